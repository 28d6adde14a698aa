use std::{
    env,
    io::{self, Write},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::{debug, warn};

use crate::{
    app::{AppEvent, KeyAction},
    artwork, kitty,
};

const INPUT_POLL: Duration = Duration::from_millis(200);

pub fn supports_kitty_graphics() -> bool {
    let term = env::var("TERM").unwrap_or_default();
    let term_program = env::var("TERM_PROGRAM").unwrap_or_default();
    detect_kitty_graphics(&term, &term_program)
}

pub fn detect_kitty_graphics(term: &str, term_program: &str) -> bool {
    term.contains("kitty")
        || term.contains("konsole")
        || term_program == "ghostty"
        || term_program == "WezTerm"
}

pub struct TerminalGuard {
    kitty: bool,
}

impl TerminalGuard {
    pub fn enter(kitty: bool) -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)
            .context("Failed to enter alternate screen")?;
        install_panic_hook(kitty);
        Ok(Self { kitty })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore(self.kitty);
    }
}

fn restore(kitty: bool) {
    let mut stdout = io::stdout();
    if kitty {
        let _ = write!(stdout, "{}", kitty::delete_sequence());
    }
    let _ = execute!(stdout, cursor::Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
}

fn install_panic_hook(kitty: bool) {
    install_panic_hook_with(move || restore(kitty));
}

/// Puts the terminal back before the panic message is printed.
///
/// Panics raised inside the artwork boundary are caught there and logged,
/// so they neither restore the terminal nor print anything.
fn install_panic_hook_with(restore: impl Fn() + Send + Sync + 'static) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if artwork::in_image_code() {
            return;
        }
        restore();
        default_hook(info);
    }));
}

pub fn size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}

pub fn spawn_input_thread(tx: Sender<AppEvent>) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("terminal-input".to_string())
        .spawn(move || loop {
            match event::poll(INPUT_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    warn!("terminal input poll failed: {err}");
                    break;
                }
            }

            let forwarded = match event::read() {
                Ok(Event::Key(key)) => match map_key(&key) {
                    Some(action) => tx.send(AppEvent::Key(action)),
                    None => Ok(()),
                },
                Ok(Event::Resize(cols, rows)) => tx.send(AppEvent::Resize(cols, rows)),
                Ok(_) => Ok(()),
                Err(err) => {
                    warn!("terminal input read failed: {err}");
                    break;
                }
            };
            if forwarded.is_err() {
                debug!("event loop gone, stopping input thread");
                break;
            }
        })
        .context("Failed to spawn input thread")
}

pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(KeyAction::Quit);
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(KeyAction::PlayPause),
        KeyCode::Char('n') => Some(KeyAction::Next),
        KeyCode::Char('b') => Some(KeyAction::Previous),
        KeyCode::Char('a') => Some(KeyAction::ToggleArtwork),
        KeyCode::Char('?') => Some(KeyAction::ToggleHelp),
        _ => None,
    }
}
