use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    io::{self, Write},
};

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, Print, SetAttribute, SetForegroundColor},
    terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};

use crate::{
    animation::scroll_text,
    kitty,
    playback::{format_time, PlayStatus},
};

pub const HEADER: &str = "󰓃 Now Playing";
pub const NOTHING_PLAYING: &str = "Nothing playing";
pub const NOTHING_PLAYING_HINT: &str = "Start playing music to begin";
pub const HELP_HINT: &str = "Press ? for help";

const TITLE_ICON: &str = "󰎈 ";
const ARTIST_ICON: &str = "󰠃 ";
const ALBUM_ICON: &str = "󰀥 ";
const PLAY_ICON: &str = "󰐊 ";
const PAUSE_ICON: &str = "󰏤 ";
const STOP_ICON: &str = "󰓛 ";

const HELP_KEYS: [(&str, &str); 6] = [
    ("Play/Pause: ", "p"),
    ("  Next: ", "n"),
    ("  Previous: ", "b"),
    ("  Toggle Art: ", "a"),
    ("  Quit: ", "q"),
    ("  Hide: ", "?"),
];

const SPINNER: [char; 8] = ['⠁', '⠂', '⠄', '⡀', '⢀', '⠠', '⠐', '⠈'];

const PROGRESS_RESERVED: usize = 17;
const HORIZONTAL_CHROME: usize = 4;

const WHITE: Color = Color::AnsiValue(15);
const MUTED: Color = Color::AnsiValue(240);
const DIM: Color = Color::AnsiValue(245);
const ERROR: Color = Color::AnsiValue(203);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub color: Color,
    pub bold: bool,
}

impl Span {
    fn plain(text: impl Into<String>) -> Self {
        Self::colored(text, Color::Reset)
    }

    fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
            bold: false,
        }
    }

    fn bold(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
            bold: true,
        }
    }
}

pub type Line = Vec<Span>;

pub fn line_text(line: &[Span]) -> String {
    line.iter().map(|span| span.text.as_str()).collect()
}

#[derive(Debug, Clone)]
pub struct TrackView<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub album: &'a str,
    pub status: PlayStatus,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub progress: f64,
    pub scroll_offset: usize,
}

#[derive(Debug, Clone)]
pub enum PanelBody<'a> {
    NothingPlaying,
    Error(String),
    Track(TrackView<'a>),
}

#[derive(Debug, Clone)]
pub struct PanelState<'a> {
    pub body: PanelBody<'a>,
    pub accent: Color,
    pub max_width: usize,
    pub text_width: usize,
    pub padding: usize,
    pub artwork: Option<&'a str>,
    pub artwork_columns: u32,
    pub clear_artwork: bool,
    pub vinyl: Option<(usize, f64)>,
    pub show_help: bool,
}

impl PanelState<'_> {
    fn content_width(&self) -> usize {
        self.max_width.saturating_sub(HORIZONTAL_CHROME)
    }

    fn artwork_rows(&self) -> usize {
        if self.artwork.is_none() {
            return 0;
        }
        (self.artwork_columns as usize).div_ceil(2)
    }
}

pub fn compose(state: &PanelState<'_>) -> Vec<Line> {
    let (text, progress) = match &state.body {
        PanelBody::NothingPlaying => (
            vec![
                vec![Span::colored(HEADER, state.accent)],
                Vec::new(),
                vec![Span::colored(NOTHING_PLAYING, MUTED)],
                Vec::new(),
                vec![Span::colored(NOTHING_PLAYING_HINT, DIM)],
            ],
            None,
        ),
        PanelBody::Error(message) => (
            vec![vec![Span::colored(format!("Error: {message}"), ERROR)]],
            None,
        ),
        PanelBody::Track(track) => (
            track_lines(track, state),
            progress_line(track, state),
        ),
    };

    let mut lines = Vec::new();
    if state.artwork.is_some() {
        let art_rows = state.artwork_rows();
        let label_row = state.vinyl.map(|_| art_rows);
        let total = text.len().max(art_rows + usize::from(label_row.is_some()));
        for row in 0..total {
            let mut line = Vec::with_capacity(4);
            if Some(row) == label_row {
                line.push(Span::colored(
                    fit(&vinyl_label(state.vinyl), state.padding),
                    state.accent,
                ));
            } else {
                line.push(Span::plain(" ".repeat(state.padding)));
            }
            if let Some(text_line) = text.get(row) {
                line.extend(text_line.iter().cloned());
            }
            lines.push(line);
        }
    } else {
        lines = text;
    }

    if let Some(bar) = progress {
        lines.push(Vec::new());
        lines.push(bar);
    }
    lines
}

fn track_lines(track: &TrackView<'_>, state: &PanelState<'_>) -> Vec<Line> {
    let mut lines = vec![vec![Span::colored(HEADER, state.accent)], Vec::new()];

    let fields = [
        (TITLE_ICON, track.title),
        (ARTIST_ICON, track.artist),
        (ALBUM_ICON, track.album),
    ];
    for (icon, value) in fields {
        if value.is_empty() {
            continue;
        }
        let shown = if value.chars().count() > state.text_width {
            scroll_text(value, state.text_width, track.scroll_offset)
        } else {
            value.to_string()
        };
        lines.push(vec![
            Span::bold(icon, state.accent),
            Span::plain(format!(" {shown}")),
        ]);
    }

    let (icon, label) = match track.status {
        PlayStatus::Playing => (PLAY_ICON, "Playing"),
        PlayStatus::Paused => (PAUSE_ICON, "Paused"),
        PlayStatus::Stopped => (STOP_ICON, "Stopped"),
        PlayStatus::Unknown => (PLAY_ICON, "Unknown"),
    };
    lines.push(vec![
        Span::bold(icon, state.accent),
        Span::plain(format!(" {label}")),
    ]);
    lines
}

fn progress_line(track: &TrackView<'_>, state: &PanelState<'_>) -> Option<Line> {
    if track.progress <= 0.0 {
        return None;
    }
    let bar_width = state.max_width.saturating_sub(PROGRESS_RESERVED);
    let filled = ((bar_width as f64 * track.progress) as usize).min(bar_width);
    Some(vec![
        Span::colored("█".repeat(filled), state.accent),
        Span::colored("─".repeat(bar_width - filled), WHITE),
        Span::plain(" "),
        Span::colored(format_time(track.position_secs as u64), state.accent),
        Span::plain("/"),
        Span::colored(format_time(track.duration_secs as u64), state.accent),
    ])
}

fn vinyl_label(vinyl: Option<(usize, f64)>) -> String {
    let Some((frame, rpm)) = vinyl else {
        return String::new();
    };
    let spinner = SPINNER[frame % SPINNER.len()];
    let speed = if rpm.fract().abs() < f64::EPSILON {
        format!("{rpm:.0}")
    } else {
        format!("{rpm:.2}")
    };
    format!(" {spinner} {speed} RPM ")
}

fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

fn fit_line(line: &[Span], width: usize) -> Line {
    let mut remaining = width;
    let mut out = Vec::with_capacity(line.len() + 1);
    for span in line {
        if remaining == 0 {
            break;
        }
        let text: String = span.text.chars().take(remaining).collect();
        remaining -= text.chars().count();
        out.push(Span {
            text,
            color: span.color,
            bold: span.bold,
        });
    }
    if remaining > 0 {
        out.push(Span::plain(" ".repeat(remaining)));
    }
    out
}

fn help_line(state: &PanelState<'_>) -> Line {
    if !state.show_help {
        return vec![Span::colored(HELP_HINT, MUTED)];
    }
    HELP_KEYS
        .iter()
        .flat_map(|(label, key)| [Span::plain(*label), Span::colored(*key, state.accent)])
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    terminal: (u16, u16),
    origin: (u16, u16),
    height: u16,
}

/// Draws panels incrementally: the screen is only cleared when the panel
/// moves, and the image is only retransmitted when its frame changes.
#[derive(Debug, Default)]
pub struct Renderer {
    geometry: Option<Geometry>,
    artwork: Option<(u64, (u16, u16))>,
    artwork_cleared: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub fn draw<W: Write>(
        &mut self,
        out: &mut W,
        state: &PanelState<'_>,
        terminal: (u16, u16),
    ) -> io::Result<()> {
        let lines = compose(state);
        let inner = state.max_width;
        let content_width = state.content_width();
        let panel_width = inner + 2;
        // Border and one padding row on each side.
        let panel_height = lines.len() + 4;
        let total_height = panel_height + 2;

        let origin = (
            to_u16((terminal.0 as usize).saturating_sub(panel_width) / 2),
            to_u16((terminal.1 as usize).saturating_sub(total_height) / 2),
        );
        let geometry = Geometry {
            terminal,
            origin,
            height: to_u16(panel_height),
        };

        queue!(out, BeginSynchronizedUpdate)?;

        if self.geometry != Some(geometry) {
            queue!(out, Clear(ClearType::All))?;
            self.geometry = Some(geometry);
            self.artwork = None;
            self.artwork_cleared = false;
        }

        let (x, y) = origin;
        let border = state.accent;
        queue!(
            out,
            MoveTo(x, y),
            SetForegroundColor(border),
            Print(format!("╭{}╮", "─".repeat(inner)))
        )?;

        let blank: Line = Vec::new();
        let rows = std::iter::once(&blank)
            .chain(lines.iter())
            .chain(std::iter::once(&blank));
        for (offset, line) in rows.enumerate() {
            let row = y + 1 + to_u16(offset);
            queue!(
                out,
                MoveTo(x, row),
                SetForegroundColor(border),
                Print("│  ")
            )?;
            write_spans(out, &fit_line(line, content_width))?;
            queue!(
                out,
                SetForegroundColor(border),
                Print(format!("{}│", " ".repeat(inner.saturating_sub(content_width + 2))))
            )?;
        }

        queue!(
            out,
            MoveTo(x, y + to_u16(panel_height) - 1),
            SetForegroundColor(border),
            Print(format!("╰{}╯", "─".repeat(inner)))
        )?;

        let help = help_line(state);
        let help_width = line_text(&help).chars().count();
        let help_row = y + to_u16(panel_height) + 1;
        let center = x as usize + panel_width / 2;
        let help_x = to_u16(center.saturating_sub(help_width / 2));
        queue!(out, MoveTo(0, help_row), Clear(ClearType::CurrentLine), MoveTo(help_x, help_row))?;
        write_spans(out, &help)?;

        self.draw_artwork(out, state, (x + 3, y + 2))?;

        queue!(out, SetAttribute(Attribute::Reset), EndSynchronizedUpdate)?;
        out.flush()
    }

    fn draw_artwork<W: Write>(
        &mut self,
        out: &mut W,
        state: &PanelState<'_>,
        at: (u16, u16),
    ) -> io::Result<()> {
        match state.artwork {
            Some(frame) => {
                let key = (hash_str(frame), at);
                if self.artwork != Some(key) {
                    queue!(out, MoveTo(at.0, at.1), Print(frame))?;
                    self.artwork = Some(key);
                }
                self.artwork_cleared = false;
            }
            None => {
                self.artwork = None;
                if state.clear_artwork && !self.artwork_cleared {
                    queue!(out, Print(kitty::delete_sequence()))?;
                    self.artwork_cleared = true;
                }
            }
        }
        Ok(())
    }
}

fn write_spans<W: Write>(out: &mut W, spans: &[Span]) -> io::Result<()> {
    for span in spans {
        queue!(out, SetForegroundColor(span.color))?;
        if span.bold {
            queue!(
                out,
                SetAttribute(Attribute::Bold),
                Print(&span.text),
                SetAttribute(Attribute::NormalIntensity)
            )?;
        } else {
            queue!(out, Print(&span.text))?;
        }
    }
    Ok(())
}

fn hash_str(data: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track<'a>() -> TrackView<'a> {
        TrackView {
            title: "Song",
            artist: "Band",
            album: "Record",
            status: PlayStatus::Playing,
            position_secs: 75.0,
            duration_secs: 200.0,
            progress: 0.375,
            scroll_offset: 0,
        }
    }

    fn state<'a>(body: PanelBody<'a>) -> PanelState<'a> {
        PanelState {
            body,
            accent: Color::AnsiValue(2),
            max_width: 45,
            text_width: 36,
            padding: 16,
            artwork: None,
            artwork_columns: 14,
            clear_artwork: false,
            vinyl: None,
            show_help: false,
        }
    }

    fn texts(lines: &[Line]) -> Vec<String> {
        lines.iter().map(|line| line_text(line)).collect()
    }

    #[test]
    fn track_panel_lists_fields_and_progress() {
        let lines = texts(&compose(&state(PanelBody::Track(track()))));
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[2], "󰎈  Song");
        assert_eq!(lines[3], "󰠃  Band");
        assert_eq!(lines[4], "󰀥  Record");
        assert_eq!(lines[5], "󰐊  Playing");
        let bar = lines.last().unwrap();
        // 28 columns of bar, 37.5% filled.
        assert!(bar.starts_with(&"█".repeat(10)));
        assert!(bar.ends_with(" 01:15/03:20"));
        assert_eq!(bar.chars().count(), 28 + 12);
    }

    #[test]
    fn empty_fields_and_zero_progress_are_omitted() {
        let mut view = track();
        view.album = "";
        view.progress = 0.0;
        view.status = PlayStatus::Paused;
        let lines = texts(&compose(&state(PanelBody::Track(view))));
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "󰏤  Paused");
    }

    #[test]
    fn long_fields_scroll_inside_the_window() {
        let mut view = track();
        view.title = "An Exceptionally Long Song Title That Scrolls";
        view.scroll_offset = 3;
        let mut panel = state(PanelBody::Track(view));
        panel.text_width = 10;
        let lines = texts(&compose(&panel));
        assert_eq!(lines[2], "󰎈  Exceptiona");
        assert_eq!(lines[3], "󰠃  Band");
    }

    #[test]
    fn nothing_playing_shows_placeholder() {
        let lines = texts(&compose(&state(PanelBody::NothingPlaying)));
        assert_eq!(
            lines,
            vec![HEADER, "", NOTHING_PLAYING, "", NOTHING_PLAYING_HINT]
        );
    }

    #[test]
    fn errors_show_a_single_line() {
        let lines = texts(&compose(&state(PanelBody::Error("boom".to_string()))));
        assert_eq!(lines, vec!["Error: boom"]);
    }

    #[test]
    fn artwork_indents_text_and_places_vinyl_label() {
        let mut panel = state(PanelBody::Track(track()));
        panel.artwork = Some("ART");
        panel.vinyl = Some((1, 33.33));
        let lines = texts(&compose(&panel));
        assert!(lines[0].starts_with(&" ".repeat(16)));
        assert!(lines[0].ends_with(HEADER));
        assert_eq!(lines[7], fit(" ⠂ 33.33 RPM ", 16));
    }

    #[test]
    fn renderer_sends_artwork_only_when_it_changes() {
        let mut renderer = Renderer::new();
        let mut panel = state(PanelBody::Track(track()));
        panel.artwork = Some("\x1b_Gframe-one\x1b\\");

        let mut first = Vec::new();
        renderer.draw(&mut first, &panel, (80, 30)).unwrap();
        assert!(String::from_utf8_lossy(&first).contains("frame-one"));

        let mut second = Vec::new();
        renderer.draw(&mut second, &panel, (80, 30)).unwrap();
        assert!(!String::from_utf8_lossy(&second).contains("frame-one"));

        panel.artwork = Some("\x1b_Gframe-two\x1b\\");
        let mut third = Vec::new();
        renderer.draw(&mut third, &panel, (80, 30)).unwrap();
        assert!(String::from_utf8_lossy(&third).contains("frame-two"));

        let mut resized = Vec::new();
        renderer.draw(&mut resized, &panel, (100, 40)).unwrap();
        assert!(String::from_utf8_lossy(&resized).contains("frame-two"));
    }

    #[test]
    fn hidden_artwork_is_deleted_once() {
        let mut renderer = Renderer::new();
        let mut panel = state(PanelBody::NothingPlaying);
        panel.clear_artwork = true;

        let mut first = Vec::new();
        renderer.draw(&mut first, &panel, (80, 30)).unwrap();
        assert!(String::from_utf8_lossy(&first).contains(&kitty::delete_sequence()));

        let mut second = Vec::new();
        renderer.draw(&mut second, &panel, (80, 30)).unwrap();
        assert!(!String::from_utf8_lossy(&second).contains(&kitty::delete_sequence()));
    }

    #[test]
    fn help_line_toggles() {
        let mut panel = state(PanelBody::NothingPlaying);
        assert_eq!(line_text(&help_line(&panel)), HELP_HINT);
        panel.show_help = true;
        assert_eq!(
            line_text(&help_line(&panel)),
            "Play/Pause: p  Next: n  Previous: b  Toggle Art: a  Quit: q  Hide: ?"
        );
    }
}
