use std::{
    fs,
    io::{self, BufWriter},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::EnvFilter;

use now_playing_term::{
    app::App,
    config::{Config, ConfigOverrides, APP_DIR_NAME},
    config_store::{change_channel, ConfigStore, ConfigWatcher},
    media, terminal,
    theme::parse_color,
};

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
    /// Configuration file (default: search the usual locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Accent color: ANSI index or #RRGGBB
    #[arg(short, long)]
    color: Option<String>,

    /// Never show album artwork
    #[arg(long)]
    no_artwork: bool,

    /// Spin the artwork like a record
    #[arg(long)]
    vinyl: bool,
}

fn init_logging() -> Result<WorkerGuard> {
    let log_dir = directories::BaseDirs::new()
        .map(|d| d.data_dir().join(APP_DIR_NAME).join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME).join("logs"));
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("now-playing")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to open log file")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("now_playing_term=info,now_playing=info"));
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(guard)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The panel owns the terminal, so logs only ever go to a file.
    let _log_guard = match init_logging() {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };
    info!("now-playing v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = Config::locate(args.config.as_deref());
    let (mut config, issues) = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => (Config::default(), Vec::new()),
    };
    for issue in &issues {
        eprintln!("warning: config: {issue}");
        warn!("config: {issue}");
    }

    let overrides = ConfigOverrides {
        color: args.color,
        no_artwork: args.no_artwork,
        vinyl: args.vinyl,
    };
    if let Some(color) = &overrides.color {
        parse_color(color).with_context(|| format!("Invalid --color '{color}'"))?;
    }
    overrides.apply(&mut config);

    let store = Arc::new(ConfigStore::new(config));
    let (notifier, config_rx) = change_channel();
    let _watcher = config_path.as_deref().and_then(|path| {
        ConfigWatcher::spawn(path, Arc::clone(&store), overrides.clone(), notifier)
            .map_err(|err| warn!("config hot reload disabled: {err:#}"))
            .ok()
    });

    let supports_kitty = terminal::supports_kitty_graphics();
    info!(supports_kitty, "terminal detected");

    let mut app = App::new(store, Arc::from(media::default_source()), supports_kitty);
    let (cols, rows) = terminal::size();
    app.set_terminal_size(cols, rows);

    let _guard = terminal::TerminalGuard::enter(supports_kitty)?;
    terminal::spawn_input_thread(app.events_sender())?;

    let mut out = BufWriter::new(io::stdout());
    let result = app.run(config_rx, &mut out);
    drop(out);
    if let Err(err) = &result {
        error!("event loop stopped: {err:#}");
    }
    result
}

