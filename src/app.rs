//! The interactive event loop.
//!
//! One thread owns all display state. Media queries, artwork processing and
//! rotation frame rendering run on short-lived worker threads that report
//! back through a single event channel; results for a track that is no
//! longer current are dropped on arrival.

use std::{
    io::Write,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::{
    animation::{RotationState, ScrollState},
    artwork::{process_artwork, ProcessedArtwork},
    config::{ColorMode, Config},
    config_store::ConfigStore,
    error::{ArtworkError, MediaError},
    frame_cache::FrameCache,
    kitty::{EncodeOptions, RotationSpec},
    media::{MediaSource, PlaybackCommand, TrackMetadata},
    playback::{PlayStatus, PlaybackSnapshot, TrackId},
    theme::accent_color,
    view::{PanelBody, PanelState, Renderer, TrackView},
};

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TICK_CAP: Duration = Duration::from_secs(1);
const PAUSED_TICK_FACTOR: u32 = 3;
const IDLE_TICK_FACTOR: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    PlayPause,
    Next,
    Previous,
    ToggleArtwork,
    ToggleHelp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone)]
pub struct FetchedArtwork {
    pub raw: Arc<[u8]>,
    pub processed: Option<ProcessedArtwork>,
}

#[derive(Debug, Clone)]
pub struct TrackUpdate {
    pub metadata: TrackMetadata,
    pub duration_secs: f64,
    pub position_secs: f64,
    pub observed_at: Instant,
    pub artwork: Option<FetchedArtwork>,
}

impl TrackUpdate {
    pub fn track_id(&self) -> TrackId {
        TrackId::new(&self.metadata.title, &self.metadata.artist)
    }
}

#[derive(Debug)]
pub enum AppEvent {
    Fetched(Result<TrackUpdate, MediaError>),
    FramesBuilt {
        request_id: u64,
        track: TrackId,
        result: Result<FrameCache, ArtworkError>,
    },
    ControlFinished {
        command: PlaybackCommand,
        result: Result<(), MediaError>,
    },
    Key(KeyAction),
    Resize(u16, u16),
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub artwork_track: Option<TrackId>,
    pub want_artwork: bool,
    pub extract_color: bool,
    pub rotation: Option<RotationSpec>,
    pub options: EncodeOptions,
}

/// Queries the player and, for a new track, processes its artwork.
///
/// Artwork is not downloaded at all while paused on the same track. Artwork
/// failures never fail the fetch.
pub fn fetch_track(
    source: &dyn MediaSource,
    request: &FetchRequest,
) -> Result<TrackUpdate, MediaError> {
    let metadata = source.metadata()?;
    let duration_secs = source.duration()?;
    let position_secs = source.position()?;
    let observed_at = Instant::now();

    let track = TrackId::new(&metadata.title, &metadata.artist);
    let changed = request.artwork_track.as_ref() != Some(&track);
    let skip_artwork =
        !request.want_artwork || (metadata.status == PlayStatus::Paused && !changed);

    let artwork = if skip_artwork {
        None
    } else {
        match source.artwork() {
            Ok(bytes) if !bytes.is_empty() => {
                let processed = if changed {
                    match process_artwork(
                        &bytes,
                        request.extract_color,
                        request.rotation,
                        request.options,
                    ) {
                        Ok(processed) => Some(processed),
                        Err(err) => {
                            warn!(track = %track, "artwork unusable: {err}");
                            None
                        }
                    }
                } else {
                    None
                };
                Some(FetchedArtwork {
                    raw: Arc::from(bytes),
                    processed,
                })
            }
            Ok(_) => {
                debug!(track = %track, "player returned empty artwork");
                None
            }
            Err(err) => {
                debug!(track = %track, "no artwork: {err}");
                None
            }
        }
    };

    Ok(TrackUpdate {
        metadata,
        duration_secs,
        position_secs,
        observed_at,
        artwork,
    })
}

#[derive(Debug)]
enum AnimationPhase {
    Idle,
    Building {
        request_id: u64,
        track: TrackId,
        frames: usize,
    },
    Ready(FrameCache),
    /// Building failed; not retried until the track or settings change.
    Failed {
        track: TrackId,
        frames: usize,
    },
}

pub struct App {
    store: Arc<ConfigStore>,
    /// Snapshot the display state was last reconciled with.
    config: Config,
    source: Arc<dyn MediaSource>,
    events_tx: Sender<AppEvent>,
    events_rx: Receiver<AppEvent>,
    supports_kitty: bool,

    metadata: Option<TrackMetadata>,
    current_track: Option<TrackId>,
    playback: PlaybackSnapshot,
    error: Option<MediaError>,

    color: String,
    artwork_encoded: Option<String>,
    artwork_track: Option<TrackId>,
    raw_artwork: Option<(TrackId, Arc<[u8]>)>,
    animation: AnimationPhase,
    next_build_id: u64,
    rotation: RotationState,
    scroll: ScrollState,

    fetch_inflight: Option<Instant>,
    fetch_queued: bool,
    show_help: bool,
    terminal_size: (u16, u16),
}

impl App {
    pub fn new(store: Arc<ConfigStore>, source: Arc<dyn MediaSource>, supports_kitty: bool) -> Self {
        let config = store.get();
        let (events_tx, events_rx) = unbounded();
        Self {
            color: config.ui.color.clone(),
            config,
            store,
            source,
            events_tx,
            events_rx,
            supports_kitty,
            metadata: None,
            current_track: None,
            playback: PlaybackSnapshot::default(),
            error: None,
            artwork_encoded: None,
            artwork_track: None,
            raw_artwork: None,
            animation: AnimationPhase::Idle,
            next_build_id: 0,
            rotation: RotationState::default(),
            scroll: ScrollState::default(),
            fetch_inflight: None,
            fetch_queued: false,
            show_help: false,
            terminal_size: (80, 24),
        }
    }

    pub fn events_sender(&self) -> Sender<AppEvent> {
        self.events_tx.clone()
    }

    pub fn next_event(&self, timeout: Duration) -> Option<AppEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    pub fn set_terminal_size(&mut self, cols: u16, rows: u16) {
        self.terminal_size = (cols, rows);
    }

    pub fn handle(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::Fetched(result) => self.on_fetched(result),
            AppEvent::FramesBuilt {
                request_id,
                track,
                result,
            } => self.on_frames_built(request_id, track, result),
            AppEvent::ControlFinished { command, result } => {
                if let Err(err) = result {
                    warn!(command = command.as_str(), "media control failed: {err}");
                    self.error = Some(err);
                }
                self.request_fetch();
            }
            AppEvent::Key(action) => return self.on_key(action),
            AppEvent::Resize(cols, rows) => self.set_terminal_size(cols, rows),
        }
        Flow::Continue
    }

    fn on_key(&mut self, action: KeyAction) -> Flow {
        match action {
            KeyAction::Quit => return Flow::Quit,
            KeyAction::PlayPause => self.send_control(PlaybackCommand::PlayPause),
            KeyAction::Next => self.send_control(PlaybackCommand::Next),
            KeyAction::Previous => self.send_control(PlaybackCommand::Previous),
            KeyAction::ToggleArtwork => {
                let mut config = self.store.get();
                config.artwork.enabled = !config.artwork.enabled;
                info!(enabled = config.artwork.enabled, "artwork toggled");
                self.store.set(config);
                self.on_config_changed();
            }
            KeyAction::ToggleHelp => self.show_help = !self.show_help,
        }
        Flow::Continue
    }

    fn send_control(&mut self, command: PlaybackCommand) {
        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        let spawned = thread::Builder::new()
            .name("media-control".to_string())
            .spawn(move || {
                let result = source.control(command);
                let _ = tx.send(AppEvent::ControlFinished { command, result });
            });
        if let Err(err) = spawned {
            warn!("failed to spawn control thread: {err}");
        }
    }

    pub fn request_fetch(&mut self) {
        if let Some(started) = self.fetch_inflight {
            if started.elapsed() < FETCH_TIMEOUT {
                self.fetch_queued = true;
                return;
            }
            warn!("previous fetch still running after {FETCH_TIMEOUT:?}");
        }

        let request = FetchRequest {
            artwork_track: self.artwork_track.clone(),
            want_artwork: self.artwork_shown(),
            extract_color: self.config.ui.color_mode == ColorMode::Auto,
            rotation: self
                .config
                .artwork
                .vinyl_mode
                .then(|| RotationSpec::new(self.rotation.frame, self.config.artwork.vinyl_frames)),
            options: EncodeOptions::from_config(&self.config.artwork),
        };
        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        let spawned = thread::Builder::new()
            .name("media-fetch".to_string())
            .spawn(move || {
                let result = fetch_track(source.as_ref(), &request);
                let _ = tx.send(AppEvent::Fetched(result));
            });
        match spawned {
            Ok(_) => {
                self.fetch_inflight = Some(Instant::now());
                self.fetch_queued = false;
            }
            Err(err) => warn!("failed to spawn fetch thread: {err}"),
        }
    }

    fn on_fetched(&mut self, result: Result<TrackUpdate, MediaError>) {
        self.fetch_inflight = None;

        match result {
            Ok(update) => self.apply_update(update),
            Err(err) => {
                if err.is_nothing_playing() {
                    debug!("nothing playing: {err}");
                } else {
                    warn!("fetch failed: {err}");
                }
                self.error = Some(err);
                self.current_track = None;
                self.artwork_encoded = None;
                self.artwork_track = None;
                self.raw_artwork = None;
                self.animation = AnimationPhase::Idle;
            }
        }

        if self.fetch_queued {
            self.request_fetch();
        }
    }

    fn apply_update(&mut self, update: TrackUpdate) {
        let track = update.track_id();
        if self.current_track.as_ref() != Some(&track) {
            info!(track = %track, "track changed");
            self.scroll.reset();
            self.rotation.reset();
            self.animation = AnimationPhase::Idle;
            self.raw_artwork = None;
            if self.artwork_track.as_ref() != Some(&track) {
                self.artwork_encoded = None;
                self.artwork_track = None;
            }
            self.current_track = Some(track.clone());
        }

        self.playback = PlaybackSnapshot::new(
            update.position_secs,
            update.duration_secs,
            update.metadata.status,
            update.observed_at,
        );
        self.metadata = Some(update.metadata);
        self.error = None;

        let Some(artwork) = update.artwork else {
            return;
        };
        if let Some(processed) = artwork.processed {
            if self.config.ui.color_mode == ColorMode::Auto && !processed.color.is_empty() {
                self.color = processed.color;
            }
            if !processed.encoded.is_empty() {
                self.artwork_encoded = Some(processed.encoded);
                self.artwork_track = Some(track.clone());
            }
        }
        self.raw_artwork = Some((track, artwork.raw));
        self.maybe_build_frames();
    }

    /// Kicks off a frame build when rotation is on and nothing usable exists
    /// for the current track and frame count.
    fn maybe_build_frames(&mut self) {
        if !self.config.artwork.vinyl_mode || !self.artwork_shown() {
            return;
        }
        let Some((track, raw)) = &self.raw_artwork else {
            return;
        };
        if self.current_track.as_ref() != Some(track) {
            return;
        }
        let wanted = self.config.artwork.vinyl_frames;
        let up_to_date = match &self.animation {
            AnimationPhase::Idle => false,
            AnimationPhase::Building { track: t, frames, .. }
            | AnimationPhase::Failed { track: t, frames } => t == track && *frames == wanted,
            AnimationPhase::Ready(cache) => cache.track() == track && cache.len() == wanted,
        };
        if up_to_date {
            return;
        }

        let track = track.clone();
        let raw = Arc::clone(raw);
        self.start_frame_build(track, raw, wanted);
    }

    fn start_frame_build(&mut self, track: TrackId, raw: Arc<[u8]>, frames: usize) {
        let request_id = self.next_build_id;
        self.next_build_id = self.next_build_id.wrapping_add(1);
        let options = EncodeOptions::from_config(&self.config.artwork);
        let tx = self.events_tx.clone();
        let worker_track = track.clone();

        debug!(track = %track, frames, request_id, "building rotation frames");
        let spawned = thread::Builder::new()
            .name("vinyl-frames".to_string())
            .spawn(move || {
                let result = FrameCache::build(&raw, worker_track.clone(), frames, options);
                let _ = tx.send(AppEvent::FramesBuilt {
                    request_id,
                    track: worker_track,
                    result,
                });
            });
        self.animation = match spawned {
            Ok(_) => AnimationPhase::Building {
                request_id,
                track,
                frames,
            },
            Err(err) => {
                warn!("failed to spawn frame builder: {err}");
                AnimationPhase::Failed { track, frames }
            }
        };
    }

    fn on_frames_built(
        &mut self,
        request_id: u64,
        track: TrackId,
        result: Result<FrameCache, ArtworkError>,
    ) {
        let expected = match &self.animation {
            AnimationPhase::Building {
                request_id: pending,
                track: pending_track,
                frames,
            } if *pending == request_id
                && *pending_track == track
                && self.current_track.as_ref() == Some(&track) =>
            {
                *frames
            }
            _ => {
                debug!(track = %track, request_id, "discarding stale rotation frames");
                return;
            }
        };

        self.animation = match result {
            Ok(cache) if cache.len() == expected => {
                self.rotation.frame %= expected;
                AnimationPhase::Ready(cache)
            }
            Ok(cache) => {
                warn!(
                    track = %track,
                    "rotation frame count mismatch: {} != {expected}",
                    cache.len()
                );
                AnimationPhase::Failed {
                    track,
                    frames: expected,
                }
            }
            Err(err) => {
                warn!(track = %track, "rotation frames failed: {err}");
                AnimationPhase::Failed {
                    track,
                    frames: expected,
                }
            }
        };
    }

    pub fn on_config_changed(&mut self) {
        let previous = std::mem::replace(&mut self.config, self.store.get());
        let (prev_art, art) = (&previous.artwork, self.config.artwork.clone());
        let mut refetch = false;

        if self.config.ui.color_mode == ColorMode::Manual {
            self.color = self.config.ui.color.clone();
        } else if previous.ui.color_mode == ColorMode::Manual {
            // Extract a color from the current artwork on the next fetch.
            self.artwork_track = None;
            refetch = true;
        }

        let options_changed = EncodeOptions::from_config(prev_art) != EncodeOptions::from_config(&art);

        if prev_art.enabled && !art.enabled {
            self.artwork_encoded = None;
            self.artwork_track = None;
            self.animation = AnimationPhase::Idle;
        } else if !prev_art.enabled && art.enabled {
            self.artwork_track = None;
            refetch = true;
        }

        if prev_art.vinyl_mode && !art.vinyl_mode {
            self.animation = AnimationPhase::Idle;
            self.rotation.reset();
            self.artwork_track = None;
            refetch = true;
        } else if art.vinyl_mode
            && (!prev_art.vinyl_mode || prev_art.vinyl_frames != art.vinyl_frames || options_changed)
        {
            self.animation = AnimationPhase::Idle;
            self.rotation.reset();
            self.maybe_build_frames();
        }

        if options_changed {
            self.artwork_track = None;
            refetch = true;
        }

        if refetch && self.artwork_shown() {
            self.request_fetch();
        }
        info!("configuration applied");
    }

    pub fn on_tick(&mut self, dt: Duration) {
        if self.is_spinning() {
            if let AnimationPhase::Ready(cache) = &self.animation {
                self.rotation
                    .advance(self.config.artwork.vinyl_rpm, cache.len(), dt.as_secs_f64());
            }
        }

        if self.error.is_none() {
            if let Some(metadata) = &self.metadata {
                let longest = [&metadata.title, &metadata.artist, &metadata.album]
                    .iter()
                    .map(|field| field.chars().count())
                    .max()
                    .unwrap_or(0);
                let width = self.config.text_width(self.artwork_shown());
                self.scroll.advance(longest, width);
            }
        }
    }

    fn is_spinning(&self) -> bool {
        self.config.artwork.vinyl_mode
            && self.artwork_shown()
            && self.error.is_none()
            && self.playback.status == PlayStatus::Playing
    }

    pub fn tick_interval(&self) -> Duration {
        let base = self.config.timing.ui_refresh();
        let idle = (base * IDLE_TICK_FACTOR).min(IDLE_TICK_CAP).max(base);
        if self.error.is_some() || self.metadata.is_none() {
            return idle;
        }
        match self.playback.status {
            PlayStatus::Playing => base,
            PlayStatus::Paused => base * PAUSED_TICK_FACTOR,
            PlayStatus::Stopped | PlayStatus::Unknown => idle,
        }
    }

    pub fn artwork_shown(&self) -> bool {
        self.supports_kitty && self.config.artwork.enabled
    }

    pub fn displayed_artwork(&self) -> Option<&str> {
        if !self.artwork_shown() || self.error.is_some() {
            return None;
        }
        if self.config.artwork.vinyl_mode {
            if let AnimationPhase::Ready(cache) = &self.animation {
                if self.current_track.as_ref() == Some(cache.track()) {
                    return cache.frame(self.rotation.frame);
                }
            }
        }
        self.artwork_encoded.as_deref()
    }

    pub fn panel_state(&self, now: Instant) -> PanelState<'_> {
        let body = match (&self.error, &self.metadata) {
            (Some(err), _) if err.is_nothing_playing() => PanelBody::NothingPlaying,
            (Some(err), _) => PanelBody::Error(err.to_string()),
            (None, Some(metadata)) => PanelBody::Track(TrackView {
                title: &metadata.title,
                artist: &metadata.artist,
                album: &metadata.album,
                status: metadata.status,
                position_secs: self.playback.position_at(now),
                duration_secs: self.playback.duration_secs,
                progress: self.playback.progress_at(now),
                scroll_offset: self.scroll.offset,
            }),
            (None, None) => PanelBody::NothingPlaying,
        };
        let artwork = self.displayed_artwork();
        let art = &self.config.artwork;
        PanelState {
            body,
            accent: accent_color(&self.color),
            max_width: self.config.ui.max_width,
            text_width: self.config.text_width(self.artwork_shown()),
            padding: art.padding,
            artwork,
            artwork_columns: art.width_columns,
            clear_artwork: self.supports_kitty && artwork.is_none(),
            vinyl: (art.vinyl_mode && artwork.is_some())
                .then_some((self.rotation.frame, art.vinyl_rpm)),
            show_help: self.show_help,
        }
    }

    pub fn run<W: Write>(mut self, config_rx: Receiver<()>, out: &mut W) -> anyhow::Result<()> {
        let events = self.events_rx.clone();
        let mut config_rx = config_rx;
        let mut renderer = Renderer::new();

        let start = Instant::now();
        let mut last_tick = start;
        let mut next_tick = start;
        let mut next_fetch = start;

        loop {
            let now = Instant::now();
            let mut redraw = false;
            if now >= next_fetch {
                self.request_fetch();
                next_fetch = now + self.config.timing.data_fetch();
            }
            if now >= next_tick {
                self.on_tick(now.saturating_duration_since(last_tick));
                last_tick = now;
                next_tick = now + self.tick_interval();
                redraw = true;
            }
            if redraw {
                renderer
                    .draw(out, &self.panel_state(now), self.terminal_size)
                    .context("Failed to draw panel")?;
            }

            let timeout = next_tick.min(next_fetch).saturating_duration_since(Instant::now());
            let mut config_closed = false;
            let mut flow = Flow::Continue;
            let mut changed = false;
            select! {
                recv(events) -> event => {
                    if let Ok(event) = event {
                        flow = self.handle(event);
                        changed = true;
                    }
                }
                recv(config_rx) -> msg => match msg {
                    Ok(()) => {
                        self.on_config_changed();
                        changed = true;
                    }
                    Err(_) => config_closed = true,
                },
                default(timeout) => {}
            }

            if flow == Flow::Quit {
                info!("quitting");
                break;
            }
            if config_closed {
                config_rx = never();
            }
            if changed {
                // Pick up a faster cadence right away, e.g. after resuming.
                next_tick = next_tick.min(Instant::now() + self.tick_interval());
                renderer
                    .draw(out, &self.panel_state(Instant::now()), self.terminal_size)
                    .context("Failed to draw panel")?;
            }
        }
        Ok(())
    }

    pub fn current_track(&self) -> Option<&TrackId> {
        self.current_track.as_ref()
    }

    pub fn metadata(&self) -> Option<&TrackMetadata> {
        self.metadata.as_ref()
    }

    pub fn error(&self) -> Option<&MediaError> {
        self.error.as_ref()
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn playback(&self) -> &PlaybackSnapshot {
        &self.playback
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    pub fn rotation(&self) -> &RotationState {
        &self.rotation
    }

    pub fn frame_cache(&self) -> Option<&FrameCache> {
        match &self.animation {
            AnimationPhase::Ready(cache) => Some(cache),
            _ => None,
        }
    }

    pub fn is_building_frames(&self) -> bool {
        matches!(self.animation, AnimationPhase::Building { .. })
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
