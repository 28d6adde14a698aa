use crate::{error::MediaError, playback::PlayStatus};

#[cfg(target_os = "linux")]
mod playerctl;
mod unsupported;

#[cfg(target_os = "linux")]
pub use playerctl::PlayerctlSource;
pub use unsupported::UnsupportedSource;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub status: PlayStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackCommand {
    PlayPause,
    Next,
    Previous,
}

impl PlaybackCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayPause => "play-pause",
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

/// Query and control surface of a media player.
///
/// Calls block on the player, so the event loop only invokes them from
/// worker threads.
pub trait MediaSource: Send + Sync {
    fn metadata(&self) -> Result<TrackMetadata, MediaError>;

    fn duration(&self) -> Result<f64, MediaError>;

    fn position(&self) -> Result<f64, MediaError>;

    fn control(&self, command: PlaybackCommand) -> Result<(), MediaError>;

    /// Image bytes, raw or base64 encoded.
    fn artwork(&self) -> Result<Vec<u8>, MediaError>;
}

#[cfg(target_os = "linux")]
pub fn default_source() -> Box<dyn MediaSource> {
    Box::new(PlayerctlSource::new())
}

#[cfg(not(target_os = "linux"))]
pub fn default_source() -> Box<dyn MediaSource> {
    Box::new(UnsupportedSource::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_player_verbs() {
        assert_eq!(PlaybackCommand::PlayPause.as_str(), "play-pause");
        assert_eq!(PlaybackCommand::Next.as_str(), "next");
        assert_eq!(PlaybackCommand::Previous.as_str(), "previous");
    }
}
