use tracing::debug;

use super::{MediaSource, PlaybackCommand, TrackMetadata};
use crate::error::MediaError;

#[derive(Debug, Default)]
pub struct UnsupportedSource;

impl UnsupportedSource {
    pub fn new() -> Self {
        Self
    }
}

impl MediaSource for UnsupportedSource {
    fn metadata(&self) -> Result<TrackMetadata, MediaError> {
        Err(MediaError::Unavailable(
            "no active music player on this platform".to_string(),
        ))
    }

    fn duration(&self) -> Result<f64, MediaError> {
        Err(MediaError::nothing_playing())
    }

    fn position(&self) -> Result<f64, MediaError> {
        Err(MediaError::nothing_playing())
    }

    fn control(&self, command: PlaybackCommand) -> Result<(), MediaError> {
        debug!(command = command.as_str(), "media control not supported here");
        Ok(())
    }

    fn artwork(&self) -> Result<Vec<u8>, MediaError> {
        Err(MediaError::nothing_playing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_reports_nothing_playing() {
        let source = UnsupportedSource::new();
        assert!(source.metadata().unwrap_err().is_nothing_playing());
        assert!(source.position().unwrap_err().is_nothing_playing());
        assert!(source.control(PlaybackCommand::Next).is_ok());
    }
}
