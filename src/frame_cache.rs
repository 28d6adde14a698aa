use tracing::debug;

use crate::{
    artwork::process_artwork,
    error::ArtworkError,
    kitty::{EncodeOptions, RotationSpec},
    playback::TrackId,
};

/// Pre-rendered rotation frames for one track.
///
/// Always holds exactly the frame count it was built for; a failed frame
/// fails the whole build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCache {
    track: TrackId,
    frames: Vec<String>,
}

impl FrameCache {
    /// CPU bound; call it from a worker thread.
    pub fn build(
        raw: &[u8],
        track: TrackId,
        total: usize,
        options: EncodeOptions,
    ) -> Result<Self, ArtworkError> {
        if total == 0 {
            return Err(ArtworkError::encode("frame count must be positive"));
        }

        let mut frames = Vec::with_capacity(total);
        for index in 0..total {
            let processed =
                process_artwork(raw, false, Some(RotationSpec::new(index, total)), options)?;
            if processed.encoded.is_empty() {
                return Err(ArtworkError::encode(format!(
                    "rotation frame {index} of {total} could not be encoded"
                )));
            }
            frames.push(processed.encoded);
        }

        debug!(track = %track, frames = total, "rotation frames ready");
        Ok(Self { track, frames })
    }

    pub fn track(&self) -> &TrackId {
        &self.track
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&str> {
        if self.frames.is_empty() {
            return None;
        }
        self.frames
            .get(index % self.frames.len())
            .map(String::as_str)
    }
}
