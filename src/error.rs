#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtworkError {
    #[error("failed to decode artwork: {0}")]
    Decode(String),

    #[error("no suitable colors found")]
    NoSuitableColor,

    #[error("failed to encode artwork: {0}")]
    Encode(String),
}

impl ArtworkError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

/// Phrases backends use when no player is running or nothing is queued.
const NOTHING_PLAYING_PATTERNS: [&str; 3] =
    ["can't get metadata", "no active music player", "no song playing"];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Nothing is playing; rendered as a placeholder rather than an error.
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Backend(String),
}

impl MediaError {
    pub fn classify(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let lower = msg.to_lowercase();
        if NOTHING_PLAYING_PATTERNS
            .iter()
            .any(|pattern| lower.contains(pattern))
        {
            Self::Unavailable(msg)
        } else {
            Self::Backend(msg)
        }
    }

    pub fn nothing_playing() -> Self {
        Self::Unavailable("no song playing".to_string())
    }

    pub fn is_nothing_playing(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
