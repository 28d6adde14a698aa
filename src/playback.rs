use std::{
    fmt,
    time::{Duration, Instant},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlayStatus {
    Playing,
    Paused,
    Stopped,
    #[default]
    Unknown,
}

impl PlayStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            "stopped" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

/// Key used to notice track changes: title and artist joined by `|`.
///
/// Two releases sharing a title and artist map to the same key.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(title: &str, artist: &str) -> Self {
        Self(format!("{title}|{artist}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct PlaybackSnapshot {
    pub position_secs: f64,
    pub observed_at: Instant,
    pub duration_secs: f64,
    pub status: PlayStatus,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            position_secs: 0.0,
            observed_at: Instant::now(),
            duration_secs: 0.0,
            status: PlayStatus::Unknown,
        }
    }
}

impl PlaybackSnapshot {
    pub fn new(position_secs: f64, duration_secs: f64, status: PlayStatus, observed_at: Instant) -> Self {
        Self {
            position_secs: position_secs.max(0.0),
            observed_at,
            duration_secs: duration_secs.max(0.0),
            status,
        }
    }

    /// Position at `now`: advances with wall-clock time while playing and is
    /// frozen otherwise. Never exceeds a known duration.
    pub fn position_at(&self, now: Instant) -> f64 {
        let mut position = self.position_secs;
        if self.status == PlayStatus::Playing {
            position += now
                .checked_duration_since(self.observed_at)
                .unwrap_or(Duration::ZERO)
                .as_secs_f64();
        }
        if self.duration_secs > 0.0 {
            position = position.min(self.duration_secs);
        }
        position
    }

    pub fn progress_at(&self, now: Instant) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        (self.position_at(now) / self.duration_secs).clamp(0.0, 1.0)
    }
}

pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(PlayStatus::parse("Playing"), PlayStatus::Playing);
        assert_eq!(PlayStatus::parse("PAUSED\n"), PlayStatus::Paused);
        assert_eq!(PlayStatus::parse("stopped"), PlayStatus::Stopped);
        assert_eq!(PlayStatus::parse("buffering"), PlayStatus::Unknown);
    }

    #[test]
    fn track_id_joins_title_and_artist() {
        assert_eq!(TrackId::new("Song", "Band").as_str(), "Song|Band");
        assert_ne!(TrackId::new("Song", "Band"), TrackId::new("Song", "Other"));
    }

    #[test]
    fn progress_is_position_over_duration() {
        let start = Instant::now();
        let snapshot = PlaybackSnapshot::new(75.0, 200.0, PlayStatus::Paused, start);
        assert!((snapshot.progress_at(start) - 0.375).abs() < 1e-9);
    }

    #[test]
    fn paused_position_does_not_interpolate() {
        let start = Instant::now();
        let snapshot = PlaybackSnapshot::new(75.0, 200.0, PlayStatus::Paused, start);
        let first = snapshot.position_at(start);
        let later = snapshot.position_at(start + Duration::from_secs(2));
        assert_eq!(first, later);
    }

    #[test]
    fn playing_position_advances_and_clamps() {
        let start = Instant::now();
        let snapshot = PlaybackSnapshot::new(190.0, 200.0, PlayStatus::Playing, start);
        let later = snapshot.position_at(start + Duration::from_secs(4));
        assert!((later - 194.0).abs() < 1e-6);
        assert_eq!(snapshot.position_at(start + Duration::from_secs(60)), 200.0);
        assert_eq!(snapshot.progress_at(start + Duration::from_secs(60)), 1.0);
    }

    #[test]
    fn unknown_duration_has_no_progress() {
        let start = Instant::now();
        let snapshot = PlaybackSnapshot::new(30.0, 0.0, PlayStatus::Playing, start);
        assert_eq!(snapshot.progress_at(start), 0.0);
        assert!(snapshot.position_at(start + Duration::from_secs(1)) > 30.0);
    }

    #[test]
    fn time_formatting_keeps_minutes_unbounded() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(75), "01:15");
        assert_eq!(format_time(3661), "61:01");
    }
}
