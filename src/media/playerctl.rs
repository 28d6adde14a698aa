use std::{fs, io::Read, process::Command};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use super::{MediaSource, PlaybackCommand, TrackMetadata};
use crate::{error::MediaError, playback::PlayStatus};

/// Tab separated so `|` inside album names survives.
const METADATA_FORMAT: &str = "{{title}}\t{{artist}}\t{{album}}\t{{status}}";
const MAX_ARTWORK_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct PlayerctlSource;

impl PlayerctlSource {
    pub fn new() -> Self {
        Self
    }
}

fn playerctl(args: &[&str]) -> Result<String, String> {
    let output = Command::new("playerctl")
        .args(args)
        .output()
        .map_err(|e| format!("failed to run playerctl: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} ({})", output.status, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Any failed query means no player has a track loaded.
fn query(args: &[&str]) -> Result<String, MediaError> {
    playerctl(args).map_err(|err| {
        debug!("playerctl {}: {err}", args.join(" "));
        MediaError::nothing_playing()
    })
}

impl MediaSource for PlayerctlSource {
    fn metadata(&self) -> Result<TrackMetadata, MediaError> {
        let output = query(&["metadata", "--format", METADATA_FORMAT])?;
        parse_metadata(&output)
    }

    fn duration(&self) -> Result<f64, MediaError> {
        let output = query(&["metadata", "mpris:length"])?;
        parse_length(&output)
    }

    fn position(&self) -> Result<f64, MediaError> {
        let output = query(&["position"])?;
        output
            .parse::<f64>()
            .map_err(|e| MediaError::Backend(format!("failed to parse position '{output}': {e}")))
    }

    fn control(&self, command: PlaybackCommand) -> Result<(), MediaError> {
        playerctl(&[command.as_str()])
            .map(|_| ())
            .map_err(|err| MediaError::classify(format!("playerctl {} failed: {err}", command.as_str())))
    }

    fn artwork(&self) -> Result<Vec<u8>, MediaError> {
        let url = playerctl(&["metadata", "mpris:artUrl"])
            .map_err(|_| MediaError::Backend("no artwork available".to_string()))?;
        if url.is_empty() {
            return Err(MediaError::Backend("no artwork URL".to_string()));
        }

        let data = if let Some(path) = url.strip_prefix("file://") {
            let path = percent_decode(path);
            fs::read(&path).map_err(|e| {
                MediaError::Backend(format!("failed to read artwork file {path}: {e}"))
            })?
        } else if url.starts_with("http://") || url.starts_with("https://") {
            download(&url)?
        } else {
            return Err(MediaError::Backend(format!(
                "unsupported artwork URL scheme: {url}"
            )));
        };

        Ok(STANDARD.encode(data).into_bytes())
    }
}

fn download(url: &str) -> Result<Vec<u8>, MediaError> {
    let response = ureq::get(url)
        .set("User-Agent", concat!("now-playing/", env!("CARGO_PKG_VERSION")))
        .call()
        .map_err(|e| MediaError::Backend(format!("failed to download artwork: {e}")))?;

    let mut data = Vec::new();
    response
        .into_reader()
        .take(MAX_ARTWORK_BYTES)
        .read_to_end(&mut data)
        .map_err(|e| MediaError::Backend(format!("failed to read artwork data: {e}")))?;
    Ok(data)
}

fn parse_metadata(output: &str) -> Result<TrackMetadata, MediaError> {
    if output.is_empty() {
        return Err(MediaError::nothing_playing());
    }
    let parts: Vec<&str> = output.split('\t').collect();
    if parts.len() != 4 {
        return Err(MediaError::Backend(format!(
            "unexpected metadata format: got {} parts, expected 4",
            parts.len()
        )));
    }
    Ok(TrackMetadata {
        title: parts[0].trim().to_string(),
        artist: parts[1].trim().to_string(),
        album: parts[2].trim().to_string(),
        status: PlayStatus::parse(parts[3]),
    })
}

/// `mpris:length` is reported in whole microseconds.
fn parse_length(output: &str) -> Result<f64, MediaError> {
    output
        .parse::<u64>()
        .map(|micros| (micros / 1_000_000) as f64)
        .map_err(|e| MediaError::Backend(format!("failed to parse duration '{output}': {e}")))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
            if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                out.push((hex_value(hi) << 4) | hex_value(lo));
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit.to_ascii_uppercase() - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_line_splits_on_tabs() {
        let meta = parse_metadata("Song | Live\tBand\tAlbum | Sessions\tPlaying").unwrap();
        assert_eq!(meta.title, "Song | Live");
        assert_eq!(meta.artist, "Band");
        assert_eq!(meta.album, "Album | Sessions");
        assert_eq!(meta.status, PlayStatus::Playing);
    }

    #[test]
    fn malformed_metadata_is_a_backend_error() {
        assert!(parse_metadata("").unwrap_err().is_nothing_playing());
        assert!(matches!(
            parse_metadata("only\ttwo"),
            Err(MediaError::Backend(_))
        ));
    }

    #[test]
    fn length_is_converted_from_microseconds() {
        assert_eq!(parse_length("215000000").unwrap(), 215.0);
        assert_eq!(parse_length("999999").unwrap(), 0.0);
        assert!(parse_length("n/a").is_err());
    }

    #[test]
    fn file_urls_are_percent_decoded() {
        assert_eq!(
            percent_decode("/home/me/My%20Music/cover%C3%A9.jpg"),
            "/home/me/My Music/coveré.jpg"
        );
        assert_eq!(percent_decode("/tmp/100%"), "/tmp/100%");
        assert_eq!(percent_decode("/tmp/%zz"), "/tmp/%zz");
    }
}
