//! Kitty terminal graphics protocol output.
//!
//! Every sequence has the shape `ESC _G <key>=<value>,...[;<payload>] ESC \`.
//! One fixed image id is used so each new placement replaces the last one.

use std::{fmt::Write as _, io::Cursor};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat};

use crate::{config::ArtworkConfig, error::ArtworkError, vinyl};

pub const IMAGE_ID: u32 = 42;
pub const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSpec {
    pub index: usize,
    pub total: usize,
}

impl RotationSpec {
    pub fn new(index: usize, total: usize) -> Self {
        Self { index, total }
    }

    pub fn degrees(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.index % self.total) as f32 / self.total as f32 * 360.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub width_pixels: u32,
    pub width_columns: u32,
}

impl EncodeOptions {
    pub fn from_config(config: &ArtworkConfig) -> Self {
        Self {
            width_pixels: config.width_pixels.max(1),
            width_columns: config.width_columns.max(1),
        }
    }
}

pub fn delete_sequence() -> String {
    format!("\x1b_Ga=d,d=I,i={IMAGE_ID}\x1b\\")
}

pub fn encode_image(
    image: &DynamicImage,
    rotation: Option<RotationSpec>,
    options: EncodeOptions,
) -> Result<String, ArtworkError> {
    let png = encode_png(image, rotation, options)?;
    let payload = STANDARD.encode(png);
    Ok(wire_sequence(&payload, options.width_columns))
}

pub fn encode_png(
    image: &DynamicImage,
    rotation: Option<RotationSpec>,
    options: EncodeOptions,
) -> Result<Vec<u8>, ArtworkError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ArtworkError::encode("image has no pixels"));
    }

    let record;
    let source = match rotation {
        Some(spec) => {
            record = DynamicImage::ImageRgba8(vinyl::render_record(image, spec.degrees()));
            &record
        }
        None => image,
    };

    let width = options.width_pixels.max(1);
    let height = ((u64::from(source.height()) * u64::from(width)) / u64::from(source.width()))
        .clamp(1, u64::from(u32::MAX)) as u32;
    let resized = source.resize_exact(width, height, FilterType::Lanczos3);

    let mut png = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ArtworkError::encode(format!("failed to encode PNG: {e}")))?;
    Ok(png)
}

pub fn wire_sequence(payload: &str, columns: u32) -> String {
    let mut out = String::with_capacity(payload.len() + 64 + (payload.len() / CHUNK_SIZE) * 16);
    out.push_str(&delete_sequence());

    // Column sizing keeps the image independent of font zoom; rows are
    // derived by the terminal from the aspect ratio.
    let header = format!("a=T,f=100,t=d,i={IMAGE_ID},c={columns},C=1");

    if payload.len() <= CHUNK_SIZE {
        let _ = write!(out, "\x1b_G{header};{payload}\x1b\\");
        return out;
    }

    let bytes = payload.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let end = (start + CHUNK_SIZE).min(bytes.len());
        // base64 is ASCII, so any byte offset is a char boundary.
        let chunk = &payload[start..end];
        if start == 0 {
            let _ = write!(out, "\x1b_G{header},m=1;{chunk}\x1b\\");
        } else if end == bytes.len() {
            let _ = write!(out, "\x1b_Gm=0;{chunk}\x1b\\");
        } else {
            let _ = write!(out, "\x1b_Gm=1;{chunk}\x1b\\");
        }
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const OPTIONS: EncodeOptions = EncodeOptions {
        width_pixels: 100,
        width_columns: 10,
    };

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255])))
    }

    fn sequences(wire: &str) -> Vec<&str> {
        wire.split("\x1b\\").filter(|s| !s.is_empty()).collect()
    }

    #[test]
    fn small_payload_is_sent_in_one_command() {
        let payload = "A".repeat(CHUNK_SIZE);
        let wire = wire_sequence(&payload, 14);
        let parts = sequences(&wire);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "\x1b_Ga=d,d=I,i=42");
        assert_eq!(parts[1], format!("\x1b_Ga=T,f=100,t=d,i=42,c=14,C=1;{payload}"));
        assert!(!wire.contains("m=1"));
        assert!(!wire.contains("m=0"));
    }

    #[test]
    fn one_byte_over_splits_into_two_chunks() {
        let payload = "B".repeat(CHUNK_SIZE + 1);
        let wire = wire_sequence(&payload, 14);
        let parts = sequences(&wire);
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[1],
            format!("\x1b_Ga=T,f=100,t=d,i=42,c=14,C=1,m=1;{}", "B".repeat(CHUNK_SIZE))
        );
        assert_eq!(parts[2], "\x1b_Gm=0;B");
    }

    #[test]
    fn interior_chunks_repeat_the_more_flag() {
        let payload = "C".repeat(CHUNK_SIZE * 2 + 10);
        let parts_owned = wire_sequence(&payload, 8);
        let parts = sequences(&parts_owned);
        assert_eq!(parts.len(), 4);
        assert!(parts[1].contains(",m=1;"));
        assert!(parts[2].starts_with("\x1b_Gm=1;"));
        assert_eq!(parts[3], format!("\x1b_Gm=0;{}", "C".repeat(10)));
    }

    #[test]
    fn encoded_png_has_configured_width_and_aspect() {
        let png = encode_png(&solid(400, 200), None, OPTIONS).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn rotated_frames_are_square_and_circular() {
        let png = encode_png(&solid(120, 80), Some(RotationSpec::new(3, 8)), OPTIONS).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (100, 100));
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
        assert_eq!(decoded.get_pixel(50, 50).0[3], 255);
    }

    #[test]
    fn encoding_is_deterministic() {
        let img = solid(64, 64);
        let spec = Some(RotationSpec::new(5, 90));
        assert_eq!(
            encode_image(&img, spec, OPTIONS).unwrap(),
            encode_image(&img, spec, OPTIONS).unwrap()
        );
    }

    #[test]
    fn rotation_degrees_cover_the_circle() {
        assert_eq!(RotationSpec::new(0, 90).degrees(), 0.0);
        assert_eq!(RotationSpec::new(45, 90).degrees(), 180.0);
        assert_eq!(RotationSpec::new(90, 90).degrees(), 0.0);
        assert_eq!(RotationSpec::new(1, 0).degrees(), 0.0);
    }
}
