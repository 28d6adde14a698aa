use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use tracing::{debug, warn};

use crate::{
    error::ArtworkError,
    kitty::{self, EncodeOptions, RotationSpec},
    palette,
};

/// Decodes artwork that may arrive either raw or base64 wrapped.
pub fn decode_artwork(bytes: &[u8]) -> Result<DynamicImage, ArtworkError> {
    let data = match STANDARD.decode(strip_ascii_whitespace(bytes)) {
        Ok(decoded) => decoded,
        Err(_) => bytes.to_vec(),
    };

    if data.is_empty() {
        return Err(ArtworkError::decode("empty image data"));
    }

    image::load_from_memory(&data).map_err(|e| ArtworkError::decode(e.to_string()))
}

fn strip_ascii_whitespace(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

thread_local! {
    static IN_IMAGE_CODE: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside [`catch_image_panic`].
///
/// The terminal panic hook checks this so a panic that is about to be
/// caught here leaves the screen alone.
pub fn in_image_code() -> bool {
    IN_IMAGE_CODE.with(Cell::get)
}

pub fn catch_image_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    let previous = IN_IMAGE_CODE.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    IN_IMAGE_CODE.with(|flag| flag.set(previous));

    outcome.map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedArtwork {
    pub color: String,
    pub encoded: String,
}

/// Decodes once and feeds the same image to color extraction and encoding.
///
/// Only a decode failure is an error. Extraction or encoding failures, and
/// any panic raised by the image code, degrade to empty fields.
pub fn process_artwork(
    bytes: &[u8],
    extract_color: bool,
    rotation: Option<RotationSpec>,
    options: EncodeOptions,
) -> Result<ProcessedArtwork, ArtworkError> {
    match catch_image_panic(|| process_decoded(bytes, extract_color, rotation, options)) {
        Ok(result) => result,
        Err(reason) => {
            warn!("artwork processing panicked: {reason}");
            Ok(ProcessedArtwork::default())
        }
    }
}

fn process_decoded(
    bytes: &[u8],
    extract_color: bool,
    rotation: Option<RotationSpec>,
    options: EncodeOptions,
) -> Result<ProcessedArtwork, ArtworkError> {
    let image = decode_artwork(bytes)?;
    let mut processed = ProcessedArtwork::default();

    if extract_color {
        match palette::extract_accent_color(&image) {
            Ok(color) => processed.color = color,
            Err(err) => debug!("color extraction skipped: {err}"),
        }
    }

    match kitty::encode_image(&image, rotation, options) {
        Ok(encoded) => processed.encoded = encoded,
        Err(err) => warn!("artwork encoding failed: {err}"),
    }

    Ok(processed)
}
