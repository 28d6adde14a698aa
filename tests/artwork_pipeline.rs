use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use now_playing_term::{
    artwork::process_artwork,
    error::ArtworkError,
    frame_cache::FrameCache,
    kitty::{EncodeOptions, RotationSpec},
    playback::TrackId,
};

fn cover(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbaImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        // Mostly a saturated teal with a dark corner that must not win.
        *pixel = if x < width / 4 && y < height / 4 {
            Rgba([10, 10, 10, 255])
        } else {
            Rgba([20, 170, 160, 255])
        };
    }
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// Pulls the base64 payload back out of a (possibly chunked) draw sequence.
fn payload(encoded: &str) -> String {
    encoded
        .split("\x1b_G")
        .filter(|part| !part.starts_with("a=d"))
        .filter_map(|part| part.split_once(';'))
        .map(|(_, rest)| rest.trim_end_matches("\x1b\\").to_string())
        .collect()
}

fn decoded_size(encoded: &str) -> (u32, u32) {
    let png = STANDARD.decode(payload(encoded)).unwrap();
    let img = image::load_from_memory(&png).unwrap();
    (img.width(), img.height())
}

#[test]
fn player_artwork_becomes_color_and_drawable_image() {
    let raw = STANDARD.encode(cover(120, 60));
    let options = EncodeOptions {
        width_pixels: 60,
        width_columns: 10,
    };

    let processed = process_artwork(raw.as_bytes(), true, None, options).unwrap();

    assert_eq!(processed.color, "#14aaa0");
    assert!(processed.encoded.contains("a=T,f=100,t=d,i=42,c=10,C=1"));
    assert_eq!(decoded_size(&processed.encoded), (60, 30));
}

#[test]
fn large_artwork_is_sent_in_chunks() {
    let mut img = RgbaImage::new(256, 256);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgba([(x ^ y) as u8, (x * 7) as u8, (y * 13) as u8, 255]);
    }
    let mut raw = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut raw), ImageFormat::Png)
        .unwrap();
    let options = EncodeOptions {
        width_pixels: 256,
        width_columns: 14,
    };

    let encoded = process_artwork(&raw, false, None, options).unwrap().encoded;

    assert!(encoded.starts_with("\x1b_Ga=d,d=I,i=42\x1b\\\x1b_Ga=T"));
    assert!(encoded.contains(",m=1;"));
    assert!(encoded.ends_with("\x1b\\"));
    assert_eq!(encoded.matches("\x1b_Gm=0;").count(), 1);
    assert_eq!(decoded_size(&encoded), (256, 256));
}

#[test]
fn spun_artwork_is_square_and_differs_from_the_flat_one() {
    let raw = cover(80, 40);
    let options = EncodeOptions {
        width_pixels: 40,
        width_columns: 6,
    };

    let flat = process_artwork(&raw, false, None, options).unwrap();
    let spun = process_artwork(&raw, false, Some(RotationSpec::new(1, 4)), options).unwrap();

    assert!(flat.color.is_empty());
    assert_ne!(flat.encoded, spun.encoded);
    assert_eq!(decoded_size(&spun.encoded), (40, 40));
}

#[test]
fn frame_cache_from_base64_artwork() {
    let raw = STANDARD.encode(cover(64, 64));
    let options = EncodeOptions {
        width_pixels: 24,
        width_columns: 4,
    };

    let cache = FrameCache::build(raw.as_bytes(), TrackId::new("Song", "Band"), 6, options).unwrap();

    assert_eq!(cache.len(), 6);
    for index in 0..6 {
        assert_eq!(decoded_size(cache.frame(index).unwrap()), (24, 24));
    }
}

#[test]
fn unreadable_artwork_is_reported() {
    let options = EncodeOptions {
        width_pixels: 24,
        width_columns: 4,
    };
    assert!(matches!(
        process_artwork(b"<html>not found</html>", true, None, options),
        Err(ArtworkError::Decode(_))
    ));
}
