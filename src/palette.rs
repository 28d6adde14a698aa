use std::{cmp::Reverse, collections::HashMap};

use image::{DynamicImage, GenericImageView};

use crate::{error::ArtworkError, theme::to_hex};

const SAMPLE_STEP: u32 = 5;
const MIN_ALPHA: u8 = 128;

const MIN_LIGHTNESS: f64 = 0.30;
const MAX_LIGHTNESS: f64 = 0.85;
const MIN_SATURATION: f64 = 0.25;
/// Lightness above this is penalised so near-white loses to mid tones.
const LIGHTNESS_KNEE: f64 = 0.7;

const KMEANS_MAX_SAMPLES: usize = 6_000;
const KMEANS_K: usize = 3;
const KMEANS_MAX_ITER: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub rgb: [u8; 3],
    pub count: usize,
    pub lightness: f64,
    pub saturation: f64,
    pub score: f64,
}

/// The sampled heuristic runs first. K-means over a strided sample of at most
/// `KMEANS_MAX_SAMPLES` pixels only runs when no sampled color passes the
/// lightness and saturation filter.
pub fn extract_accent_color(image: &DynamicImage) -> Result<String, ArtworkError> {
    if let Some(best) = best_candidate(image) {
        let [r, g, b] = best.rgb;
        return Ok(to_hex(r, g, b));
    }

    let samples = sample_pixels(image, KMEANS_MAX_SAMPLES);
    let k = KMEANS_K.min(samples.len());
    let mut clusters = kmeans_clusters(&samples, k, KMEANS_MAX_ITER);
    clusters.sort_by_key(|cluster| Reverse(cluster.count));
    clusters
        .into_iter()
        .find(|cluster| cluster.count > 0)
        .map(|cluster| {
            let [r, g, b] = color_from_centroid(cluster.centroid);
            to_hex(r, g, b)
        })
        .ok_or(ArtworkError::NoSuitableColor)
}

pub fn best_candidate(image: &DynamicImage) -> Option<Candidate> {
    scored_candidates(image)
        .into_iter()
        .fold(None, |best: Option<Candidate>, candidate| match best {
            Some(current) if current.score >= candidate.score => Some(current),
            _ => Some(candidate),
        })
}

pub fn scored_candidates(image: &DynamicImage) -> Vec<Candidate> {
    let (width, height) = image.dimensions();
    let mut order: Vec<u32> = Vec::new();
    let mut counts: HashMap<u32, usize> = HashMap::new();

    for y in (0..height).step_by(SAMPLE_STEP as usize) {
        for x in (0..width).step_by(SAMPLE_STEP as usize) {
            let pixel = image.get_pixel(x, y);
            let [r, g, b, a] = pixel.0;
            if a < MIN_ALPHA {
                continue;
            }
            let packed = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
            let count = counts.entry(packed).or_insert(0);
            if *count == 0 {
                order.push(packed);
            }
            *count += 1;
        }
    }

    order
        .into_iter()
        .filter_map(|packed| {
            let rgb = [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8];
            let count = counts.get(&packed).copied().unwrap_or(0);
            let (lightness, saturation) = lightness_saturation(rgb);
            if lightness < MIN_LIGHTNESS || lightness > MAX_LIGHTNESS || saturation < MIN_SATURATION
            {
                return None;
            }
            let lightness_score = if lightness > LIGHTNESS_KNEE {
                LIGHTNESS_KNEE - (lightness - LIGHTNESS_KNEE)
            } else {
                lightness
            };
            let score = saturation * 2.5 + lightness_score * 1.5 + count as f64 / 1000.0;
            Some(Candidate {
                rgb,
                count,
                lightness,
                saturation,
                score,
            })
        })
        .collect()
}

pub fn lightness_saturation(rgb: [u8; 3]) -> (f64, f64) {
    let [r, g, b] = rgb.map(|c| f64::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;
    let saturation = if max == min {
        0.0
    } else if lightness > 0.5 {
        (max - min) / (2.0 - max - min)
    } else {
        (max - min) / (max + min)
    };
    (lightness, saturation)
}

#[derive(Clone, Copy)]
struct Cluster {
    centroid: [f32; 3],
    count: usize,
}

fn sample_pixels(image: &DynamicImage, max_samples: usize) -> Vec<[f32; 3]> {
    let rgba = image.to_rgba8();
    let total = rgba.pixels().len();
    if total == 0 || max_samples == 0 {
        return Vec::new();
    }

    let step = (total / max_samples).max(1);
    let mut samples = Vec::with_capacity(max_samples.min(total));

    for pixel in rgba.pixels().step_by(step) {
        if pixel.0[3] < MIN_ALPHA {
            continue;
        }
        samples.push([
            f32::from(pixel.0[0]),
            f32::from(pixel.0[1]),
            f32::from(pixel.0[2]),
        ]);
        if samples.len() >= max_samples {
            break;
        }
    }

    samples
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn kmeans_clusters(samples: &[[f32; 3]], k: usize, max_iter: usize) -> Vec<Cluster> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut centroids = Vec::with_capacity(k);
    for i in 0..k {
        let idx = ((i * samples.len()) / k).min(samples.len() - 1);
        centroids.push(samples[idx]);
    }

    let mut assignments = vec![0usize; samples.len()];

    for iter in 0..max_iter {
        let mut sums = vec![[0f32; 3]; k];
        let mut counts = vec![0usize; k];

        for (sample_idx, sample) in samples.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for (centroid_idx, centroid) in centroids.iter().enumerate() {
                let dist = squared_distance(sample, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best = centroid_idx;
                }
            }

            assignments[sample_idx] = best;
            for channel in 0..3 {
                sums[best][channel] += sample[channel];
            }
            counts[best] += 1;
        }

        let mut changed = false;
        for i in 0..k {
            if counts[i] == 0 {
                centroids[i] = samples[(i + iter) % samples.len()];
                changed = true;
                continue;
            }
            let n = counts[i] as f32;
            let new_centroid = [sums[i][0] / n, sums[i][1] / n, sums[i][2] / n];
            if squared_distance(&centroids[i], &new_centroid) > 1e-2 {
                changed = true;
            }
            centroids[i] = new_centroid;
        }

        if !changed {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for &assignment in &assignments {
        counts[assignment] += 1;
    }

    centroids
        .into_iter()
        .enumerate()
        .map(|(idx, centroid)| Cluster {
            centroid,
            count: counts[idx],
        })
        .collect()
}

fn color_from_centroid(centroid: [f32; 3]) -> [u8; 3] {
    centroid.map(|c| c.clamp(0.0, 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    fn hue_of(hex: &str) -> f64 {
        let value = u32::from_str_radix(hex.trim_start_matches('#'), 16).unwrap();
        let [r, g, b] = [(value >> 16) as u8, (value >> 8) as u8, value as u8]
            .map(|c| f64::from(c) / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        if max == min {
            return 0.0;
        }
        let d = max - min;
        let h = if max == r {
            ((g - b) / d).rem_euclid(6.0)
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        h * 60.0
    }

    #[test]
    fn red_artwork_gives_a_red_accent() {
        let color = extract_accent_color(&solid(300, 300, [255, 0, 0, 255])).unwrap();
        assert_eq!(color.len(), 7);
        assert!(color.starts_with('#'));
        let hue = hue_of(&color);
        assert!(hue < 15.0 || hue > 345.0, "hue {hue} of {color}");
    }

    #[test]
    fn primary_path_respects_readability_bounds() {
        let mut img = RgbaImage::new(100, 100);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8, 255]);
        }
        let candidates = scored_candidates(&DynamicImage::ImageRgba8(img));
        assert!(!candidates.is_empty());
        for candidate in candidates {
            assert!((MIN_LIGHTNESS..=MAX_LIGHTNESS).contains(&candidate.lightness));
            assert!(candidate.saturation >= MIN_SATURATION);
        }
    }

    #[test]
    fn transparent_artwork_never_panics() {
        let result = extract_accent_color(&solid(50, 50, [255, 0, 0, 0]));
        assert_eq!(result, Err(ArtworkError::NoSuitableColor));
    }

    #[test]
    fn flat_dark_artwork_uses_kmeans_fallback() {
        let img = solid(40, 40, [20, 20, 20, 255]);
        assert!(best_candidate(&img).is_none());
        assert_eq!(extract_accent_color(&img).unwrap(), "#141414");
    }

    #[test]
    fn saturated_colors_beat_frequent_grey() {
        let mut img = RgbaImage::from_pixel(100, 100, Rgba([128, 128, 128, 255]));
        for y in 0..20 {
            for x in 0..20 {
                img.put_pixel(x, y, Rgba([40, 120, 230, 255]));
            }
        }
        let color = extract_accent_color(&DynamicImage::ImageRgba8(img)).unwrap();
        assert_eq!(color, "#2878e6");
    }

    #[test]
    fn tiny_images_still_sample() {
        let color = extract_accent_color(&solid(5, 5, [128, 128, 255, 255])).unwrap();
        assert_eq!(color, "#8080ff");
    }

    #[test]
    fn lightness_saturation_matches_hsl() {
        let (l, s) = lightness_saturation([255, 0, 0]);
        assert!((l - 0.5).abs() < 1e-9);
        assert!((s - 1.0).abs() < 1e-9);
        let (l, s) = lightness_saturation([128, 128, 128]);
        assert!((l - 128.0 / 255.0).abs() < 1e-9);
        assert_eq!(s, 0.0);
    }
}
