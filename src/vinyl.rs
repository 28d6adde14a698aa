use image::{DynamicImage, Rgba, RgbaImage};

const MIN_RECORD_SIZE: u32 = 64;
const MAX_RECORD_SIZE: u32 = 1024;

#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub output_size: u32,
    pub hole_ratio: f32,
    pub edge_softness: f32,
}

impl RecordOptions {
    pub fn for_source(source_width: u32, source_height: u32) -> Self {
        let min_dim = source_width.min(source_height);
        let mut output_size = min_dim.clamp(MIN_RECORD_SIZE, MAX_RECORD_SIZE);
        if output_size % 2 == 1 {
            output_size += 1;
        }
        let radius_px = output_size as f32 / 2.0;
        let hole_radius_px = (output_size as f32 / 100.0).clamp(1.5, 7.5);
        Self {
            output_size,
            hole_ratio: hole_radius_px / radius_px,
            edge_softness: 0.005,
        }
    }
}

/// Crops the artwork to a disc, spun clockwise by `degrees`.
pub fn render_record(image: &DynamicImage, degrees: f32) -> RgbaImage {
    let options = RecordOptions::for_source(image.width(), image.height());
    render_record_with(&image.to_rgba8(), degrees, &options)
}

pub fn render_record_with(image: &RgbaImage, degrees: f32, options: &RecordOptions) -> RgbaImage {
    let size = options.output_size;
    let mut output = RgbaImage::new(size, size);

    let radius_px = size as f32 / 2.0;
    let inv_radius = 1.0 / radius_px;

    let src_width = image.width() as f32;
    let src_height = image.height() as f32;
    let src_radius = src_width.min(src_height) / 2.0;
    let src_center = (src_width / 2.0, src_height / 2.0);

    let rotation = degrees.to_radians();
    let edge_start = 1.0 - options.edge_softness;

    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;
            let dx = (fx - radius_px) * inv_radius;
            let dy = (fy - radius_px) * inv_radius;
            let r = (dx * dx + dy * dy).sqrt();

            if r >= 1.0 {
                output.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                continue;
            }

            if r <= options.hole_ratio {
                output.put_pixel(x, y, Rgba([32, 32, 32, 255]));
                continue;
            }

            // Screen y grows downward, so subtracting turns the content clockwise.
            let sample_angle = dy.atan2(dx) - rotation;
            let sample_px_radius = r * src_radius;
            let sample_x = src_center.0 + sample_angle.cos() * sample_px_radius;
            let sample_y = src_center.1 + sample_angle.sin() * sample_px_radius;
            let mut color = sample_bilinear(image, sample_x, sample_y);

            if r > edge_start {
                let t = ((1.0 - r) / options.edge_softness).clamp(0.0, 1.0);
                color.0[3] = (f32::from(color.0[3]) * t).round() as u8;
            }

            output.put_pixel(x, y, color);
        }
    }

    output
}

fn sample_bilinear(image: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let width = image.width() as i64;
    let height = image.height() as i64;
    if width == 0 || height == 0 {
        return Rgba([0, 0, 0, 255]);
    }

    let clamped_x = (x - 0.5).clamp(0.0, (width - 1) as f32);
    let clamped_y = (y - 0.5).clamp(0.0, (height - 1) as f32);

    let x0 = clamped_x.floor() as i64;
    let y0 = clamped_y.floor() as i64;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let tx = clamped_x - x0 as f32;
    let ty = clamped_y - y0 as f32;

    let c00 = *image.get_pixel(x0 as u32, y0 as u32);
    let c10 = *image.get_pixel(x1 as u32, y0 as u32);
    let c01 = *image.get_pixel(x0 as u32, y1 as u32);
    let c11 = *image.get_pixel(x1 as u32, y1 as u32);

    let top = lerp_color(c00, c10, tx);
    let bottom = lerp_color(c01, c11, tx);
    lerp_color(top, bottom, ty)
}

fn lerp_color(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let inv = 1.0 - t;
    let mut out = [0u8; 4];
    for (channel, value) in out.iter_mut().enumerate() {
        *value = (f32::from(a.0[channel]) * inv + f32::from(b.0[channel]) * t).round() as u8;
    }
    Rgba(out)
}
