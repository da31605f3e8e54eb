//! Image preprocessing for WD-style taggers.
//!
//! The taggers expect:
//! - Input size: square, `image_size × image_size` (448 for v3 models)
//! - Transparent pixels composited onto white, then padded to a centered
//!   white square so the aspect ratio survives the resize
//! - Channel order: BGR, raw 0-255 floats (no mean/std normalization)
//! - Tensor layout: NHWC [batch, height, width, channels]
//!
//! The longest side is scaled to `image_size` before padding, so memory stays
//! proportional to the input image and the output tensor, never to the
//! square of the longest side.

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Preprocess an image for tagger inference.
///
/// Returns `None` for images with a zero-sized dimension.
pub fn preprocess(image: &DynamicImage, image_size: u32) -> Option<Array4<f32>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || image_size == 0 {
        return None;
    }

    let flattened = composite_on_white(image);

    let (scaled_w, scaled_h) = fit_within(width, height, image_size);
    let scaled = if (scaled_w, scaled_h) == (width, height) {
        flattened
    } else {
        image::imageops::resize(&flattened, scaled_w, scaled_h, FilterType::CatmullRom)
    };

    let mut canvas = RgbImage::from_pixel(image_size, image_size, WHITE);
    let offset_x = (image_size - scaled_w) / 2;
    let offset_y = (image_size - scaled_h) / 2;
    image::imageops::replace(&mut canvas, &scaled, offset_x as i64, offset_y as i64);

    let size = image_size as usize;
    // NHWC with BGR channel order: channel c reads RGB component 2 - c.
    Some(Array4::from_shape_fn(
        (1, size, size, 3),
        |(_, y, x, c)| canvas.get_pixel(x as u32, y as u32)[2 - c] as f32,
    ))
}

/// Blend alpha onto a white background.
fn composite_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let blend = |c: u8, alpha: f32| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = pixel[3] as f32 / 255.0;
        Rgb([
            blend(pixel[0], alpha),
            blend(pixel[1], alpha),
            blend(pixel[2], alpha),
        ])
    })
}

/// Scale `(width, height)` so the longest side equals `target`, keeping
/// the aspect ratio. Neither side drops below one pixel.
fn fit_within(width: u32, height: u32, target: u32) -> (u32, u32) {
    let side = u64::from(width.max(height));
    let scale = |v: u32| {
        let scaled = (u64::from(v) * u64::from(target) + side / 2) / side;
        scaled.clamp(1, u64::from(target)) as u32
    };
    (scale(width), scale(height))
}
