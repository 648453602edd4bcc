//! Synthetic frames for unit tests.

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::dhash::HASH_WIDTH;

pub fn flat_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Vertical stripes, one per dHash column: even stripes `even`, odd stripes `odd`.
pub fn striped_image(width: u32, height: u32, even: u8, odd: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        let stripe = x * HASH_WIDTH / width;
        let value = if stripe % 2 == 0 { even } else { odd };
        Rgba([value, value, value, 255])
    })
}

pub fn encode_png_base64(img: &RgbaImage) -> String {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode png");
    base64::engine::general_purpose::STANDARD.encode(buffer.into_inner())
}

pub fn png_data_uri(img: &RgbaImage) -> String {
    format!("data:image/png;base64,{}", encode_png_base64(img))
}
