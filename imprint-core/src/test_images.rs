//! In-memory test images.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};

/// Gradient with a checkerboard overlay, so perceptual features are stable.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    let mut img = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let b = (((x + y) as f32 / (width + height) as f32) * 200.0) as u8;

        let pattern = if (x / 20 + y / 20) % 2 == 0 { 30 } else { 0 };
        *pixel = Rgb([r.saturating_add(pattern), g, b]);
    }

    img
}

/// Flat single-color image.
pub fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    ImageBuffer::from_pixel(width, height, Rgb(color))
}

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    encode_png_with(img, CompressionType::Best, FilterType::Adaptive)
}

pub fn encode_png_fast(img: &RgbImage) -> Vec<u8> {
    encode_png_with(img, CompressionType::Fast, FilterType::NoFilter)
}

fn encode_png_with(img: &RgbImage, compression: CompressionType, filter: FilterType) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(&mut buffer, compression, filter);
    DynamicImage::ImageRgb8(img.clone())
        .write_with_encoder(encoder)
        .expect("PNG encoding failed");
    buffer.into_inner()
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder).expect("JPEG encoding failed");
    buffer.into_inner()
}
