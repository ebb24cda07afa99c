use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage, imageops::FilterType};
use ndarray::Array3;

/// Pixel value subtracted before scaling, as the RFB models were trained with.
pub const PIXEL_MEAN: f32 = 127.0;
/// Divisor applied after mean subtraction.
pub const PIXEL_SCALE: f32 = 128.0;

/// Decode an encoded image (PNG, JPEG, BMP, WebP) from memory.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    anyhow::ensure!(!bytes.is_empty(), "image buffer is empty");
    image::load_from_memory(bytes).context("failed to decode image bytes")
}

/// Encode an RGBA pixel grid as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(bytes)
}

/// Resize an image to exactly `width` x `height` using the provided filter.
pub fn resize_image(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    image.resize_exact(width, height, filter).to_rgb8()
}

/// Convert an RGB image into an RGB CHW array normalized as `(value - 127) / 128`.
pub fn rgb_to_normalized_chw(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        for channel in 0..3 {
            array[(channel, yi, xi)] = (pixel[channel] as f32 - PIXEL_MEAN) / PIXEL_SCALE;
        }
    }
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn normalized_chw_keeps_rgb_order() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 127, 0]));
        image.put_pixel(1, 0, Rgb([127, 127, 127]));

        let array = rgb_to_normalized_chw(&image);
        assert_eq!(array.shape(), &[3, 1, 2]);
        assert_eq!(array[(0, 0, 0)], 1.0);
        assert_eq!(array[(1, 0, 0)], 0.0);
        assert_eq!(array[(2, 0, 0)], -127.0 / 128.0);
        assert_eq!(array[(0, 0, 1)], 0.0);
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 200]));
        let bytes = encode_png(&image).expect("encode");
        let decoded = decode_image(&bytes).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &Rgba([10, 20, 30, 200]));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(&[]).is_err());
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
