//! Pixel preparation shared by the strategies.

use anyhow::{Context, Result};
use fast_image_resize::{self as fr, images::Image as FrImage};
use image::DynamicImage;
use std::path::Path;

/// Squashes `img` onto a `size x size` RGB raster.
///
/// The heuristic counts skin pixels on this raster and the model backends
/// feed it to their networks, so every strategy sees the same downsampling.
/// Returns packed RGB bytes (`size * size * 3`); aspect ratio is not kept.
pub fn resize_to_square_rgb(img: DynamicImage, size: u32) -> Result<Vec<u8>> {
    let rgb = img.into_rgb8();
    let (src_w, src_h) = rgb.dimensions();
    let src = FrImage::from_vec_u8(src_w, src_h, rgb.into_raw(), fr::PixelType::U8x3)
        .with_context(|| format!("{src_w}x{src_h} frame has no pixel buffer"))?;
    let mut raster = FrImage::new(size, size, fr::PixelType::U8x3);
    let bilinear = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    fr::Resizer::new()
        .resize(&src, &mut raster, &bilinear)
        .with_context(|| format!("cannot downsample {src_w}x{src_h} to {size}x{size}"))?;
    Ok(raster.into_vec())
}

/// Resizes `img` and lays it out as normalized CHW floats.
pub fn image_tensor_data(
    img: DynamicImage,
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
) -> Result<Vec<f32>> {
    let resized = resize_to_square_rgb(img, size)?;
    let hw = (size * size) as usize;
    let mut data = vec![0f32; hw * 3];
    for (idx, px) in resized.chunks_exact(3).enumerate() {
        for channel in 0..3 {
            data[channel * hw + idx] = scale_to_unit(px[channel], mean[channel], std[channel]);
        }
    }
    Ok(data)
}

/// Decodes the file at `path` and prepares it like [`image_tensor_data`].
pub fn load_image_tensor_data(
    path: &Path,
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
) -> Result<Vec<f32>> {
    let img = image::open(path).with_context(|| format!("cannot decode {}", path.display()))?;
    image_tensor_data(img, size, mean, std)
}

/// Maps a byte to `[0, 1]` and standardizes it with the channel statistics.
fn scale_to_unit(value: u8, mean: f32, std: f32) -> f32 {
    (f32::from(value) / 255.0 - mean) / std
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn resize_produces_packed_rgb_square() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(37, 11, Rgb([200, 100, 50])));
        let raw = resize_to_square_rgb(img, 10)?;
        assert_eq!(raw.len(), 10 * 10 * 3);
        let close = |a: u8, b: u8| a.abs_diff(b) <= 1;
        assert!(
            raw.chunks_exact(3)
                .all(|px| close(px[0], 200) && close(px[1], 100) && close(px[2], 50))
        );
        Ok(())
    }

    #[test]
    fn tensor_data_is_channel_major_and_normalized() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 127])));
        let data = image_tensor_data(img, 2, [0.5, 0.5, 0.5], [0.5, 0.5, 0.5])?;
        assert_eq!(data.len(), 12);
        assert!(data[..4].iter().all(|v| (*v - 1.0).abs() < 0.01));
        assert!(data[4..8].iter().all(|v| (*v + 1.0).abs() < 0.01));
        assert!(data[8..].iter().all(|v| v.abs() < 0.01));
        Ok(())
    }
}
