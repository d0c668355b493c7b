//! 单通道栅格的 PNG 读写.

use crate::consts::mask::{OFF, ON};
use crate::{MesoError, MesoResult};
use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView2};
use std::path::Path;

/// 按原样将 8-bit 栅格保存为灰度图.
pub fn save_png<P: AsRef<Path>>(image: ArrayView2<u8>, path: P) -> MesoResult<()> {
    let (height, width) = image.dim();
    let mut buf = GrayImage::new(width as u32, height as u32);
    for ((h, w), &pix) in image.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, Luma([pix]));
    }
    buf.save(path)?;
    Ok(())
}

/// 读取图像并二值化为掩膜: 任一通道非零的像素为 255, 其余为 0.
///
/// 带透明通道的图像, 透明通道同样参与判断.
pub fn load_png_mask<P: AsRef<Path>>(path: P) -> MesoResult<Array2<u8>> {
    let img = image::open(path)?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (raw, channels) = if img.color().has_alpha() {
        (img.to_rgba8().into_raw(), 4)
    } else {
        (img.to_rgb8().into_raw(), 3)
    };
    let pixels = raw
        .chunks_exact(channels)
        .map(|px| if px.iter().any(|c| *c != OFF) { ON } else { OFF })
        .collect();
    Array2::from_shape_vec((height, width), pixels).map_err(|e| MesoError::shape(e.to_string()))
}
