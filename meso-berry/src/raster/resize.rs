//! 栅格缩放.
//!
//! 三次插值交给 `image` 的 Catmull-Rom 滤波; 面积平均是可分离的,
//! 先沿宽方向, 再沿高方向, 中间结果以 `f32` 保存.

use crate::consts::CANONICAL_EDGE;
use crate::{Idx2d, MesoError, MesoResult};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 缩放插值方式.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Interpolation {
    /// Catmull-Rom 三次卷积. 放大时质量较好.
    Cubic,

    /// 按覆盖面积加权平均. 缩小时不产生混叠.
    Area,
}

impl Interpolation {
    /// 按目标尺寸选择插值方式: 较长边不小于标准边长 (512) 时用 `Cubic`, 否则用 `Area`.
    #[inline]
    pub fn for_target((h, w): Idx2d) -> Self {
        if h.max(w) >= CANONICAL_EDGE {
            Self::Cubic
        } else {
            Self::Area
        }
    }
}

/// 每个输出位置对应的 `(输入索引, 权重)` 列表.
type Taps = Vec<Vec<(usize, f32)>>;

/// 将 `image` 缩放到 `(h, w)`.
///
/// 输入或输出尺寸为 0 时返回 `DataShape` 错误.
pub fn resize(
    image: ArrayView2<u8>,
    (h, w): Idx2d,
    method: Interpolation,
) -> MesoResult<Array2<u8>> {
    let (src_h, src_w) = image.dim();
    if src_h == 0 || src_w == 0 || h == 0 || w == 0 {
        return Err(MesoError::shape(format!(
            "cannot resize ({src_h}, {src_w}) to ({h}, {w})"
        )));
    }
    if (src_h, src_w) == (h, w) {
        return Ok(image.to_owned());
    }
    match method {
        Interpolation::Cubic => resize_cubic(image, (h, w)),
        Interpolation::Area => Ok(resize_area(image, (h, w))),
    }
}

fn resize_cubic(image: ArrayView2<u8>, (h, w): Idx2d) -> MesoResult<Array2<u8>> {
    let (src_h, src_w) = image.dim();
    let raw: Vec<u8> = image.iter().copied().collect();
    let src = GrayImage::from_raw(src_w as u32, src_h as u32, raw).ok_or_else(|| {
        MesoError::shape(format!("cannot view ({src_h}, {src_w}) as an image"))
    })?;
    let out = imageops::resize(&src, w as u32, h as u32, FilterType::CatmullRom);
    Array2::from_shape_vec((h, w), out.into_raw())
        .map_err(|e| MesoError::shape(format!("resized image has a wrong shape: {e}")))
}

fn resize_area(image: ArrayView2<u8>, (h, w): Idx2d) -> Array2<u8> {
    let (src_h, src_w) = image.dim();
    let taps_w = area_taps(src_w, w);
    let taps_h = area_taps(src_h, h);

    // 宽方向
    let tmp = Array2::<f32>::from_shape_fn((src_h, w), |(r, c)| {
        taps_w[c]
            .iter()
            .map(|&(i, wt)| image[(r, i)] as f32 * wt)
            .sum()
    });

    // 高方向
    Array2::from_shape_fn((h, w), |(r, c)| {
        let v: f32 = taps_h[r].iter().map(|&(i, wt)| tmp[(i, c)] * wt).sum();
        num::clamp(v.round(), 0.0, 255.0) as u8
    })
}

/// 按 [`Interpolation::for_target`] 自动选择插值方式并缩放.
#[inline]
pub fn resize_auto(image: ArrayView2<u8>, size: Idx2d) -> MesoResult<Array2<u8>> {
    resize(image, size, Interpolation::for_target(size))
}

/// 输出像素 `d` 覆盖输入区间 `[d * scale, (d + 1) * scale)`, 权重为重叠长度占比.
fn area_taps(src: usize, dst: usize) -> Taps {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = ((d + 1) as f64 * scale).min(src as f64);
            let lo = start.floor() as usize;
            let hi = (end.ceil() as usize).min(src);
            (lo..hi)
                .filter_map(|i| {
                    let overlap = end.min((i + 1) as f64) - start.max(i as f64);
                    (overlap > 1e-12).then(|| (i, (overlap / (end - start)) as f32))
                })
                .collect()
        })
        .collect()
}
