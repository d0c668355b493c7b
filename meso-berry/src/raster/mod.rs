//! 8-bit 栅格 (掩膜 / 帧图像) 的几何重采样与编码转换.
//!
//! 栅格统一以 `ndarray` 的 `(h, w)` 行优先形式存储; 几何变换作用的坐标为 `(x, y) = (w, h)`,
//! 且像素中心位于整数坐标处.

mod io;
mod resize;
mod warp;

pub use io::{load_png_mask, save_png};
pub use resize::{resize, resize_auto, Interpolation};
pub use warp::warp_affine;

use crate::consts::mask::{OFF, ON, ON_UNIT};
use crate::Point2d;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 布尔掩膜在外部的编码方式.
///
/// 内部统一使用 [`MaskEncoding::Byte`]. 只在读写外部数据时转换.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MaskEncoding {
    /// 前景为 255, 背景为 0.
    #[default]
    Byte,

    /// 前景为 1, 背景为 0.
    Unit,
}

impl MaskEncoding {
    /// 前景像素值.
    #[inline]
    pub const fn on(&self) -> u8 {
        match self {
            Self::Byte => ON,
            Self::Unit => ON_UNIT,
        }
    }

    /// 将内部编码的栅格转换为该编码.
    ///
    /// `Byte` 原样拷贝 (保留插值产生的灰度); `Unit` 将任何非零像素视为前景.
    pub fn encode(&self, internal: ArrayView2<u8>) -> Array2<u8> {
        match self {
            Self::Byte => internal.to_owned(),
            Self::Unit => internal.mapv(|p| if p == OFF { OFF } else { ON_UNIT }),
        }
    }

    /// 将该编码的外部栅格转换为内部编码.
    ///
    /// `Byte` 原样拷贝; `Unit` 将任何非零像素映射为 255.
    pub fn decode(&self, external: ArrayView2<u8>) -> Array2<u8> {
        match self {
            Self::Byte => external.to_owned(),
            Self::Unit => binarize(external),
        }
    }
}

/// 非零像素映射为 255, 其余为 0.
pub fn binarize(image: ArrayView2<u8>) -> Array2<u8> {
    image.mapv(|p| if p == OFF { OFF } else { ON })
}

/// 栅格中非零像素的个数.
#[inline]
pub fn count_on(image: ArrayView2<u8>) -> usize {
    image.iter().filter(|p| **p != OFF).count()
}

/// 以 `center` 为圆心, `radius` 为半径画实心圆 (越界部分裁剪).
pub fn draw_disk(mut image: ArrayViewMut2<u8>, (cx, cy): Point2d, radius: f64, value: u8) {
    if !(cx.is_finite() && cy.is_finite()) || radius < 0.0 {
        return;
    }
    let (h, w) = image.dim();
    let h_lo = (cy - radius).floor().max(0.0) as usize;
    let w_lo = (cx - radius).floor().max(0.0) as usize;
    let h_hi = ((cy + radius).ceil().max(-1.0) + 1.0).min(h as f64) as usize;
    let w_hi = ((cx + radius).ceil().max(-1.0) + 1.0).min(w as f64) as usize;
    let r2 = radius * radius;
    for hh in h_lo..h_hi {
        for ww in w_lo..w_hi {
            let (dx, dy) = (ww as f64 - cx, hh as f64 - cy);
            if dx * dx + dy * dy <= r2 {
                image[(hh, ww)] = value;
            }
        }
    }
}
