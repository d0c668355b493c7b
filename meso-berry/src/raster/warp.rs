//! 仿射扭曲.

use crate::affine::AffineTransform;
use crate::{Idx2d, MesoError, MesoResult};
use ndarray::{Array2, ArrayView2};

/// 将 `image` 经 `warp` 扭曲到尺寸为 `(out_h, out_w)` 的画布上.
///
/// `warp` 为 "输入坐标 -> 输出坐标" 方向; 内部对每个输出像素施加其逆变换,
/// 在输入图像上做双线性插值. 落在输入图像外的邻居按 0 计算.
///
/// 如果 `warp` 不可逆, 返回 `UnsupportedOperation` 错误;
/// 如果画布尺寸为 0, 返回 `DataShape` 错误.
pub fn warp_affine(
    image: ArrayView2<u8>,
    warp: &AffineTransform,
    (out_h, out_w): Idx2d,
) -> MesoResult<Array2<u8>> {
    if out_h == 0 || out_w == 0 {
        return Err(MesoError::shape(format!(
            "output canvas must be non-empty, got ({out_h}, {out_w})"
        )));
    }
    let inv = warp.invert()?;
    let sampler = Bilinear { image };
    Ok(Array2::from_shape_fn((out_h, out_w), |(h, w)| {
        let (x, y) = inv.apply((w as f64, h as f64));
        sampler.sample(x, y)
    }))
}

/// 以 0 为边界的双线性采样器.
struct Bilinear<'a> {
    image: ArrayView2<'a, u8>,
}

impl Bilinear<'_> {
    /// 获取 `(x, y)` 处的像素值, 越界时为 0.
    #[inline]
    fn pixel(&self, x: i64, y: i64) -> f64 {
        if x < 0 || y < 0 {
            return 0.0;
        }
        self.image
            .get((y as usize, x as usize))
            .map_or(0.0, |p| *p as f64)
    }

    fn sample(&self, x: f64, y: f64) -> u8 {
        if !(x.is_finite() && y.is_finite()) {
            return 0;
        }
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = self.pixel(x0, y0) * (1.0 - fx) + self.pixel(x0 + 1, y0) * fx;
        let bottom = self.pixel(x0, y0 + 1) * (1.0 - fx) + self.pixel(x0 + 1, y0 + 1) * fx;
        let v = top * (1.0 - fy) + bottom * fy;
        num::clamp(v.round(), 0.0, 255.0) as u8
    }
}
