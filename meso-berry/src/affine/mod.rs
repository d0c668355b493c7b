//! 二维仿射变换.
//!
//! 变换以 2x3 的 "紧凑" 矩阵为规范 (持久化) 形式, 仅在复合运算时展开为
//! 3x3 的齐次 "方阵". 两种形式之间的转换是精确无损的.

mod estimate;

pub use estimate::estimate;

use crate::raster;
use crate::{Idx2d, MesoError, MesoResult, Point2d};
use nalgebra::Matrix3;
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 行列式绝对值小于该值时视为不可逆.
const SINGULAR_EPS: f64 = 1e-12;

/// 二维仿射变换, 6 个自由参数.
///
/// 紧凑形式按行优先排列为 `[[xx, xy, xc], [yx, yy, yc]]`, 其中 `xc`, `yc` 为平移分量:
///
/// ```text
/// x' = xx * x + xy * y + xc
/// y' = yx * x + yy * y + yc
/// ```
///
/// 该结构是只读的值类型. 复合、求逆都会产生新的实例.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AffineTransform {
    m: [[f64; 3]; 2],
}

impl Default for AffineTransform {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    /// 从紧凑矩阵直接构建.
    #[inline]
    pub const fn from_compact(m: [[f64; 3]; 2]) -> Self {
        Self { m }
    }

    /// 恒等变换.
    #[inline]
    pub const fn identity() -> Self {
        Self::from_compact([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    /// 平移变换.
    #[inline]
    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self::from_compact([[1.0, 0.0, tx], [0.0, 1.0, ty]])
    }

    /// 以原点为中心的缩放变换.
    #[inline]
    pub const fn scaling(sx: f64, sy: f64) -> Self {
        Self::from_compact([[sx, 0.0, 0.0], [0.0, sy, 0.0]])
    }

    /// 获得紧凑矩阵.
    #[inline]
    pub const fn compact(&self) -> [[f64; 3]; 2] {
        self.m
    }

    /// 按行优先顺序获得 6 个分量 `[xx, xy, xc, yx, yy, yc]`.
    #[inline]
    pub fn components(&self) -> [f64; 6] {
        let [[a, b, c], [d, e, f]] = self.m;
        [a, b, c, d, e, f]
    }

    /// 由行优先的 6 个分量构建. 与 [`Self::components`] 互逆.
    #[inline]
    pub const fn from_components([a, b, c, d, e, f]: [f64; 6]) -> Self {
        Self::from_compact([[a, b, c], [d, e, f]])
    }

    /// 展开为 3x3 齐次方阵, 最后一行为 `[0, 0, 1]`.
    pub fn to_square(&self) -> Matrix3<f64> {
        let [[a, b, c], [d, e, f]] = self.m;
        Matrix3::new(a, b, c, d, e, f, 0.0, 0.0, 1.0)
    }

    /// 由 3x3 齐次方阵取前两行得到紧凑形式.
    ///
    /// 不检查最后一行是否为 `[0, 0, 1]`.
    pub fn from_square(sq: &Matrix3<f64>) -> Self {
        Self::from_compact([
            [sq[(0, 0)], sq[(0, 1)], sq[(0, 2)]],
            [sq[(1, 0)], sq[(1, 1)], sq[(1, 2)]],
        ])
    }

    /// 线性部分的行列式.
    #[inline]
    pub fn determinant(&self) -> f64 {
        let [[a, b, _], [d, e, _]] = self.m;
        a * e - b * d
    }

    /// 变换单个点.
    #[inline]
    pub fn apply(&self, (x, y): Point2d) -> Point2d {
        let [[a, b, c], [d, e, f]] = self.m;
        (a * x + b * y + c, d * x + e * y + f)
    }

    /// 变换形状为 `(N, 2)` 的点集, 每行为一个 `(x, y)`.
    ///
    /// 如果列数不为 2, 返回 `DataShape` 错误.
    pub fn apply_to_points(&self, pts: ArrayView2<f64>) -> MesoResult<Array2<f64>> {
        let (n, k) = pts.dim();
        if k != 2 {
            return Err(MesoError::shape(format!(
                "points must be in shape (N, 2), got ({n}, {k})"
            )));
        }
        Ok(Array2::from_shape_fn((n, 2), |(i, j)| {
            let (x, y) = self.apply((pts[(i, 0)], pts[(i, 1)]));
            if j == 0 {
                x
            } else {
                y
            }
        }))
    }

    /// 将栅格 `image` 按该变换重采样到尺寸为 `size` (默认 512x512) 的画布上.
    ///
    /// 变换方向为 "输入 -> 输出", 采用双线性插值, 越界部分以 0 填充.
    pub fn apply_to_raster(
        &self,
        image: ArrayView2<u8>,
        size: Option<Idx2d>,
    ) -> MesoResult<Array2<u8>> {
        let size = size.unwrap_or(crate::consts::CANONICAL_FRAME);
        raster::warp_affine(image, self, size)
    }

    /// 先施加 `self`, 再施加 `next` 的复合变换.
    pub fn then(&self, next: &AffineTransform) -> AffineTransform {
        Self::from_square(&(next.to_square() * self.to_square()))
    }

    /// 逆变换. 若线性部分奇异, 返回 `UnsupportedOperation` 错误.
    pub fn invert(&self) -> MesoResult<AffineTransform> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPS {
            return Err(MesoError::UnsupportedOperation(format!(
                "affine transform is not invertible (det = {det})"
            )));
        }
        let [[a, b, c], [d, e, f]] = self.m;
        let inv_det = 1.0 / det;
        let (ia, ib, id, ie) = (e * inv_det, -b * inv_det, -d * inv_det, a * inv_det);
        Ok(Self::from_compact([
            [ia, ib, -(ia * c + ib * f)],
            [id, ie, -(id * c + ie * f)],
        ]))
    }

    /// 所有分量在 `tol` 内相等.
    pub fn approx_eq(&self, other: &AffineTransform, tol: f64) -> bool {
        self.components()
            .iter()
            .zip(other.components().iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// 复合一系列变换. `compose([A, B, C])` 等价于依次施加 `A -> B -> C`.
///
/// 空序列得到恒等变换; 只有一个元素时原样返回.
pub fn compose<'a, I>(transforms: I) -> AffineTransform
where
    I: IntoIterator<Item = &'a AffineTransform>,
{
    let mut it = transforms.into_iter();
    let Some(first) = it.next() else {
        return AffineTransform::identity();
    };
    it.fold(*first, |acc, t| acc.then(t))
}

#[cfg(test)]
mod tests {
    use super::{compose, AffineTransform};
    use ndarray::array;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn sample() -> AffineTransform {
        AffineTransform::from_compact([[1.2, -0.3, 14.0], [0.25, 0.9, -7.5]])
    }

    #[test]
    fn test_square_compact_lossless() {
        let t = sample();
        assert_eq!(AffineTransform::from_square(&t.to_square()), t);
        assert_eq!(AffineTransform::from_components(t.components()), t);
    }

    #[test]
    fn test_compose_translations() {
        let t = compose(&[
            AffineTransform::translation(1.0, 0.0),
            AffineTransform::translation(0.0, 1.0),
        ]);
        assert!(t.approx_eq(&AffineTransform::translation(1.0, 1.0), 1e-12));
    }

    #[test]
    fn test_compose_degenerate_arity() {
        assert_eq!(compose(&[] as &[AffineTransform]), AffineTransform::identity());
        let t = sample();
        assert_eq!(compose([&t]), t);
    }

    /// 复合顺序: 先缩放后平移, 与先平移后缩放结果不同.
    #[test]
    fn test_compose_order() {
        let s = AffineTransform::scaling(2.0, 2.0);
        let t = AffineTransform::translation(1.0, 0.0);

        let st = compose([&s, &t]);
        let (x, y) = st.apply((1.0, 1.0));
        assert!(f64_eq(x, 3.0) && f64_eq(y, 2.0));

        let ts = compose([&t, &s]);
        let (x, y) = ts.apply((1.0, 1.0));
        assert!(f64_eq(x, 4.0) && f64_eq(y, 2.0));
    }

    #[test]
    fn test_invert_round_trip() {
        let t = sample();
        let inv = t.invert().unwrap();
        let pts = array![[0.0, 0.0], [10.0, -3.0], [256.0, 511.0], [-40.5, 12.25]];
        let back = inv
            .apply_to_points(t.apply_to_points(pts.view()).unwrap().view())
            .unwrap();
        for (a, b) in pts.iter().zip(back.iter()) {
            assert!(f64_eq(*a, *b));
        }
        assert!(compose([&t, &inv]).approx_eq(&AffineTransform::identity(), 1e-12));
    }

    #[test]
    fn test_invert_singular() {
        let t = AffineTransform::from_compact([[1.0, 2.0, 0.0], [2.0, 4.0, 0.0]]);
        assert!(matches!(
            t.invert(),
            Err(crate::MesoError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_apply_to_points_shape() {
        let t = sample();
        let bad = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            t.apply_to_points(bad.view()),
            Err(crate::MesoError::DataShape(_))
        ));

        let empty = ndarray::Array2::<f64>::zeros((0, 2));
        assert_eq!(t.apply_to_points(empty.view()).unwrap().dim(), (0, 2));
    }
}
