//! 半球配准.
//!
//! 一个 [`Alignment`] 持有左右两个半球的 "参考 -> 实际帧" 仿射变换.
//! 若两侧是分别估计的 (`separate = true`), 两个变换相互独立; 否则两者完全相同.

mod estimator;

pub use estimator::{estimate_alignment, AlignConfig, AlignmentEstimator, HemisphereMode};

use crate::affine::AffineTransform;
use crate::landmark::{LandmarkSet, Side};
use crate::roi::Hemisphere;
use crate::{Idx2d, MesoError, MesoResult};
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单帧的配准结果.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Alignment {
    left: AffineTransform,
    right: AffineTransform,
    separate: bool,
}

impl Alignment {
    /// 全局单一变换.
    #[inline]
    pub const fn joint(warp: AffineTransform) -> Self {
        Self {
            left: warp,
            right: warp,
            separate: false,
        }
    }

    /// 左右半球分别估计的变换.
    #[inline]
    pub const fn separate(left: AffineTransform, right: AffineTransform) -> Self {
        Self {
            left,
            right,
            separate: true,
        }
    }

    /// 由各部分构造. 若 `separate = false` 但两侧分量不逐位相同, 返回 `Validation` 错误.
    pub fn from_parts(
        left: AffineTransform,
        right: AffineTransform,
        separate: bool,
    ) -> MesoResult<Self> {
        let identical = left
            .components()
            .iter()
            .zip(right.components().iter())
            .all(|(a, b)| a.to_bits() == b.to_bits());
        if !separate && !identical {
            return Err(MesoError::invalid(
                "a joint alignment must hold identical left and right transforms",
            ));
        }
        Ok(Self {
            left,
            right,
            separate,
        })
    }

    /// 左半球变换.
    #[inline]
    pub fn left(&self) -> &AffineTransform {
        &self.left
    }

    /// 右半球变换.
    #[inline]
    pub fn right(&self) -> &AffineTransform {
        &self.right
    }

    /// 左右半球是否分别估计.
    #[inline]
    pub fn is_separate(&self) -> bool {
        self.separate
    }

    /// 获取 `side` 对应的变换.
    ///
    /// `Both` 只在全局单一变换下有定义, 否则返回 `UnsupportedOperation` 错误.
    pub fn transform(&self, side: Hemisphere) -> MesoResult<&AffineTransform> {
        match side {
            Hemisphere::Left => Ok(&self.left),
            Hemisphere::Right => Ok(&self.right),
            Hemisphere::Both if !self.separate => Ok(&self.left),
            Hemisphere::Both => Err(MesoError::UnsupportedOperation(
                "a `both` raster cannot be warped by a separate-hemisphere alignment".into(),
            )),
        }
    }

    /// 逆配准 ("实际帧 -> 参考" 方向).
    ///
    /// 只支持全局单一变换; 对分半球配准求逆返回 `UnsupportedOperation` 错误.
    pub fn invert(&self) -> MesoResult<Alignment> {
        if self.separate {
            return Err(MesoError::UnsupportedOperation(
                "inverting a separate-hemisphere alignment is not supported".into(),
            ));
        }
        Ok(Self::joint(self.left.invert()?))
    }

    /// 变换标志点集合.
    ///
    /// 左半球 (非中线) 的点使用左变换, 右半球 (非中线) 的点使用右变换.
    /// 中线点在分半球配准下取两个变换结果的平均, 否则只变换一次.
    /// 结果按 "左, 中线, 右" 排列; 非标准名字的点被丢弃.
    pub fn warp_points(&self, landmarks: &LandmarkSet) -> LandmarkSet {
        let left = landmarks.left().without_middle().affine_warp(&self.left);
        let right = landmarks.right().without_middle().affine_warp(&self.right);
        let middle = landmarks.middle();
        let middle = if self.separate {
            let ml = middle.affine_warp(&self.left);
            let mr = middle.affine_warp(&self.right);
            LandmarkSet::from_trusted(
                ml.iter()
                    .zip(mr.iter())
                    .map(|(a, b)| {
                        let mut m = a.clone();
                        m.x = (a.x + b.x) / 2.0;
                        m.y = (a.y + b.y) / 2.0;
                        m
                    })
                    .collect(),
            )
        } else {
            middle.affine_warp(&self.left)
        };
        debug_assert!(middle.iter().all(|l| l.side() == Some(Side::Middle)));

        LandmarkSet::from_trusted(
            left.iter()
                .chain(middle.iter())
                .chain(right.iter())
                .cloned()
                .collect(),
        )
    }

    /// 按 `side` 对应的变换将栅格扭曲到尺寸为 `size` (默认 512x512) 的画布上.
    pub fn warp_raster(
        &self,
        image: ArrayView2<u8>,
        side: Hemisphere,
        size: Option<Idx2d>,
    ) -> MesoResult<Array2<u8>> {
        self.transform(side)?.apply_to_raster(image, size)
    }
}

#[cfg(test)]
mod tests {
    use super::Alignment;
    use crate::affine::AffineTransform;
    use crate::landmark::{reference_landmarks, Landmark, LandmarkSet};
    use crate::roi::Hemisphere;
    use crate::MesoError;
    use ndarray::Array2;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_from_parts() {
        let a = AffineTransform::translation(1.0, 2.0);
        let b = AffineTransform::translation(3.0, 2.0);
        assert!(Alignment::from_parts(a, a, false).is_ok());
        assert!(Alignment::from_parts(a, b, true).is_ok());
        assert!(matches!(
            Alignment::from_parts(a, b, false),
            Err(MesoError::Validation(_))
        ));

        // 逐位比较: 两侧相同的 NaN 分量仍是一致的全局变换.
        let nan = AffineTransform::translation(f64::NAN, 0.0);
        let joint = Alignment::from_parts(nan, nan, false).unwrap();
        assert!(!joint.is_separate());
        assert!(Alignment::from_parts(nan, a, false).is_err());
    }

    #[test]
    fn test_invert() {
        let t = AffineTransform::from_compact([[1.1, 0.1, 5.0], [-0.2, 0.9, 3.0]]);
        let inv = Alignment::joint(t).invert().unwrap();
        assert!(!inv.is_separate());
        assert!(t.then(inv.left()).approx_eq(&AffineTransform::identity(), 1e-12));

        let sep = Alignment::separate(t, AffineTransform::identity());
        assert!(matches!(
            sep.invert(),
            Err(MesoError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_midline_blending() {
        let bregma = LandmarkSet::new(vec![Landmark::new("bregma", 256.0, 256.0, 1.0)]).unwrap();
        let a = Alignment::separate(
            AffineTransform::translation(-254.0, -254.0),
            AffineTransform::translation(-252.0, -252.0),
        );
        let w = a.warp_points(&bregma);
        assert_eq!(w.len(), 1);
        assert!(f64_eq(w[0].x, 3.0) && f64_eq(w[0].y, 3.0));

        // 全局单一变换下只变换一次.
        let j = Alignment::joint(AffineTransform::translation(-254.0, -254.0));
        let w = j.warp_points(&bregma);
        assert!(f64_eq(w[0].x, 2.0) && f64_eq(w[0].y, 2.0));
    }

    #[test]
    fn test_warp_points_order() {
        let r = reference_landmarks();
        let a = Alignment::separate(
            AffineTransform::translation(-10.0, 0.0),
            AffineTransform::translation(10.0, 0.0),
        );
        let w = a.warp_points(r);
        let names: Vec<_> = w.names().collect();
        assert_eq!(
            names,
            [
                "left",
                "top left",
                "bottom left",
                "top center",
                "bregma",
                "lambda",
                "right",
                "top right",
                "bottom right"
            ]
        );
        assert_eq!(w.get("left").unwrap().xy(), (92.0, 148.0));
        assert_eq!(w.get("right").unwrap().xy(), (420.0, 148.0));
        assert_eq!(w.get("bregma").unwrap().xy(), (256.0, 256.0));
    }

    #[test]
    fn test_warp_raster_sides() {
        let img = Array2::<u8>::from_elem((8, 8), 255);
        let sep = Alignment::separate(
            AffineTransform::identity(),
            AffineTransform::translation(2.0, 0.0),
        );
        let l = sep.warp_raster(img.view(), Hemisphere::Left, Some((8, 8))).unwrap();
        let r = sep.warp_raster(img.view(), Hemisphere::Right, Some((8, 8))).unwrap();
        assert_eq!(l[(0, 0)], 255);
        assert_eq!(r[(0, 0)], 0);
        assert!(matches!(
            sep.warp_raster(img.view(), Hemisphere::Both, None),
            Err(MesoError::UnsupportedOperation(_))
        ));

        let joint = Alignment::joint(AffineTransform::identity());
        assert_eq!(
            joint.warp_raster(img.view(), Hemisphere::Both, None).unwrap().dim(),
            (512, 512)
        );
    }
}
