//! 由对应点估计配准.

use super::Alignment;
use crate::affine::{self, AffineTransform};
use crate::consts::LIKELIHOOD_THRESHOLD;
use crate::landmark::{reference_landmarks, validate, LandmarkSet, Pairing};
use crate::MesoResult;
use log::{debug, info, warn};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 自动分半球时, 每侧 (去掉中线后) 至少需要 **多于** 该数目的有效点.
const MIN_SIDE_POINTS: usize = 2;

/// 是否分别估计左右半球的变换.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum HemisphereMode {
    /// 两侧非中线有效点均多于 2 个时分别估计, 否则估计全局单一变换.
    #[default]
    Auto,

    /// 总是分别估计.
    Separate,

    /// 总是估计全局单一变换.
    Joint,
}

/// 配准参数.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AlignConfig {
    /// 置信度阈值, 只采用严格大于该值的检测点.
    pub likelihood_threshold: f64,

    /// 分半球策略.
    pub hemisphere: HemisphereMode,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            likelihood_threshold: LIKELIHOOD_THRESHOLD,
            hemisphere: HemisphereMode::Auto,
        }
    }
}

/// 由已筛选的对应点估计配准.
///
/// 变换方向为 "参考 -> 实际帧". 点数不足或退化时返回 `DataShape` 错误;
/// 自动模式下某一侧点数不足 **不是** 错误, 而是退化为全局单一变换.
pub fn estimate_alignment(pairing: &Pairing, mode: HemisphereMode) -> MesoResult<Alignment> {
    let fit = |p: &Pairing| -> MesoResult<AffineTransform> {
        affine::estimate(p.reference().xy().view(), p.target().xy().view())
    };

    let left = pairing.left();
    let right = pairing.right();
    let separate = match mode {
        HemisphereMode::Separate => true,
        HemisphereMode::Joint => false,
        HemisphereMode::Auto => {
            left.without_middle().len() > MIN_SIDE_POINTS
                && right.without_middle().len() > MIN_SIDE_POINTS
        }
    };
    debug!(
        "estimating alignment from {} correspondences (left {}, right {}), separate = {separate}",
        pairing.len(),
        left.len(),
        right.len()
    );

    if separate {
        Ok(Alignment::separate(fit(&left)?, fit(&right)?))
    } else {
        Ok(Alignment::joint(fit(pairing)?))
    }
}

/// 以固定的参考标志点与配置, 对一帧或多帧检测结果做配准.
#[derive(Clone, Debug)]
pub struct AlignmentEstimator {
    reference: LandmarkSet,
    config: AlignConfig,
}

impl Default for AlignmentEstimator {
    fn default() -> Self {
        Self::new(reference_landmarks().clone(), AlignConfig::default())
    }
}

impl AlignmentEstimator {
    /// 以 `reference` 为参考标志点构造.
    pub fn new(reference: LandmarkSet, config: AlignConfig) -> Self {
        Self { reference, config }
    }

    /// 参考标志点.
    #[inline]
    pub fn reference(&self) -> &LandmarkSet {
        &self.reference
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// 筛选 `target` 中的有效点, 得到与参考标志点的对应关系.
    pub fn pair(&self, target: &LandmarkSet) -> MesoResult<Pairing> {
        validate(target, &self.reference, self.config.likelihood_threshold)
    }

    /// 对已有的对应关系估计配准.
    #[inline]
    pub fn estimate(&self, pairing: &Pairing) -> MesoResult<Alignment> {
        estimate_alignment(pairing, self.config.hemisphere)
    }

    /// 对单帧检测结果做筛选与估计.
    pub fn align(&self, target: &LandmarkSet) -> MesoResult<Alignment> {
        let pairing = self.pair(target)?;
        debug!(
            "{} of {} landmarks passed the likelihood threshold",
            pairing.len(),
            target.len()
        );
        self.estimate(&pairing)
    }

    /// 逐帧配准. 每帧相互独立, 某一帧失败不影响其它帧.
    ///
    /// 开启 `rayon` feature 时并行处理.
    pub fn align_batch(&self, targets: &[LandmarkSet]) -> Vec<MesoResult<Alignment>> {
        let one = |(idx, t): (usize, &LandmarkSet)| {
            let r = self.align(t);
            if let Err(e) = &r {
                warn!("frame {idx}: alignment failed: {e}");
            }
            r
        };

        #[cfg(feature = "rayon")]
        let ret: Vec<_> = targets.par_iter().enumerate().map(one).collect();
        #[cfg(not(feature = "rayon"))]
        let ret: Vec<_> = targets.iter().enumerate().map(one).collect();

        let failed = ret.iter().filter(|r| r.is_err()).count();
        info!("aligned {} frames ({failed} failed)", ret.len());
        ret
    }

    /// 将参考标志点经每帧的配准变换到实际帧坐标中.
    pub fn reannotate(&self, alignments: &[Alignment]) -> Vec<LandmarkSet> {
        alignments
            .iter()
            .map(|a| a.warp_points(&self.reference))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{estimate_alignment, AlignConfig, AlignmentEstimator, HemisphereMode};
    use crate::affine::AffineTransform;
    use crate::landmark::{reference_landmarks, validate, LandmarkSet};
    use crate::MesoError;

    fn init_logger() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    }

    /// 以 `left` / `right` 两个变换生成检测结果, 置信度由 `p` 给出.
    fn synthetic(left: &AffineTransform, right: &AffineTransform, p: &[f64; 9]) -> LandmarkSet {
        let r = reference_landmarks();
        let rows: Vec<_> = r
            .iter()
            .zip(p.iter())
            .map(|(l, &p)| {
                let warp = match l.side() {
                    Some(crate::landmark::Side::Right) => right,
                    _ => left,
                };
                let (x, y) = warp.apply(l.xy());
                (x, y, p)
            })
            .collect();
        LandmarkSet::from_detection(&rows).unwrap()
    }

    #[test]
    fn test_auto_separate() {
        init_logger();
        let left = AffineTransform::from_compact([[1.0, 0.05, 3.0], [0.0, 0.95, -2.0]]);
        let right = AffineTransform::from_compact([[0.97, 0.0, 6.0], [-0.03, 1.0, 1.0]]);
        let target = synthetic(&left, &right, &[1.0; 9]);

        let est = AlignmentEstimator::default();
        let a = est.align(&target).unwrap();
        assert!(a.is_separate());

        // 只用左侧 3 点加中线 (中线点也按左变换生成), 左变换应被精确恢复.
        let pairing = validate(&target, reference_landmarks(), 0.5).unwrap();
        let a = estimate_alignment(&pairing, HemisphereMode::Auto).unwrap();
        assert!(a.left().approx_eq(&left, 1e-8));
    }

    #[test]
    fn test_auto_joint() {
        init_logger();
        let warp = AffineTransform::from_compact([[1.02, 0.01, -4.0], [0.0, 0.99, 7.0]]);
        // 左右各 1 点, 中线 3 点.
        let p = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0];
        let target = synthetic(&warp, &warp, &p);

        let a = AlignmentEstimator::default().align(&target).unwrap();
        assert!(!a.is_separate());
        assert_eq!(a.left(), a.right());
        assert!(a.left().approx_eq(&warp, 1e-8));
    }

    #[test]
    fn test_forced_modes() {
        let warp = AffineTransform::translation(5.0, -5.0);
        let target = synthetic(&warp, &warp, &[1.0; 9]);

        let joint = AlignmentEstimator::new(
            reference_landmarks().clone(),
            AlignConfig {
                hemisphere: HemisphereMode::Joint,
                ..AlignConfig::default()
            },
        );
        assert!(!joint.align(&target).unwrap().is_separate());

        let sep = AlignmentEstimator::new(
            reference_landmarks().clone(),
            AlignConfig {
                hemisphere: HemisphereMode::Separate,
                ..AlignConfig::default()
            },
        );
        let a = sep.align(&target).unwrap();
        assert!(a.is_separate());
        assert!(a.right().approx_eq(&warp, 1e-8));
    }

    #[test]
    fn test_too_few_points() {
        let warp = AffineTransform::identity();
        let p = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let target = synthetic(&warp, &warp, &p);
        assert!(matches!(
            AlignmentEstimator::default().align(&target),
            Err(MesoError::DataShape(_))
        ));
    }

    /// 置信度通过筛选但坐标缺失 (NaN) 的检测结果是该帧的硬错误.
    #[test]
    fn test_non_finite_detection() {
        let warp = AffineTransform::translation(3.0, 4.0);
        let mut rows: Vec<_> = synthetic(&warp, &warp, &[1.0; 9])
            .iter()
            .map(|l| (l.x, l.y, l.p))
            .collect();
        rows[4].0 = f64::NAN;
        let target = LandmarkSet::from_detection(&rows).unwrap();

        for mode in [HemisphereMode::Auto, HemisphereMode::Joint, HemisphereMode::Separate] {
            let est = AlignmentEstimator::new(
                reference_landmarks().clone(),
                AlignConfig {
                    hemisphere: mode,
                    ..AlignConfig::default()
                },
            );
            assert!(matches!(est.align(&target), Err(MesoError::DataShape(_))));
        }
    }

    #[test]
    fn test_align_batch_isolated() {
        let warp = AffineTransform::translation(1.0, 1.0);
        let good = synthetic(&warp, &warp, &[1.0; 9]);
        let bad = synthetic(&warp, &warp, &[0.0; 9]);

        let est = AlignmentEstimator::default();
        let ret = est.align_batch(&[good.clone(), bad, good]);
        assert_eq!(ret.len(), 3);
        assert!(ret[0].is_ok());
        assert!(ret[1].is_err());
        assert!(ret[2].is_ok());

        let aligned: Vec<_> = ret.into_iter().flatten().collect();
        let marks = est.reannotate(&aligned);
        assert_eq!(marks.len(), 2);
        let bregma = marks[0].get("bregma").unwrap();
        assert!((bregma.x - 257.0).abs() < 1e-8 && (bregma.y - 257.0).abs() < 1e-8);
    }
}
