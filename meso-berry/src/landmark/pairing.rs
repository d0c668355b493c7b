//! 检测点与参考点的对应关系.

use super::{names_of, LandmarkSet, Side};
use crate::{MesoError, MesoResult};
use itertools::Itertools;

/// 按下标一一对应、且已按置信度筛选过的两个标志点集合.
///
/// `target[i]` 与 `reference[i]` 对应; 两者长度始终相等.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pairing {
    target: LandmarkSet,
    reference: LandmarkSet,
}

impl Pairing {
    /// 构造对应关系. 长度不一致时返回 `DataShape` 错误.
    pub fn new(target: LandmarkSet, reference: LandmarkSet) -> MesoResult<Self> {
        if target.len() != reference.len() {
            return Err(MesoError::shape(format!(
                "paired sets must have the same length, got {} (target) and {} (reference)",
                target.len(),
                reference.len()
            )));
        }
        Ok(Self { target, reference })
    }

    /// 实际帧上的标志点.
    #[inline]
    pub fn target(&self) -> &LandmarkSet {
        &self.target
    }

    /// 参考图谱上的标志点.
    #[inline]
    pub fn reference(&self) -> &LandmarkSet {
        &self.reference
    }

    /// 对应点对数.
    #[inline]
    pub fn len(&self) -> usize {
        self.target.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// 对应点对的名字 (取自 `target`).
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.target.names()
    }

    /// 按 `keys` (`target` 中的名字) 的顺序挑选点对. 不存在的名字被忽略.
    pub fn ordered<'a, I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let idx: Vec<usize> = keys
            .into_iter()
            .unique()
            .filter_map(|k| self.target.names().position(|n| n == k))
            .collect();
        self.pick(&idx)
    }

    /// 左半球与中线上的点对.
    pub fn left(&self) -> Self {
        self.ordered(names_of(Side::Left).chain(names_of(Side::Middle)))
    }

    /// 右半球与中线上的点对.
    pub fn right(&self) -> Self {
        self.ordered(names_of(Side::Right).chain(names_of(Side::Middle)))
    }

    /// 中线上的点对.
    pub fn middle(&self) -> Self {
        self.ordered(names_of(Side::Middle))
    }

    /// 去掉中线点对, 其余保持原顺序.
    pub fn without_middle(&self) -> Self {
        let idx: Vec<usize> = self
            .target
            .iter()
            .positions(|l| l.side() != Some(Side::Middle))
            .collect();
        self.pick(&idx)
    }

    fn pick(&self, idx: &[usize]) -> Self {
        let take = |s: &LandmarkSet| {
            LandmarkSet::from_trusted(idx.iter().map(|&i| s[i].clone()).collect())
        };
        Self {
            target: take(&self.target),
            reference: take(&self.reference),
        }
    }
}

/// 按置信度筛选对应点.
///
/// 逐下标遍历 `target` 与 `reference`, 只保留 `target[i].p` **严格大于** `threshold` 的点对,
/// 并保持其相对顺序. 两者长度不一致时返回 `DataShape` 错误.
pub fn validate(
    target: &LandmarkSet,
    reference: &LandmarkSet,
    threshold: f64,
) -> MesoResult<Pairing> {
    if target.len() != reference.len() {
        return Err(MesoError::shape(format!(
            "cannot pair {} target landmarks with {} reference landmarks",
            target.len(),
            reference.len()
        )));
    }
    let (kept_target, kept_reference): (Vec<_>, Vec<_>) = target
        .iter()
        .zip(reference.iter())
        .filter(|(t, _)| t.p > threshold)
        .map(|(t, r)| (t.clone(), r.clone()))
        .unzip();
    Ok(Pairing {
        target: LandmarkSet::from_trusted(kept_target),
        reference: LandmarkSet::from_trusted(kept_reference),
    })
}

#[cfg(test)]
mod tests {
    use super::{validate, Pairing};
    use crate::consts::LIKELIHOOD_THRESHOLD;
    use crate::landmark::{reference_landmarks, LandmarkSet};
    use crate::MesoError;

    fn detection(p: &[f64; 9]) -> LandmarkSet {
        let rows: Vec<_> = p
            .iter()
            .enumerate()
            .map(|(i, &p)| (i as f64, 2.0 * i as f64, p))
            .collect();
        LandmarkSet::from_detection(&rows).unwrap()
    }

    #[test]
    fn test_validate_threshold() {
        let target = detection(&[0.99995, 0.9998, 1.0, 0.5, 0.99999, 0.9999, 1.0, 0.0, 1.0]);
        let pairing = validate(&target, reference_landmarks(), LIKELIHOOD_THRESHOLD).unwrap();

        // 0.9999 本身不满足 "严格大于".
        let names: Vec<_> = pairing.names().collect();
        assert_eq!(
            names,
            ["left", "bottom left", "bregma", "right", "bottom right"]
        );
        assert_eq!(pairing.len(), 5);
        for (t, r) in pairing.target().iter().zip(pairing.reference().iter()) {
            assert_eq!(t.name, r.name);
        }
    }

    #[test]
    fn test_validate_length_mismatch() {
        let target = detection(&[1.0; 9]);
        let reference = reference_landmarks().left();
        assert!(matches!(
            validate(&target, &reference, 0.5),
            Err(MesoError::DataShape(_))
        ));
        assert!(Pairing::new(target, reference).is_err());
    }

    #[test]
    fn test_pairing_partitions() {
        let target = detection(&[1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        let pairing = validate(&target, reference_landmarks(), 0.5).unwrap();

        assert_eq!(pairing.left().len(), 5);
        assert_eq!(pairing.left().without_middle().len(), 2);
        assert_eq!(pairing.right().len(), 4);
        assert_eq!(pairing.right().without_middle().len(), 1);
        assert_eq!(pairing.middle().len(), 3);
        assert_eq!(pairing.without_middle().len(), 3);

        let right = pairing.right();
        assert_eq!(right.target().names().next(), Some("right"));
        assert_eq!(right.reference()[0].xy(), (410.0, 148.0));
    }
}
