//! 把参考图谱的 ROI 投影到各帧.

use super::{AtlasProvider, Hemisphere, Roi, RoiSet};
use crate::align::Alignment;
use crate::consts::mask::{OFF, ON};
use crate::consts::{CANONICAL_FRAME, OUTLINE_DESCRIPTION, OUTLINE_NAME};
use crate::raster::resize_auto;
use crate::{Idx2d, MesoError, MesoResult};
use log::{debug, info, warn};
use ndarray::{Array2, Zip};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 左右两半轮廓的合并方式.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OutlineMerge {
    /// 任一半非零处为 255, 其余为 0.
    #[default]
    Union,

    /// 每个像素为覆盖它的半边个数, 取值 0, 1, 2.
    Sum,
}

impl OutlineMerge {
    fn merge(&self, left: &Array2<u8>, right: &Array2<u8>) -> Array2<u8> {
        let on = |p: u8| (p != OFF) as u8;
        let mut out = Array2::<u8>::zeros(left.dim());
        match self {
            Self::Union => Zip::from(&mut out)
                .and(left)
                .and(right)
                .for_each(|o, &l, &r| *o = if on(l) + on(r) > 0 { ON } else { OFF }),
            Self::Sum => Zip::from(&mut out)
                .and(left)
                .and(right)
                .for_each(|o, &l, &r| *o = on(l) + on(r)),
        }
        out
    }
}

/// 投影参数.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProjectConfig {
    /// 是否将扭曲后的掩膜缩放到帧的实际尺寸.
    pub resize: bool,

    /// 轮廓合并方式.
    pub merge: OutlineMerge,

    /// 扭曲时的画布尺寸 `(h, w)`.
    pub canvas: Idx2d,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            resize: true,
            merge: OutlineMerge::Union,
            canvas: CANONICAL_FRAME,
        }
    }
}

/// 单帧的元数据.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameMeta {
    /// 图像 (或视频) 名.
    pub image_name: String,

    /// 帧索引.
    pub frame_idx: i64,

    /// 帧宽.
    pub width: usize,

    /// 帧高.
    pub height: usize,

    /// 总帧数.
    pub total_frames: i64,
}

impl FrameMeta {
    /// 帧尺寸 `(h, w)`.
    #[inline]
    pub fn size(&self) -> Idx2d {
        (self.height, self.width)
    }
}

/// ROI 投影器.
///
/// 参考图谱与轮廓在构造时由 [`AtlasProvider`] 加载一次, 之后只读地用于每一帧.
#[derive(Clone, Debug)]
pub struct RoiProjector {
    reference: RoiSet,
    outline: RoiSet,
    config: ProjectConfig,
}

impl RoiProjector {
    /// 从 `provider` 加载图谱资源并构造. 资源缺失时直接返回错误.
    pub fn new(provider: &dyn AtlasProvider, config: ProjectConfig) -> MesoResult<Self> {
        let reference = provider.reference_rois()?;
        let outline = provider.outlines()?;
        info!(
            "loaded atlas with {} reference ROIs and {} outline halves",
            reference.len(),
            outline.len()
        );
        Self::from_sets(reference, outline, config)
    }

    /// 由已加载的图谱资源构造.
    ///
    /// `outline` 必须恰好含有一个左半球和一个右半球的 ROI, 否则返回 `Validation` 错误;
    /// 画布尺寸为 0 时返回 `DataShape` 错误.
    pub fn from_sets(
        reference: RoiSet,
        outline: RoiSet,
        config: ProjectConfig,
    ) -> MesoResult<Self> {
        let count = |side: Hemisphere| outline.iter().filter(|r| r.side == side).count();
        if outline.len() != 2 || count(Hemisphere::Left) != 1 || count(Hemisphere::Right) != 1 {
            return Err(MesoError::invalid(
                "the outline set must hold exactly one left and one right ROI",
            ));
        }
        if config.canvas.0 == 0 || config.canvas.1 == 0 {
            return Err(MesoError::shape(format!(
                "canvas must be non-empty, got {:?}",
                config.canvas
            )));
        }
        Ok(Self {
            reference,
            outline,
            config,
        })
    }

    /// 参考图谱的 ROI.
    #[inline]
    pub fn reference(&self) -> &RoiSet {
        &self.reference
    }

    /// 参考图谱的轮廓.
    #[inline]
    pub fn outline(&self) -> &RoiSet {
        &self.outline
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    fn warp_roi(&self, roi: &Roi, alignment: &Alignment, target: Option<Idx2d>) -> MesoResult<Roi> {
        let mut mask = alignment.warp_raster(roi.mask.view(), roi.side, Some(self.config.canvas))?;
        if let Some(size) = target {
            mask = resize_auto(mask.view(), size)?;
        }
        Ok(roi.with_mask(mask))
    }

    /// 将全部轮廓与参考 ROI 按 `alignment` 扭曲到 `meta` 描述的帧上.
    ///
    /// 结果依次为: 合并后的轮廓 (`both`), 左右两半轮廓, 参考 ROI.
    pub fn project(&self, alignment: &Alignment, meta: &FrameMeta) -> MesoResult<RoiSet> {
        let target = self.config.resize.then(|| meta.size());
        let outlines = self
            .outline
            .iter()
            .map(|r| self.warp_roi(r, alignment, target))
            .collect::<MesoResult<Vec<_>>>()?;
        let left = outlines
            .iter()
            .find(|r| r.side == Hemisphere::Left)
            .ok_or_else(|| MesoError::NotFound("left outline".into()))?;
        let right = outlines
            .iter()
            .find(|r| r.side == Hemisphere::Right)
            .ok_or_else(|| MesoError::NotFound("right outline".into()))?;
        let merged = Roi::new(
            OUTLINE_NAME,
            Hemisphere::Both,
            -1,
            OUTLINE_DESCRIPTION,
            self.config.merge.merge(&left.mask, &right.mask),
        );

        let mut rois = Vec::with_capacity(1 + outlines.len() + self.reference.len());
        rois.push(merged);
        rois.extend(outlines);
        for r in self.reference.iter() {
            rois.push(self.warp_roi(r, alignment, target)?);
        }
        debug!(
            "projected {} ROIs onto `{}` frame {}",
            rois.len(),
            meta.image_name,
            meta.frame_idx
        );
        RoiSet::new(meta.image_name.clone(), meta.frame_idx, meta.total_frames, rois)
    }

    /// 逐帧投影, `alignments` 与 `metas` 按下标对应.
    ///
    /// 两者长度不一致时返回 `DataShape` 错误. 单帧失败只体现在该帧的结果中,
    /// 不影响其它帧. 开启 `rayon` feature 时并行处理.
    pub fn project_batch(
        &self,
        alignments: &[Alignment],
        metas: &[FrameMeta],
    ) -> MesoResult<Vec<MesoResult<RoiSet>>> {
        if alignments.len() != metas.len() {
            return Err(MesoError::shape(format!(
                "got {} alignments for {} metadata rows",
                alignments.len(),
                metas.len()
            )));
        }
        let one = |(a, m): (&Alignment, &FrameMeta)| {
            let r = self.project(a, m);
            if let Err(e) = &r {
                warn!("`{}` frame {}: ROI projection failed: {e}", m.image_name, m.frame_idx);
            }
            r
        };

        #[cfg(feature = "rayon")]
        let ret: Vec<_> = alignments.par_iter().zip(metas.par_iter()).map(one).collect();
        #[cfg(not(feature = "rayon"))]
        let ret: Vec<_> = alignments.iter().zip(metas.iter()).map(one).collect();

        let failed = ret.iter().filter(|r| r.is_err()).count();
        info!("projected ROIs for {} frames ({failed} failed)", ret.len());
        Ok(ret)
    }
}
