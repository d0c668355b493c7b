//! ROI 模型、图谱资源与投影.
//!
//! 掩膜在内部统一以 0/255 编码 (见 [`crate::raster::MaskEncoding`]).

mod flat;
mod projector;
mod provider;

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        mod container;

        pub use container::CONTAINER_VERSION;
    }
}

pub use flat::FlatRois;
pub use projector::{FrameMeta, OutlineMerge, ProjectConfig, RoiProjector};
pub use provider::{AtlasProvider, StaticAtlas};

#[cfg(feature = "serde")]
pub use provider::DirectoryAtlas;

use crate::consts::{REFERENCE_FRAME, REFERENCE_NAME};
use crate::raster::MaskEncoding;
use crate::{MesoError, MesoResult};
use itertools::Itertools;
use ndarray::Array2;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// ROI 所属的半球.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Hemisphere {
    /// 左半球.
    Left,

    /// 右半球.
    Right,

    /// 不区分半球, 如合并后的轮廓.
    Both,
}

impl Hemisphere {
    /// 持久化时使用的标签.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 只接受 `left`, `right`, `both`; 其它标签返回 `Validation` 错误.
impl FromStr for Hemisphere {
    type Err = MesoError;

    fn from_str(s: &str) -> MesoResult<Self> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "both" => Ok(Self::Both),
            other => Err(MesoError::invalid(format!(
                "hemisphere must be one of left/right/both, got `{other}`"
            ))),
        }
    }
}

/// 单个 ROI.
#[derive(Clone, Debug, PartialEq)]
pub struct Roi {
    /// 名字.
    pub name: String,

    /// 所属半球.
    pub side: Hemisphere,

    /// 图谱编号, 负数表示没有编号.
    pub id: i64,

    /// 描述.
    pub description: String,

    /// 掩膜, 形状为 `(h, w)`.
    pub mask: Array2<u8>,
}

impl Roi {
    /// 构造 ROI.
    pub fn new(
        name: impl Into<String>,
        side: Hemisphere,
        id: i64,
        description: impl Into<String>,
        mask: Array2<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            side,
            id,
            description: description.into(),
            mask,
        }
    }

    /// 图谱编号. 负数视为没有编号.
    #[inline]
    pub fn allen_id(&self) -> Option<i64> {
        (self.id >= 0).then_some(self.id)
    }

    /// 保留元数据, 替换掩膜.
    pub fn with_mask(&self, mask: Array2<u8>) -> Self {
        Self {
            name: self.name.clone(),
            side: self.side,
            id: self.id,
            description: self.description.clone(),
            mask,
        }
    }
}

/// ROI 文件格式.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RoiFileType {
    /// 层次化容器 (`.roi`).
    #[default]
    Container,

    /// 扁平 npz 归档 (`.npz`), 0/255 编码.
    Npz,
}

impl RoiFileType {
    /// 对应的文件后缀.
    pub const fn suffix(&self) -> &'static str {
        match self {
            Self::Container => crate::consts::files::ROI_SUFFIX,
            Self::Npz => crate::consts::files::NPZ_SUFFIX,
        }
    }
}

/// 只接受 `roi` (及其别名 `hdf`) 与 `npz`; 其它格式返回 `Validation` 错误.
impl FromStr for RoiFileType {
    type Err = MesoError;

    fn from_str(s: &str) -> MesoResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "roi" | "hdf" => Ok(Self::Container),
            "npz" => Ok(Self::Npz),
            _ => Err(MesoError::invalid(format!(
                "ROI file type must be one of roi/npz, got `{s}`"
            ))),
        }
    }
}

/// 属于同一帧 (或参考图谱) 的全部 ROI.
///
/// 同一半球内名字唯一. `Both` 的 ROI 在扁平布局中位于顶层, 不能占用 `left` / `right` 这两个名字.
#[derive(Clone, Debug, PartialEq)]
pub struct RoiSet {
    image_name: String,
    frame_idx: i64,
    total_frames: i64,
    rois: Vec<Roi>,
}

impl RoiSet {
    /// 构造 ROI 集合. 违反唯一性约束时返回 `Validation` 错误.
    pub fn new(
        image_name: impl Into<String>,
        frame_idx: i64,
        total_frames: i64,
        rois: Vec<Roi>,
    ) -> MesoResult<Self> {
        if let Some((side, name)) = rois
            .iter()
            .map(|r| (r.side, r.name.as_str()))
            .duplicates()
            .next()
        {
            return Err(MesoError::invalid(format!(
                "duplicate ROI `{name}` in hemisphere `{side}`"
            )));
        }
        if let Some(r) = rois.iter().find(|r| {
            r.side == Hemisphere::Both
                && (r.name == Hemisphere::Left.as_str() || r.name == Hemisphere::Right.as_str())
        }) {
            return Err(MesoError::invalid(format!(
                "a `both` ROI cannot be named `{}`",
                r.name
            )));
        }
        Ok(Self {
            image_name: image_name.into(),
            frame_idx,
            total_frames,
            rois,
        })
    }

    /// 参考图谱的 ROI 集合 (帧索引与总帧数均为 -1).
    pub fn reference(rois: Vec<Roi>) -> MesoResult<Self> {
        Self::new(REFERENCE_NAME, REFERENCE_FRAME, REFERENCE_FRAME, rois)
    }

    /// 图像名.
    #[inline]
    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// 帧索引.
    #[inline]
    pub fn frame_idx(&self) -> i64 {
        self.frame_idx
    }

    /// 总帧数.
    #[inline]
    pub fn total_frames(&self) -> i64 {
        self.total_frames
    }

    /// 按顺序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Roi> {
        self.rois.iter()
    }

    /// ROI 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rois.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// 去重后的名字, 保持首次出现的顺序.
    pub fn names(&self) -> Vec<&str> {
        self.rois.iter().map(|r| r.name.as_str()).unique().collect()
    }

    /// 获取 `side` 半球中名为 `name` 的 ROI.
    pub fn get(&self, side: Hemisphere, name: &str) -> Option<&Roi> {
        self.rois.iter().find(|r| r.side == side && r.name == name)
    }

    /// 获取全部 ROI.
    #[inline]
    pub fn into_rois(self) -> Vec<Roi> {
        self.rois
    }

    /// 按 `filetype` 保存到 `path`.
    ///
    /// 层次化容器需要 `serde` feature, 否则返回 `UnsupportedOperation` 错误.
    pub fn to_file<P: AsRef<Path>>(&self, path: P, filetype: RoiFileType) -> MesoResult<()> {
        match filetype {
            #[cfg(feature = "serde")]
            RoiFileType::Container => self.save(path),
            #[cfg(not(feature = "serde"))]
            RoiFileType::Container => Err(MesoError::UnsupportedOperation(
                "the ROI container requires the `serde` feature".into(),
            )),
            RoiFileType::Npz => FlatRois::from(self).write_npz(path, MaskEncoding::Byte),
        }
    }
}

impl<'a> IntoIterator for &'a RoiSet {
    type Item = &'a Roi;
    type IntoIter = std::slice::Iter<'a, Roi>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.rois.iter()
    }
}
