//! 9 个标准标志点及其左 / 中 / 右划分.

use super::{Landmark, LandmarkSet};
use crate::{MesoError, MesoResult};
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 标志点所在的一侧. `Middle` 表示位于中线上.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    /// 左半球.
    Left,

    /// 中线.
    Middle,

    /// 右半球.
    Right,
}

/// 标准标志点编号.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum LandmarkId {
    /// 左.
    L1,
    /// 左上, 左侧嗅球根部的左缘.
    L2,
    /// 左下.
    L3,
    /// 上中, 两侧嗅球根部的中线.
    M4,
    /// 前囟 (bregma).
    M5,
    /// 人字缝尖 (lambda).
    M6,
    /// 右, 与 `L1` 对称.
    R7,
    /// 右上, 右侧嗅球根部的右缘.
    R8,
    /// 右下, 与 `L3` 对称.
    R9,
}

impl LandmarkId {
    /// 按标准顺序排列的全部编号.
    pub const ALL: [LandmarkId; 9] = [
        Self::L1,
        Self::L2,
        Self::L3,
        Self::M4,
        Self::M5,
        Self::M6,
        Self::R7,
        Self::R8,
        Self::R9,
    ];

    /// 编号字符串, 如 `"L1"`.
    pub const fn id(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::M4 => "M4",
            Self::M5 => "M5",
            Self::M6 => "M6",
            Self::R7 => "R7",
            Self::R8 => "R8",
            Self::R9 => "R9",
        }
    }

    /// 标志点名字. [`LandmarkSet`] 中以该名字作为键.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::L1 => "left",
            Self::L2 => "top left",
            Self::L3 => "bottom left",
            Self::M4 => "top center",
            Self::M5 => "bregma",
            Self::M6 => "lambda",
            Self::R7 => "right",
            Self::R8 => "top right",
            Self::R9 => "bottom right",
        }
    }

    /// 在 512x512 标准帧中的坐标 `(x, y)`.
    pub const fn coords_512(&self) -> (f64, f64) {
        match self {
            Self::L1 => (102.0, 148.0),
            Self::L2 => (166.0, 88.0),
            Self::L3 => (214.0, 454.0),
            Self::M4 => (256.0, 88.0),
            Self::M5 => (256.0, 256.0),
            Self::M6 => (256.0, 428.0),
            Self::R7 => (410.0, 148.0),
            Self::R8 => (346.0, 88.0),
            Self::R9 => (298.0, 454.0),
        }
    }

    /// 所在一侧.
    pub const fn side(&self) -> Side {
        match self {
            Self::L1 | Self::L2 | Self::L3 => Side::Left,
            Self::M4 | Self::M5 | Self::M6 => Side::Middle,
            Self::R7 | Self::R8 | Self::R9 => Side::Right,
        }
    }

    /// 由标志点名字反查编号.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }
}

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// 编号解析不区分大小写 (检测结果表格中使用 `l1`, `m5` 等小写形式).
impl FromStr for LandmarkId {
    type Err = MesoError;

    fn from_str(s: &str) -> MesoResult<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MesoError::invalid(format!("unknown landmark id `{s}`")))
    }
}

/// 查询名字为 `name` 的标志点所在一侧. 非标准名字返回 `None`.
#[inline]
pub fn side_of(name: &str) -> Option<Side> {
    LandmarkId::from_name(name).map(|i| i.side())
}

/// 某一侧全部标志点的名字, 按标准顺序.
pub fn names_of(side: Side) -> impl Iterator<Item = &'static str> {
    LandmarkId::ALL
        .into_iter()
        .filter(move |i| i.side() == side)
        .map(|i| i.name())
}

static REFERENCE: Lazy<LandmarkSet> = Lazy::new(|| {
    LandmarkSet::from_trusted(
        LandmarkId::ALL
            .into_iter()
            .map(|i| {
                let (x, y) = i.coords_512();
                Landmark::new(i.name(), x, y, 1.0)
            })
            .collect(),
    )
});

/// 参考图谱上的 9 个标志点 (置信度均为 1.0).
pub fn reference_landmarks() -> &'static LandmarkSet {
    &REFERENCE
}
