//! 标志点模型.
//!
//! 标志点集合是不可变的值类型: 重排、筛选、变换都会产生新的集合.

mod pairing;
mod reference;

pub use pairing::{validate, Pairing};
pub use reference::{names_of, reference_landmarks, side_of, LandmarkId, Side};

use crate::affine::AffineTransform;
use crate::consts::mask::ON;
use crate::raster::draw_disk;
use crate::{MesoError, MesoResult, Point2d};
use itertools::Itertools;
use ndarray::{Array2, ArrayViewMut2};
use std::ops::Index;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 带置信度的具名二维点.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Landmark {
    /// 名字, 在所属集合内唯一.
    pub name: String,

    /// 水平坐标.
    pub x: f64,

    /// 垂直坐标.
    pub y: f64,

    /// 检测置信度. 通常位于 `[0, 1]`.
    pub p: f64,
}

impl Landmark {
    /// 构造标志点.
    #[inline]
    pub fn new(name: impl Into<String>, x: f64, y: f64, p: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            p,
        }
    }

    /// 坐标 `(x, y)`.
    #[inline]
    pub fn xy(&self) -> Point2d {
        (self.x, self.y)
    }

    /// 坐标是否有效 (均为有限值).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// 所在一侧. 非标准名字返回 `None`.
    #[inline]
    pub fn side(&self) -> Option<Side> {
        side_of(&self.name)
    }
}

/// 有序的标志点集合, 名字互不相同.
///
/// 顺序是有意义的: 两个集合之间按下标一一对应.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    items: Vec<Landmark>,
}

impl LandmarkSet {
    /// 构造集合. 若名字有重复, 返回 `Validation` 错误.
    pub fn new(items: Vec<Landmark>) -> MesoResult<Self> {
        if let Some(dup) = items.iter().map(|l| l.name.as_str()).duplicates().next() {
            return Err(MesoError::invalid(format!(
                "duplicate landmark name `{dup}`"
            )));
        }
        Ok(Self::from_trusted(items))
    }

    /// 调用方保证名字互不相同.
    #[inline]
    pub(crate) fn from_trusted(items: Vec<Landmark>) -> Self {
        Self { items }
    }

    /// 由一帧检测结果构造集合.
    ///
    /// `rows` 为按标准编号顺序 (`L1`, `L2`, ..., `R9`) 排列的 `(x, y, p)`.
    /// 长度不为 9 时返回 `DataShape` 错误.
    pub fn from_detection(rows: &[(f64, f64, f64)]) -> MesoResult<Self> {
        if rows.len() != LandmarkId::ALL.len() {
            return Err(MesoError::shape(format!(
                "a detection row must hold {} landmarks, got {}",
                LandmarkId::ALL.len(),
                rows.len()
            )));
        }
        Ok(Self::from_trusted(
            LandmarkId::ALL
                .iter()
                .zip(rows)
                .map(|(id, &(x, y, p))| Landmark::new(id.name(), x, y, p))
                .collect(),
        ))
    }

    /// 标志点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 按顺序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.items.iter()
    }

    /// 按名字获取标志点, 不存在时返回 `None`.
    pub fn get(&self, name: &str) -> Option<&Landmark> {
        self.items.iter().find(|l| l.name == name)
    }

    /// 是否含有名为 `name` 的标志点.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 按顺序迭代名字.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.items.iter().map(|l| l.name.as_str())
    }

    /// 坐标, 形状为 `(N, 2)`.
    pub fn xy(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.len(), 2), |(i, j)| {
            let l = &self.items[i];
            if j == 0 {
                l.x
            } else {
                l.y
            }
        })
    }

    /// 按 `keys` 的顺序重排. 不存在的名字被忽略, 重复的名字只保留首次出现.
    pub fn ordered<'a, I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_trusted(
            keys.into_iter()
                .unique()
                .filter_map(|k| self.get(k).cloned())
                .collect(),
        )
    }

    /// 左半球与中线上的标志点.
    pub fn left(&self) -> Self {
        self.ordered(names_of(Side::Left).chain(names_of(Side::Middle)))
    }

    /// 中线与右半球上的标志点.
    pub fn right(&self) -> Self {
        self.ordered(names_of(Side::Middle).chain(names_of(Side::Right)))
    }

    /// 中线上的标志点.
    pub fn middle(&self) -> Self {
        self.ordered(names_of(Side::Middle))
    }

    /// 去掉中线标志点, 其余保持原顺序.
    pub fn without_middle(&self) -> Self {
        Self::from_trusted(
            self.items
                .iter()
                .filter(|l| l.side() != Some(Side::Middle))
                .cloned()
                .collect(),
        )
    }

    /// 按 `warp` 变换所有坐标. 名字与置信度不变.
    pub fn affine_warp(&self, warp: &AffineTransform) -> Self {
        Self::from_trusted(
            self.items
                .iter()
                .map(|l| {
                    let (x, y) = warp.apply(l.xy());
                    Landmark { x, y, ..l.clone() }
                })
                .collect(),
        )
    }

    /// 依次拼接若干集合. 名字重复时返回 `Validation` 错误.
    pub fn concat<'a, I>(parts: I) -> MesoResult<Self>
    where
        I: IntoIterator<Item = &'a LandmarkSet>,
    {
        Self::new(
            parts
                .into_iter()
                .flat_map(|s| s.items.iter().cloned())
                .collect(),
        )
    }

    /// 在 8-bit 栅格上以白色实心圆标出所有有效的标志点, `marker_size` 为直径.
    pub fn draw(&self, mut image: ArrayViewMut2<u8>, marker_size: u32) {
        let radius = marker_size as f64 / 2.0;
        for l in self.items.iter().filter(|l| l.is_valid()) {
            draw_disk(image.view_mut(), l.xy(), radius, ON);
        }
    }
}

impl Index<usize> for LandmarkSet {
    type Output = Landmark;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a> IntoIterator for &'a LandmarkSet {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
