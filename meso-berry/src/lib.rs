#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 以稀疏标志点为依据, 将标准参考坐标系 (固定的小鼠背侧皮层图谱)
//! 配准到每一帧图像上, 并把参考 ROI 掩膜投影到各帧的坐标空间中.
//!
//! 该 crate 只负责几何配准与 ROI 投影这一核心部分. 标志点检测模型、视频读写、
//! 命令行参数解析等均被视为外部协作者.
//!
//! # 注意
//!
//! 1. 所有坐标均为 `(x, y)` 形式, 即 `x` 为水平方向 (图像宽), `y` 为垂直方向 (图像高).
//!   而所有栅格尺寸均沿用 ndarray 的 `(h, w)` 形式. 两者之间的转换在 `raster` 模块内完成.
//! 2. 仿射变换默认表示 "参考图谱 -> 实际帧" 方向.
//!
//! # 开发计划
//!
//! ### 仿射变换代数 ✅
//!
//! 最小二乘估计、复合、求逆、作用于点集与栅格.
//!
//! 实现位于 `meso-berry/src/affine`.
//!
//! ### 标志点模型与置信度筛选 ✅
//!
//! 9 个标准标志点 (左 3 / 中线 3 / 右 3), 按置信度严格大于阈值筛选对应点.
//!
//! 实现位于 `meso-berry/src/landmark`.
//!
//! ### 半球配准 ✅
//!
//! 两侧非中线有效点均多于 2 个时, 分别估计左右半球变换; 否则退化为全局单一变换.
//! 中线点在两侧变换下的结果取平均.
//!
//! 实现位于 `meso-berry/src/align`.
//!
//! ### 栅格重采样 ✅
//!
//! 双线性仿射扭曲, 以及三次卷积 / 面积平均两种缩放.
//!
//! 实现位于 `meso-berry/src/raster`.
//!
//! ### ROI 投影与持久化 ✅
//!
//! 1. 图谱资源由 `AtlasProvider` 显式注入, 只加载一次. ✅
//! 2. 批量投影时逐帧隔离错误. ✅
//! 3. 层次化容器格式 (带版本号) 与 npz 扁平导出. ✅
//!
//! 实现位于 `meso-berry/src/roi`.
//!
//! ### 表格持久化 ✅
//!
//! 1. 配准表格: 每帧一行, 12 个矩阵分量加 `is_separate` 标志, 可精确往返. ✅
//! 2. 标志点检测 / 重标注表格. ✅
//! 3. 每帧元数据表格, 以及 ROI 输出文件命名. ✅
//!
//! 实现位于 `meso-berry/src/table`.
//!
//! ### 命令行入口
//!
//! 暂不计划. 视频解码与标志点检测模型不在本 crate 内.

/// 二维索引 / 尺寸, 以 `(h, w)` 表示.
pub type Idx2d = (usize, usize);

/// 二维实数坐标, 以 `(x, y)` 表示.
pub type Point2d = (f64, f64);

pub mod consts;

mod error;

pub use error::{MesoError, MesoResult};

pub mod affine;

pub mod raster;

pub mod landmark;

pub mod align;

pub mod roi;

pub mod table;

pub mod prelude;
