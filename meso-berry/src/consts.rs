//! 通用常量.

use crate::Idx2d;

/// 流水线中的标准帧尺寸 `(h, w)`. 参考图谱与标志点坐标都定义在该尺寸下.
pub const CANONICAL_FRAME: Idx2d = (512, 512);

/// 标准帧的边长. 投影时用于选择缩放插值方式.
pub const CANONICAL_EDGE: usize = 512;

/// 默认的标志点置信度阈值. 只有 **严格大于** 该值的检测结果会被采用.
pub const LIKELIHOOD_THRESHOLD: f64 = 0.9999;

/// 参考图谱 ROI 集合的图像名.
pub const REFERENCE_NAME: &str = "__reference__";

/// 参考图谱 ROI 集合的帧索引与总帧数.
pub const REFERENCE_FRAME: i64 = -1;

/// 合并后轮廓 ROI 的名字.
pub const OUTLINE_NAME: &str = "outline";

/// 轮廓 ROI 的描述.
pub const OUTLINE_DESCRIPTION: &str = "the expected outline of the brain for this ROI set";

/// 在标志点叠加图上画点时的默认直径 (像素).
pub const MARKER_SIZE: u32 = 16;

/// 掩膜像素值.
pub mod mask {
    /// 掩膜背景.
    pub const OFF: u8 = 0;

    /// 掩膜前景 (内部统一编码).
    pub const ON: u8 = 255;

    /// 另一种外部编码下的前景.
    pub const ON_UNIT: u8 = 1;
}

/// 约定的文件名.
pub mod files {
    /// 参考图谱 ROI 容器文件.
    pub const ATLAS_MASK_FILE: &str = "reference_masks.roi";

    /// 左半球轮廓图.
    pub const LEFT_OUTLINE_FILE: &str = "atlas_outline_left.png";

    /// 右半球轮廓图.
    pub const RIGHT_OUTLINE_FILE: &str = "atlas_outline_right.png";

    /// 配准表格.
    pub const ALIGNMENT_TABLE_NAME: &str = "reference_to_images_transform.csv";

    /// 每帧元数据表格.
    pub const METADATA_TABLE_NAME: &str = "metadata.csv";

    /// ROI 容器文件后缀.
    pub const ROI_SUFFIX: &str = ".roi";

    /// ROI 扁平导出文件后缀.
    pub const NPZ_SUFFIX: &str = ".npz";
}
