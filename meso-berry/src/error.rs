//! 运行时错误.

use thiserror::Error;

/// 配准、投影与持久化过程中的错误.
#[derive(Error, Debug)]
pub enum MesoError {
    /// 点集形状不符 (长度不一致, 非二维, 点数不足或退化).
    #[error("data shape error: {0}")]
    DataShape(String),

    /// 不支持的操作, 如对分半球配准求逆.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// 找不到图谱资源或外部文件.
    #[error("not found: {0}")]
    NotFound(String),

    /// 持久化的表格或容器格式错误.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// 非法取值, 如未知半球标签或重名.
    #[error("validation error: {0}")]
    Validation(String),

    /// 底层 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 图像编解码错误.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// 写 npz 文件错误.
    #[error("npz write error: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// 读 npz 文件错误.
    #[error("npz read error: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),
}

impl MesoError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::DataShape(msg.into())
    }

    pub(crate) fn serial(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// 本 crate 通用的 `Result`.
pub type MesoResult<T> = Result<T, MesoError>;
