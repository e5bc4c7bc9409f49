//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载裁剪链路（加载 → 解码 → 选区 → 提取 → 编码）中的所有错误来源。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! ## 实现思路
//!
//! - `kind()` 将错误归类为 `CropErrorKind`，供会话状态机记录失败原因。
//! - `code()` / `stage()` 输出稳定字符串，便于日志检索与上层展示。
//! - `RegionTooSmall` 属于交互修正路径，会话层不会将其上抛。

/// 裁剪链路统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("画布不可用：{0}")]
    RasterContextUnavailable(String),

    #[error("选区过小：{width:.1}x{height:.1}（最小：{min}）")]
    RegionTooSmall { width: f64, height: f64, min: u32 },

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("状态错误：{0}")]
    InvalidState(String),

    #[error("裁剪任务进行中，拒绝重复提交")]
    Busy,

    #[error("已取消：{0}")]
    Cancelled(String),
}

/// 错误分类，用于会话 `Failed` 状态携带失败原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropErrorKind {
    DecodeFailed,
    RasterContextUnavailable,
    RegionTooSmall,
    EncodeFailed,
    InvalidInput,
    ResourceLimit,
    InvalidState,
    Cancelled,
}

impl CropError {
    pub fn kind(&self) -> CropErrorKind {
        match self {
            Self::Decode(_) => CropErrorKind::DecodeFailed,
            Self::RasterContextUnavailable(_) => CropErrorKind::RasterContextUnavailable,
            Self::RegionTooSmall { .. } => CropErrorKind::RegionTooSmall,
            Self::Encode(_) => CropErrorKind::EncodeFailed,
            Self::InvalidFormat(_) | Self::FileSystem(_) => CropErrorKind::InvalidInput,
            Self::ResourceLimit(_) => CropErrorKind::ResourceLimit,
            Self::InvalidState(_) | Self::Busy => CropErrorKind::InvalidState,
            Self::Cancelled(_) => CropErrorKind::Cancelled,
        }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "E_DECODE",
            Self::RasterContextUnavailable(_) => "E_RASTER_CONTEXT",
            Self::RegionTooSmall { .. } => "E_REGION_TOO_SMALL",
            Self::Encode(_) => "E_ENCODE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::InvalidState(_) => "E_INVALID_STATE",
            Self::Busy => "E_BUSY",
            Self::Cancelled(_) => "E_CANCELLED",
        }
    }

    /// 是否可以在同一选区上重新执行提取。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RasterContextUnavailable(_) | Self::Encode(_))
    }
}
