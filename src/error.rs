//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，作为命令行入口与设置读写的返回类型，
//! 各子模块保留自己的错误类型（`CropError` / `ApiError`），在边界处通过 `From` 汇总。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `CropError`、`ApiError`、`std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于以 JSON 形式输出。

use serde::Serialize;

use crate::crop_engine::CropError;
use crate::gallery_api::ApiError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 裁剪流水线错误（加载 / 解码 / 提取 / 编码）
    #[error("{0}")]
    Crop(#[from] CropError),

    /// 图库服务调用错误
    #[error("{0}")]
    Api(#[from] ApiError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件读写或解析失败
    #[error("设置错误: {0}")]
    Settings(String),
}

impl AppError {
    /// 稳定错误码，便于脚本判断。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Crop(err) => err.code(),
            Self::Api(err) => err.code(),
            Self::Io(_) => "E_IO",
            Self::Settings(_) => "E_SETTINGS",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_module_errors_and_serializes_as_message() {
        let err: AppError = CropError::Busy.into();
        assert_eq!(err.code(), "E_BUSY");

        let json = serde_json::to_string(&err).expect("serialize");
        assert_eq!(json, format!("\"{}\"", CropError::Busy));

        let err: AppError = ApiError::InvalidInput("x".to_string()).into();
        assert_eq!(err.code(), "E_INVALID_INPUT");
    }
}
