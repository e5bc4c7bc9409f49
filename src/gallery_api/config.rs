//! 图库服务连接配置。

use super::ApiError;

/// 本地开发时图库服务的默认地址。
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryApiConfig {
    /// 服务根地址，例如 `http://localhost:8000`。
    pub base_url: String,
    /// 单次请求总超时（毫秒）。
    pub timeout_ms: u64,
    /// 下载原图允许的最大体积（字节）。
    pub max_download_bytes: u64,
}

impl Default for GalleryApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 10_000,
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

impl GalleryApiConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidInput(format!("base_url 无效：{}（{}）", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidInput(format!(
                "base_url 仅支持 http/https：{}",
                self.base_url
            )));
        }
        if !(100..=600_000).contains(&self.timeout_ms) {
            return Err(ApiError::InvalidInput(
                "timeout_ms 必须在 100~600000 毫秒之间".to_string(),
            ));
        }
        if self.max_download_bytes == 0 {
            return Err(ApiError::InvalidInput("max_download_bytes 不能为 0".to_string()));
        }
        Ok(())
    }
}
