//! 图库服务调用错误。

/// 图库 HTTP 客户端错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("请求超时：{0}")]
    Timeout(String),

    #[error("服务端返回 HTTP {status}：{message}")]
    Status { status: u16, message: String },

    #[error("响应解析失败：{0}")]
    Decode(String),

    #[error("参数错误：{0}")]
    InvalidInput(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Status { .. } => "E_HTTP_STATUS",
            Self::Decode(_) => "E_DECODE_RESPONSE",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_code_and_status() {
        let client = ApiError::Status { status: 422, message: "bad".to_string() };

        assert_eq!(client.code(), "E_HTTP_STATUS");
        assert!(client.to_string().contains("422"));
    }
}
