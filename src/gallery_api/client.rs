//! # 图库 HTTP 客户端
//!
//! ## 设计思路
//!
//! 客户端只做"请求组装 + 状态码/响应体映射"，不关心裁剪细节：
//! 上传与以图搜图都直接接收 `FileArtifact`，字节原样作为 multipart 的 `file` 字段发送。
//!
//! ## 实现思路
//!
//! - `reqwest::Client` 在构造时创建一次并复用。
//! - 非 2xx 统一映射为 `ApiError::Status`，优先取服务端 JSON 的 `detail` 字段作为文案。
//! - 原图下载按块读取并做体积上限检查。

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;

use super::types::ErrorBody;
use super::{ApiError, GalleryApiConfig, SearchResult, UploadedImage};
use crate::crop_engine::FileArtifact;

/// 图库服务客户端。
pub struct GalleryClient {
    config: GalleryApiConfig,
    base_url: String,
    http: reqwest::Client,
}

impl GalleryClient {
    pub fn new(config: GalleryApiConfig) -> Result<Self, ApiError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ApiError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
            http,
        })
    }

    /// 上传裁剪结果。
    pub async fn upload_image(&self, artifact: &FileArtifact) -> Result<UploadedImage, ApiError> {
        let url = self.endpoint("/images")?;
        let form = Self::file_form(artifact)?;
        let start = Instant::now();

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;
        let uploaded: UploadedImage = Self::read_json(response).await?;

        log::info!(
            "⬆️ 上传完成 - id={} {} {} bytes {}ms",
            uploaded.id,
            uploaded.original_filename,
            uploaded.size_bytes,
            start.elapsed().as_millis()
        );
        Ok(uploaded)
    }

    /// 列出全部图片。
    pub async fn list_images(&self) -> Result<Vec<SearchResult>, ApiError> {
        let url = self.endpoint("/search/all")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;
        Self::read_json(response).await
    }

    /// 文本检索。空白提示词在本地直接拒绝。
    pub async fn search_by_text(&self, prompt: &str) -> Result<Vec<SearchResult>, ApiError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ApiError::InvalidInput("检索提示词不能为空".to_string()));
        }

        let url = reqwest::Url::parse_with_params(&format!("{}/search/text", self.base_url), &[("prompt", prompt)])
            .map_err(|e| ApiError::InvalidInput(format!("无法构造请求地址：{}", e)))?;

        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;
        let results: Vec<SearchResult> = Self::read_json(response).await?;
        log::debug!("🔎 文本检索 \"{}\" 命中 {} 条", prompt, results.len());
        Ok(results)
    }

    /// 以图搜图。
    pub async fn search_by_image(&self, artifact: &FileArtifact) -> Result<Vec<SearchResult>, ApiError> {
        let url = self.endpoint("/search/image")?;
        let form = Self::file_form(artifact)?;

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;
        let results: Vec<SearchResult> = Self::read_json(response).await?;
        log::debug!("🔎 以图搜图 {} 命中 {} 条", artifact.name, results.len());
        Ok(results)
    }

    /// 下载原图字节。
    pub async fn fetch_raw(&self, id: i64) -> Result<Bytes, ApiError> {
        let url = self.endpoint(&format!("/images/{}/raw", id))?;
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let limit = self.config.max_download_bytes;
        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(ApiError::InvalidInput(format!(
                    "原图过大：{} bytes（限制：{} bytes）",
                    len, limit
                )));
            }
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_reqwest_error(e))? {
            if buffer.len() as u64 + chunk.len() as u64 > limit {
                return Err(ApiError::InvalidInput(format!("原图超过体积限制：{} bytes", limit)));
            }
            buffer.extend_from_slice(&chunk);
        }

        log::debug!("✅ 原图下载完成 - id={} {} bytes", id, buffer.len());
        Ok(buffer.freeze())
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        reqwest::Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ApiError::InvalidInput(format!("无法构造请求地址：{}", e)))
    }

    fn file_form(artifact: &FileArtifact) -> Result<reqwest::multipart::Form, ApiError> {
        if artifact.is_empty() {
            return Err(ApiError::InvalidInput("文件内容为空".to_string()));
        }

        let part = reqwest::multipart::Part::bytes(artifact.bytes.to_vec())
            .file_name(artifact.name.clone())
            .mime_str(artifact.mime_type)
            .map_err(|e| ApiError::InvalidInput(format!("无效的 MIME 类型：{}", e)))?;

        Ok(reqwest::multipart::Form::new().part("file", part))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("读取响应失败：{}", e)))?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn status_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody { detail: serde_json::Value::String(detail) }) => detail,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => Self::status_message(status).to_string(),
        };

        log::warn!("⚠️ 图库服务返回 HTTP {}：{}", status, message);
        ApiError::Status { status, message }
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            403 => "访问被拒绝",
            413 => "文件过大",
            422 => "参数校验失败",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(format!("请求超时（{}ms）", self.config.timeout_ms))
        } else if e.is_connect() {
            ApiError::Network(format!("无法连接：{}", e))
        } else {
            ApiError::Network(format!("请求失败：{}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// 读取一个完整请求（请求头 + Content-Length 指定的请求体）。
    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).expect("read request failed");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(pos) = find_header_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// 单次应答的测试服务器，返回服务地址与收到的请求。
    fn serve_once(status_line: &'static str, body: Vec<u8>) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept failed");
            let request = read_request(&mut stream);

            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            // 客户端可能提前断开（例如体积超限），写失败不影响断言
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
            request
        });

        (format!("http://127.0.0.1:{}", addr.port()), server)
    }

    fn client(base_url: String) -> GalleryClient {
        GalleryClient::new(GalleryApiConfig {
            base_url,
            timeout_ms: 2_000,
            ..GalleryApiConfig::default()
        })
        .expect("client init failed")
    }

    fn artifact() -> FileArtifact {
        FileArtifact {
            name: "cat.jpg".to_string(),
            mime_type: "image/jpeg",
            bytes: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9]),
            quality: Some(0.95),
            last_modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_field() {
        let body = br#"{"id":5,"sha256":"ff","original_filename":"cat.jpg","mime_type":"image/jpeg","ext":"jpg","size_bytes":8,"width":null,"height":null,"stored_path":"s/ff.jpg","created_at":"2024-05-01T08:30:15"}"#;
        let (base, server) = serve_once("200 OK", body.to_vec());

        let uploaded = client(base).upload_image(&artifact()).await.expect("upload should succeed");
        let request = server.join().expect("server thread failed");

        assert_eq!(uploaded.id, 5);
        assert_eq!(uploaded.original_filename, "cat.jpg");
        assert!(request.starts_with("POST /images "));
        assert!(request.contains("multipart/form-data"));
        assert!(request.contains("name=\"file\""));
        assert!(request.contains("filename=\"cat.jpg\""));
        assert!(request.contains("image/jpeg"));
    }

    #[tokio::test]
    async fn text_search_encodes_prompt_as_query() {
        let body = br#"[{"id":1,"score":0.5,"filename":"a.jpg","mime_type":"image/jpeg","url":"/images/1/raw","stored_path":"a"}]"#;
        let (base, server) = serve_once("200 OK", body.to_vec());

        let results = client(base)
            .search_by_text("  black cat  ")
            .await
            .expect("search should succeed");
        let request = server.join().expect("server thread failed");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, Some(0.5));
        assert!(request.starts_with("POST /search/text?prompt=black+cat "));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_locally() {
        let client = client("http://127.0.0.1:9".to_string());
        assert!(matches!(client.search_by_text("   ").await, Err(ApiError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn non_success_status_uses_detail_message() {
        let (base, server) = serve_once("422 Unprocessable Entity", br#"{"detail":"Invalid image"}"#.to_vec());

        let result = client(base).search_by_image(&artifact()).await;
        let request = server.join().expect("server thread failed");

        assert!(request.starts_with("POST /search/image "));
        match result {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "Invalid image");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_images_maps_malformed_body_to_decode_error() {
        let (base, server) = serve_once("200 OK", b"not json".to_vec());

        let result = client(base).list_images().await;
        let request = server.join().expect("server thread failed");

        assert!(request.starts_with("GET /search/all "));
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[tokio::test]
    async fn fetch_raw_returns_body_bytes() {
        let (base, server) = serve_once("200 OK", vec![1, 2, 3, 4]);

        let bytes = client(base).fetch_raw(42).await.expect("fetch should succeed");
        let request = server.join().expect("server thread failed");

        assert!(request.starts_with("GET /images/42/raw "));
        assert_eq!(&bytes[..], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn fetch_raw_enforces_size_limit() {
        let (base, server) = serve_once("200 OK", vec![0u8; 64]);

        let client = GalleryClient::new(GalleryApiConfig {
            base_url: base,
            timeout_ms: 2_000,
            max_download_bytes: 16,
        })
        .expect("client init failed");

        let result = client.fetch_raw(1).await;
        server.join().expect("server thread failed");
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind failed");
        let port = listener.local_addr().expect("read local addr failed").port();
        drop(listener);

        let result = client(format!("http://127.0.0.1:{}", port)).list_images().await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[tokio::test]
    async fn slow_server_maps_to_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept failed");
            let _ = read_request(&mut stream);
            thread::sleep(Duration::from_millis(800));
        });

        let client = GalleryClient::new(GalleryApiConfig {
            base_url: format!("http://127.0.0.1:{}", addr.port()),
            timeout_ms: 200,
            ..GalleryApiConfig::default()
        })
        .expect("client init failed");

        let result = client.list_images().await;
        server.join().expect("server thread failed");
        assert!(matches!(result, Err(ApiError::Timeout(_))));
    }
}
