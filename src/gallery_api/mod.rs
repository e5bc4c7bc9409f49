//! # 图库服务客户端（gallery_api）
//!
//! 裁剪产物的去向：上传入库、以图搜图，以及列表/文本检索/原图下载。
//!
//! - `client`：请求组装与响应映射
//! - `config`：服务地址与超时
//! - `types`：响应数据模型
//! - `error`：`ApiError`

mod client;
mod config;
mod error;
mod types;

pub use client::GalleryClient;
pub use config::{DEFAULT_BASE_URL, GalleryApiConfig};
pub use error::ApiError;
pub use types::{SearchResult, UploadedImage};
