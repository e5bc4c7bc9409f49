//! # 图片裁剪引擎（crop_engine）
//!
//! ## 设计思路
//!
//! 该模块将"来源加载 → 解码 → 选区几何 → 像素提取 → JPEG 编码"按职责拆分，
//! 交互式裁剪对话框与一次性裁剪工具共用同一条流水线，差异只体现在 `CropProfile`。
//!
//! - `handler`：引擎入口，持有配置并编排流水线
//! - `session`：交互式裁剪的状态机
//! - `geometry`：选区数学（初始选区、宽高比、边界、最小尺寸）
//! - `loader` / `pipeline`：来源加载与解码（含资源上限）
//! - `surface`：画布抽象（可注入、可失败）
//! - `extractor` / `encoder`：像素提取与文件产物封装
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! CropEngine（配置快照）
//!    ├─ start_session → CropSession
//!    │     load ─▶ loader.rs + pipeline.rs（spawn_blocking）
//!    │     update_region / complete_region ─▶ geometry.rs
//!    │     confirm ─▶ ExtractionJob
//!    │                  ├─ extractor.rs（SurfaceFactory → RasterSurface::draw_image）
//!    │                  └─ encoder.rs（RasterSurface::encode_jpeg → FileArtifact）
//!    └─ crop_image（一次性裁剪，显示尺寸 = 原始尺寸）
//! ```
//!
//! ## 分层职责建议
//!
//! - 默认参数与档位变更优先改 `config.rs`
//! - 选区行为（居中、收缩、最小值）优先改 `geometry.rs`
//! - 状态流转与重试策略优先改 `session.rs`
//! - 渲染后端替换只需实现 `SurfaceFactory` / `RasterSurface`

mod config;
mod encoder;
mod error;
mod extractor;
mod geometry;
mod handler;
mod loader;
mod pipeline;
mod session;
mod source;
mod surface;

pub use config::{CropConfig, CropProfile};
pub use encoder::{FileArtifact, JPEG_MIME_TYPE, encode};
pub use error::{CropError, CropErrorKind};
pub use extractor::{ExtractedRaster, extract, source_rect_for};
pub use geometry::{
    CropRegion, CropUnit, Dimensions, center_crop, compute_initial_crop, compute_initial_crop_with_percent,
    contain_crop, ensure_min_size, fit_contain, make_aspect_crop,
};
pub use handler::CropEngine;
pub use session::{CropSession, CropState, DEFAULT_FILE_NAME, ExtractionJob, RegionOutcome};
pub use source::{ImageSource, SourceImage};
pub use surface::{DestRect, MemorySurface, MemorySurfaceFactory, RasterSurface, SourceRect, SurfaceFactory};
