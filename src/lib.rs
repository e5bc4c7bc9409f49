//! # 图库裁剪工具：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │               命令行 (clap 子命令, main.rs)               │
//! │  crop · upload · search-text · search-image · list · fetch│
//! └───────┬──────────────────────────────────────┬───────────┘
//!         ↓ Result<T, AppError>                  ↓
//! ┌───────┴──────────────────────────────────────┴───────────┐
//! │                        库 (Rust)                          │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  ├─ settings ─── JSON 设置 + 环境变量覆盖                  │
//! │  │                                                       │
//! │  ├─ crop_engine  加载·解码·选区·提取·JPEG 编码            │
//! │  │   ├─ session     交互式裁剪状态机                      │
//! │  │   ├─ geometry    初始选区 / 宽高比 / 最小尺寸           │
//! │  │   └─ surface     可注入画布 (fast_image_resize)        │
//! │  │                                                       │
//! │  └─ gallery_api  上传 / 列表 / 文本检索 / 以图搜图 (reqwest)│
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，命令行入口的返回类型 |
//! | [`settings`] | 设置文件读写、默认值与环境变量覆盖 |
//! | [`crop_engine`] | 裁剪引擎：交互式会话与一次性裁剪共用一条流水线 |
//! | [`gallery_api`] | 图库检索服务 HTTP 客户端 |

pub mod error;
pub mod crop_engine;
pub mod gallery_api;
pub mod settings;
