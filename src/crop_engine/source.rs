//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将"外部输入类型"和"流水线中间结果"解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `SourceImage` 表示已解码、可供裁剪的位图

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;

use super::geometry::Dimensions;
use super::CropError;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 内存字节（例如上传控件读到的文件内容）。
    Bytes { data: Vec<u8>, file_name: String },
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(PathBuf),
}

impl ImageSource {
    /// 来源自带的文件名，用作输出文件名。
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Bytes { file_name, .. } => Some(file_name.clone()),
            Self::Base64(_) => None,
            Self::FilePath(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
#[derive(Debug)]
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 已解码的源图。
///
/// 像素数据只读共享；显示尺寸随布局变化时通过 [`SourceImage::with_displayed`] 派生新值。
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: Arc<RgbaImage>,
    displayed: Dimensions,
}

impl SourceImage {
    /// 以 RGBA 位图构造，显示尺寸默认等于原始尺寸。
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, CropError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(CropError::Decode(format!("解码结果尺寸无效：{}x{}", width, height)));
        }

        Ok(Self {
            pixels: Arc::new(pixels),
            displayed: Dimensions::new(width, height),
        })
    }

    /// 派生一个显示尺寸不同的源图，像素共享。
    pub fn with_displayed(&self, displayed: Dimensions) -> Result<Self, CropError> {
        if displayed.is_empty() {
            return Err(CropError::InvalidFormat(format!(
                "显示尺寸必须大于 0：{}x{}",
                displayed.width, displayed.height
            )));
        }

        Ok(Self {
            pixels: Arc::clone(&self.pixels),
            displayed,
        })
    }

    pub fn natural(&self) -> Dimensions {
        let (width, height) = self.pixels.dimensions();
        Dimensions::new(width, height)
    }

    pub fn displayed(&self) -> Dimensions {
        self.displayed
    }

    /// `(natural.width / displayed.width, natural.height / displayed.height)`
    pub fn scale_factors(&self) -> (f64, f64) {
        let natural = self.natural();
        (
            natural.width as f64 / self.displayed.width as f64,
            natural.height as f64 / self.displayed.height as f64,
        )
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
