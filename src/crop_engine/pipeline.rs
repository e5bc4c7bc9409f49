//! # 解码流水线模块
//!
//! ## 设计思路
//!
//! 将"字节 → 图像 → RGBA 源图"的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限与内存上限快速拒绝
//! 3. 完整解码，并按 EXIF 方向摆正（与浏览器显示 `naturalWidth/naturalHeight` 一致）
//! 4. 转换 RGBA，构造 `SourceImage`

use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

use super::source::{RawImageData, SourceImage};
use super::{CropConfig, CropError};

/// 将原始字节解码为源图。
pub(crate) fn decode_source(raw: RawImageData, config: &CropConfig) -> Result<SourceImage, CropError> {
    let (header_width, header_height) = inspect_dimensions_from_memory(&raw.bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;
    validate_decoded_memory_limits(config, header_width, header_height)?;

    let decoded = decode_with_orientation(&raw.bytes)?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    validate_pixel_limits(config, width, height)?;

    log::info!(
        "✅ 图片解码成功 - 来源: {} header 尺寸: {}x{} 摆正后尺寸: {}x{}",
        raw.source_hint,
        header_width,
        header_height,
        width,
        height
    );

    SourceImage::from_rgba(rgba)
}

/// 仅通过内存中的图片头信息读取宽高。
///
/// 用于在完整解码前做像素限制检查。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), CropError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CropError::Decode(format!("无法识别图片格式：{}", e)))?;

    if reader.format().is_none() {
        return Err(CropError::Decode("不支持的图片格式".to_string()));
    }

    reader
        .into_dimensions()
        .map_err(|e| CropError::Decode(format!("无法读取图片尺寸：{}", e)))
}

fn decode_with_orientation(bytes: &[u8]) -> Result<DynamicImage, CropError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CropError::Decode(format!("无法识别图片格式：{}", e)))?;

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| CropError::Decode(format!("无法创建解码器：{}", e)))?;

    let orientation = match decoder.orientation() {
        Ok(orientation) => Some(orientation),
        Err(err) => {
            log::debug!("读取 EXIF 方向失败，按原方向处理：{}", err);
            None
        }
    };

    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| CropError::Decode(format!("图片解码失败：{}", e)))?;

    if let Some(orientation) = orientation {
        image.apply_orientation(orientation);
    }

    Ok(image)
}

/// 校验像素数量是否超过配置上限。
fn validate_pixel_limits(config: &CropConfig, width: u32, height: u32) -> Result<(), CropError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| CropError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels == 0 {
        return Err(CropError::Decode(format!("图片尺寸无效：{}x{}", width, height)));
    }

    if pixels > config.max_decoded_pixels {
        return Err(CropError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn validate_decoded_memory_limits(config: &CropConfig, width: u32, height: u32) -> Result<(), CropError> {
    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| CropError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(CropError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}
