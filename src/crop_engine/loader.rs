//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（内存字节 / Base64 / 本地文件）的原始字节加载，并在"尽可能早"的阶段执行输入校验。
//! 目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 内存字节：体积限制 + 签名校验。
//! - Base64：格式解析 + 解码前体积预估 + 解码后体积限制。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 所有来源最后都通过 `infer` 做文件签名（magic bytes）校验。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::source::{ImageSource, RawImageData};
use super::{CropConfig, CropError};

/// 按来源加载原始字节。
pub(crate) fn load_source(source: &ImageSource, config: &CropConfig) -> Result<RawImageData, CropError> {
    match source {
        ImageSource::Bytes { data, file_name } => load_from_bytes(data, file_name, config),
        ImageSource::Base64(data) => load_from_base64(data, config),
        ImageSource::FilePath(path) => load_from_file(path, config),
    }
}

fn load_from_bytes(data: &[u8], file_name: &str, config: &CropConfig) -> Result<RawImageData, CropError> {
    log::info!("📦 开始处理内存图片 - 文件名: {} 大小: {} bytes", file_name, data.len());

    ensure_within_file_limit(data.len() as u64, config.max_file_size, "内存图片")?;
    validate_image_signature(data)?;

    Ok(RawImageData {
        bytes: data.to_vec(),
        source_hint: "bytes",
    })
}

fn load_from_base64(data: &str, config: &CropConfig) -> Result<RawImageData, CropError> {
    log::info!("📝 开始处理 base64 图片");

    let bytes = parse_base64_with_limit(data, config.max_file_size)?;
    ensure_within_file_limit(bytes.len() as u64, config.max_file_size, "Base64 解码后")?;
    validate_image_signature(&bytes)?;

    Ok(RawImageData {
        bytes,
        source_hint: "base64",
    })
}

fn load_from_file(path: &Path, config: &CropConfig) -> Result<RawImageData, CropError> {
    log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

    if !path.exists() {
        return Err(CropError::FileSystem(format!("文件不存在：{}", path.display())));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| CropError::FileSystem(format!("无法读取文件信息：{}", e)))?;
    ensure_within_file_limit(metadata.len(), config.max_file_size, "文件")?;

    let bytes = std::fs::read(path)
        .map_err(|e| CropError::FileSystem(format!("无法读取图片文件：{}", e)))?;
    validate_image_signature(&bytes)?;

    Ok(RawImageData {
        bytes,
        source_hint: "file",
    })
}

fn ensure_within_file_limit(len: u64, max_file_size: u64, label: &str) -> Result<(), CropError> {
    if len > max_file_size {
        return Err(CropError::ResourceLimit(format!(
            "{}体积过大：{:.2} MB（限制：{:.2} MB）",
            label,
            len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }
    Ok(())
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, CropError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| CropError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| CropError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

/// 解析 Base64 输入（支持 Data URL / 纯 Base64），解码前按长度预估体积。
pub(crate) fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, CropError> {
    let normalized = data.trim();

    let payload = if normalized.starts_with("data:") {
        if !normalized.starts_with("data:image/") {
            return Err(CropError::InvalidFormat("Data URL 不是图片类型".to_string()));
        }
        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| CropError::InvalidFormat("缺少 base64 标记".to_string()))?;
        &normalized[base64_start + 8..]
    } else {
        normalized
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_file_size {
        return Err(CropError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CropError::Decode(format!("Base64 解码失败：{}", e)))
}

/// 通过文件签名（magic bytes）校验输入是否为图片。
///
/// 签名缺失或不是图片时按解码失败处理。
fn validate_image_signature(bytes: &[u8]) -> Result<(), CropError> {
    if bytes.is_empty() {
        return Err(CropError::Decode("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| CropError::Decode("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(CropError::Decode(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}
