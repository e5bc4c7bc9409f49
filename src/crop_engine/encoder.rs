//! # 文件编码模块
//!
//! ## 设计思路
//!
//! 把提取出的画布导出为 JPEG 字节，并包装成带文件名、MIME 类型、修改时间的文件产物。
//! 本模块不做磁盘或网络 I/O，产物交给上传方自行处理。

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::config::validate_quality;
use super::extractor::ExtractedRaster;
use super::CropError;

/// 产物固定的 MIME 类型。
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// 编码后的文件产物。
#[derive(Debug, Clone)]
pub struct FileArtifact {
    pub name: String,
    pub mime_type: &'static str,
    pub bytes: Bytes,
    /// 编码使用的质量因子，`None` 表示编码器默认值。
    pub quality: Option<f32>,
    pub last_modified: DateTime<Utc>,
}

impl FileArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 将画布编码为 JPEG 文件产物。
pub fn encode(
    raster: &ExtractedRaster,
    file_name: &str,
    quality: Option<f32>,
) -> Result<FileArtifact, CropError> {
    if let Some(q) = quality {
        validate_quality(q)?;
    }

    let size = raster.dimensions();
    if size.is_empty() {
        return Err(CropError::Encode(format!(
            "画布尺寸无效：{}x{}",
            size.width, size.height
        )));
    }

    let bytes = raster.surface().encode_jpeg(quality)?;
    if bytes.is_empty() {
        return Err(CropError::Encode("画布为空，未产生任何字节".to_string()));
    }

    log::debug!(
        "🗜️ JPEG 编码完成 - {} {}x{} quality={:?} {} bytes",
        file_name,
        size.width,
        size.height,
        quality,
        bytes.len()
    );

    Ok(FileArtifact {
        name: file_name.to_string(),
        mime_type: JPEG_MIME_TYPE,
        bytes: Bytes::from(bytes),
        quality,
        last_modified: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop_engine::extractor::extract;
    use crate::crop_engine::geometry::CropRegion;
    use crate::crop_engine::source::SourceImage;
    use crate::crop_engine::surface::MemorySurfaceFactory;
    use image::imageops::FilterType;
    use image::{Rgba, RgbaImage};

    fn gradient_raster() -> ExtractedRaster {
        let pixels = RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255]));
        let image = SourceImage::from_rgba(pixels).expect("valid image");
        extract(
            &image,
            &CropRegion::pixels(8.0, 8.0, 32.0, 32.0),
            &MemorySurfaceFactory::new(u64::MAX),
            FilterType::Triangle,
        )
        .expect("extract should succeed")
    }

    #[test]
    fn artifact_carries_name_type_and_timestamp() {
        let raster = gradient_raster();
        let before = Utc::now();

        let artifact = encode(&raster, "photo.png", Some(0.95)).expect("encode should succeed");

        assert_eq!(artifact.name, "photo.png");
        assert_eq!(artifact.mime_type, "image/jpeg");
        assert_eq!(artifact.quality, Some(0.95));
        assert!(!artifact.is_empty());
        assert!(artifact.last_modified >= before);
        assert_eq!(&artifact.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn encoding_is_deterministic_for_same_raster() {
        let raster = gradient_raster();

        let first = encode(&raster, "a.jpg", Some(0.8)).expect("encode should succeed");
        let second = encode(&raster, "a.jpg", Some(0.8)).expect("encode should succeed");

        assert_eq!(first.len(), second.len());
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn encoder_default_quality_is_supported() {
        let raster = gradient_raster();
        let artifact = encode(&raster, "a.jpg", None).expect("encode should succeed");
        assert!(artifact.quality.is_none());
        assert!(!artifact.is_empty());
    }

    #[test]
    fn rejects_quality_out_of_range() {
        let raster = gradient_raster();
        assert!(matches!(encode(&raster, "a.jpg", Some(0.0)), Err(CropError::InvalidFormat(_))));
        assert!(matches!(encode(&raster, "a.jpg", Some(1.2)), Err(CropError::InvalidFormat(_))));
    }
}
