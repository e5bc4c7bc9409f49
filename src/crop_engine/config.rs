//! # 配置模块
//!
//! ## 设计思路
//!
//! 将裁剪链路的所有"可调策略"集中到 `CropConfig`：宽高比锁定、最小选区、编码质量、
//! 重采样滤镜与各类资源上限。交互式裁剪与一次性裁剪工具原本是两套实现，
//! 这里统一为同一引擎，差异仅体现为 `CropProfile` 档位。
//!
//! ## 实现思路
//!
//! - `Default` 等价于交互式档位（1:1、最小 150、质量 0.95）。
//! - `CropProfile` 负责档位字符串解析与反向输出。
//! - `apply_profile` 将档位转换为具体参数，`infer_profile` 从参数反推档位。
//! - `validate` 在配置写入前统一校验取值范围。

use image::imageops::FilterType;

use super::CropError;
use super::geometry::Dimensions;

/// 裁剪引擎配置。
#[derive(Debug, Clone)]
pub struct CropConfig {
    /// 宽高比锁定（`width / height`），`None` 表示自由比例。
    pub aspect: Option<f64>,
    /// 初始选区宽度占图片宽度的百分比。
    pub initial_crop_percent: f64,
    /// 完成选区时宽高的最小像素值（显示坐标系）。
    pub min_dimension: Option<u32>,
    /// JPEG 编码质量，取值 `(0, 1]`；`None` 使用编码器默认值。
    pub quality: Option<f32>,
    /// 重采样滤镜。
    pub resample_filter: FilterType,
    /// 预览区域尺寸，图片按 contain 方式放入；`None` 表示按原始尺寸显示。
    pub display_bounds: Option<Dimensions>,
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 单个画布允许的最大像素数。
    pub max_surface_pixels: u64,
    /// 同一选区允许的提取尝试次数，耗尽后会话进入终态 `Failed`。
    pub max_extraction_attempts: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            aspect: Some(1.0),
            initial_crop_percent: 90.0,
            min_dimension: Some(150),
            quality: Some(0.95),
            resample_filter: FilterType::Triangle,
            display_bounds: None,
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            max_surface_pixels: 16_384 * 16_384,
            max_extraction_attempts: 3,
        }
    }
}

/// 裁剪档位。
///
/// - `Interactive`：对话框交互裁剪，1:1 锁定、最小 150 像素、质量 0.95
/// - `Utility`：一次性裁剪工具，自由比例、无最小限制、编码器默认质量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropProfile {
    Interactive,
    Utility,
}

impl CropProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use gallery_crop::crop_engine::CropProfile;
    ///
    /// let p = CropProfile::from_str("utility")?;
    /// assert_eq!(p.as_str(), "utility");
    /// # Ok::<(), gallery_crop::crop_engine::CropError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, CropError> {
        match profile.trim().to_lowercase().as_str() {
            "interactive" => Ok(Self::Interactive),
            "utility" => Ok(Self::Utility),
            other => Err(CropError::InvalidFormat(format!(
                "未知裁剪档位：{}（可选：interactive / utility）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Utility => "utility",
        }
    }
}

impl CropConfig {
    /// 指定档位的完整配置。
    pub fn for_profile(profile: CropProfile) -> Self {
        let mut config = Self::default();
        config.apply_profile(profile);
        config
    }

    /// 应用档位到实际参数，资源上限保持不变。
    pub fn apply_profile(&mut self, profile: CropProfile) {
        match profile {
            CropProfile::Interactive => {
                self.aspect = Some(1.0);
                self.min_dimension = Some(150);
                self.quality = Some(0.95);
            }
            CropProfile::Utility => {
                self.aspect = None;
                self.min_dimension = None;
                self.quality = None;
            }
        }
    }

    /// 基于当前参数反推档位。
    pub fn infer_profile(&self) -> CropProfile {
        if self.aspect.is_none() && self.min_dimension.is_none() && self.quality.is_none() {
            CropProfile::Utility
        } else {
            CropProfile::Interactive
        }
    }

    /// 校验参数取值范围。
    pub fn validate(&self) -> Result<(), CropError> {
        if let Some(aspect) = self.aspect {
            if !aspect.is_finite() || aspect <= 0.0 {
                return Err(CropError::InvalidFormat(format!("aspect 必须为正数：{}", aspect)));
            }
        }
        if !(self.initial_crop_percent > 0.0 && self.initial_crop_percent <= 100.0) {
            return Err(CropError::InvalidFormat(format!(
                "initial_crop_percent 必须在 (0, 100] 之间：{}",
                self.initial_crop_percent
            )));
        }
        if let Some(quality) = self.quality {
            validate_quality(quality)?;
        }
        if matches!(self.min_dimension, Some(0)) {
            return Err(CropError::InvalidFormat("min_dimension 不能为 0".to_string()));
        }
        if let Some(bounds) = self.display_bounds {
            if bounds.width == 0 || bounds.height == 0 {
                return Err(CropError::InvalidFormat("display_bounds 宽高必须大于 0".to_string()));
            }
        }
        if self.max_file_size == 0
            || self.max_decoded_pixels == 0
            || self.max_decoded_bytes == 0
            || self.max_surface_pixels == 0
        {
            return Err(CropError::InvalidFormat("资源上限不能为 0".to_string()));
        }
        if self.max_extraction_attempts == 0 {
            return Err(CropError::InvalidFormat("max_extraction_attempts 至少为 1".to_string()));
        }
        Ok(())
    }
}

/// 质量因子必须落在 `(0, 1]`。
pub(crate) fn validate_quality(quality: f32) -> Result<(), CropError> {
    if quality.is_finite() && quality > 0.0 && quality <= 1.0 {
        Ok(())
    } else {
        Err(CropError::InvalidFormat(format!(
            "quality 必须在 (0, 1] 之间：{}",
            quality
        )))
    }
}
