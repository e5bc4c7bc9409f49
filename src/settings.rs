//! 应用设置：JSON 文件持久化，缺省字段回落到默认值。
//!
//! 图库服务地址可通过环境变量 `GALLERY_API_BASE_URL` 覆盖文件中的值。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crop_engine::{CropConfig, CropProfile, Dimensions};
use crate::error::AppError;
use crate::gallery_api::GalleryApiConfig;

/// 覆盖 `api_base_url` 的环境变量。
pub const API_BASE_URL_ENV: &str = "GALLERY_API_BASE_URL";

/// 未指定时使用的设置文件名（相对当前目录）。
pub const DEFAULT_SETTINGS_FILE: &str = "gallery-crop.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    pub max_download_bytes: u64,
    /// `interactive` / `utility`
    pub profile: String,
    /// 覆盖档位自带的编码质量。
    pub quality: Option<f32>,
    pub display_bounds: Option<Dimensions>,
    pub max_file_size: u64,
    pub max_decoded_pixels: u64,
    /// 解码后 RGBA 内存上限，与像素上限同时生效。
    pub max_decoded_bytes: u64,
    pub max_extraction_attempts: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        let crop = CropConfig::default();
        let api = GalleryApiConfig::default();
        Self {
            api_base_url: api.base_url,
            api_timeout_ms: api.timeout_ms,
            max_download_bytes: api.max_download_bytes,
            profile: CropProfile::Interactive.as_str().to_string(),
            quality: None,
            display_bounds: crop.display_bounds,
            max_file_size: crop.max_file_size,
            max_decoded_pixels: crop.max_decoded_pixels,
            max_decoded_bytes: crop.max_decoded_bytes,
            max_extraction_attempts: crop.max_extraction_attempts,
        }
    }
}

impl AppSettings {
    /// 用外部变量覆盖设置；`lookup` 通常为 `std::env::var`。
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            log::debug!("环境变量 {} 覆盖服务地址：{}", API_BASE_URL_ENV, url);
            self.api_base_url = url.trim().to_string();
        }
    }

    /// 转换为裁剪引擎配置。
    pub fn crop_config(&self) -> Result<CropConfig, AppError> {
        let profile = CropProfile::from_str(&self.profile)?;
        let mut config = CropConfig::for_profile(profile);

        if self.quality.is_some() {
            config.quality = self.quality;
        }
        config.display_bounds = self.display_bounds;
        config.max_file_size = self.max_file_size;
        config.max_decoded_pixels = self.max_decoded_pixels;
        config.max_decoded_bytes = self.max_decoded_bytes;
        config.max_extraction_attempts = self.max_extraction_attempts;

        config.validate()?;
        Ok(config)
    }

    /// 转换为图库客户端配置。
    pub fn api_config(&self) -> GalleryApiConfig {
        GalleryApiConfig {
            base_url: self.api_base_url.clone(),
            timeout_ms: self.api_timeout_ms,
            max_download_bytes: self.max_download_bytes,
        }
    }
}

/// 设置文件路径：显式传入优先，否则使用当前目录下的默认文件。
pub fn settings_file_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

/// 读取设置文件并应用环境变量覆盖。文件不存在时返回默认设置。
pub fn load_settings(path: &Path) -> Result<AppSettings, AppError> {
    let mut settings = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_json::from_str::<AppSettings>(&content)
            .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?
    } else {
        log::debug!("设置文件不存在，使用默认设置：{}", path.display());
        AppSettings::default()
    };

    settings.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Settings(format!("创建设置目录失败: {}", e)))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery_api::DEFAULT_BASE_URL;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir()
            .join(format!("gallery-crop-settings-{}-{}", std::process::id(), nanos))
            .join(name)
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"profile":"utility"}"#).expect("partial settings parse");

        assert_eq!(settings.profile, "utility");
        assert_eq!(settings.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.api_timeout_ms, 10_000);

        let config = settings.crop_config().expect("valid config");
        assert!(config.aspect.is_none());
        assert!(config.min_dimension.is_none());
    }

    #[test]
    fn quality_override_and_invalid_profile() {
        let mut settings = AppSettings {
            quality: Some(0.5),
            ..AppSettings::default()
        };
        assert_eq!(settings.crop_config().expect("valid config").quality, Some(0.5));

        settings.profile = "fancy".to_string();
        assert!(matches!(settings.crop_config(), Err(AppError::Crop(_))));
    }

    #[test]
    fn decode_limits_flow_into_crop_config() {
        let settings: AppSettings = serde_json::from_str(
            r#"{"max_decoded_pixels":80000000,"max_decoded_bytes":335544320}"#,
        )
        .expect("limits parse");

        let config = settings.crop_config().expect("valid config");
        assert_eq!(config.max_decoded_pixels, 80_000_000);
        assert_eq!(config.max_decoded_bytes, 320 * 1024 * 1024);

        let defaults = AppSettings::default().crop_config().expect("valid config");
        assert_eq!(defaults.max_decoded_bytes, CropConfig::default().max_decoded_bytes);

        let zeroed = AppSettings {
            max_decoded_bytes: 0,
            ..AppSettings::default()
        };
        assert!(matches!(zeroed.crop_config(), Err(AppError::Crop(_))));
    }

    #[test]
    fn env_override_replaces_base_url() {
        let mut settings = AppSettings::default();
        settings.apply_env_overrides(|key| {
            (key == API_BASE_URL_ENV).then(|| "http://gallery.internal:9000".to_string())
        });
        assert_eq!(settings.api_config().base_url, "http://gallery.internal:9000");

        settings.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(settings.api_base_url, "http://gallery.internal:9000");
    }

    #[test]
    fn save_then_load_round_trip() {
        let path = temp_path("settings.json");
        let settings = AppSettings {
            profile: "utility".to_string(),
            display_bounds: Some(Dimensions::new(640, 480)),
            ..AppSettings::default()
        };

        save_settings(&path, &settings).expect("save");
        let loaded = load_settings(&path).expect("load");

        assert_eq!(loaded.profile, "utility");
        assert_eq!(loaded.display_bounds, Some(Dimensions::new(640, 480)));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn malformed_file_is_a_settings_error() {
        let path = temp_path("broken.json");
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).expect("create dir");
        }
        fs::write(&path, "{ not json").expect("write");

        assert!(matches!(load_settings(&path), Err(AppError::Settings(_))));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}
