//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `CropEngine` 只负责配置管理与流程编排，不关心结果去向（上传、落盘由调用方决定）。
//! 两种使用方式共用同一条流水线：
//! 1. 交互式：`start_session` 创建会话，由状态机驱动选区与确认
//! 2. 一次性：`crop_image` 按给定像素选区直接导出，显示尺寸即原始尺寸
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<CropConfig>>` 支持运行时切换档位。
//! - 单次请求与单个会话都使用"同一配置快照"，避免处理中途配置漂移。
//! - 记录 `load/decode/extract/encode/total` 阶段耗时。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::encoder::{self, FileArtifact};
use super::extractor;
use super::geometry::{self, CropRegion, CropUnit};
use super::session::{CropSession, DEFAULT_FILE_NAME};
use super::surface::{MemorySurfaceFactory, SurfaceFactory};
use super::{CropConfig, CropError, CropProfile, ImageSource, loader, pipeline};

/// 裁剪引擎。
pub struct CropEngine {
    config: Arc<RwLock<CropConfig>>,
    factory: Option<Arc<dyn SurfaceFactory>>,
}

impl CropEngine {
    /// 根据初始配置创建引擎，使用内存画布。
    ///
    /// # 示例
    /// ```rust
    /// use gallery_crop::crop_engine::{CropConfig, CropEngine, CropProfile};
    ///
    /// let engine = CropEngine::new(CropConfig::default())?;
    /// assert_eq!(engine.profile()?, CropProfile::Interactive);
    /// # Ok::<(), gallery_crop::crop_engine::CropError>(())
    /// ```
    pub fn new(config: CropConfig) -> Result<Self, CropError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            factory: None,
        })
    }

    /// 使用自定义画布工厂创建引擎。
    pub fn with_surface_factory(
        config: CropConfig,
        factory: Arc<dyn SurfaceFactory>,
    ) -> Result<Self, CropError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            factory: Some(factory),
        })
    }

    /// 获取配置快照。
    pub fn config_snapshot(&self) -> Result<CropConfig, CropError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| CropError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 以校验后的方式修改配置，校验失败时保持原配置不变。
    pub fn update_config<F>(&self, update: F) -> Result<(), CropError>
    where
        F: FnOnce(&mut CropConfig),
    {
        let mut config = self
            .config
            .write()
            .map_err(|_| CropError::ResourceLimit("配置写入锁已中毒".to_string()))?;

        let mut candidate = config.clone();
        update(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }

    /// 切换裁剪档位。
    pub fn set_profile(&self, profile: CropProfile) -> Result<(), CropError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| CropError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.apply_profile(profile);

        log::info!(
            "⚙️ 已切换裁剪档位：{:?}（aspect={:?}, min={:?}, quality={:?}）",
            profile,
            config.aspect,
            config.min_dimension,
            config.quality
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn profile(&self) -> Result<CropProfile, CropError> {
        let config = self
            .config
            .read()
            .map_err(|_| CropError::ResourceLimit("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_profile())
    }

    /// 创建一个新的交互式会话，会话持有当前配置的快照。
    pub fn start_session(&self) -> Result<CropSession, CropError> {
        let config = self.config_snapshot()?;
        let factory = self.surface_factory(&config);
        Ok(CropSession::new(config, factory))
    }

    fn surface_factory(&self, config: &CropConfig) -> Arc<dyn SurfaceFactory> {
        match &self.factory {
            Some(factory) => Arc::clone(factory),
            None => Arc::new(MemorySurfaceFactory::new(config.max_surface_pixels)),
        }
    }

    /// 一次性裁剪：按原始像素坐标导出选区。
    ///
    /// 百分比选区按原始尺寸换算。越界部分按画布语义裁剪，不做宽高比修正。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use gallery_crop::crop_engine::{CropConfig, CropEngine, CropProfile, CropRegion, ImageSource};
    ///
    /// # async fn demo() -> Result<(), gallery_crop::crop_engine::CropError> {
    /// let engine = CropEngine::new(CropConfig::for_profile(CropProfile::Utility))?;
    /// let artifact = engine
    ///     .crop_image(
    ///         ImageSource::FilePath("/tmp/photo.png".into()),
    ///         CropRegion::pixels(0.0, 0.0, 320.0, 240.0),
    ///         None,
    ///     )
    ///     .await?;
    /// assert_eq!(artifact.mime_type, "image/jpeg");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn crop_image(
        &self,
        source: ImageSource,
        region: CropRegion,
        file_name: Option<&str>,
    ) -> Result<FileArtifact, CropError> {
        let config = self.config_snapshot()?;
        let factory = self.surface_factory(&config);
        let file_name = file_name
            .map(str::to_string)
            .or_else(|| source.file_name())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        tokio::task::spawn_blocking(move || crop_blocking(source, region, &file_name, &config, factory.as_ref()))
            .await
            .map_err(|e| CropError::RasterContextUnavailable(format!("裁剪线程执行失败：{}", e)))?
    }
}

fn crop_blocking(
    source: ImageSource,
    region: CropRegion,
    file_name: &str,
    config: &CropConfig,
    factory: &dyn SurfaceFactory,
) -> Result<FileArtifact, CropError> {
    let total_start = Instant::now();

    let load_start = Instant::now();
    let raw = loader::load_source(&source, config)?;
    let load_elapsed = load_start.elapsed();

    let decode_start = Instant::now();
    let image = pipeline::decode_source(raw, config)?;
    let decode_elapsed = decode_start.elapsed();

    let region = match region.unit {
        CropUnit::Percent => region.to_pixels(image.natural()),
        CropUnit::Pixel => region,
    };
    if let Some(min) = config.min_dimension {
        geometry::ensure_min_size(&region, min)?;
    }

    let extract_start = Instant::now();
    let raster = extractor::extract(&image, &region, factory, config.resample_filter)?;
    let extract_elapsed = extract_start.elapsed();

    let encode_start = Instant::now();
    let artifact = encoder::encode(&raster, file_name, config.quality)?;
    let encode_elapsed = encode_start.elapsed();

    log::info!(
        "✅ 图片裁剪完成 - load={}ms decode={}ms extract={}ms encode={}ms total={}ms",
        load_elapsed.as_millis(),
        decode_elapsed.as_millis(),
        extract_elapsed.as_millis(),
        encode_elapsed.as_millis(),
        total_start.elapsed().as_millis()
    );

    Ok(artifact)
}
