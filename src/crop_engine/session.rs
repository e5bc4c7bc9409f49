//! # 裁剪会话状态机
//!
//! ## 设计思路
//!
//! 一次裁剪会话对应一次"选图 → 调整选区 → 确认导出"的完整交互。
//! 状态机是唯一的编排点，解码与提取/编码都是显式的异步操作：
//!
//! ```text
//! Idle ──load──▶ ImageLoading ──▶ AwaitingRegionSelection ◀──update_region──┐
//!   ▲                │ 解码失败          │ complete_region（满足最小尺寸）     │
//!   └────────────────┘                   ▼                                    │
//!                                  RegionCompleted ──begin_extraction──▶ Extracting
//!                                                                           │
//!                     Done ◀── 成功 ── finish_extraction ── 失败 ──▶ AwaitingRegionSelection
//!                                                      └─ 重试耗尽或不可重试 ──▶ Failed(kind)
//! ```
//!
//! ## 实现思路
//!
//! - `Extracting` 即临界区：提取进行中再次 `begin_extraction` 直接返回 `Busy`，不排队。
//! - `ExtractionJob` 持有源图与选区的独立副本，可脱离 `&mut self` 在阻塞线程中执行。
//! - 取消不会打断进行中的提取，只阻止新的提取；已取消会话在 `finish_extraction` 时丢弃结果。
//! - 进入 `Done` / 终态 `Failed` / `Cancelled` 时统一释放源图与选区。

use std::sync::Arc;
use std::time::Instant;

use image::imageops::FilterType;

use super::encoder::{self, FileArtifact};
use super::extractor;
use super::geometry::{
    self, CropRegion, Dimensions, center_crop, compute_initial_crop_with_percent, contain_crop,
};
use super::source::{ImageSource, SourceImage};
use super::surface::SurfaceFactory;
use super::{CropConfig, CropError, CropErrorKind, loader, pipeline};

/// 未提供文件名时的输出文件名。
pub const DEFAULT_FILE_NAME: &str = "cropped.jpg";

/// 会话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropState {
    Idle,
    ImageLoading,
    AwaitingRegionSelection,
    RegionCompleted,
    Extracting,
    Done,
    Failed(CropErrorKind),
    Cancelled,
}

impl CropState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }

    fn accepts_region_input(self) -> bool {
        matches!(self, Self::AwaitingRegionSelection | Self::RegionCompleted)
    }
}

/// 完成选区的处理结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionOutcome {
    /// 选区已记录（像素单位，显示坐标系）。
    Accepted(CropRegion),
    /// 选区小于最小尺寸，会话保持在 `AwaitingRegionSelection` 等待修正。
    TooSmall { width: f64, height: f64, min: u32 },
}

/// 单次裁剪会话。
pub struct CropSession {
    config: CropConfig,
    factory: Arc<dyn SurfaceFactory>,
    state: CropState,
    image: Option<SourceImage>,
    file_name: String,
    /// 当前选区（百分比单位）。
    crop: Option<CropRegion>,
    /// 最近一次完成的选区（像素单位，显示坐标系）。
    completed: Option<CropRegion>,
    failed_attempts: u32,
    last_error: Option<CropErrorKind>,
}

/// 一次提取任务：提取 + 编码，全部成功或全部失败。
pub struct ExtractionJob {
    image: SourceImage,
    region: CropRegion,
    file_name: String,
    quality: Option<f32>,
    filter: FilterType,
    factory: Arc<dyn SurfaceFactory>,
}

impl ExtractionJob {
    pub(crate) fn new(
        image: SourceImage,
        region: CropRegion,
        file_name: String,
        config: &CropConfig,
        factory: Arc<dyn SurfaceFactory>,
    ) -> Self {
        Self {
            image,
            region,
            file_name,
            quality: config.quality,
            filter: config.resample_filter,
            factory,
        }
    }

    /// 在当前线程同步执行。
    pub fn run_blocking(self) -> Result<FileArtifact, CropError> {
        let extract_start = Instant::now();
        let raster = extractor::extract(&self.image, &self.region, self.factory.as_ref(), self.filter)?;
        let extract_elapsed = extract_start.elapsed();

        let encode_start = Instant::now();
        let artifact = encoder::encode(&raster, &self.file_name, self.quality)?;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 裁剪导出完成 - {} {}x{} {} bytes extract={}ms encode={}ms",
            artifact.name,
            raster.dimensions().width,
            raster.dimensions().height,
            artifact.len(),
            extract_elapsed.as_millis(),
            encode_elapsed.as_millis()
        );

        Ok(artifact)
    }

    /// 在阻塞线程池中执行，不阻塞事件循环。
    pub async fn run(self) -> Result<FileArtifact, CropError> {
        tokio::task::spawn_blocking(move || self.run_blocking())
            .await
            .map_err(|e| CropError::RasterContextUnavailable(format!("提取线程执行失败：{}", e)))?
    }
}

impl CropSession {
    pub fn new(config: CropConfig, factory: Arc<dyn SurfaceFactory>) -> Self {
        Self {
            config,
            factory,
            state: CropState::Idle,
            image: None,
            file_name: DEFAULT_FILE_NAME.to_string(),
            crop: None,
            completed: None,
            failed_attempts: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> CropState {
        self.state
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn source_image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 当前选区（百分比单位）。
    pub fn current_region(&self) -> Option<CropRegion> {
        self.crop
    }

    /// 最近一次完成的选区（像素单位）。
    pub fn completed_region(&self) -> Option<CropRegion> {
        self.completed
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn last_error(&self) -> Option<CropErrorKind> {
        self.last_error
    }

    /// 加载并解码源图，返回初始选区（百分比单位）。
    ///
    /// 失败时会话回到 `Idle`。
    pub async fn load(&mut self, source: ImageSource) -> Result<CropRegion, CropError> {
        self.expect_state(CropState::Idle, "load")?;
        self.state = CropState::ImageLoading;

        let config = self.config.clone();
        let task_source = source.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let raw = loader::load_source(&task_source, &config)?;
            pipeline::decode_source(raw, &config)
        })
        .await
        .map_err(|e| CropError::Decode(format!("解码线程执行失败：{}", e)))
        .and_then(|result| result);

        match decoded {
            Ok(image) => {
                let file_name = source.file_name().unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
                self.enter_region_selection(image, file_name)
            }
            Err(err) => {
                log::warn!("❌ 源图加载失败，会话回到 Idle：{}", err);
                self.state = CropState::Idle;
                Err(err)
            }
        }
    }

    /// 直接使用已解码的源图。
    pub fn load_decoded(&mut self, image: SourceImage, file_name: &str) -> Result<CropRegion, CropError> {
        self.expect_state(CropState::Idle, "load_decoded")?;
        self.state = CropState::ImageLoading;
        self.enter_region_selection(image, file_name.to_string())
    }

    fn enter_region_selection(&mut self, image: SourceImage, file_name: String) -> Result<CropRegion, CropError> {
        let natural = image.natural();
        let image = match self.config.display_bounds {
            Some(bounds) => match image.with_displayed(geometry::fit_contain(natural, bounds)) {
                Ok(image) => image,
                Err(err) => {
                    self.state = CropState::Idle;
                    return Err(err);
                }
            },
            None => image,
        };

        let initial = self.initial_region(natural);
        log::info!(
            "🖼️ 源图就绪 - {} 原始 {}x{} 显示 {}x{} 初始选区 {:?}",
            file_name,
            natural.width,
            natural.height,
            image.displayed().width,
            image.displayed().height,
            initial
        );

        self.image = Some(image);
        self.file_name = file_name;
        self.crop = Some(initial);
        self.completed = None;
        self.state = CropState::AwaitingRegionSelection;
        Ok(initial)
    }

    fn initial_region(&self, natural: Dimensions) -> CropRegion {
        let percent = self.config.initial_crop_percent;
        match self.config.aspect {
            Some(aspect) => compute_initial_crop_with_percent(natural.width, natural.height, aspect, percent),
            None => center_crop(CropRegion::percent(0.0, 0.0, percent, percent), natural),
        }
    }

    /// 布局变化后更新显示尺寸。已完成的选区属于旧坐标系，会被清除。
    pub fn set_displayed_size(&mut self, displayed: Dimensions) -> Result<(), CropError> {
        self.expect_region_input("set_displayed_size")?;
        let image = self.require_image()?.with_displayed(displayed)?;

        self.image = Some(image);
        self.completed = None;
        self.state = CropState::AwaitingRegionSelection;
        Ok(())
    }

    /// 拖拽/缩放过程中的选区更新，不改变状态之外的任何东西。
    pub fn update_region(&mut self, region: CropRegion) -> Result<CropRegion, CropError> {
        self.expect_region_input("update_region")?;
        let displayed = self.require_image()?.displayed();

        let contained = contain_crop(region, self.config.aspect, displayed).to_percent(displayed);
        self.crop = Some(contained);
        self.state = CropState::AwaitingRegionSelection;
        Ok(contained)
    }

    /// 手势结束：校验最小尺寸并记录完成选区。
    pub fn complete_region(&mut self, region: CropRegion) -> Result<RegionOutcome, CropError> {
        self.expect_region_input("complete_region")?;
        let displayed = self.require_image()?.displayed();

        let px = contain_crop(region, self.config.aspect, displayed);
        if let Some(min) = self.config.min_dimension {
            if let Err(CropError::RegionTooSmall { width, height, min }) = geometry::ensure_min_size(&px, min) {
                log::debug!("选区过小（{:.1}x{:.1} < {}），等待用户修正", width, height, min);
                self.state = CropState::AwaitingRegionSelection;
                return Ok(RegionOutcome::TooSmall { width, height, min });
            }
        }

        self.crop = Some(px.to_percent(displayed));
        self.completed = Some(px);
        self.failed_attempts = 0;
        self.state = CropState::RegionCompleted;
        Ok(RegionOutcome::Accepted(px))
    }

    /// 进入 `Extracting` 并返回提取任务。
    pub fn begin_extraction(&mut self) -> Result<ExtractionJob, CropError> {
        match self.state {
            CropState::Extracting => return Err(CropError::Busy),
            state if !state.accepts_region_input() => {
                return Err(CropError::InvalidState(format!("当前状态 {:?} 不能开始提取", state)));
            }
            _ => {}
        }

        let region = self
            .completed
            .ok_or_else(|| CropError::InvalidState("尚未完成选区".to_string()))?;
        let image = self.require_image()?.clone();

        self.state = CropState::Extracting;
        Ok(ExtractionJob::new(
            image,
            region,
            self.file_name.clone(),
            &self.config,
            Arc::clone(&self.factory),
        ))
    }

    /// 提交提取结果并推进状态。
    ///
    /// 只有 `is_retryable` 的错误会回到选区阶段并消耗一次重试，其余错误直接进入 `Failed`。
    pub fn finish_extraction(
        &mut self,
        result: Result<FileArtifact, CropError>,
    ) -> Result<FileArtifact, CropError> {
        if self.state == CropState::Cancelled {
            return Err(CropError::Cancelled("会话已取消，丢弃提取结果".to_string()));
        }
        self.expect_state(CropState::Extracting, "finish_extraction")?;

        match result {
            Ok(artifact) => {
                self.state = CropState::Done;
                self.release_resources();
                Ok(artifact)
            }
            Err(err) => {
                let kind = err.kind();
                self.failed_attempts += 1;
                self.last_error = Some(kind);

                if !err.is_retryable() {
                    log::error!("❌ 提取失败且不可重试：{}", err);
                    self.state = CropState::Failed(kind);
                    self.release_resources();
                } else if self.failed_attempts >= self.config.max_extraction_attempts {
                    log::error!(
                        "❌ 提取失败且重试次数耗尽（{}/{}）：{}",
                        self.failed_attempts,
                        self.config.max_extraction_attempts,
                        err
                    );
                    self.state = CropState::Failed(kind);
                    self.release_resources();
                } else {
                    log::warn!(
                        "⚠️ 提取失败（{}/{}），保留选区等待重试：{}",
                        self.failed_attempts,
                        self.config.max_extraction_attempts,
                        err
                    );
                    self.state = CropState::AwaitingRegionSelection;
                }
                Err(err)
            }
        }
    }

    /// 确认导出：开始提取、执行并提交结果。
    pub async fn confirm(&mut self) -> Result<FileArtifact, CropError> {
        let job = self.begin_extraction()?;
        let result = job.run().await;
        self.finish_extraction(result)
    }

    /// 取消会话。进行中的提取不会被打断，但其结果会被丢弃。
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        log::info!("🚫 裁剪会话已取消（状态：{:?}）", self.state);
        self.state = CropState::Cancelled;
        self.release_resources();
    }

    fn release_resources(&mut self) {
        if self.image.take().is_some() {
            log::debug!("🧹 已释放源图 - {}", self.file_name);
        }
        self.crop = None;
        self.completed = None;
    }

    fn require_image(&self) -> Result<&SourceImage, CropError> {
        self.image
            .as_ref()
            .ok_or_else(|| CropError::InvalidState("源图尚未加载".to_string()))
    }

    fn expect_state(&self, expected: CropState, op: &str) -> Result<(), CropError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CropError::InvalidState(format!(
                "{} 需要状态 {:?}，当前为 {:?}",
                op, expected, self.state
            )))
        }
    }

    fn expect_region_input(&self, op: &str) -> Result<(), CropError> {
        match self.state {
            CropState::Extracting => Err(CropError::Busy),
            state if state.accepts_region_input() => Ok(()),
            state => Err(CropError::InvalidState(format!("{} 不能在状态 {:?} 下执行", op, state))),
        }
    }
}
