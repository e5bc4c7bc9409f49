//! # 图库裁剪工具：命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与子命令分发。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。
//!
//! ```bash
//! gallery-crop crop --input photo.png                       # 居中初始选区
//! gallery-crop crop --input photo.png --region 10,10,200,200 --profile utility
//! gallery-crop upload --input photo.png
//! gallery-crop search-text "a black cat"
//! gallery-crop search-image --input photo.png
//! gallery-crop list
//! gallery-crop fetch 42 --output 42.jpg
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use gallery_crop::crop_engine::{
    CropEngine, CropError, CropProfile, CropRegion, FileArtifact, ImageSource, RegionOutcome,
};
use gallery_crop::error::AppError;
use gallery_crop::gallery_api::GalleryClient;
use gallery_crop::settings::{self, AppSettings};

#[derive(Parser)]
#[command(name = "gallery-crop")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "裁剪图片并与图库检索服务交互", long_about = None)]
struct Cli {
    /// 设置文件路径
    #[arg(long, global = true, env = "GALLERY_CROP_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 裁剪图片并写出 JPEG
    Crop {
        #[command(flatten)]
        crop: CropArgs,

        /// 输出文件路径，默认为 `<源文件名>_cropped.jpg`
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// 裁剪后上传到图库
    Upload {
        #[command(flatten)]
        crop: CropArgs,
    },
    /// 文本检索
    SearchText {
        /// 检索提示词
        prompt: String,
    },
    /// 裁剪后以图搜图
    SearchImage {
        #[command(flatten)]
        crop: CropArgs,
    },
    /// 列出图库中的全部图片
    List,
    /// 下载原图
    Fetch {
        /// 图片 ID
        id: i64,

        /// 输出文件路径
        #[arg(long, short)]
        output: PathBuf,
    },
    /// 写出默认设置文件
    InitSettings {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct CropArgs {
    /// 源图路径
    #[arg(long, short)]
    input: PathBuf,

    /// 选区 `x,y,width,height`（原始像素），省略时使用居中初始选区
    #[arg(long, value_parser = parse_region)]
    region: Option<[f64; 4]>,

    /// 将 `--region` 按百分比解释
    #[arg(long, requires = "region")]
    percent: bool,

    /// 裁剪档位（interactive / utility），覆盖设置文件
    #[arg(long)]
    profile: Option<String>,

    /// JPEG 质量 (0, 1]
    #[arg(long)]
    quality: Option<f32>,
}

fn parse_region(value: &str) -> Result<[f64; 4], String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("选区数值无效：{}", e))?;

    <[f64; 4]>::try_from(parts).map_err(|_| "选区格式应为 x,y,width,height".to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ [{}] {}", err.code(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings_path = settings::settings_file_path(cli.settings.as_deref());

    if let Commands::InitSettings { force } = cli.command {
        if settings_path.exists() && !force {
            return Err(AppError::Settings(format!(
                "设置文件已存在：{}（使用 --force 覆盖）",
                settings_path.display()
            )));
        }
        settings::save_settings(&settings_path, &AppSettings::default())?;
        log::info!("📝 已写出默认设置：{}", settings_path.display());
        return Ok(());
    }

    let settings = settings::load_settings(&settings_path)?;

    match cli.command {
        Commands::Crop { crop, output } => {
            let artifact = produce_artifact(&crop, &settings).await?;
            let output = output.unwrap_or_else(|| default_output_path(&crop.input));
            std::fs::write(&output, &artifact.bytes)?;
            log::info!("💾 已写出 {}（{} bytes）", output.display(), artifact.len());
        }
        Commands::Upload { crop } => {
            let artifact = produce_artifact(&crop, &settings).await?;
            let client = GalleryClient::new(settings.api_config())?;
            print_json(&client.upload_image(&artifact).await?)?;
        }
        Commands::SearchText { prompt } => {
            let client = GalleryClient::new(settings.api_config())?;
            print_json(&client.search_by_text(&prompt).await?)?;
        }
        Commands::SearchImage { crop } => {
            let artifact = produce_artifact(&crop, &settings).await?;
            let client = GalleryClient::new(settings.api_config())?;
            print_json(&client.search_by_image(&artifact).await?)?;
        }
        Commands::List => {
            let client = GalleryClient::new(settings.api_config())?;
            print_json(&client.list_images().await?)?;
        }
        Commands::Fetch { id, output } => {
            let client = GalleryClient::new(settings.api_config())?;
            let bytes = client.fetch_raw(id).await?;
            std::fs::write(&output, &bytes)?;
            log::info!("💾 已写出 {}（{} bytes）", output.display(), bytes.len());
        }
        Commands::InitSettings { .. } => {}
    }

    Ok(())
}

/// 按参数裁剪：给出选区时走一次性裁剪，否则走会话并采用居中初始选区。
async fn produce_artifact(args: &CropArgs, settings: &AppSettings) -> Result<FileArtifact, AppError> {
    let mut config = settings.crop_config()?;
    if let Some(profile) = &args.profile {
        config.apply_profile(CropProfile::from_str(profile)?);
    }
    if args.quality.is_some() {
        config.quality = args.quality;
    }

    let engine = CropEngine::new(config)?;
    let source = ImageSource::FilePath(args.input.clone());

    if let Some([x, y, width, height]) = args.region {
        let region = if args.percent {
            CropRegion::percent(x, y, width, height)
        } else {
            CropRegion::pixels(x, y, width, height)
        };
        return Ok(engine.crop_image(source, region, None).await?);
    }

    let mut session = engine.start_session()?;
    let initial = session.load(source).await?;
    let displayed = session
        .source_image()
        .map(|image| image.displayed())
        .ok_or_else(|| CropError::InvalidState("源图尚未加载".to_string()))?;

    match session.complete_region(initial.to_pixels(displayed))? {
        RegionOutcome::Accepted(region) => {
            log::info!("✂️ 使用初始选区 {:?}", region);
        }
        RegionOutcome::TooSmall { width, height, min } => {
            return Err(CropError::RegionTooSmall { width, height, min }.into());
        }
    }

    Ok(session.confirm().await?)
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_cropped.jpg", stem))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{}", json);
    Ok(())
}
