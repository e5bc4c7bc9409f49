//! # 像素提取模块
//!
//! ## 设计思路
//!
//! 输入为"显示坐标系"下的像素选区，输出为一块新画布：
//! - 采样矩形 = 选区 × 缩放因子（`natural / displayed`）
//! - 目标画布尺寸 = 选区的显示像素尺寸（向下取整），而非原始分辨率下的等效尺寸
//!
//! 当显示尺寸小于原始尺寸时，这会降低输出分辨率；保留该行为以与交互式裁剪对话框一致。

use image::imageops::FilterType;

use super::geometry::{CropRegion, CropUnit, Dimensions};
use super::source::SourceImage;
use super::surface::{DestRect, RasterSurface, SourceRect, SurfaceFactory};
use super::CropError;

/// 提取结果：持有绘制完成的画布与实际采样矩形。
pub struct ExtractedRaster {
    surface: Box<dyn RasterSurface>,
    source_rect: SourceRect,
}

impl ExtractedRaster {
    pub fn dimensions(&self) -> Dimensions {
        self.surface.dimensions()
    }

    pub fn source_rect(&self) -> SourceRect {
        self.source_rect
    }

    pub(crate) fn surface(&self) -> &dyn RasterSurface {
        self.surface.as_ref()
    }
}

impl std::fmt::Debug for ExtractedRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedRaster")
            .field("dimensions", &self.dimensions())
            .field("source_rect", &self.source_rect)
            .finish()
    }
}

/// 由显示坐标选区计算原始像素采样矩形。
pub fn source_rect_for(image: &SourceImage, region: &CropRegion) -> SourceRect {
    let (scale_x, scale_y) = image.scale_factors();
    SourceRect {
        x: region.x * scale_x,
        y: region.y * scale_y,
        width: region.width * scale_x,
        height: region.height * scale_y,
    }
}

/// 从源图中提取选区像素。
///
/// `region` 必须为像素单位、相对源图的显示尺寸，宽高为正。
pub fn extract(
    image: &SourceImage,
    region: &CropRegion,
    factory: &dyn SurfaceFactory,
    filter: FilterType,
) -> Result<ExtractedRaster, CropError> {
    if region.unit != CropUnit::Pixel {
        return Err(CropError::InvalidFormat("提取选区必须为像素单位".to_string()));
    }
    if !(region.width > 0.0 && region.height > 0.0) || !region.x.is_finite() || !region.y.is_finite() {
        return Err(CropError::InvalidFormat(format!(
            "选区尺寸无效：{:.2}x{:.2}",
            region.width, region.height
        )));
    }

    let source_rect = source_rect_for(image, region);
    let surface_width = region.width.floor() as u32;
    let surface_height = region.height.floor() as u32;

    log::debug!(
        "✂️ 提取选区 - 显示 {:?} 采样 {:?} 画布 {}x{}",
        region,
        source_rect,
        surface_width,
        surface_height
    );

    let mut surface = factory.create(surface_width, surface_height)?;
    surface.draw_image(
        image,
        source_rect,
        DestRect {
            x: 0.0,
            y: 0.0,
            width: region.width,
            height: region.height,
        },
        filter,
    )?;

    Ok(ExtractedRaster {
        surface,
        source_rect,
    })
}
