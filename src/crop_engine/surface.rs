//! # 画布抽象模块
//!
//! ## 设计思路
//!
//! 浏览器裁剪依赖隐式的全局 2D 画布。这里改为显式注入的能力：
//! - `RasterSurface`：可绘制、可导出 JPEG 的 RGBA 画布
//! - `SurfaceFactory`：由宿主提供的画布工厂，提取器通过它申请画布
//!
//! 测试可注入合成画布，记录采样矩形或模拟分配失败。
//!
//! ## 实现思路
//!
//! `MemorySurface` 为内置实现：
//! - `draw_image` 遵循 `drawImage(image, sx, sy, sw, sh, dx, dy, dw, dh)` 语义：
//!   源矩形裁剪到图片范围内，目标矩形按比例收缩，未覆盖的像素保持透明。
//! - 重采样使用 `fast_image_resize`（支持非整数源矩形），失败时回退 `image::imageops`。
//! - `encode_jpeg` 先把透明像素合成到黑色背景，再用 `image` 的 JPEG 编码器输出。

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageBuffer, Rgba, RgbaImage};

use super::geometry::Dimensions;
use super::source::SourceImage;
use super::CropError;

/// 源图上的采样矩形（原始像素坐标，可为小数）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 目标画布上的绘制矩形（像素坐标，可为小数）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 可绘制的 RGBA 画布。
pub trait RasterSurface: Send {
    fn dimensions(&self) -> Dimensions;

    /// 将 `src` 区域的源图像素重采样绘制到 `dst` 区域。
    fn draw_image(
        &mut self,
        image: &SourceImage,
        src: SourceRect,
        dst: DestRect,
        filter: FilterType,
    ) -> Result<(), CropError>;

    /// 导出为 JPEG 字节；`quality` 为 `None` 时使用编码器默认质量。
    fn encode_jpeg(&self, quality: Option<f32>) -> Result<Vec<u8>, CropError>;
}

/// 画布工厂。
pub trait SurfaceFactory: Send + Sync {
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn RasterSurface>, CropError>;
}

/// 内存画布工厂，带像素上限。
#[derive(Debug, Clone)]
pub struct MemorySurfaceFactory {
    max_pixels: u64,
}

impl MemorySurfaceFactory {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }
}

impl SurfaceFactory for MemorySurfaceFactory {
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn RasterSurface>, CropError> {
        Ok(Box::new(MemorySurface::new(width, height, self.max_pixels)?))
    }
}

/// 内存 RGBA 画布。
#[derive(Debug, Clone)]
pub struct MemorySurface {
    buffer: RgbaImage,
}

impl MemorySurface {
    pub fn new(width: u32, height: u32, max_pixels: u64) -> Result<Self, CropError> {
        if width == 0 || height == 0 {
            return Err(CropError::RasterContextUnavailable(format!(
                "画布尺寸无效：{}x{}",
                width, height
            )));
        }

        let pixels = width as u64 * height as u64;
        if pixels > max_pixels {
            return Err(CropError::RasterContextUnavailable(format!(
                "画布像素过大：{} 像素（限制：{} 像素）",
                pixels, max_pixels
            )));
        }

        Ok(Self {
            buffer: RgbaImage::new(width, height),
        })
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.buffer
    }

    /// 把 `patch` 贴到 `(left, top)`，超出画布的部分丢弃。
    fn blit(&mut self, patch: &RgbaImage, left: u32, top: u32) {
        let (width, height) = self.buffer.dimensions();
        let copy_width = patch.width().min(width.saturating_sub(left)) as usize;
        if copy_width == 0 {
            return;
        }

        let dst_stride = width as usize * 4;
        let src_stride = patch.width() as usize * 4;
        let src = patch.as_raw();
        let dst: &mut [u8] = &mut self.buffer;

        for row in 0..patch.height().min(height.saturating_sub(top)) as usize {
            let dst_start = (top as usize + row) * dst_stride + left as usize * 4;
            let src_start = row * src_stride;
            dst[dst_start..dst_start + copy_width * 4]
                .copy_from_slice(&src[src_start..src_start + copy_width * 4]);
        }
    }
}

impl RasterSurface for MemorySurface {
    fn dimensions(&self) -> Dimensions {
        let (width, height) = self.buffer.dimensions();
        Dimensions::new(width, height)
    }

    fn draw_image(
        &mut self,
        image: &SourceImage,
        src: SourceRect,
        dst: DestRect,
        filter: FilterType,
    ) -> Result<(), CropError> {
        let Some((clipped, left, top, width, height)) = clip_to_image(image.natural(), src, dst) else {
            log::debug!("源矩形与图片无交集，画布保持透明：{:?}", src);
            return Ok(());
        };

        let patch = match resample_with_fast_image_resize(image.pixels(), clipped, width, height, filter) {
            Ok(patch) => patch,
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 重采样失败，回退 image::imageops：{}", err);
                resample_with_imageops(image.pixels(), clipped, width, height, filter)
            }
        };

        self.blit(&patch, left, top);
        Ok(())
    }

    fn encode_jpeg(&self, quality: Option<f32>) -> Result<Vec<u8>, CropError> {
        let (width, height) = self.buffer.dimensions();
        if width == 0 || height == 0 {
            return Err(CropError::Encode("画布为空".to_string()));
        }

        let rgb = flatten_onto_black(&self.buffer);
        let mut bytes = Vec::new();
        let mut encoder = match quality {
            Some(q) => JpegEncoder::new_with_quality(&mut bytes, to_jpeg_quality(q)),
            None => JpegEncoder::new(&mut bytes),
        };

        encoder
            .encode(&rgb, width, height, ExtendedColorType::Rgb8)
            .map_err(|e| CropError::Encode(format!("JPEG 编码失败：{}", e)))?;

        if bytes.is_empty() {
            return Err(CropError::Encode("JPEG 编码结果为空".to_string()));
        }

        Ok(bytes)
    }
}

/// `(0, 1]` 质量因子映射到 JPEG 的 `1..=100`。
pub(crate) fn to_jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// 按 alpha 把颜色合成到黑色背景，输出 RGB 字节。
fn flatten_onto_black(buffer: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(buffer.width() as usize * buffer.height() as usize * 3);
    for Rgba([r, g, b, a]) in buffer.pixels().copied() {
        let alpha = a as u16;
        rgb.push(((r as u16 * alpha + 127) / 255) as u8);
        rgb.push(((g as u16 * alpha + 127) / 255) as u8);
        rgb.push(((b as u16 * alpha + 127) / 255) as u8);
    }
    rgb
}

/// 将源矩形裁剪到图片范围内，并同比例收缩目标矩形。
///
/// 返回 `(裁剪后源矩形, 目标左, 目标上, 目标宽, 目标高)`；无交集或目标退化时返回 `None`。
fn clip_to_image(
    natural: Dimensions,
    src: SourceRect,
    dst: DestRect,
) -> Option<(SourceRect, u32, u32, u32, u32)> {
    if src.width <= 0.0 || src.height <= 0.0 || dst.width <= 0.0 || dst.height <= 0.0 {
        return None;
    }

    let x0 = src.x.max(0.0);
    let y0 = src.y.max(0.0);
    let x1 = (src.x + src.width).min(natural.width as f64);
    let y1 = (src.y + src.height).min(natural.height as f64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let ratio_x = dst.width / src.width;
    let ratio_y = dst.height / src.height;

    let left = (dst.x + (x0 - src.x) * ratio_x).round().max(0.0);
    let top = (dst.y + (y0 - src.y) * ratio_y).round().max(0.0);
    let right = (dst.x + (x1 - src.x) * ratio_x).round();
    let bottom = (dst.y + (y1 - src.y) * ratio_y).round();
    if right <= left || bottom <= top {
        return None;
    }

    Some((
        SourceRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        },
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

fn resample_with_fast_image_resize(
    source: &RgbaImage,
    src: SourceRect,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RgbaImage, CropError> {
    let (src_width, src_height) = source.dimensions();
    let src_image = fr::images::ImageRef::new(src_width, src_height, source.as_raw(), fr::PixelType::U8x4)
        .map_err(|e| CropError::RasterContextUnavailable(format!("构建源图像视图失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(to_fast_alg(filter))
        .crop(src.x, src.y, src.width, src.height);

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| CropError::RasterContextUnavailable(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CropError::RasterContextUnavailable("fast_image_resize 输出缓冲长度异常".to_string()))
}

/// 回退路径：源矩形取整后裁剪，再整体缩放。
fn resample_with_imageops(
    source: &RgbaImage,
    src: SourceRect,
    width: u32,
    height: u32,
    filter: FilterType,
) -> RgbaImage {
    let x = src.x.floor() as u32;
    let y = src.y.floor() as u32;
    let w = (src.width.round() as u32).clamp(1, source.width().saturating_sub(x).max(1));
    let h = (src.height.round() as u32).clamp(1, source.height().saturating_sub(y).max(1));

    let cropped = DynamicImage::ImageRgba8(image::imageops::crop_imm(source, x, y, w, h).to_image());
    cropped.resize_exact(width, height, filter).to_rgba8()
}

fn to_fast_alg(filter: FilterType) -> fr::ResizeAlg {
    match filter {
        FilterType::Nearest => fr::ResizeAlg::Nearest,
        FilterType::Triangle => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
        FilterType::CatmullRom => fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom),
        FilterType::Gaussian => fr::ResizeAlg::Convolution(fr::FilterType::Mitchell),
        FilterType::Lanczos3 => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
    }
}
