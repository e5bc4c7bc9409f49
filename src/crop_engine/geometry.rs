//! # 选区几何模块
//!
//! ## 设计思路
//!
//! 纯函数集合，不持有状态、不做 I/O。负责：
//! - 初始选区：按宽高比生成 90% 宽度的选区并居中
//! - 单位换算：百分比 ⇄ 像素
//! - 约束：选区限制在显示区域内、最小尺寸校验
//! - 预览布局：contain 方式放入预览区域时的显示尺寸
//!
//! ## 实现思路
//!
//! 初始选区算法：
//! 1. 以 `{x: 0, y: 0, width: 90%}` 为种子换算成像素，`height = width / aspect`
//! 2. 纵向越界时以高度为准回推宽度，横向越界时以宽度为准回推高度
//! 3. 居中后换算回百分比
//!
//! 宽高比约束在像素坐标系中成立；百分比坐标下两轴基数不同，比值一般不等于 aspect。

use serde::{Deserialize, Serialize};

use super::CropError;

/// 像素尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// 选区坐标单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropUnit {
    /// 相对容器宽/高的百分比（0~100）。
    Percent,
    /// 绝对像素。
    Pixel,
}

/// 矩形选区。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub unit: CropUnit,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    pub fn pixels(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: CropUnit::Pixel,
            x,
            y,
            width,
            height,
        }
    }

    pub fn percent(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: CropUnit::Percent,
            x,
            y,
            width,
            height,
        }
    }

    /// 换算为像素坐标（相对 `container`）。
    pub fn to_pixels(&self, container: Dimensions) -> CropRegion {
        match self.unit {
            CropUnit::Pixel => *self,
            CropUnit::Percent => {
                let cw = container.width as f64;
                let ch = container.height as f64;
                CropRegion::pixels(
                    self.x / 100.0 * cw,
                    self.y / 100.0 * ch,
                    self.width / 100.0 * cw,
                    self.height / 100.0 * ch,
                )
            }
        }
    }

    /// 换算为百分比坐标（相对 `container`）。
    pub fn to_percent(&self, container: Dimensions) -> CropRegion {
        match self.unit {
            CropUnit::Percent => *self,
            CropUnit::Pixel => {
                let cw = container.width as f64;
                let ch = container.height as f64;
                if cw <= 0.0 || ch <= 0.0 {
                    return CropRegion::percent(0.0, 0.0, 0.0, 0.0);
                }
                CropRegion::percent(
                    self.x / cw * 100.0,
                    self.y / ch * 100.0,
                    self.width / cw * 100.0,
                    self.height / ch * 100.0,
                )
            }
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// 按宽高比补全种子选区，并保证不越过容器边界。
///
/// 种子只给出宽度时由宽度推导高度；只给出高度时由高度推导宽度。
/// 输出单位与种子一致。
pub fn make_aspect_crop(seed: CropRegion, aspect: f64, container: Dimensions) -> CropRegion {
    let cw = container.width as f64;
    let ch = container.height as f64;
    let mut px = seed.to_pixels(container);

    if seed.width > 0.0 {
        px.height = px.width / aspect;
    }
    if seed.height > 0.0 && seed.width <= 0.0 {
        px.width = px.height * aspect;
    }

    if px.y + px.height > ch {
        px.height = ch - px.y;
        px.width = px.height * aspect;
    }
    if px.x + px.width > cw {
        px.width = cw - px.x;
        px.height = px.width / aspect;
    }

    match seed.unit {
        CropUnit::Percent => px.to_percent(container),
        CropUnit::Pixel => px,
    }
}

/// 将选区在容器内居中，尺寸不变。
pub fn center_crop(region: CropRegion, container: Dimensions) -> CropRegion {
    let mut px = region.to_pixels(container);
    px.x = (container.width as f64 - px.width) / 2.0;
    px.y = (container.height as f64 - px.height) / 2.0;

    match region.unit {
        CropUnit::Percent => px.to_percent(container),
        CropUnit::Pixel => px,
    }
}

/// 计算初始选区（百分比单位）：宽度 90%、锁定宽高比、居中。
///
/// # 示例
/// ```rust
/// use gallery_crop::crop_engine::compute_initial_crop;
///
/// let crop = compute_initial_crop(1000, 800, 1.0);
/// assert!((crop.x - 10.0).abs() < 1e-9);
/// assert!((crop.width - 80.0).abs() < 1e-9);
/// assert!((crop.height - 100.0).abs() < 1e-9);
/// ```
pub fn compute_initial_crop(natural_width: u32, natural_height: u32, aspect: f64) -> CropRegion {
    compute_initial_crop_with_percent(natural_width, natural_height, aspect, 90.0)
}

/// 同 [`compute_initial_crop`]，可指定初始宽度百分比。
pub fn compute_initial_crop_with_percent(
    natural_width: u32,
    natural_height: u32,
    aspect: f64,
    width_percent: f64,
) -> CropRegion {
    let container = Dimensions::new(natural_width, natural_height);
    if container.is_empty() || !aspect.is_finite() || aspect <= 0.0 {
        log::warn!(
            "⚠️ 初始选区参数无效，回退为整图 - 尺寸: {}x{} aspect: {}",
            natural_width,
            natural_height,
            aspect
        );
        return CropRegion::percent(0.0, 0.0, 100.0, 100.0);
    }

    let seed = CropRegion::percent(0.0, 0.0, width_percent.clamp(0.0, 100.0), 0.0);
    center_crop(make_aspect_crop(seed, aspect, container), container)
}

/// 将像素选区限制在 `bounds` 内。
///
/// 有宽高比锁定时，超出部分按比例收缩，保持 `width / height == aspect`。
pub fn contain_crop(region: CropRegion, aspect: Option<f64>, bounds: Dimensions) -> CropRegion {
    let bw = bounds.width as f64;
    let bh = bounds.height as f64;
    let mut px = region.to_pixels(bounds);

    px.width = px.width.clamp(0.0, bw);
    px.height = px.height.clamp(0.0, bh);

    if let Some(aspect) = aspect.filter(|a| a.is_finite() && *a > 0.0) {
        if px.height > 0.0 && px.width / px.height > aspect {
            px.width = px.height * aspect;
        } else {
            px.height = px.width / aspect;
        }
    }

    px.x = px.x.clamp(0.0, (bw - px.width).max(0.0));
    px.y = px.y.clamp(0.0, (bh - px.height).max(0.0));
    px
}

/// 校验完成选区的最小尺寸，恰好等于最小值视为合法。
pub fn ensure_min_size(region: &CropRegion, min_dimension: u32) -> Result<(), CropError> {
    let min = min_dimension as f64;
    if !region.is_finite() || region.width < min || region.height < min {
        return Err(CropError::RegionTooSmall {
            width: region.width,
            height: region.height,
            min: min_dimension,
        });
    }
    Ok(())
}

/// 图片以 contain 方式放入 `bounds` 时的显示尺寸，不放大。
pub fn fit_contain(natural: Dimensions, bounds: Dimensions) -> Dimensions {
    if natural.is_empty() || bounds.is_empty() {
        return natural;
    }

    let scale = (bounds.width as f64 / natural.width as f64)
        .min(bounds.height as f64 / natural.height as f64)
        .min(1.0);

    Dimensions::new(
        ((natural.width as f64 * scale).round() as u32).max(1),
        ((natural.height as f64 * scale).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn initial_crop_landscape_fixture() {
        let crop = compute_initial_crop(1000, 800, 1.0);

        assert_eq!(crop.unit, CropUnit::Percent);
        assert!(approx(crop.x, 10.0));
        assert!(approx(crop.y, 0.0));
        assert!(approx(crop.width, 80.0));
        assert!(approx(crop.height, 100.0));

        let px = crop.to_pixels(Dimensions::new(1000, 800));
        assert!(approx(px.width, 800.0));
        assert!(approx(px.height, 800.0));
    }

    #[test]
    fn initial_crop_portrait_keeps_ninety_percent_width() {
        let crop = compute_initial_crop(800, 1000, 1.0);

        assert!(approx(crop.width, 90.0));
        assert!(approx(crop.x, 5.0));
        // 720px 高，居中后上下各留 140px
        assert!(approx(crop.height, 72.0));
        assert!(approx(crop.y, 14.0));
    }

    #[test]
    fn initial_crop_square_image() {
        let crop = compute_initial_crop(500, 500, 1.0);
        assert!(approx(crop.width, 90.0));
        assert!(approx(crop.height, 90.0));
        assert!(approx(crop.x, 5.0));
        assert!(approx(crop.y, 5.0));
    }

    #[test]
    fn initial_crop_wide_aspect() {
        let crop = compute_initial_crop(1000, 1000, 2.0);
        let px = crop.to_pixels(Dimensions::new(1000, 1000));
        assert!(approx(px.width, 900.0));
        assert!(approx(px.height, 450.0));
        assert!(approx(px.y, 275.0));
    }

    #[test]
    fn initial_crop_invalid_input_falls_back_to_full_image() {
        let crop = compute_initial_crop(0, 100, 1.0);
        assert_eq!(crop, CropRegion::percent(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn unit_conversion_roundtrip() {
        let container = Dimensions::new(400, 200);
        let px = CropRegion::pixels(40.0, 20.0, 200.0, 100.0);
        let pct = px.to_percent(container);
        assert!(approx(pct.x, 10.0));
        assert!(approx(pct.height, 50.0));
        assert_eq!(pct.to_pixels(container), px);
    }

    #[test]
    fn contain_crop_clamps_position_and_keeps_aspect() {
        let bounds = Dimensions::new(300, 200);

        let moved = contain_crop(CropRegion::pixels(250.0, -10.0, 100.0, 100.0), Some(1.0), bounds);
        assert!(approx(moved.x, 200.0));
        assert!(approx(moved.y, 0.0));

        let shrunk = contain_crop(CropRegion::pixels(0.0, 0.0, 400.0, 400.0), Some(1.0), bounds);
        assert!(approx(shrunk.width, 200.0));
        assert!(approx(shrunk.height, 200.0));

        let free = contain_crop(CropRegion::pixels(0.0, 0.0, 400.0, 400.0), None, bounds);
        assert!(approx(free.width, 300.0));
        assert!(approx(free.height, 200.0));
    }

    #[test]
    fn min_size_boundary() {
        assert!(ensure_min_size(&CropRegion::pixels(0.0, 0.0, 150.0, 150.0), 150).is_ok());
        assert!(matches!(
            ensure_min_size(&CropRegion::pixels(0.0, 0.0, 149.0, 150.0), 150),
            Err(CropError::RegionTooSmall { min: 150, .. })
        ));
    }

    #[test]
    fn fit_contain_never_upscales() {
        assert_eq!(
            fit_contain(Dimensions::new(2000, 1000), Dimensions::new(500, 420)),
            Dimensions::new(500, 250)
        );
        assert_eq!(
            fit_contain(Dimensions::new(100, 80), Dimensions::new(500, 420)),
            Dimensions::new(100, 80)
        );
    }
}
