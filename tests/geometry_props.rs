//! 选区几何与提取尺寸的性质测试。

use gallery_crop::crop_engine::{
    CropRegion, Dimensions, MemorySurfaceFactory, SourceImage, compute_initial_crop, contain_crop,
    extract,
};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

const EPS: f64 = 1e-6;

proptest! {
    #[test]
    fn initial_crop_stays_in_bounds_and_keeps_pixel_ratio(
        width in 1u32..5000,
        height in 1u32..5000,
        aspect in 0.1f64..10.0,
    ) {
        let crop = compute_initial_crop(width, height, aspect);

        prop_assert!(crop.x >= -EPS && crop.y >= -EPS);
        prop_assert!(crop.x + crop.width <= 100.0 + EPS);
        prop_assert!(crop.y + crop.height <= 100.0 + EPS);
        prop_assert!(crop.width > 0.0 && crop.height > 0.0);

        let px = crop.to_pixels(Dimensions::new(width, height));
        let ratio = px.width / px.height;
        prop_assert!((ratio - aspect).abs() <= EPS * aspect, "ratio {} vs aspect {}", ratio, aspect);
    }

    #[test]
    fn contained_region_fits_bounds_with_locked_ratio(
        bw in 1u32..2000,
        bh in 1u32..2000,
        x in -500.0f64..2500.0,
        y in -500.0f64..2500.0,
        w in 1.0f64..3000.0,
        h in 1.0f64..3000.0,
        aspect in 0.2f64..5.0,
    ) {
        let bounds = Dimensions::new(bw, bh);
        let region = contain_crop(CropRegion::pixels(x, y, w, h), Some(aspect), bounds);

        prop_assert!(region.x >= 0.0 && region.y >= 0.0);
        prop_assert!(region.x + region.width <= bw as f64 + EPS);
        prop_assert!(region.y + region.height <= bh as f64 + EPS);
        prop_assert!(((region.width / region.height) - aspect).abs() <= EPS * aspect);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn extracted_surface_matches_truncated_region(
        nw in 1u32..200,
        nh in 1u32..200,
        dw in 1u32..200,
        dh in 1u32..200,
        fx in 0.0f64..1.0,
        fy in 0.0f64..1.0,
        w in 1.0f64..150.0,
        h in 1.0f64..150.0,
    ) {
        let image = SourceImage::from_rgba(RgbaImage::from_pixel(nw, nh, Rgba([50, 60, 70, 255])))
            .and_then(|img| img.with_displayed(Dimensions::new(dw, dh)))
            .expect("valid source");
        let region = CropRegion::pixels(fx * dw as f64, fy * dh as f64, w, h);

        let raster = extract(&image, &region, &MemorySurfaceFactory::new(u64::MAX), FilterType::Triangle)
            .expect("extract should succeed");

        prop_assert_eq!(raster.dimensions(), Dimensions::new(w.floor() as u32, h.floor() as u32));
    }
}
