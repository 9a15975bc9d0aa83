//! RGBA overlay synthesis from a label mask and its object registry.
//!
//! Three overlays exist:
//! - **overview**: every object at a low alpha, background transparent
//! - **isolated**: only the current object, fully opaque
//! - **highlight**: the overview with one object raised to full alpha
//!
//! Painting is restricted to each object's bounding box, so the isolated and
//! highlight builds cost one frame allocation or copy plus one box scan.

use image::RgbaImage;

use crate::constants::{DEFAULT_LOW_ALPHA, FULL_ALPHA};
use crate::data::LabelMask;
use crate::model::{ObjectRecord, ObjectRegistry};

use super::{OverlayError, OverlayRaster};

/// Builds overlay rasters with a fixed alpha policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayCompositor {
    low_alpha: u8,
    highlight_alpha: u8,
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_ALPHA)
    }
}

impl OverlayCompositor {
    /// Compositor drawing the overview at `low_alpha`.
    pub fn new(low_alpha: u8) -> Self {
        Self {
            low_alpha,
            highlight_alpha: FULL_ALPHA,
        }
    }

    /// Override the alpha used for isolated and hovered objects.
    pub fn with_highlight_alpha(mut self, alpha: u8) -> Self {
        self.highlight_alpha = alpha;
        self
    }

    /// Alpha of objects in the overview.
    pub fn low_alpha(&self) -> u8 {
        self.low_alpha
    }

    /// Build the overview, reporting progress after each object.
    pub fn build_overview<P>(
        &self,
        mask: &LabelMask,
        registry: &ObjectRegistry,
        progress: P,
    ) -> Result<OverlayRaster, OverlayError>
    where
        P: FnMut(u8),
    {
        self.build_overview_cancellable(mask, registry, progress, || false)
    }

    /// Build the overview, checking `is_cancelled` between objects.
    ///
    /// `progress` receives integer percentages in strictly increasing order;
    /// the last value is always 100 when the build completes. A registry
    /// without objects yields a fully transparent raster.
    pub fn build_overview_cancellable<P, C>(
        &self,
        mask: &LabelMask,
        registry: &ObjectRegistry,
        mut progress: P,
        is_cancelled: C,
    ) -> Result<OverlayRaster, OverlayError>
    where
        P: FnMut(u8),
        C: Fn() -> bool,
    {
        let mut raster = OverlayRaster::transparent(mask.height(), mask.width())?;
        let total = registry.len();
        let mut last_reported: Option<u8> = None;
        let mut report = |percent: u8| {
            if last_reported.is_none_or(|last| percent > last) {
                last_reported = Some(percent);
                progress(percent);
            }
        };

        for (i, record) in registry.records().iter().enumerate() {
            if is_cancelled() {
                return Err(OverlayError::Cancelled);
            }
            let [r, g, b] = record.color;
            paint_object(&mut raster, mask, record, |px| *px = [r, g, b, self.low_alpha]);
            report(((i + 1) * 100 / total) as u8);
        }

        report(100);
        log::debug!(
            "Built {}x{} overview for {} objects",
            raster.width(),
            raster.height(),
            total
        );
        Ok(raster)
    }

    /// Raster showing only `record`, fully opaque.
    pub fn build_isolated(
        &self,
        mask: &LabelMask,
        record: &ObjectRecord,
    ) -> Result<OverlayRaster, OverlayError> {
        let mut raster = OverlayRaster::transparent(mask.height(), mask.width())?;
        let [r, g, b] = record.color;
        paint_object(&mut raster, mask, record, |px| {
            *px = [r, g, b, self.highlight_alpha]
        });
        Ok(raster)
    }

    /// Copy of `overview` with `record` raised to full alpha.
    ///
    /// Other objects keep their overview alpha.
    pub fn build_highlight(
        &self,
        overview: &OverlayRaster,
        mask: &LabelMask,
        record: &ObjectRecord,
    ) -> OverlayRaster {
        let mut raster = overview.clone();
        paint_object(&mut raster, mask, record, |px| px[3] = self.highlight_alpha);
        raster
    }
}

/// Apply `paint` to every cell of `record` inside its bounding box.
///
/// Records without pixels or bounding box are skipped.
fn paint_object<F>(raster: &mut OverlayRaster, mask: &LabelMask, record: &ObjectRecord, mut paint: F)
where
    F: FnMut(&mut [u8; 4]),
{
    if record.pixel_count == 0 {
        return;
    }
    let Some(bbox) = record.bounding_box else {
        return;
    };

    let view = mask.view();
    for row in bbox.rows() {
        for col in bbox.cols() {
            if view.get((row, col)) != Some(&record.id) {
                continue;
            }
            if let Some(mut px) = raster.pixel(row, col) {
                paint(&mut px);
                raster.set_pixel(row, col, px);
            }
        }
    }
}

/// Zero the color channels of `image` wherever `mask` holds an object.
///
/// Leaves only the background visible, for inspecting what the segmentation
/// missed. Alpha is preserved.
pub fn mask_out(image: &RgbaImage, mask: &LabelMask) -> Result<RgbaImage, OverlayError> {
    let (width, height) = image.dimensions();
    if width as usize != mask.width() || height as usize != mask.height() {
        return Err(OverlayError::DimensionMismatch {
            image: (width as usize, height as usize),
            mask: (mask.width(), mask.height()),
        });
    }

    let mut out = image.clone();
    let view = mask.view();
    for (col, row, px) in out.enumerate_pixels_mut() {
        if view[(row as usize, col as usize)] != 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_object_mask() -> LabelMask {
        LabelMask::from_rows(&[
            [1, 1, 0, 0],
            [1, 0, 0, 2],
            [0, 0, 2, 2],
        ])
        .unwrap()
    }

    #[test]
    fn test_overview_alpha_and_colors() {
        let mask = two_object_mask();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        let compositor = OverlayCompositor::default();
        let raster = compositor.build_overview(&mask, &registry, |_| {}).unwrap();

        let c1 = registry.get(1).unwrap().color;
        let c2 = registry.get(2).unwrap().color;
        for row in 0..mask.height() {
            for col in 0..mask.width() {
                let px = raster.pixel(row, col).unwrap();
                match mask.get(row, col).unwrap() {
                    0 => assert_eq!(px, [0, 0, 0, 0]),
                    1 => assert_eq!(px, [c1[0], c1[1], c1[2], DEFAULT_LOW_ALPHA]),
                    2 => assert_eq!(px, [c2[0], c2[1], c2[2], DEFAULT_LOW_ALPHA]),
                    other => panic!("unexpected id {}", other),
                }
            }
        }
    }

    #[test]
    fn test_overview_progress_strictly_increasing() {
        let rows: Vec<Vec<u32>> = vec![(1..=7).collect()];
        let mask = LabelMask::from_rows(&rows).unwrap();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        let mut seen = Vec::new();
        OverlayCompositor::default()
            .build_overview(&mask, &registry, |p| seen.push(p))
            .unwrap();

        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_overview_of_empty_registry_is_transparent() {
        let mask = LabelMask::from_rows(&[[0, 0], [0, 0]]).unwrap();
        let mut seen = Vec::new();
        let raster = OverlayCompositor::default()
            .build_overview(&mask, &ObjectRegistry::empty(), |p| seen.push(p))
            .unwrap();
        assert!(raster.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(seen, vec![100]);
    }

    #[test]
    fn test_overview_cancellation() {
        let mask = two_object_mask();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        let result = OverlayCompositor::default().build_overview_cancellable(
            &mask,
            &registry,
            |_| {},
            || true,
        );
        assert!(matches!(result, Err(OverlayError::Cancelled)));
    }

    #[test]
    fn test_isolated_shows_only_current_object() {
        let mask = two_object_mask();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        let record = registry.get(2).unwrap();
        let raster = OverlayCompositor::default()
            .build_isolated(&mask, record)
            .unwrap();

        for row in 0..mask.height() {
            for col in 0..mask.width() {
                let px = raster.pixel(row, col).unwrap();
                if mask.get(row, col) == Some(2) {
                    assert_eq!(px[3], FULL_ALPHA);
                    assert_eq!(&px[..3], &record.color);
                } else {
                    assert_eq!(px, [0, 0, 0, 0]);
                }
            }
        }
    }

    #[test]
    fn test_highlight_keeps_other_objects() {
        let mask = two_object_mask();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        let compositor = OverlayCompositor::default();
        let overview = compositor.build_overview(&mask, &registry, |_| {}).unwrap();
        let highlight = compositor.build_highlight(&overview, &mask, registry.get(2).unwrap());

        assert_eq!(highlight.pixel(2, 3).unwrap()[3], FULL_ALPHA);
        assert_eq!(highlight.pixel(0, 0).unwrap()[3], DEFAULT_LOW_ALPHA);
        assert_eq!(highlight.pixel(0, 3).unwrap(), [0, 0, 0, 0]);
        assert_eq!(&highlight.pixel(2, 3).unwrap()[..3], &overview.pixel(2, 3).unwrap()[..3]);
    }

    #[test]
    fn test_degenerate_record_is_skipped() {
        let mask = two_object_mask();
        let record = ObjectRecord {
            id: 1,
            pixel_count: 0,
            color: [1, 2, 3],
            bounding_box: None,
        };
        let raster = OverlayCompositor::default()
            .build_isolated(&mask, &record)
            .unwrap();
        assert!(raster.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mask_out_zeroes_object_pixels() {
        let mask = two_object_mask();
        let image = RgbaImage::from_pixel(4, 3, image::Rgba([50, 60, 70, 255]));
        let out = mask_out(&image, &mask).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(2, 0).0, [50, 60, 70, 255]);
    }

    #[test]
    fn test_mask_out_rejects_size_mismatch() {
        let mask = two_object_mask();
        let image = RgbaImage::new(2, 2);
        assert!(matches!(
            mask_out(&image, &mask),
            Err(OverlayError::DimensionMismatch { .. })
        ));
    }
}
