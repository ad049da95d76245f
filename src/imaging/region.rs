use image::DynamicImage;
use tracing::debug;

use crate::config::RegionWindow;

/// Row range `[start_y, end_y)` selected by a pair of height ratios.
///
/// Returns `None` when the ratios are out of `[0, 1]` or `start >= end`.
pub fn region_rows(height: u32, start_ratio: f64, end_ratio: f64) -> Option<(u32, u32)> {
    let in_range = |v: f64| (0.0..=1.0).contains(&v);
    if !in_range(start_ratio) || !in_range(end_ratio) || start_ratio >= end_ratio {
        return None;
    }

    let start_y = ((height as f64 * start_ratio).floor() as u32).min(height);
    let end_y = ((height as f64 * end_ratio).floor() as u32).min(height);
    Some((start_y, end_y.max(start_y)))
}

/// Crops the horizontal band between `start_ratio` and `end_ratio` of the page
/// height, across the full width.
///
/// Invalid ratios yield an empty (zero-row) region rather than an error.
pub fn extract_region(image: &DynamicImage, start_ratio: f64, end_ratio: f64) -> DynamicImage {
    let (width, height) = (image.width(), image.height());

    match region_rows(height, start_ratio, end_ratio) {
        Some((start_y, end_y)) => image.crop_imm(0, start_y, width, end_y - start_y),
        None => {
            debug!(
                "Rejected region ratios {:.3}..{:.3}, returning empty region",
                start_ratio, end_ratio
            );
            image.crop_imm(0, 0, width, 0)
        }
    }
}

/// Convenience wrapper over [`extract_region`] for a configured window.
pub fn extract_window(image: &DynamicImage, window: RegionWindow) -> DynamicImage {
    extract_region(image, window.start, window.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 0])
        }))
    }

    #[test]
    fn test_extract_region() {
        let img = gradient(100, 200);
        let region = extract_region(&img, 0.25, 0.5);

        assert_eq!((region.width(), region.height()), (100, 50));
        // First row of the region is row 50 of the page
        let px = region.to_rgb8().get_pixel(10, 0).0;
        assert_eq!(px[0], 10);
        assert_eq!(px[1], 50);
    }

    #[test]
    fn test_row_count_matches_floor_difference() {
        let windows = [(0.15, 0.30), (0.25, 0.60), (0.52, 0.68), (0.0, 1.0), (0.333, 0.334)];
        for height in [1u32, 7, 99, 480, 1001, 3024] {
            let img = DynamicImage::new_luma8(13, height);
            for &(start, end) in &windows {
                let region = extract_region(&img, start, end);
                let expected =
                    (height as f64 * end).floor() as u32 - (height as f64 * start).floor() as u32;
                assert_eq!(region.height(), expected, "h={} {}..{}", height, start, end);
                assert_eq!(region.width(), 13);
            }
        }
    }

    #[test]
    fn test_invalid_ratios_give_empty_region() {
        let img = gradient(40, 40);

        assert_eq!(extract_region(&img, 0.6, 0.3).height(), 0);
        assert_eq!(extract_region(&img, 0.5, 0.5).height(), 0);
        assert_eq!(extract_region(&img, -0.1, 0.5).height(), 0);
        assert_eq!(extract_region(&img, 0.1, 1.5).height(), 0);
    }

    #[test]
    fn test_extract_window_uses_configured_ratios() {
        let img = gradient(10, 100);
        let region = extract_window(&img, RegionWindow::new(0.52, 0.68));
        assert_eq!(region.height(), 68 - 52);
    }
}
