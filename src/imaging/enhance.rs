use std::borrow::Cow;

use image::{DynamicImage, GrayImage};

use super::clahe::clahe;
use crate::config::{ContrastPreset, UpscaleMethod};

/// Upscales `image` so that its height reaches `min_height`.
///
/// Both dimensions are scaled by `min_height / height`. Images that are already
/// tall enough, or have no rows at all, are returned unchanged (borrowed).
pub fn upscale_if_needed(
    image: &DynamicImage,
    min_height: u32,
    method: UpscaleMethod,
) -> Cow<'_, DynamicImage> {
    let (width, height) = (image.width(), image.height());
    if height == 0 || height >= min_height {
        return Cow::Borrowed(image);
    }

    let scale = min_height as f64 / height as f64;
    let new_width = ((width as f64 * scale).floor() as u32).max(1);

    Cow::Owned(image.resize_exact(new_width, min_height, method.filter()))
}

/// Rescales both dimensions by `factor`, truncating to whole pixels.
/// A factor of exactly 1.0 borrows the input.
pub fn rescale(image: &DynamicImage, factor: f64, method: UpscaleMethod) -> Cow<'_, DynamicImage> {
    if factor == 1.0 || image.width() == 0 || image.height() == 0 {
        return Cow::Borrowed(image);
    }

    let new_width = ((image.width() as f64 * factor).floor() as u32).max(1);
    let new_height = ((image.height() as f64 * factor).floor() as u32).max(1);

    Cow::Owned(image.resize_exact(new_width, new_height, method.filter()))
}

/// Single-channel luminance view of an image.
pub fn to_luminance(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    }
}

/// Converts to luminance and applies clip-limited adaptive equalisation.
pub fn enhance_contrast(image: &DynamicImage, preset: ContrastPreset) -> GrayImage {
    let gray = to_luminance(image);
    clahe(&gray, preset.clip_limit, preset.tile_grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};

    fn page(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_upscale_small_region() {
        let img = page(300, 100);
        let out = upscale_if_needed(&img, 800, UpscaleMethod::Cubic);

        assert!(matches!(out, Cow::Owned(_)));
        assert!(out.height() >= 800);
        assert_eq!(out.width(), 2400);
    }

    #[test]
    fn test_upscale_reaches_minimum_for_awkward_heights() {
        for height in [1u32, 3, 7, 299, 799] {
            let img = DynamicImage::new_luma8(11, height);
            for method in [UpscaleMethod::Linear, UpscaleMethod::Cubic, UpscaleMethod::Lanczos] {
                let out = upscale_if_needed(&img, 800, method);
                assert!(out.height() >= 800, "height {} -> {}", height, out.height());
            }
        }
    }

    #[test]
    fn test_tall_region_untouched() {
        let img = page(50, 900);
        let out = upscale_if_needed(&img, 800, UpscaleMethod::Cubic);

        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, &img);

        let exact = page(50, 800);
        assert_eq!(&*upscale_if_needed(&exact, 800, UpscaleMethod::Linear), &exact);
    }

    #[test]
    fn test_rescale_truncates() {
        let img = page(101, 33);
        let out = rescale(&img, 1.5, UpscaleMethod::Cubic);
        assert_eq!((out.width(), out.height()), (151, 49));

        assert!(matches!(rescale(&img, 1.0, UpscaleMethod::Cubic), Cow::Borrowed(_)));
    }

    #[test]
    fn test_enhance_contrast_outputs_gray() {
        let img = page(64, 32);
        let out = enhance_contrast(&img, ContrastPreset::new(2.0, 8));
        assert_eq!(out.dimensions(), (64, 32));
    }

    #[test]
    fn test_luminance_passthrough_for_gray() {
        let gray: GrayImage = ImageBuffer::from_fn(4, 4, |x, _| Luma([x as u8 * 10]));
        let out = to_luminance(&DynamicImage::ImageLuma8(gray.clone()));
        assert_eq!(out, gray);
    }
}
