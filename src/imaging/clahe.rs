//! Contrast-limited adaptive histogram equalisation (CLAHE).
//!
//! The page is split into a `tile_grid x tile_grid` grid. Each tile gets its own
//! clipped, equalised lookup table and every pixel is mapped through a bilinear
//! blend of the four nearest tile tables, which avoids visible tile seams.
//! Images whose sides are not multiples of the grid are treated as if padded
//! by edge replication.

use image::{GrayImage, Luma};

const BINS: usize = 256;

/// Applies CLAHE to an 8-bit luminance image.
///
/// `clip_limit` is relative to the mean bin height (as in OpenCV): a bin may hold
/// at most `clip_limit * tile_area / 256` pixels before the excess is spread over
/// all bins. The result is deterministic for identical input and parameters.
pub fn clahe(image: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let grid = tile_grid.max(1);
    let tile_w = width.div_ceil(grid);
    let tile_h = height.div_ceil(grid);
    let tile_area = (tile_w * tile_h) as usize;

    let clip = if clip_limit > 0.0 {
        ((clip_limit * tile_area as f32 / BINS as f32) as usize).max(1)
    } else {
        0
    };

    let luts: Vec<[u8; BINS]> = (0..grid * grid)
        .map(|idx| {
            let (tx, ty) = (idx % grid, idx / grid);
            let mut hist = tile_histogram(image, tx * tile_w, ty * tile_h, tile_w, tile_h);
            if clip > 0 {
                clip_histogram(&mut hist, clip);
            }
            equalisation_lut(&hist, tile_area)
        })
        .collect();

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let last = grid as i64 - 1;

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f32;
        let (ty1, ty2) = (ty1.max(0), (ty1 + 1).min(last));

        for x in 0..width {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f32;
            let (tx1, tx2) = (tx1.max(0), (tx1 + 1).min(last));

            let v = image.get_pixel(x, y)[0] as usize;
            let lut = |tx: i64, ty: i64| luts[(ty * grid as i64 + tx) as usize][v] as f32;

            let top = lut(tx1, ty1) * (1.0 - xa) + lut(tx2, ty1) * xa;
            let bottom = lut(tx1, ty2) * (1.0 - xa) + lut(tx2, ty2) * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            output.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    output
}

/// Histogram of one tile; coordinates past the image edge replicate the border.
fn tile_histogram(image: &GrayImage, x0: u32, y0: u32, tile_w: u32, tile_h: u32) -> [usize; BINS] {
    let (width, height) = image.dimensions();
    let mut hist = [0usize; BINS];
    for y in y0..y0 + tile_h {
        let sy = y.min(height - 1);
        for x in x0..x0 + tile_w {
            let sx = x.min(width - 1);
            hist[image.get_pixel(sx, sy)[0] as usize] += 1;
        }
    }
    hist
}

/// Caps every bin at `limit` and redistributes the excess evenly, spreading the
/// remainder one pixel at a time across evenly spaced bins.
fn clip_histogram(hist: &mut [usize; BINS], limit: usize) {
    let mut clipped = 0usize;
    for bin in hist.iter_mut() {
        if *bin > limit {
            clipped += *bin - limit;
            *bin = limit;
        }
    }

    let batch = clipped / BINS;
    let mut residual = clipped - batch * BINS;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (BINS / residual).max(1);
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

fn equalisation_lut(hist: &[usize; BINS], tile_area: usize) -> [u8; BINS] {
    let scale = (BINS - 1) as f32 / tile_area as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0usize;
    for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
        sum += count;
        *entry = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
