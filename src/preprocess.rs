use image::{
    imageops::{self, FilterType},
    DynamicImage, GrayImage, Luma,
};
use imageproc::stats::histogram;

use crate::config::{ContrastSetting, UpscaleFilter};

/// Preprocessing half of a strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    pub contrast: ContrastSetting,
    /// Bands shorter than this are upscaled to exactly this height.
    pub min_height: u32,
    pub upscale_filter: UpscaleFilter,
}

/// Prepare a cropped band for recognition.
///
/// Pipeline: grayscale → upscale to `min_height` (never down) →
/// contrast-limited adaptive histogram equalisation.
/// Pure and deterministic: the same band and params give the same bytes.
pub fn enhance(band: &DynamicImage, params: &PreprocessParams) -> GrayImage {
    let gray = upscale_to(band.to_luma8(), params.min_height, params.upscale_filter);
    clahe(&gray, params.contrast.clip_limit, params.contrast.tile_grid)
}

/// Isotropic upscale so that the height equals `min_height`.
pub fn upscale_to(gray: GrayImage, min_height: u32, filter: UpscaleFilter) -> GrayImage {
    let (w, h) = gray.dimensions();
    if h == 0 || w == 0 || h >= min_height {
        return gray;
    }
    let scale = min_height as f64 / h as f64;
    let new_w = ((w as f64 * scale).round() as u32).max(1);
    imageops::resize(&gray, new_w, min_height, filter_type(filter))
}

fn filter_type(filter: UpscaleFilter) -> FilterType {
    match filter {
        UpscaleFilter::Linear => FilterType::Triangle,
        UpscaleFilter::Cubic => FilterType::CatmullRom,
        UpscaleFilter::Lanczos => FilterType::Lanczos3,
    }
}

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into at most `tile_grid`×`tile_grid` tiles. Each tile
/// gets its own clipped-histogram lookup table, and every pixel blends the
/// tables of the four nearest tile centres.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let gx = tile_grid.clamp(1, w);
    let gy = tile_grid.clamp(1, h);
    let xs = tile_edges(w, gx);
    let ys = tile_edges(h, gy);

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((gx * gy) as usize);
    for ty in 0..gy as usize {
        for tx in 0..gx as usize {
            let tile = imageops::crop_imm(
                gray,
                xs[tx],
                ys[ty],
                xs[tx + 1] - xs[tx],
                ys[ty + 1] - ys[ty],
            )
            .to_image();
            luts.push(tile_lut(&tile, clip_limit));
        }
    }

    let tile_w = w as f32 / gx as f32;
    let tile_h = h as f32 / gy as f32;
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let (y0, y1, fy) = neighbours(y, tile_h, gy);
        for x in 0..w {
            let (x0, x1, fx) = neighbours(x, tile_w, gx);
            let v = gray.get_pixel(x, y)[0] as usize;
            let at = |tx: u32, ty: u32| luts[(ty * gx + tx) as usize][v] as f32;
            let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
            let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// `count + 1` integer edges splitting `len` into `count` near-equal parts.
fn tile_edges(len: u32, count: u32) -> Vec<u32> {
    (0..=count)
        .map(|i| (i as u64 * len as u64 / count as u64) as u32)
        .collect()
}

/// The two tile indices whose centres bracket `pos`, and the blend weight.
fn neighbours(pos: u32, tile: f32, count: u32) -> (u32, u32, f32) {
    let t = (pos as f32 + 0.5) / tile - 0.5;
    if t <= 0.0 {
        return (0, 0, 0.0);
    }
    let i0 = t.floor() as u32;
    if i0 >= count - 1 {
        return (count - 1, count - 1, 0.0);
    }
    (i0, i0 + 1, t - i0 as f32)
}

fn tile_lut(tile: &GrayImage, clip_limit: f32) -> [u8; 256] {
    let mut hist = histogram(tile).channels[0];
    let area = (tile.width() as u64 * tile.height() as u64).max(1);

    let limit = ((clip_limit as f64 * area as f64 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256;
    let remainder = excess % 256;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from((i as u32) < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        cdf += count as u64;
        lut[i] = ((cdf * 255 + area / 2) / area).min(255) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn params(clip_limit: f32, tile_grid: u32, min_height: u32) -> PreprocessParams {
        PreprocessParams {
            contrast: ContrastSetting {
                clip_limit,
                tile_grid,
            },
            min_height,
            upscale_filter: UpscaleFilter::Cubic,
        }
    }

    /// Low-contrast text-like pattern: dark strokes on a grey background.
    fn sample(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(width, height, |x, y| {
            let stroke = (x / 3 + y / 5) % 4 == 0;
            Luma([if stroke { 110 } else { 140 + (x % 7) as u8 }])
        }))
    }

    fn spread(img: &GrayImage) -> u8 {
        let min = img.pixels().map(|p| p[0]).min().unwrap_or(0);
        let max = img.pixels().map(|p| p[0]).max().unwrap_or(0);
        max - min
    }

    #[test]
    fn enhance_is_deterministic() {
        let band = sample(120, 37);
        let p = params(2.0, 8, 90);
        let a = enhance(&band, &p);
        let b = enhance(&band, &p);
        assert_eq!(a.as_raw(), b.as_raw());
        assert_eq!(a.dimensions(), b.dimensions());
    }

    #[test]
    fn short_band_is_upscaled_to_min_height() {
        let out = enhance(&sample(100, 25), &params(2.0, 8, 100));
        assert_eq!(out.dimensions(), (400, 100));
    }

    #[test]
    fn upscale_filter_changes_interpolation_not_size() {
        let gray = sample(30, 10).to_luma8();
        let linear = upscale_to(gray.clone(), 40, UpscaleFilter::Linear);
        let cubic = upscale_to(gray.clone(), 40, UpscaleFilter::Cubic);
        let lanczos = upscale_to(gray, 40, UpscaleFilter::Lanczos);
        for img in [&linear, &cubic, &lanczos] {
            assert_eq!(img.dimensions(), (120, 40));
        }
        assert_ne!(linear.as_raw(), cubic.as_raw());
        assert_ne!(cubic.as_raw(), lanczos.as_raw());
    }

    #[test]
    fn tall_band_is_never_downscaled() {
        let out = enhance(&sample(64, 200), &params(2.0, 8, 100));
        assert_eq!(out.dimensions(), (64, 200));
    }

    #[test]
    fn zero_min_height_keeps_size() {
        let out = enhance(&sample(10, 3), &params(3.0, 8, 0));
        assert_eq!(out.dimensions(), (10, 3));
    }

    #[test]
    fn equalisation_stretches_contrast() {
        let band = sample(96, 96);
        let before = band.to_luma8();
        let after = clahe(&before, 3.0, 4);
        assert!(spread(&after) > spread(&before));
    }

    #[test]
    fn higher_clip_limit_amplifies_more() {
        let gray = sample(96, 96).to_luma8();
        let mild = clahe(&gray, 1.0, 4);
        let strong = clahe(&gray, 4.0, 4);
        assert!(spread(&strong) >= spread(&mild));
        assert_ne!(mild.as_raw(), strong.as_raw());
    }

    #[test]
    fn tiny_images_survive_large_grids() {
        let gray = GrayImage::from_pixel(3, 2, Luma([77]));
        let out = clahe(&gray, 2.0, 16);
        assert_eq!(out.dimensions(), (3, 2));
        // A flat tile maps every pixel to the same value.
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn lut_is_monotonic() {
        let gray = sample(40, 40).to_luma8();
        let lut = tile_lut(&gray, 2.0);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lut[255], 255);
    }
}
