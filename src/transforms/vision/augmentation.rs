use crate::rng::{worker_gen_bool, worker_gen_range};
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use tch::Tensor;

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Mirrors the image horizontally with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "flip probability must be in [0.0, 1.0] (got {})",
            p
        );
        Ok(Self { p })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if self.p >= 1.0 || (self.p > 0.0 && worker_gen_bool(self.p)) {
            Ok(img.fliph())
        } else {
            Ok(img)
        }
    }
}

// ============================================================================
// RandAugment
// ============================================================================

/// The fixed operator set RandAugment samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RandAugmentOp {
    Identity,
    AutoContrast,
    Equalize,
    Solarize,
    Posterize,
    Brightness,
    Contrast,
    TranslateX,
    TranslateY,
}

const RAND_AUGMENT_OPS: [RandAugmentOp; 9] = [
    RandAugmentOp::Identity,
    RandAugmentOp::AutoContrast,
    RandAugmentOp::Equalize,
    RandAugmentOp::Solarize,
    RandAugmentOp::Posterize,
    RandAugmentOp::Brightness,
    RandAugmentOp::Contrast,
    RandAugmentOp::TranslateX,
    RandAugmentOp::TranslateY,
];

/// Maximum magnitude on the conventional 0..=30 RandAugment scale.
const MAX_MAGNITUDE: f64 = 30.0;
/// Largest translation as a fraction of the image edge, at full magnitude.
const TRANSLATE_MAX_FRACTION: f64 = 0.45;
/// Largest brightness/contrast enhancement swing at full magnitude.
const ENHANCE_MAX_SWING: f64 = 0.9;

/// Randomized augmentation policy: applies `n` operators drawn uniformly
/// from a fixed set, each at magnitude `m` (0..=30). Signed operators
/// (brightness, contrast, translation) flip direction at random per draw.
///
/// `fill` is the color written into regions a translation vacates; the
/// provider derives it from its normalization mean so filled pixels land
/// near zero after standardization.
#[derive(Debug, Clone)]
pub struct RandAugment {
    n: usize,
    m: f64,
    fill: Rgb<u8>,
}

impl RandAugment {
    pub fn new(n: usize, m: f64, fill: [u8; 3]) -> Result<Self> {
        ensure!(
            (0.0..=MAX_MAGNITUDE).contains(&m),
            "rand-augment magnitude must be in [0, {}] (got {})",
            MAX_MAGNITUDE,
            m
        );
        Ok(Self {
            n,
            m,
            fill: Rgb(fill),
        })
    }

    /// Fill color from per-channel normalization means in `[0, 1]`.
    pub fn fill_from_mean(mean: &[f32]) -> [u8; 3] {
        let channel = |i: usize| (mean.get(i).copied().unwrap_or(0.5) * 255.0).round() as u8;
        [channel(0), channel(1), channel(2)]
    }

    fn level(&self) -> f64 {
        self.m / MAX_MAGNITUDE
    }

    /// Random sign for operators that can go either direction.
    fn signed(level: f64) -> f64 {
        if worker_gen_bool(0.5) {
            level
        } else {
            -level
        }
    }

    fn apply_op(&self, op: RandAugmentOp, img: RgbImage) -> RgbImage {
        let level = self.level();
        match op {
            RandAugmentOp::Identity => img,
            RandAugmentOp::AutoContrast => auto_contrast(img),
            RandAugmentOp::Equalize => equalize(img),
            RandAugmentOp::Solarize => {
                let threshold = 255 - (level * 255.0).round() as i32;
                solarize(img, threshold.clamp(0, 255) as u8)
            }
            RandAugmentOp::Posterize => {
                let bits = 8 - (level * 4.0).round() as u8;
                posterize(img, bits.clamp(1, 8))
            }
            RandAugmentOp::Brightness => {
                enhance_brightness(img, 1.0 + Self::signed(level * ENHANCE_MAX_SWING))
            }
            RandAugmentOp::Contrast => {
                enhance_contrast(img, 1.0 + Self::signed(level * ENHANCE_MAX_SWING))
            }
            RandAugmentOp::TranslateX => {
                let (width, _) = img.dimensions();
                let shift = Self::signed(level * TRANSLATE_MAX_FRACTION) * width as f64;
                translate(img, shift.round() as i32, 0, self.fill)
            }
            RandAugmentOp::TranslateY => {
                let (_, height) = img.dimensions();
                let shift = Self::signed(level * TRANSLATE_MAX_FRACTION) * height as f64;
                translate(img, 0, shift.round() as i32, self.fill)
            }
        }
    }
}

impl Transform<DynamicImage, DynamicImage> for RandAugment {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let mut rgb = img.into_rgb8();
        for _ in 0..self.n {
            let op = RAND_AUGMENT_OPS[worker_gen_range(0..RAND_AUGMENT_OPS.len())];
            rgb = self.apply_op(op, rgb);
        }
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

fn clamp_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Stretches each channel so its observed range covers the full [0, 255].
fn auto_contrast(img: RgbImage) -> RgbImage {
    let mut lo = [255u8; 3];
    let mut hi = [0u8; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            lo[c] = lo[c].min(pixel[c]);
            hi[c] = hi[c].max(pixel[c]);
        }
    }

    let mut out = img;
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            if hi[c] > lo[c] {
                let scaled = (pixel[c] - lo[c]) as f64 * 255.0 / (hi[c] - lo[c]) as f64;
                pixel[c] = clamp_u8(scaled);
            }
        }
    }
    out
}

/// Per-channel histogram equalization.
fn equalize(img: RgbImage) -> RgbImage {
    let pixel_count = (img.width() * img.height()) as u64;
    if pixel_count == 0 {
        return img;
    }

    let mut luts = [[0u8; 256]; 3];
    for c in 0..3 {
        let mut histogram = [0u64; 256];
        for pixel in img.pixels() {
            histogram[pixel[c] as usize] += 1;
        }

        // Cumulative distribution, remapped to span [0, 255].
        let cdf_min = histogram.iter().copied().find(|&n| n > 0).unwrap_or(0);
        if cdf_min == pixel_count {
            // Single-valued channel: leave it untouched.
            for (value, entry) in luts[c].iter_mut().enumerate() {
                *entry = value as u8;
            }
            continue;
        }
        let mut cdf = 0u64;
        for (value, &count) in histogram.iter().enumerate() {
            cdf += count;
            let remapped = (cdf - cdf_min) as f64 * 255.0 / (pixel_count - cdf_min) as f64;
            luts[c][value] = clamp_u8(remapped);
        }
    }

    let mut out = img;
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            pixel[c] = luts[c][pixel[c] as usize];
        }
    }
    out
}

/// Inverts every channel value at or above `threshold`.
fn solarize(img: RgbImage, threshold: u8) -> RgbImage {
    let mut out = img;
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            if pixel[c] >= threshold {
                pixel[c] = 255 - pixel[c];
            }
        }
    }
    out
}

/// Keeps only the `bits` most significant bits of each channel.
fn posterize(img: RgbImage, bits: u8) -> RgbImage {
    let mask = 0xFFu8 << (8 - bits.clamp(1, 8));
    let mut out = img;
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            pixel[c] &= mask;
        }
    }
    out
}

/// Blends toward black (`factor < 1`) or amplifies (`factor > 1`).
fn enhance_brightness(img: RgbImage, factor: f64) -> RgbImage {
    let mut out = img;
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            pixel[c] = clamp_u8(pixel[c] as f64 * factor);
        }
    }
    out
}

/// Blends toward (`factor < 1`) or away from (`factor > 1`) the mean
/// luminance of the image.
fn enhance_contrast(img: RgbImage, factor: f64) -> RgbImage {
    let pixel_count = (img.width() * img.height()) as f64;
    if pixel_count == 0.0 {
        return img;
    }
    let mean: f64 = img
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum::<f64>()
        / pixel_count;

    let mut out = img;
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            pixel[c] = clamp_u8(mean + (pixel[c] as f64 - mean) * factor);
        }
    }
    out
}

/// Shifts the image by `(dx, dy)` pixels, filling vacated space with `fill`.
fn translate(img: RgbImage, dx: i32, dy: i32, fill: Rgb<u8>) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut out = RgbImage::from_pixel(width, height, fill);
    for (x, y, pixel) in img.enumerate_pixels() {
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if nx >= 0 && ny >= 0 && (nx as u32) < width && (ny as u32) < height {
            out.put_pixel(nx as u32, ny as u32, *pixel);
        }
    }
    out
}

// ============================================================================
// RandomErasing
// ============================================================================

/// Area-scale window for the erased rectangle, as a fraction of the image.
const ERASE_SCALE: (f64, f64) = (0.02, 1.0 / 3.0);
/// Aspect-ratio window for the erased rectangle.
const ERASE_RATIO: (f64, f64) = (0.3, 10.0 / 3.0);
const ERASE_ATTEMPTS: usize = 10;

/// With probability `p`, zeroes a random rectangle of the input tensor.
///
/// Operates on `[C, H, W]` tensors, so it must run after `ToTensor` and
/// `Normalize`: the zeroed region then sits at the per-channel mean.
#[derive(Debug, Clone)]
pub struct RandomErasing {
    p: f64,
}

impl RandomErasing {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "erase probability must be in [0.0, 1.0] (got {})",
            p
        );
        Ok(Self { p })
    }

    pub fn probability(&self) -> f64 {
        self.p
    }
}

impl Transform<Tensor, Tensor> for RandomErasing {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        if self.p == 0.0 || !worker_gen_bool(self.p) {
            return Ok(tensor);
        }

        let (_channels, height, width) = tensor
            .size3()
            .context("random erasing expects a 3D [C, H, W] tensor")?;
        let image_area = (height * width) as f64;

        for _ in 0..ERASE_ATTEMPTS {
            let erase_area = image_area * worker_gen_range(ERASE_SCALE.0..=ERASE_SCALE.1);
            let aspect = worker_gen_range(ERASE_RATIO.0.ln()..=ERASE_RATIO.1.ln()).exp();
            let erase_height = (erase_area / aspect).sqrt().round() as i64;
            let erase_width = (erase_area * aspect).sqrt().round() as i64;
            if erase_height > 0 && erase_width > 0 && erase_height < height && erase_width < width
            {
                let top = worker_gen_range(0..=height - erase_height);
                let left = worker_gen_range(0..=width - erase_width);
                let mut region = tensor
                    .narrow(1, top, erase_height)
                    .narrow(2, left, erase_width);
                let _ = region.fill_(0.0);
                break;
            }
        }
        Ok(tensor)
    }
}
