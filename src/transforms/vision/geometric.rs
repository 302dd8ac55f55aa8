use crate::rng::worker_gen_range;
use crate::transforms::Transform;
use anyhow::{bail, ensure, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Candidate filters for the `"random"` interpolation mode.
const RANDOM_FILTERS: [FilterType; 2] = [FilterType::Triangle, FilterType::CatmullRom];

/// Interpolation mode selected by name.
///
/// `Fixed` modes map onto `image` filter types; `Random` picks a filter from
/// a fixed bilinear/bicubic candidate pair each time it is used, the
/// behaviour train-time pipelines request with the name `"random"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Random,
    Fixed(FilterType),
}

impl Interpolation {
    /// Looks up an interpolation mode by configuration name.
    /// Unknown names are errors, surfaced when a pipeline is built.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "random" => Interpolation::Random,
            "nearest" => Interpolation::Fixed(FilterType::Nearest),
            "bilinear" => Interpolation::Fixed(FilterType::Triangle),
            "bicubic" => Interpolation::Fixed(FilterType::CatmullRom),
            "lanczos" => Interpolation::Fixed(FilterType::Lanczos3),
            other => bail!("unknown interpolation mode: {other:?}"),
        })
    }

    /// Resolves to a concrete filter, sampling one for `Random`.
    pub fn filter(&self) -> FilterType {
        match self {
            Interpolation::Random => RANDOM_FILTERS[worker_gen_range(0..RANDOM_FILTERS.len())],
            Interpolation::Fixed(filter) => *filter,
        }
    }
}

// ============================================================================
// Resize (shorter side)
// ============================================================================

/// Resizes so the shorter image side equals `size`, preserving aspect ratio.
#[derive(Debug, Clone)]
pub struct Resize {
    size: u32,
    interpolation: Interpolation,
}

impl Resize {
    pub fn new(size: u32, interpolation: Interpolation) -> Result<Self> {
        ensure!(size > 0, "resize target must be positive (got {})", size);
        Ok(Self {
            size,
            interpolation,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Transform<DynamicImage, DynamicImage> for Resize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "cannot resize an empty image ({}x{})",
            width,
            height
        );
        let (new_width, new_height) = if width <= height {
            let scaled = (height as f64 * self.size as f64 / width as f64).round() as u32;
            (self.size, scaled.max(self.size))
        } else {
            let scaled = (width as f64 * self.size as f64 / height as f64).round() as u32;
            (scaled.max(self.size), self.size)
        };
        Ok(img.resize_exact(new_width, new_height, self.interpolation.filter()))
    }
}

// ============================================================================
// CenterCrop
// ============================================================================

/// Crops a `size`×`size` square from the image center.
///
/// The input must already be at least `size` on both sides; evaluation
/// pipelines guarantee this by resizing the shorter side to
/// `ceil(size / crop_ratio) >= size` first.
#[derive(Debug, Clone)]
pub struct CenterCrop {
    size: u32,
}

impl CenterCrop {
    pub fn new(size: u32) -> Result<Self> {
        ensure!(size > 0, "crop size must be positive (got {})", size);
        Ok(Self { size })
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Transform<DynamicImage, DynamicImage> for CenterCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width >= self.size && height >= self.size,
            "image {}x{} is smaller than center-crop size {}",
            width,
            height,
            self.size
        );
        let left = (width - self.size) / 2;
        let top = (height - self.size) / 2;
        Ok(img.crop_imm(left, top, self.size, self.size))
    }
}

// ============================================================================
// RandomResizedCrop
// ============================================================================

/// Crops a random region (random area and aspect ratio) and resizes it to a
/// square target. With multiple candidate sizes the target edge is sampled
/// per invocation, which is what progressive multi-resolution training uses.
///
/// Area scale and aspect-ratio windows are the conventional RRC defaults;
/// after `ATTEMPTS` failed samples it falls back to a center crop.
#[derive(Debug, Clone)]
pub struct RandomResizedCrop {
    sizes: Vec<u32>,
    scale: (f64, f64),
    ratio: (f64, f64),
    interpolation: Interpolation,
}

const RRC_SCALE: (f64, f64) = (0.08, 1.0);
const RRC_RATIO: (f64, f64) = (3.0 / 4.0, 4.0 / 3.0);
const RRC_ATTEMPTS: usize = 10;

impl RandomResizedCrop {
    pub fn new(sizes: Vec<u32>, interpolation: Interpolation) -> Result<Self> {
        ensure!(
            !sizes.is_empty() && sizes.iter().all(|&s| s > 0),
            "random-resized-crop needs at least one positive target size"
        );
        Ok(Self {
            sizes,
            scale: RRC_SCALE,
            ratio: RRC_RATIO,
            interpolation,
        })
    }

    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    fn target_size(&self) -> u32 {
        if self.sizes.len() == 1 {
            self.sizes[0]
        } else {
            self.sizes[worker_gen_range(0..self.sizes.len())]
        }
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomResizedCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let target = self.target_size();
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "cannot crop an empty image ({}x{})",
            width,
            height
        );
        let area = (width * height) as f64;
        let filter = self.interpolation.filter();

        for _ in 0..RRC_ATTEMPTS {
            let crop_area = area * worker_gen_range(self.scale.0..=self.scale.1);
            let aspect = worker_gen_range(self.ratio.0.ln()..=self.ratio.1.ln()).exp();
            let crop_width = (crop_area * aspect).sqrt().round() as u32;
            let crop_height = (crop_area / aspect).sqrt().round() as u32;
            if crop_width > 0 && crop_height > 0 && crop_width <= width && crop_height <= height {
                let left = worker_gen_range(0..=width - crop_width);
                let top = worker_gen_range(0..=height - crop_height);
                let crop = img.crop_imm(left, top, crop_width, crop_height);
                return Ok(crop.resize_exact(target, target, filter));
            }
        }

        // Fallback: largest centered square.
        let side = width.min(height);
        let left = (width - side) / 2;
        let top = (height - side) / 2;
        let crop = img.crop_imm(left, top, side, side);
        Ok(crop.resize_exact(target, target, filter))
    }
}
