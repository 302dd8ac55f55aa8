//! Provider configuration.
//!
//! `ProviderConfig` collects everything the provider needs to build its
//! datasets and pipelines. It can be assembled through the builder or
//! deserialized from JSON:
//!
//! ```ignore
//! let config = ProviderConfig::builder("/dataset/imagenet")
//!     .image_size(224)
//!     .valid_size(HoldoutSize::Count(25_000))
//!     .rrc_patch(RrcConfigPatch {
//!         test_crop_ratio: Some(0.95),
//!         ..Default::default()
//!     })
//!     .augment(AugmentConfig::randaug(2, 9.0))
//!     .build()?;
//! ```
//!
//! Augmentation entries are stored as-is here; whether an entry names a
//! supported operator is only checked when the train pipeline is built.

use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Resize/crop configuration shared by the train and eval pipelines.
///
/// Interpolation modes are kept as names (`"random"`, `"nearest"`,
/// `"bilinear"`, `"bicubic"`, `"lanczos"`) and resolved when a pipeline is
/// built, so an unknown name surfaces there rather than at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RrcConfig {
    pub train_interpolate: String,
    pub test_interpolate: String,
    pub test_crop_ratio: f64,
}

impl Default for RrcConfig {
    fn default() -> Self {
        Self {
            train_interpolate: "random".to_string(),
            test_interpolate: "bicubic".to_string(),
            test_crop_ratio: 1.0,
        }
    }
}

impl RrcConfig {
    /// Shallow overlay: fields set in `patch` win, unset fields keep their
    /// current value.
    pub fn merged(mut self, patch: RrcConfigPatch) -> Self {
        if let Some(train_interpolate) = patch.train_interpolate {
            self.train_interpolate = train_interpolate;
        }
        if let Some(test_interpolate) = patch.test_interpolate {
            self.test_interpolate = test_interpolate;
        }
        if let Some(test_crop_ratio) = patch.test_crop_ratio {
            self.test_crop_ratio = test_crop_ratio;
        }
        self
    }
}

/// Partial [`RrcConfig`] override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RrcConfigPatch {
    pub train_interpolate: Option<String>,
    pub test_interpolate: Option<String>,
    pub test_crop_ratio: Option<f64>,
}

/// One augmentation-spec entry: an operator name plus its parameters.
///
/// Recognized names are `"randaug"` (uses `n` ops at magnitude `m`) and
/// `"erase"` (uses probability `p`). Unknown names are rejected when the
/// train pipeline is assembled.
#[derive(Debug, Clone, Deserialize)]
pub struct AugmentConfig {
    pub name: String,
    #[serde(default)]
    pub n: Option<usize>,
    #[serde(default)]
    pub m: Option<f64>,
    #[serde(default)]
    pub p: Option<f64>,
}

impl AugmentConfig {
    /// RandAugment entry: `n` random ops per image at magnitude `m` (0..=30).
    pub fn randaug(n: usize, m: f64) -> Self {
        Self {
            name: "randaug".to_string(),
            n: Some(n),
            m: Some(m),
            p: None,
        }
    }

    /// Random-erasing entry with probability `p`.
    pub fn erase(p: f64) -> Self {
        Self {
            name: "erase".to_string(),
            n: None,
            m: None,
            p: Some(p),
        }
    }
}

/// Accepts either a single augmentation entry or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

fn deserialize_data_aug<'de, D>(deserializer: D) -> Result<Vec<AugmentConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<OneOrMany<AugmentConfig>>::deserialize(deserializer)?;
    Ok(value.map(Vec::from).unwrap_or_default())
}

/// Size of the holdout validation split carved from the training set:
/// either an absolute sample count or a fraction of the training set.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HoldoutSize {
    Count(usize),
    Fraction(f64),
}

impl HoldoutSize {
    /// Resolves to a sample count for a training set of `train_len` samples.
    pub fn resolve(self, train_len: usize) -> usize {
        match self {
            HoldoutSize::Count(n) => n,
            HoldoutSize::Fraction(f) => (f * train_len as f64).round() as usize,
        }
    }
}

/// How the corpus is laid out on disk.
///
/// Both layouts expect label-per-subdirectory image trees; they differ only
/// in where the train and test roots live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetLayout {
    /// Conventional layout: `<data_dir>/train` and `<data_dir>/val`.
    #[default]
    Split,
    /// Flat large-vocabulary layout: training classes directly under
    /// `data_dir`, test classes under a separately configured `val_dir`.
    Flat,
}

fn default_batch_size() -> usize {
    128
}

fn default_n_worker() -> usize {
    8
}

fn default_image_size() -> Vec<u32> {
    vec![224]
}

fn default_n_classes() -> usize {
    1000
}

/// Full provider configuration.
///
/// Batch sizes, worker count, replica/rank, and `drop_last` are bookkeeping
/// for the external loader that consumes the datasets; the provider itself
/// only reads the directory, layout, image-size, rrc, augmentation, and
/// split fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub val_dir: Option<PathBuf>,
    #[serde(default)]
    pub layout: DatasetLayout,
    #[serde(default = "default_n_classes")]
    pub n_classes: usize,
    #[serde(default)]
    pub rrc: RrcConfig,
    #[serde(default, deserialize_with = "deserialize_data_aug")]
    pub data_aug: Vec<AugmentConfig>,
    #[serde(default = "default_batch_size")]
    pub train_batch_size: usize,
    #[serde(default = "default_batch_size")]
    pub test_batch_size: usize,
    #[serde(default)]
    pub valid_size: Option<HoldoutSize>,
    #[serde(default = "default_n_worker")]
    pub n_worker: usize,
    /// Target image size(s). More than one entry enables progressive
    /// multi-resolution training; kept sorted ascending, the largest entry
    /// is the active evaluation size.
    #[serde(default = "default_image_size")]
    pub image_size: Vec<u32>,
    #[serde(default)]
    pub num_replicas: Option<usize>,
    #[serde(default)]
    pub rank: Option<usize>,
    #[serde(default)]
    pub train_ratio: Option<f64>,
    #[serde(default)]
    pub drop_last: bool,
}

impl ProviderConfig {
    pub fn builder(data_dir: impl Into<PathBuf>) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(data_dir)
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(
            self.rrc.test_crop_ratio > 0.0 && self.rrc.test_crop_ratio <= 1.0,
            "test_crop_ratio must be in (0.0, 1.0] (got {})",
            self.rrc.test_crop_ratio
        );
        ensure!(
            !self.image_size.is_empty() && self.image_size.iter().all(|&s| s > 0),
            "image_size must contain at least one positive size"
        );
        if let Some(ratio) = self.train_ratio {
            ensure!(
                ratio > 0.0 && ratio <= 1.0,
                "train_ratio must be in (0.0, 1.0] (got {})",
                ratio
            );
        }
        if self.layout == DatasetLayout::Flat {
            ensure!(
                self.val_dir.is_some(),
                "flat layout requires val_dir to locate the test set"
            );
        }
        Ok(())
    }
}

/// Builder for [`ProviderConfig`] with method chaining.
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: ProviderConfig {
                data_dir: data_dir.into(),
                val_dir: None,
                layout: DatasetLayout::default(),
                n_classes: default_n_classes(),
                rrc: RrcConfig::default(),
                data_aug: Vec::new(),
                train_batch_size: default_batch_size(),
                test_batch_size: default_batch_size(),
                valid_size: None,
                n_worker: default_n_worker(),
                image_size: default_image_size(),
                num_replicas: None,
                rank: None,
                train_ratio: None,
                drop_last: false,
            },
        }
    }

    /// Set the test-set directory (required for [`DatasetLayout::Flat`]).
    pub fn val_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.val_dir = Some(dir.into());
        self
    }

    pub fn layout(mut self, layout: DatasetLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn n_classes(mut self, n: usize) -> Self {
        self.config.n_classes = n;
        self
    }

    /// Overlay a partial resize/crop configuration onto the defaults.
    pub fn rrc_patch(mut self, patch: RrcConfigPatch) -> Self {
        self.config.rrc = self.config.rrc.merged(patch);
        self
    }

    /// Append an augmentation entry. Order matters: entries contribute
    /// pipeline stages in the order they were added.
    pub fn augment(mut self, aug: AugmentConfig) -> Self {
        self.config.data_aug.push(aug);
        self
    }

    pub fn train_batch_size(mut self, size: usize) -> Self {
        self.config.train_batch_size = size;
        self
    }

    pub fn test_batch_size(mut self, size: usize) -> Self {
        self.config.test_batch_size = size;
        self
    }

    pub fn valid_size(mut self, size: HoldoutSize) -> Self {
        self.config.valid_size = Some(size);
        self
    }

    pub fn n_worker(mut self, workers: usize) -> Self {
        self.config.n_worker = workers;
        self
    }

    /// Set a single target image size.
    pub fn image_size(mut self, size: u32) -> Self {
        self.config.image_size = vec![size];
        self
    }

    /// Set multiple candidate sizes for progressive multi-resolution
    /// training.
    pub fn image_sizes(mut self, sizes: Vec<u32>) -> Self {
        self.config.image_size = sizes;
        self
    }

    /// Distributed bookkeeping carried for the external loader.
    pub fn distributed(mut self, num_replicas: usize, rank: usize) -> Self {
        self.config.num_replicas = Some(num_replicas);
        self.config.rank = Some(rank);
        self
    }

    /// Train on only this fraction of the (post-holdout) training set.
    pub fn train_ratio(mut self, ratio: f64) -> Self {
        self.config.train_ratio = Some(ratio);
        self
    }

    pub fn drop_last(mut self, drop: bool) -> Self {
        self.config.drop_last = drop;
        self
    }

    pub fn build(self) -> Result<ProviderConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
