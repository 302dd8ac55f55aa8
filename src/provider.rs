//! The ImageNet data provider.
//!
//! [`ImageNetDataProvider`] wires configuration into concrete dataset
//! handles and transform pipelines. It owns no training logic: the returned
//! datasets and the batch/worker bookkeeping in the config are consumed by
//! an external training harness.

use crate::config::{DatasetLayout, ProviderConfig};
use crate::dataset::{Dataset, ImageFolderDataset};
use crate::transforms::pipeline::{ImageStage, TensorStage};
use crate::transforms::vision::{
    CenterCrop, Interpolation, Normalize, RandAugment, RandomErasing, RandomHorizontalFlip,
    RandomResizedCrop, Resize,
};
use crate::transforms::ImagePipeline;
use anyhow::{bail, ensure, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seed for the holdout validation permutation. Fixed so the same samples
/// are held out on every run against the same corpus.
const HOLDOUT_SEED: u64 = 0;
/// Seed for train-subset sampling when `train_ratio` is set.
const SUBSET_SEED: u64 = 937_162_211;

/// Default RandAugment parameters when an entry omits them.
const RANDAUG_DEFAULT_N: usize = 2;
const RANDAUG_DEFAULT_M: f64 = 9.0;

/// Builds train/validation/test datasets and their preprocessing pipelines
/// for an ImageNet-style corpus.
pub struct ImageNetDataProvider {
    config: ProviderConfig,
    /// Candidate image sizes, sorted ascending; the largest is the active
    /// evaluation size.
    image_sizes: Vec<u32>,
    normalize: Normalize,
}

impl ImageNetDataProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let mut image_sizes = config.image_size.clone();
        image_sizes.sort_unstable();
        image_sizes.dedup();
        Ok(Self {
            config,
            image_sizes,
            normalize: Normalize::imagenet(),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The evaluation-time target size: the largest configured image size.
    pub fn active_image_size(&self) -> u32 {
        *self.image_sizes.last().expect("validated non-empty")
    }

    /// Normalization statistics shared by both pipelines.
    pub fn normalize(&self) -> &Normalize {
        &self.normalize
    }

    /// Deterministic evaluation pipeline:
    /// resize shorter side to `ceil(size / test_crop_ratio)`, center-crop to
    /// `size`, convert, normalize. Since `test_crop_ratio <= 1`, the resize
    /// target is always at least the crop size.
    pub fn build_valid_transform(&self, image_size: Option<u32>) -> Result<ImagePipeline> {
        let size = image_size.unwrap_or_else(|| self.active_image_size());
        let crop_size = (size as f64 / self.config.rrc.test_crop_ratio).ceil() as u32;
        let interpolation = Interpolation::from_name(&self.config.rrc.test_interpolate)?;
        Ok(ImagePipeline::new(
            vec![
                ImageStage::Resize(Resize::new(crop_size, interpolation)?),
                ImageStage::CenterCrop(CenterCrop::new(size)?),
            ],
            vec![TensorStage::Normalize(self.normalize.clone())],
        ))
    }

    /// Train-time pipeline: random-resized crop, random flip, then the
    /// configured augmentation entries. `"randaug"` entries run on the image
    /// before tensor conversion; `"erase"` entries run on the tensor after
    /// normalization. An unrecognized entry fails the whole build.
    pub fn build_train_transform(&self, image_sizes: Option<&[u32]>) -> Result<ImagePipeline> {
        let sizes = image_sizes.unwrap_or(&self.image_sizes).to_vec();
        let interpolation = Interpolation::from_name(&self.config.rrc.train_interpolate)?;

        let mut image_stages = vec![
            ImageStage::RandomResizedCrop(RandomResizedCrop::new(sizes, interpolation)?),
            ImageStage::RandomHorizontalFlip(RandomHorizontalFlip::new(0.5)?),
        ];
        let mut post_stages = Vec::new();

        for aug in &self.config.data_aug {
            match aug.name.as_str() {
                "randaug" => {
                    let n = aug.n.unwrap_or(RANDAUG_DEFAULT_N);
                    let m = aug.m.unwrap_or(RANDAUG_DEFAULT_M);
                    let fill = RandAugment::fill_from_mean(self.normalize.mean());
                    image_stages.push(ImageStage::RandAugment(RandAugment::new(n, m, fill)?));
                }
                "erase" => {
                    let p = aug
                        .p
                        .context("\"erase\" augmentation entry requires a probability `p`")?;
                    post_stages.push(TensorStage::RandomErasing(RandomErasing::new(p)?));
                }
                other => bail!("unsupported augmentation op: {other:?}"),
            }
        }

        let mut tensor_stages = vec![TensorStage::Normalize(self.normalize.clone())];
        tensor_stages.extend(post_stages);
        Ok(ImagePipeline::new(image_stages, tensor_stages))
    }

    /// Builds the `(train, holdout validation, test)` datasets.
    ///
    /// The holdout subset is carved from the training set with a fixed-seed
    /// permutation and uses the evaluation pipeline; it is `None` when no
    /// `valid_size` is configured. Test data comes from the layout's
    /// validation root. Directory scans happen here; errors from missing or
    /// malformed trees propagate unchanged.
    pub fn build_datasets(
        &self,
    ) -> Result<(
        ImageFolderDataset,
        Option<ImageFolderDataset>,
        ImageFolderDataset,
    )> {
        let train_transform = self.build_train_transform(None)?;
        let valid_transform = self.build_valid_transform(None)?;

        let (train_root, test_root) = match self.config.layout {
            DatasetLayout::Split => (
                self.config.data_dir.join("train"),
                self.config.data_dir.join("val"),
            ),
            DatasetLayout::Flat => (
                self.config.data_dir.clone(),
                self.config
                    .val_dir
                    .clone()
                    .context("flat layout requires val_dir")?,
            ),
        };

        let train_dataset = ImageFolderDataset::open(&train_root, train_transform)?;
        let test_dataset = ImageFolderDataset::open(&test_root, valid_transform.clone())?;
        let (train_dataset, valid_dataset) =
            self.sample_val_dataset(train_dataset, valid_transform)?;

        Ok((train_dataset, valid_dataset, test_dataset))
    }

    /// Splits a holdout validation subset off the training set and applies
    /// `train_ratio` subsampling to what remains.
    fn sample_val_dataset(
        &self,
        train: ImageFolderDataset,
        valid_transform: ImagePipeline,
    ) -> Result<(ImageFolderDataset, Option<ImageFolderDataset>)> {
        let total = train.len();

        let (mut train_indices, valid_dataset) = match self.config.valid_size {
            None => ((0..total).collect::<Vec<_>>(), None),
            Some(holdout) => {
                let n_valid = holdout.resolve(total);
                ensure!(
                    n_valid > 0 && n_valid < total,
                    "holdout size {} must leave both splits non-empty (train set has {} samples)",
                    n_valid,
                    total
                );
                let mut permutation: Vec<usize> = (0..total).collect();
                permutation.shuffle(&mut StdRng::seed_from_u64(HOLDOUT_SEED));
                let mut valid_indices = permutation[..n_valid].to_vec();
                valid_indices.sort_unstable();
                let subset = train.subset(valid_indices, valid_transform);
                (permutation[n_valid..].to_vec(), Some(subset))
            }
        };

        if let Some(ratio) = self.config.train_ratio {
            if ratio < 1.0 {
                let keep = ((train_indices.len() as f64) * ratio).round() as usize;
                ensure!(
                    keep > 0,
                    "train_ratio {} leaves an empty training set",
                    ratio
                );
                train_indices.shuffle(&mut StdRng::seed_from_u64(SUBSET_SEED));
                train_indices.truncate(keep);
            }
        }
        train_indices.sort_unstable();

        let valid_len = valid_dataset.as_ref().map_or(0, |d| d.len());
        log::debug!(
            "training split: {} train / {} holdout of {} samples",
            train_indices.len(),
            valid_len,
            total
        );

        // Skip the subset wrapper when nothing was carved out.
        let train = if train_indices.len() == total {
            train
        } else {
            let pipeline = train.pipeline().clone();
            train.subset(train_indices, pipeline)
        };
        Ok((train, valid_dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AugmentConfig, ProviderConfig, ProviderConfigBuilder, RrcConfigPatch};

    fn provider(
        configure: impl FnOnce(ProviderConfigBuilder) -> ProviderConfigBuilder,
    ) -> ImageNetDataProvider {
        let builder = ProviderConfig::builder("/data/imagenet");
        ImageNetDataProvider::new(configure(builder).build().unwrap()).unwrap()
    }

    fn stage_names(pipeline: &ImagePipeline) -> (Vec<&'static str>, Vec<&'static str>) {
        (
            pipeline.image_stages().iter().map(|s| s.name()).collect(),
            pipeline.tensor_stages().iter().map(|s| s.name()).collect(),
        )
    }

    #[test]
    fn test_valid_transform_crop_size_formula() -> Result<()> {
        let provider = provider(|b| {
            b.image_size(224).rrc_patch(RrcConfigPatch {
                test_crop_ratio: Some(0.9),
                ..Default::default()
            })
        });

        let pipeline = provider.build_valid_transform(None)?;
        let (image_names, tensor_names) = stage_names(&pipeline);
        assert_eq!(image_names, vec!["resize", "center_crop"]);
        assert_eq!(tensor_names, vec!["normalize"]);

        // ceil(224 / 0.9) = 249
        match &pipeline.image_stages()[0] {
            ImageStage::Resize(resize) => assert_eq!(resize.size(), 249),
            other => panic!("expected resize, got {}", other.name()),
        }
        match &pipeline.image_stages()[1] {
            ImageStage::CenterCrop(crop) => assert_eq!(crop.size(), 224),
            other => panic!("expected center_crop, got {}", other.name()),
        }
        Ok(())
    }

    #[test]
    fn test_valid_transform_resize_never_below_crop() -> Result<()> {
        for ratio in [0.5, 0.875, 0.95, 1.0] {
            for size in [160u32, 224, 288] {
                let provider = provider(|b| {
                    b.image_size(size).rrc_patch(RrcConfigPatch {
                        test_crop_ratio: Some(ratio),
                        ..Default::default()
                    })
                });
                let pipeline = provider.build_valid_transform(None)?;
                let resize = match &pipeline.image_stages()[0] {
                    ImageStage::Resize(resize) => resize.size(),
                    other => panic!("expected resize, got {}", other.name()),
                };
                assert!(resize >= size, "resize {resize} below crop {size}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_valid_transform_explicit_size_overrides_config() -> Result<()> {
        let provider = provider(|b| b.image_size(224));
        let pipeline = provider.build_valid_transform(Some(160))?;
        match &pipeline.image_stages()[1] {
            ImageStage::CenterCrop(crop) => assert_eq!(crop.size(), 160),
            other => panic!("expected center_crop, got {}", other.name()),
        }
        Ok(())
    }

    #[test]
    fn test_train_transform_without_augmentation() -> Result<()> {
        let provider = provider(|b| b);
        let pipeline = provider.build_train_transform(None)?;
        let (image_names, tensor_names) = stage_names(&pipeline);
        assert_eq!(
            image_names,
            vec!["random_resized_crop", "random_horizontal_flip"]
        );
        assert_eq!(tensor_names, vec!["normalize"]);
        Ok(())
    }

    #[test]
    fn test_train_transform_randaug_runs_before_tensor_conversion() -> Result<()> {
        let provider = provider(|b| b.augment(AugmentConfig::randaug(2, 9.0)));
        let pipeline = provider.build_train_transform(None)?;
        let (image_names, tensor_names) = stage_names(&pipeline);
        assert_eq!(
            image_names,
            vec!["random_resized_crop", "random_horizontal_flip", "rand_augment"]
        );
        assert_eq!(tensor_names, vec!["normalize"]);
        Ok(())
    }

    #[test]
    fn test_train_transform_erase_runs_after_normalize_only() -> Result<()> {
        let provider = provider(|b| b.augment(AugmentConfig::erase(0.25)));
        let pipeline = provider.build_train_transform(None)?;
        let (image_names, tensor_names) = stage_names(&pipeline);
        assert_eq!(
            image_names,
            vec!["random_resized_crop", "random_horizontal_flip"]
        );
        assert_eq!(tensor_names, vec!["normalize", "random_erasing"]);
        Ok(())
    }

    #[test]
    fn test_train_transform_combined_augmentation_order() -> Result<()> {
        let provider = provider(|b| {
            b.augment(AugmentConfig::randaug(2, 9.0))
                .augment(AugmentConfig::erase(0.25))
        });
        let pipeline = provider.build_train_transform(None)?;
        let (image_names, tensor_names) = stage_names(&pipeline);
        assert_eq!(
            image_names,
            vec!["random_resized_crop", "random_horizontal_flip", "rand_augment"]
        );
        assert_eq!(tensor_names, vec!["normalize", "random_erasing"]);
        Ok(())
    }

    #[test]
    fn test_unknown_augmentation_op_fails_build() {
        let provider = provider(|b| {
            b.augment(AugmentConfig {
                name: "cutmix".to_string(),
                n: None,
                m: None,
                p: None,
            })
        });
        let err = provider.build_train_transform(None).unwrap_err();
        assert!(err.to_string().contains("unsupported augmentation op"));
    }

    #[test]
    fn test_erase_without_probability_fails_build() {
        let provider = provider(|b| {
            b.augment(AugmentConfig {
                name: "erase".to_string(),
                n: None,
                m: None,
                p: None,
            })
        });
        assert!(provider.build_train_transform(None).is_err());
    }

    #[test]
    fn test_unknown_interpolation_surfaces_at_build() {
        let provider = provider(|b| {
            b.rrc_patch(RrcConfigPatch {
                test_interpolate: Some("trilinear".to_string()),
                ..Default::default()
            })
        });
        assert!(provider.build_valid_transform(None).is_err());
        // Train side still builds: it only reads train_interpolate.
        assert!(provider.build_train_transform(None).is_ok());
    }

    #[test]
    fn test_multi_resolution_sizes_reach_the_crop_stage() -> Result<()> {
        let provider = provider(|b| b.image_sizes(vec![224, 160, 192]));
        assert_eq!(provider.active_image_size(), 224);

        let pipeline = provider.build_train_transform(None)?;
        match &pipeline.image_stages()[0] {
            ImageStage::RandomResizedCrop(rrc) => assert_eq!(rrc.sizes(), &[160, 192, 224]),
            other => panic!("expected random_resized_crop, got {}", other.name()),
        }
        Ok(())
    }
}
