//! Dataset and transform-pipeline construction for ImageNet-style image
//! classification corpora.
//!
//! The entry point is [`ImageNetDataProvider`], which turns a
//! [`ProviderConfig`] into three dataset handles (train, holdout validation,
//! test) plus the train-time and eval-time preprocessing pipelines they use.
//! Batching, shuffling, and multi-worker fetching are left to the consumer;
//! this crate only builds the datasets and their transforms.

pub mod config;
pub mod dataset;
pub mod provider;
pub mod rng;
pub mod sample;
pub mod transforms;

pub use config::{
    AugmentConfig, DatasetLayout, HoldoutSize, ProviderConfig, RrcConfig, RrcConfigPatch,
};
pub use dataset::{Dataset, ImageFolderDataset};
pub use provider::ImageNetDataProvider;
pub use sample::Sample;
