//! End-to-end dataset construction tests.
//!
//! Covers:
//! - Split vs. flat directory layouts
//! - Holdout validation splitting (disjointness, determinism, pipelines)
//! - train_ratio subsampling
//! - Sample loading through the built pipelines

mod common;
use common::{collect_entries, write_class_tree};

use anyhow::Result;
use data_provider::{
    Dataset, DatasetLayout, HoldoutSize, ImageNetDataProvider, ProviderConfig,
};
use std::collections::HashSet;
use tempfile::TempDir;

#[test]
fn test_split_layout_reads_train_and_val_subdirs() -> Result<()> {
    let root = TempDir::new()?;
    write_class_tree(&root.path().join("train"), &[("n01440764", 3), ("n01443537", 3)]);
    write_class_tree(&root.path().join("val"), &[("n01440764", 1), ("n01443537", 1)]);

    let config = ProviderConfig::builder(root.path())
        .image_size(16)
        .n_classes(2)
        .build()?;
    let provider = ImageNetDataProvider::new(config)?;
    let (train, valid, test) = provider.build_datasets()?;

    assert_eq!(train.len(), 6);
    assert!(valid.is_none());
    assert_eq!(test.len(), 2);
    assert!(collect_entries(&train)
        .iter()
        .all(|(path, _)| path.contains("train")));
    assert!(collect_entries(&test)
        .iter()
        .all(|(path, _)| path.contains("val")));
    Ok(())
}

#[test]
fn test_flat_layout_reads_data_dir_and_val_dir() -> Result<()> {
    let train_root = TempDir::new()?;
    let val_root = TempDir::new()?;
    write_class_tree(train_root.path(), &[("a", 2), ("b", 2), ("c", 2)]);
    write_class_tree(val_root.path(), &[("a", 1), ("b", 1), ("c", 1)]);

    let config = ProviderConfig::builder(train_root.path())
        .layout(DatasetLayout::Flat)
        .val_dir(val_root.path())
        .image_size(16)
        .n_classes(3)
        .build()?;
    let provider = ImageNetDataProvider::new(config)?;
    let (train, valid, test) = provider.build_datasets()?;

    assert_eq!(train.len(), 6);
    assert!(valid.is_none());
    assert_eq!(test.len(), 3);
    assert_eq!(train.root(), train_root.path());
    assert_eq!(test.root(), val_root.path());
    Ok(())
}

#[test]
fn test_missing_train_dir_propagates_error() -> Result<()> {
    let root = TempDir::new()?;
    // No train/ or val/ subdirectories at all.
    let config = ProviderConfig::builder(root.path()).image_size(16).build()?;
    let provider = ImageNetDataProvider::new(config)?;
    assert!(provider.build_datasets().is_err());
    Ok(())
}

#[test]
fn test_holdout_split_is_disjoint_and_exhaustive() -> Result<()> {
    let root = TempDir::new()?;
    write_class_tree(&root.path().join("train"), &[("a", 5), ("b", 5)]);
    write_class_tree(&root.path().join("val"), &[("a", 1), ("b", 1)]);

    let config = ProviderConfig::builder(root.path())
        .image_size(16)
        .valid_size(HoldoutSize::Count(3))
        .build()?;
    let provider = ImageNetDataProvider::new(config)?;
    let (train, valid, _test) = provider.build_datasets()?;
    let valid = valid.expect("holdout requested");

    assert_eq!(train.len(), 7);
    assert_eq!(valid.len(), 3);

    let train_paths: HashSet<String> =
        collect_entries(&train).into_iter().map(|(p, _)| p).collect();
    let valid_paths: HashSet<String> =
        collect_entries(&valid).into_iter().map(|(p, _)| p).collect();
    assert!(train_paths.is_disjoint(&valid_paths));
    assert_eq!(train_paths.len() + valid_paths.len(), 10);
    Ok(())
}

#[test]
fn test_holdout_split_is_deterministic() -> Result<()> {
    let root = TempDir::new()?;
    write_class_tree(&root.path().join("train"), &[("a", 6), ("b", 6)]);
    write_class_tree(&root.path().join("val"), &[("a", 1), ("b", 1)]);

    let build = || -> Result<Vec<String>> {
        let config = ProviderConfig::builder(root.path())
            .image_size(16)
            .valid_size(HoldoutSize::Fraction(0.25))
            .build()?;
        let provider = ImageNetDataProvider::new(config)?;
        let (_train, valid, _test) = provider.build_datasets()?;
        Ok(collect_entries(&valid.unwrap())
            .into_iter()
            .map(|(p, _)| p)
            .collect())
    };

    assert_eq!(build()?, build()?);
    Ok(())
}

#[test]
fn test_holdout_subset_uses_eval_pipeline() -> Result<()> {
    let root = TempDir::new()?;
    write_class_tree(&root.path().join("train"), &[("a", 4)]);
    write_class_tree(&root.path().join("val"), &[("a", 1)]);

    let config = ProviderConfig::builder(root.path())
        .image_size(16)
        .valid_size(HoldoutSize::Count(1))
        .build()?;
    let provider = ImageNetDataProvider::new(config)?;
    let (train, valid, _test) = provider.build_datasets()?;
    let valid = valid.unwrap();

    let train_stages: Vec<_> = train.pipeline().image_stages().iter().map(|s| s.name()).collect();
    let valid_stages: Vec<_> = valid.pipeline().image_stages().iter().map(|s| s.name()).collect();
    assert_eq!(train_stages, vec!["random_resized_crop", "random_horizontal_flip"]);
    assert_eq!(valid_stages, vec!["resize", "center_crop"]);
    Ok(())
}

#[test]
fn test_train_ratio_subsamples_training_set() -> Result<()> {
    let root = TempDir::new()?;
    write_class_tree(&root.path().join("train"), &[("a", 10)]);
    write_class_tree(&root.path().join("val"), &[("a", 1)]);

    let config = ProviderConfig::builder(root.path())
        .image_size(16)
        .valid_size(HoldoutSize::Count(2))
        .train_ratio(0.5)
        .build()?;
    let provider = ImageNetDataProvider::new(config)?;
    let (train, valid, _test) = provider.build_datasets()?;

    // 10 - 2 held out = 8, halved by train_ratio.
    assert_eq!(train.len(), 4);
    assert_eq!(valid.unwrap().len(), 2);
    Ok(())
}

#[test]
fn test_samples_load_through_built_pipelines() -> Result<()> {
    let root = TempDir::new()?;
    write_class_tree(&root.path().join("train"), &[("a", 2), ("b", 2)]);
    write_class_tree(&root.path().join("val"), &[("a", 1), ("b", 1)]);

    let config = ProviderConfig::builder(root.path()).image_size(16).build()?;
    let provider = ImageNetDataProvider::new(config)?;
    let (train, _valid, test) = provider.build_datasets()?;

    let sample = train.get(0)?.expect("train sample 0 exists");
    assert_eq!(sample.image.size(), vec![3, 16, 16]);
    assert_eq!(sample.label, 0);

    // Labels follow sorted class order in the test split too.
    let sample = test.get(1)?.expect("test sample 1 exists");
    assert_eq!(sample.image.size(), vec![3, 16, 16]);
    assert_eq!(sample.label, 1);
    Ok(())
}
