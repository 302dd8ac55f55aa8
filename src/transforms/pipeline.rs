//! The provider's preprocessing pipeline.
//!
//! An [`ImagePipeline`] is an ordered sequence of image-space stages
//! (`DynamicImage -> DynamicImage`), an implicit tensor-conversion boundary,
//! and tensor-space stages (`Tensor -> Tensor`). The split enforces the one
//! ordering rule that matters: pixel-erasure operators work on normalized
//! tensor values, so they can only live on the tensor side, after
//! normalization.
//!
//! Stages are concrete enum variants rather than trait objects so callers
//! (and tests) can inspect the structure of a built pipeline.

use crate::transforms::vision::{
    CenterCrop, Normalize, RandAugment, RandomErasing, RandomHorizontalFlip, RandomResizedCrop,
    Resize, ToTensor,
};
use crate::transforms::Transform;
use anyhow::Result;
use image::DynamicImage;
use tch::Tensor;

/// An image-space pipeline stage.
#[derive(Debug, Clone)]
pub enum ImageStage {
    Resize(Resize),
    CenterCrop(CenterCrop),
    RandomResizedCrop(RandomResizedCrop),
    RandomHorizontalFlip(RandomHorizontalFlip),
    RandAugment(RandAugment),
}

impl ImageStage {
    pub fn name(&self) -> &'static str {
        match self {
            ImageStage::Resize(_) => "resize",
            ImageStage::CenterCrop(_) => "center_crop",
            ImageStage::RandomResizedCrop(_) => "random_resized_crop",
            ImageStage::RandomHorizontalFlip(_) => "random_horizontal_flip",
            ImageStage::RandAugment(_) => "rand_augment",
        }
    }
}

impl Transform<DynamicImage, DynamicImage> for ImageStage {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        match self {
            ImageStage::Resize(t) => t.apply(img),
            ImageStage::CenterCrop(t) => t.apply(img),
            ImageStage::RandomResizedCrop(t) => t.apply(img),
            ImageStage::RandomHorizontalFlip(t) => t.apply(img),
            ImageStage::RandAugment(t) => t.apply(img),
        }
    }
}

/// A tensor-space pipeline stage.
#[derive(Debug, Clone)]
pub enum TensorStage {
    Normalize(Normalize),
    RandomErasing(RandomErasing),
}

impl TensorStage {
    pub fn name(&self) -> &'static str {
        match self {
            TensorStage::Normalize(_) => "normalize",
            TensorStage::RandomErasing(_) => "random_erasing",
        }
    }
}

impl Transform<Tensor, Tensor> for TensorStage {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        match self {
            TensorStage::Normalize(t) => t.apply(tensor),
            TensorStage::RandomErasing(t) => t.apply(tensor),
        }
    }
}

/// Ordered image→tensor preprocessing pipeline.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    image_stages: Vec<ImageStage>,
    tensor_stages: Vec<TensorStage>,
}

impl ImagePipeline {
    pub fn new(image_stages: Vec<ImageStage>, tensor_stages: Vec<TensorStage>) -> Self {
        Self {
            image_stages,
            tensor_stages,
        }
    }

    /// Stages applied before tensor conversion, in order.
    pub fn image_stages(&self) -> &[ImageStage] {
        &self.image_stages
    }

    /// Stages applied after tensor conversion, in order.
    pub fn tensor_stages(&self) -> &[TensorStage] {
        &self.tensor_stages
    }
}

impl Transform<DynamicImage, Tensor> for ImagePipeline {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let mut img = img;
        for stage in &self.image_stages {
            img = stage.apply(img)?;
        }
        let mut tensor = ToTensor.apply(img)?;
        for stage in &self.tensor_stages {
            tensor = stage.apply(tensor)?;
        }
        Ok(tensor)
    }
}
