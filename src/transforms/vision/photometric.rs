use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::Tensor;

/// Channel-wise standardization: `out[c] = (in[c] - mean[c]) / std[c]`.
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(!mean.is_empty(), "normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "mean has {} channels but std has {}",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|&s| s != 0.0),
            "normalization std must be non-zero"
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// Standard ImageNet RGB statistics.
    pub fn imagenet() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn std(&self) -> &[f32] {
        &self.std
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (channels, _height, _width) = tensor
            .size3()
            .context("normalize expects a 3D [C, H, W] tensor")?;
        ensure!(
            channels as usize == self.mean.len(),
            "input has {} channels but normalization expects {}",
            channels,
            self.mean.len()
        );

        let mean = Tensor::from_slice(&self.mean)
            .reshape([channels, 1, 1])
            .to_kind(tensor.kind());
        let std = Tensor::from_slice(&self.std)
            .reshape([channels, 1, 1])
            .to_kind(tensor.kind());
        Ok((tensor - mean) / std)
    }
}
