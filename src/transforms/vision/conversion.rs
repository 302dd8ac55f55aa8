use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

/// Converts an image to a channel-first `f32` tensor scaled into `[0, 1]`.
///
/// Grayscale maps to `[1, H, W]`, RGB to `[3, H, W]`, RGBA to `[4, H, W]`;
/// anything else is converted to RGB first.
#[derive(Debug, Clone)]
pub struct ToTensor;

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let (height, width) = (height as i64, width as i64);

        // image stores pixels HWC; reshape to [H, W, C] then permute to CHW.
        let hwc = match img {
            DynamicImage::ImageLuma8(img) => {
                Tensor::from_slice(img.as_raw()).reshape([height, width, 1])
            }
            DynamicImage::ImageRgb8(img) => {
                Tensor::from_slice(img.as_raw()).reshape([height, width, 3])
            }
            DynamicImage::ImageRgba8(img) => {
                Tensor::from_slice(img.as_raw()).reshape([height, width, 4])
            }
            other => {
                let rgb = other.to_rgb8();
                Tensor::from_slice(rgb.as_raw()).reshape([height, width, 3])
            }
        };

        hwc.permute([2, 0, 1])
            .to_kind(Kind::Float)
            .f_div_scalar(255.0)
            .context("failed to scale pixel values into [0, 1]")
    }
}
