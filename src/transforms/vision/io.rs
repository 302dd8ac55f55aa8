use crate::transforms::Transform;
use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageReader, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use turbojpeg::{Decompressor, Image, PixelFormat};

/// Decodes images from file paths.
///
/// JPEG files (the bulk of an ImageNet tree) go through TurboJPEG; other
/// formats and malformed JPEGs fall back to the `image` crate decoder.
#[derive(Debug, Clone, Default)]
pub struct LoadImage;

impl LoadImage {
    pub fn new() -> Self {
        Self
    }

    fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage> {
        let mut decompressor = Decompressor::new().context("failed to create JPEG decompressor")?;
        let header = decompressor
            .read_header(bytes)
            .context("failed to read JPEG header")?;

        let (width, height) = (header.width, header.height);
        let mut pixels = vec![0u8; width * height * 3];
        decompressor
            .decompress(
                bytes,
                Image {
                    pixels: pixels.as_mut_slice(),
                    width,
                    height,
                    format: PixelFormat::RGB,
                    pitch: width * 3,
                },
            )
            .context("failed to decompress JPEG")?;

        let rgb = RgbImage::from_raw(width as u32, height as u32, pixels)
            .ok_or_else(|| anyhow!("JPEG decoder produced a truncated pixel buffer"))?;
        Ok(DynamicImage::ImageRgb8(rgb))
    }

    fn decode_generic(bytes: Vec<u8>, path: &Path) -> Result<DynamicImage> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("failed to decode image: {}", path.display()))
    }

    fn is_jpeg(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg"))
    }
}

impl Transform<PathBuf, DynamicImage> for LoadImage {
    fn apply(&self, path: PathBuf) -> Result<DynamicImage> {
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read image file: {}", path.display()))?;

        if Self::is_jpeg(&path) {
            match Self::decode_jpeg(&bytes) {
                Ok(img) => return Ok(img),
                Err(err) => {
                    log::warn!(
                        "TurboJPEG could not decode {}, falling back to the generic decoder: {err:#}",
                        path.display()
                    );
                }
            }
        }
        Self::decode_generic(bytes, &path)
    }
}
