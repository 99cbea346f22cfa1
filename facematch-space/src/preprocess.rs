use std::path::Path;

use image::{imageops::FilterType, DynamicImage};

use crate::error::Result;

/// Turns an image into the raw feature vector the projection model was fit
/// on: resized, grayscale, scaled to [0, 1], flattened row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreprocessor {
    pub width: u32,
    pub height: u32,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
        }
    }
}

impl ImagePreprocessor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of every vector this preprocessor produces.
    pub fn feature_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<Vec<f32>> {
        let img = image::open(path)?;
        Ok(self.features(&img))
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let img = image::load_from_memory(bytes)?;
        Ok(self.features(&img))
    }

    pub fn features(&self, img: &DynamicImage) -> Vec<f32> {
        let gray = img
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_luma8();
        log::debug!(
            "preprocessed image: {}x{} -> {}x{}",
            img.width(),
            img.height(),
            self.width,
            self.height
        );
        gray.as_raw().iter().map(|&p| p as f32 / 255.0).collect()
    }
}
