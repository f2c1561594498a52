use anyhow::{ensure, Result};
use image::{imageops, GrayImage, RgbImage};
use ndarray::Array4;

/// Preprocessor for converting RGB images to model input tensors and model
/// mattes back to frame-sized masks
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Lanczos3,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }

        tensor
    }

    /// Convert a model matte into a grayscale mask at the frame's dimensions
    ///
    /// Mattes already in [0, 1] are scaled directly; anything else (logits,
    /// unnormalized saliency) is min-max normalized first.
    ///
    /// # Arguments
    /// * `matte` - Flattened matte at model resolution, row-major
    /// * `matte_width` - Width of the matte
    /// * `matte_height` - Height of the matte
    /// * `target_width` - Desired output width
    /// * `target_height` - Desired output height
    pub fn postprocess_matte(
        matte: &[f32],
        matte_width: u32,
        matte_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<GrayImage> {
        let _span = tracing::debug_span!("postprocess").entered();

        ensure!(
            matte.len() == (matte_width as usize) * (matte_height as usize),
            "matte has {} values, expected {}x{}",
            matte.len(),
            matte_width,
            matte_height
        );

        let (min, max) = matte
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let (offset, scale) = if min >= 0.0 && max <= 1.0 {
            (0.0, 1.0)
        } else if max > min {
            tracing::debug!("Normalizing matte range [{:.3}, {:.3}]", min, max);
            (min, 1.0 / (max - min))
        } else {
            (min, 0.0)
        };

        let gray = GrayImage::from_fn(matte_width, matte_height, |x, y| {
            let idx = (y * matte_width + x) as usize;
            let value = ((matte[idx] - offset) * scale * 255.0).round().clamp(0.0, 255.0) as u8;
            image::Luma([value])
        });

        if (matte_width, matte_height) == (target_width, target_height) {
            return Ok(gray);
        }

        Ok(imageops::resize(
            &gray,
            target_width,
            target_height,
            imageops::FilterType::Lanczos3,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn preprocess_produces_nchw_tensor() {
        let image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
        let tensor = Preprocessor::new(4, 2).preprocess(&image);
        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(tensor[[0, 0, 1, 3]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn preprocess_resizes_to_target() {
        let image = RgbImage::new(10, 7);
        let tensor = Preprocessor::new(8, 8).preprocess(&image);
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
    }

    #[test]
    fn postprocess_scales_unit_matte() {
        let matte = [0.0, 1.0, 0.5, 1.0];
        let mask = Preprocessor::postprocess_matte(&matte, 2, 2, 2, 2).unwrap();
        assert_eq!(mask.as_raw(), &vec![0, 255, 128, 255]);
    }

    #[test]
    fn postprocess_normalizes_logits() {
        let matte = [-4.0, 4.0, 0.0, 4.0];
        let mask = Preprocessor::postprocess_matte(&matte, 2, 2, 2, 2).unwrap();
        assert_eq!(mask.as_raw(), &vec![0, 255, 128, 255]);
    }

    #[test]
    fn postprocess_resizes_to_frame() {
        let matte = vec![1.0; 16];
        let mask = Preprocessor::postprocess_matte(&matte, 4, 4, 9, 5).unwrap();
        assert_eq!(mask.dimensions(), (9, 5));
    }

    #[test]
    fn postprocess_rejects_short_matte() {
        assert!(Preprocessor::postprocess_matte(&[0.0; 3], 2, 2, 2, 2).is_err());
    }
}
