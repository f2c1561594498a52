use super::types::{MaskPolarity, Segment, Segmentation, SegmentationModel};
use anyhow::Result;
use image::{imageops, DynamicImage, GenericImageView, RgbImage};

/// A model that always answers with the same pre-computed mask
///
/// Used for masks produced elsewhere (loaded from disk by the CLI) and as a
/// deterministic stand-in for a real model in tests.
#[derive(Debug, Clone)]
pub struct FixedMask {
    mask: DynamicImage,
    polarity: MaskPolarity,
    label: Option<String>,
    fit_to_frame: bool,
}

impl FixedMask {
    pub fn new(mask: DynamicImage) -> Self {
        Self {
            mask,
            polarity: MaskPolarity::ForegroundHigh,
            label: None,
            fit_to_frame: false,
        }
    }

    pub fn with_polarity(mut self, polarity: MaskPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Resize the mask to each frame's dimensions instead of returning it verbatim
    pub fn fit_to_frame(mut self) -> Self {
        self.fit_to_frame = true;
        self
    }
}

impl SegmentationModel for FixedMask {
    fn segment(&mut self, image: &RgbImage) -> Result<Segmentation> {
        let (width, height) = image.dimensions();
        let mask = if self.fit_to_frame && self.mask.dimensions() != (width, height) {
            tracing::debug!(
                "Resizing fixed mask from {}x{} to {}x{}",
                self.mask.width(),
                self.mask.height(),
                width,
                height
            );
            let gray = self.mask.to_luma8();
            DynamicImage::ImageLuma8(imageops::resize(
                &gray,
                width,
                height,
                imageops::FilterType::Lanczos3,
            ))
        } else {
            self.mask.clone()
        };

        let mut segment = Segment::with_mask(mask);
        segment.label = self.label.clone();
        Ok(vec![segment])
    }

    fn polarity(&self) -> MaskPolarity {
        self.polarity
    }

    fn name(&self) -> &str {
        "fixed-mask"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn returns_mask_verbatim_by_default() {
        let mask = GrayImage::from_pixel(8, 8, Luma([200]));
        let mut model = FixedMask::new(DynamicImage::ImageLuma8(mask));
        let result = model.segment(&RgbImage::new(4, 4)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].mask().unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn fit_to_frame_resizes_mask() {
        let mask = GrayImage::from_pixel(8, 8, Luma([255]));
        let mut model = FixedMask::new(DynamicImage::ImageLuma8(mask)).fit_to_frame();
        let result = model.segment(&RgbImage::new(16, 4)).unwrap();
        let resized = result[0].mask().unwrap();
        assert_eq!(resized.dimensions(), (16, 4));
        assert_eq!(resized.get_pixel(8, 2)[0], 255);
    }
}
