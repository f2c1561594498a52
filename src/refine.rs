use image::{imageops, GrayImage, ImageBuffer, Luma};

/// Normalized single-channel mask: 0.0 = background, 1.0 = foreground
/// Dimensions match the image it was computed for
pub type Mask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Tuning for [`MaskRefiner`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineConfig {
    /// Cutoff in 0..=255 units; values strictly above become foreground
    pub threshold: u8,
    /// Standard deviation of the edge-smoothing blur in pixels, 0 disables it
    pub edge_sigma: f32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            threshold: 128,
            edge_sigma: 0.5,
        }
    }
}

/// Turns a soft model mask into a crisp silhouette with a thin anti-aliased edge
#[derive(Debug, Clone, Default)]
pub struct MaskRefiner {
    config: RefineConfig,
}

impl MaskRefiner {
    pub fn new(config: RefineConfig) -> Self {
        Self { config }
    }

    /// Threshold then smooth
    ///
    /// Pixels further than a couple of `edge_sigma` from the silhouette
    /// boundary stay at 0.0 or 1.0; only a narrow band along the boundary
    /// takes intermediate values.
    pub fn refine(&self, soft: &Mask) -> Mask {
        let _span = tracing::debug_span!("refine").entered();

        let binary = self.binarize(soft);
        if self.config.edge_sigma <= 0.0 || binary.width() == 0 || binary.height() == 0 {
            return binary;
        }

        // kernel weights can sum to a hair over 1
        let mut smoothed = imageops::blur(&binary, self.config.edge_sigma);
        for pixel in smoothed.pixels_mut() {
            pixel[0] = pixel[0].clamp(0.0, 1.0);
        }
        smoothed
    }

    /// Map every pixel to exactly 0.0 or 1.0
    pub fn binarize(&self, soft: &Mask) -> Mask {
        let cutoff = self.config.threshold as f32 / 255.0;
        let mut binary = soft.clone();
        for pixel in binary.pixels_mut() {
            pixel[0] = if pixel[0] > cutoff { 1.0 } else { 0.0 };
        }
        binary
    }
}

/// Lift an 8-bit mask into the normalized domain
pub fn mask_from_gray(gray: &GrayImage) -> Mask {
    Mask::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gray.get_pixel(x, y)[0] as f32 / 255.0])
    })
}

/// Quantize a normalized mask to 8 bits, e.g. for saving or display
pub fn mask_to_gray(mask: &Mask) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let value = (mask.get_pixel(x, y)[0] * 255.0).round().clamp(0.0, 255.0) as u8;
        Luma([value])
    })
}

/// `1 - mask` for every pixel
pub fn invert(mask: &Mask) -> Mask {
    let mut inverted = mask.clone();
    for pixel in inverted.pixels_mut() {
        pixel[0] = 1.0 - pixel[0];
    }
    inverted
}
