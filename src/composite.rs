use crate::error::{BlurError, Result};
use crate::refine::{invert, Mask};
use image::{imageops, Rgb, RgbImage};
use std::fmt;

/// Strength of the background blur, 0..=30
///
/// The level is used directly as the Gaussian standard deviation in pixels.
/// 0 leaves the background untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlurLevel(u8);

impl BlurLevel {
    pub const MAX: u8 = 30;
    pub const NONE: BlurLevel = BlurLevel(0);

    pub fn new(level: u32) -> Result<Self> {
        if level > Self::MAX as u32 {
            return Err(BlurError::InvalidBlurLevel(level));
        }
        Ok(Self(level as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn sigma(self) -> f32 {
        self.0 as f32
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for BlurLevel {
    fn default() -> Self {
        Self(15)
    }
}

impl TryFrom<u32> for BlurLevel {
    type Error = BlurError;

    fn try_from(level: u32) -> Result<Self> {
        Self::new(level)
    }
}

impl fmt::Display for BlurLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Blends a sharp subject over a blurred copy of its own background
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    pub fn new() -> Self {
        Self
    }

    /// Composite `image` over its blurred copy using `mask` as foreground opacity
    ///
    /// `out = mask * sharp + (1 - mask) * blurred`, channel by channel.
    /// The input image is left untouched.
    pub fn composite(&self, image: &RgbImage, mask: &Mask, level: BlurLevel) -> Result<RgbImage> {
        let _span = tracing::debug_span!("composite", level = level.get()).entered();

        if image.dimensions() != mask.dimensions() {
            return Err(BlurError::DimensionMismatch {
                what: "mask",
                expected_width: image.width(),
                expected_height: image.height(),
                actual_width: mask.width(),
                actual_height: mask.height(),
            });
        }

        let background_weight = invert(mask);
        let background = blur_background(image, level);

        let output = RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let alpha = background_weight.get_pixel(x, y)[0].clamp(0.0, 1.0);
            let sharp = image.get_pixel(x, y);
            let blurred = background.get_pixel(x, y);
            let mut out = [0u8; 3];
            for c in 0..3 {
                let value = (1.0 - alpha) * sharp[c] as f32 + alpha * blurred[c] as f32;
                out[c] = value.round().clamp(0.0, 255.0) as u8;
            }
            Rgb(out)
        });

        Ok(output)
    }
}

/// Gaussian-blurred copy of `image`; level 0 is an exact copy
pub fn blur_background(image: &RgbImage, level: BlurLevel) -> RgbImage {
    if level.is_none() || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageops::blur(image, level.sigma())
}
