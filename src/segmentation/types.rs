use anyhow::Result;
use image::{DynamicImage, RgbImage};
use std::collections::BTreeMap;

/// Key under which a segment stores its per-pixel mask
pub const MASK_KEY: &str = "mask";

/// Which end of the value range a model uses for the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskPolarity {
    /// 255 = foreground, 0 = background
    #[default]
    ForegroundHigh,
    /// 0 = foreground, 255 = background
    ForegroundLow,
}

/// One entry of a segmentation result
///
/// Models may attach several named layers; the pipeline only reads the one
/// stored under [`MASK_KEY`].
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub label: Option<String>,
    pub score: Option<f32>,
    pub layers: BTreeMap<String, DynamicImage>,
}

impl Segment {
    /// Create a segment holding a single grayscale mask under [`MASK_KEY`]
    pub fn with_mask(mask: DynamicImage) -> Self {
        let mut layers = BTreeMap::new();
        layers.insert(MASK_KEY.to_string(), mask);
        Self {
            label: None,
            score: None,
            layers,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn scored(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn mask(&self) -> Option<&DynamicImage> {
        self.layers.get(MASK_KEY)
    }
}

/// Everything a model returned for one image, in model order
pub type Segmentation = Vec<Segment>;

/// Trait for segmentation models
/// Allows swapping between different backends (ONNX models, fixed masks, test doubles)
///
/// Implementations are called once per image and must not rely on state from
/// earlier calls. Hosts that share one model between threads are responsible
/// for synchronizing access.
pub trait SegmentationModel {
    /// Segment an image
    ///
    /// # Returns
    /// * One or more segments whose [`MASK_KEY`] layer has the same
    ///   dimensions as `image`
    fn segment(&mut self, image: &RgbImage) -> Result<Segmentation>;

    /// Value convention of the masks this model produces
    fn polarity(&self) -> MaskPolarity {
        MaskPolarity::ForegroundHigh
    }

    /// Short name used in logs
    fn name(&self) -> &str {
        "segmentation-model"
    }
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn segment(&mut self, image: &RgbImage) -> Result<Segmentation> {
        (**self).segment(image)
    }

    fn polarity(&self) -> MaskPolarity {
        (**self).polarity()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
