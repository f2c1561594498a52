use crate::composite::{BlurLevel, Compositor};
use crate::error::{BlurError, PipelineFailure, Stage};
use crate::refine::{mask_from_gray, Mask, MaskRefiner, RefineConfig};
use crate::segmentation::{MaskPolarity, Segmentation, SegmentationModel, MASK_KEY};
use image::{DynamicImage, GrayImage, RgbImage};

/// Outcome of one pipeline run: the composite or a diagnosable failure
pub type CompositeResult = Result<RgbImage, PipelineFailure>;

/// Segment, refine and composite one image at a time
///
/// Holds no per-image state; every call to [`BackgroundBlur::process`] is
/// independent of the previous ones as long as the model is.
pub struct BackgroundBlur<M> {
    model: M,
    refiner: MaskRefiner,
    compositor: Compositor,
    label: Option<String>,
}

impl<M: SegmentationModel> BackgroundBlur<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            refiner: MaskRefiner::default(),
            compositor: Compositor::new(),
            label: None,
        }
    }

    pub fn with_refine_config(mut self, config: RefineConfig) -> Self {
        self.refiner = MaskRefiner::new(config);
        self
    }

    /// Use the first segment with this label instead of the first segment
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Blur the background of `image`
    ///
    /// Never panics on model or mask problems: any failure is logged with the
    /// stage it happened in and returned as a [`PipelineFailure`].
    pub fn process(&mut self, image: &RgbImage, level: BlurLevel) -> CompositeResult {
        self.process_with_mask(image, level).map(|(composite, _)| composite)
    }

    /// Like [`BackgroundBlur::process`], also returning the refined mask the
    /// composite was blended with. The model runs once.
    pub fn process_with_mask(
        &mut self,
        image: &RgbImage,
        level: BlurLevel,
    ) -> Result<(RgbImage, Mask), PipelineFailure> {
        let _span = tracing::debug_span!(
            "process",
            width = image.width(),
            height = image.height(),
            level = level.get()
        )
        .entered();

        let result = self.run(image, level);
        match &result {
            Ok(_) => tracing::debug!("Composite ready"),
            Err(failure) => tracing::error!(
                stage = %failure.stage,
                model = self.model.name(),
                error = %failure.source,
                "Failed to process image"
            ),
        }
        result
    }

    /// Run segmentation and return the refined mask a composite would use
    pub fn refined_mask(&mut self, image: &RgbImage) -> Result<Mask, PipelineFailure> {
        let soft = self.soft_mask(image)?;
        Ok(self.refiner.refine(&soft))
    }

    fn run(
        &mut self,
        image: &RgbImage,
        level: BlurLevel,
    ) -> Result<(RgbImage, Mask), PipelineFailure> {
        let refined = self.refined_mask(image)?;
        let composite = self
            .compositor
            .composite(image, &refined, level)
            .map_err(|err| PipelineFailure::new(Stage::Composition, err))?;
        Ok((composite, refined))
    }

    fn soft_mask(&mut self, image: &RgbImage) -> Result<Mask, PipelineFailure> {
        let segmentation = {
            let _span = tracing::debug_span!("segment", model = self.model.name()).entered();
            self.model
                .segment(image)
                .map_err(|err| PipelineFailure::new(Stage::Segmentation, BlurError::oracle(&err)))?
        };
        tracing::debug!("Model returned {} segment(s)", segmentation.len());

        let raw = self
            .select_mask(&segmentation)
            .map_err(|err| PipelineFailure::new(Stage::Segmentation, err))?;

        let gray = validate_mask(raw, image).map_err(|err| {
            let stage = if err.is_oracle_failure() {
                Stage::Segmentation
            } else {
                Stage::Validation
            };
            PipelineFailure::new(stage, err)
        })?;

        let gray = match self.model.polarity() {
            MaskPolarity::ForegroundHigh => gray,
            MaskPolarity::ForegroundLow => {
                let mut flipped = gray;
                image::imageops::invert(&mut flipped);
                flipped
            }
        };

        Ok(mask_from_gray(&gray))
    }

    fn select_mask<'a>(&self, segmentation: &'a Segmentation) -> Result<&'a DynamicImage, BlurError> {
        let segment = match &self.label {
            Some(label) => segmentation
                .iter()
                .find(|segment| segment.label.as_deref() == Some(label.as_str())),
            None => segmentation.first(),
        }
        .ok_or_else(|| BlurError::MissingSegment {
            label: self.label.clone(),
        })?;

        segment.mask().ok_or_else(|| BlurError::MissingMask {
            key: MASK_KEY.to_string(),
        })
    }
}

/// Check the model's mask against the image and bring it to 8-bit grayscale
fn validate_mask(mask: &DynamicImage, image: &RgbImage) -> Result<GrayImage, BlurError> {
    let gray = match mask {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            mask.to_luma8()
        }
        other => {
            return Err(BlurError::malformed(format!(
                "expected a single-channel mask, got {:?}",
                other.color()
            )))
        }
    };

    if gray.dimensions() != image.dimensions() {
        return Err(BlurError::DimensionMismatch {
            what: "mask",
            expected_width: image.width(),
            expected_height: image.height(),
            actual_width: gray.width(),
            actual_height: gray.height(),
        });
    }

    Ok(gray)
}
