use super::preprocess::Preprocessor;
use super::types::{MaskPolarity, Segment, Segmentation, SegmentationModel};
use anyhow::{bail, Context, Result};
use image::{DynamicImage, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use std::path::Path;

/// Single-image matting/segmentation model run through ONNX Runtime
///
/// Expects a model taking one `[1, 3, H, W]` RGB tensor in [0, 1] and
/// producing a foreground matte shaped `[1, 1, H, W]` or `[1, H, W]`
/// (MODNet, U²-Net and similar portrait models).
pub struct OnnxSegmenter {
    session: Session,
    preprocessor: Preprocessor,
    output_index: usize,
    polarity: MaskPolarity,
}

impl OnnxSegmenter {
    /// Load a model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `input_size` - Square inference resolution, e.g. 512
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading ONNX model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!(
            "Model loaded: {} input(s), {} output(s), inference at {}x{}",
            session.inputs.len(),
            session.outputs.len(),
            input_size,
            input_size
        );

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(input_size, input_size),
            output_index: 0,
            polarity: MaskPolarity::ForegroundHigh,
        })
    }

    /// Read the matte from a different model output (RVM-style models put it at 1)
    pub fn with_output_index(mut self, index: usize) -> Self {
        self.output_index = index;
        self
    }

    pub fn with_polarity(mut self, polarity: MaskPolarity) -> Self {
        self.polarity = polarity;
        self
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn segment(&mut self, image: &RgbImage) -> Result<Segmentation> {
        let _span = tracing::debug_span!("onnx_segment").entered();

        let input_tensor = self.preprocessor.preprocess(image);

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input_tensor.view())?])
            .context("Failed to run inference")?;
        drop(_infer_span);

        if self.output_index >= outputs.len() {
            bail!(
                "model has {} output(s), matte expected at index {}",
                outputs.len(),
                self.output_index
            );
        }

        let matte = outputs[self.output_index]
            .try_extract_array::<f32>()
            .context("Matte output is not an f32 tensor")?;

        let (matte_height, matte_width) = match matte.shape() {
            [1, 1, h, w] | [1, h, w] => (*h as u32, *w as u32),
            other => bail!("unexpected matte shape {:?}", other),
        };

        let matte_flat: Vec<f32> = matte.iter().copied().collect();

        let (frame_width, frame_height) = image.dimensions();
        let mask = Preprocessor::postprocess_matte(
            &matte_flat,
            matte_width,
            matte_height,
            frame_width,
            frame_height,
        )?;

        Ok(vec![Segment::with_mask(DynamicImage::ImageLuma8(mask)).labeled("foreground")])
    }

    fn polarity(&self) -> MaskPolarity {
        self.polarity
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
