mod fixture;
#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;
pub mod types;

pub use fixture::FixedMask;
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use preprocess::Preprocessor;
pub use types::{MaskPolarity, Segment, Segmentation, SegmentationModel, MASK_KEY};

