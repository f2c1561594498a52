//! Portrait-style background blur.
//!
//! A segmentation model separates the subject from the background; the mask is
//! thresholded and edge-smoothed, then the sharp subject is alpha-composited
//! over a Gaussian-blurred copy of the image.

pub mod composite;
pub mod error;
pub mod pipeline;
pub mod refine;
pub mod segmentation;

pub use composite::{BlurLevel, Compositor};
pub use error::{BlurError, PipelineFailure, Stage};
pub use pipeline::{BackgroundBlur, CompositeResult};
pub use refine::{Mask, MaskRefiner, RefineConfig};
pub use segmentation::{FixedMask, MaskPolarity, Segment, Segmentation, SegmentationModel, MASK_KEY};
