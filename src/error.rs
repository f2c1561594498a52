use std::fmt;
use thiserror::Error;

/// Errors produced while turning an image into a background-blurred composite
#[derive(Debug, Error)]
pub enum BlurError {
    /// The segmentation model failed to run
    #[error("segmentation failed: {message}")]
    Oracle { message: String },

    #[error("segmentation returned no usable segment{}", label_suffix(.label))]
    MissingSegment { label: Option<String> },

    #[error("segment is missing the \"{key}\" layer")]
    MissingMask { key: String },

    #[error("mask is malformed: {reason}")]
    MalformedMask { reason: String },

    #[error("{what} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        what: &'static str,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("blur level {0} is out of range 0..={max}", max = crate::composite::BlurLevel::MAX)]
    InvalidBlurLevel(u32),
}

fn label_suffix(label: &Option<String>) -> String {
    match label {
        Some(label) => format!(" labeled \"{label}\""),
        None => String::new(),
    }
}

impl BlurError {
    pub fn oracle(err: &anyhow::Error) -> Self {
        Self::Oracle {
            message: format!("{err:#}"),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMask {
            reason: reason.into(),
        }
    }

    /// True for failures attributable to the segmentation model rather than
    /// to mismatched inputs
    pub fn is_oracle_failure(&self) -> bool {
        matches!(
            self,
            Self::Oracle { .. }
                | Self::MissingSegment { .. }
                | Self::MissingMask { .. }
                | Self::MalformedMask { .. }
        )
    }
}

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Segmentation,
    Validation,
    Composition,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Segmentation => "segmentation",
            Stage::Validation => "validation",
            Stage::Composition => "composition",
        };
        f.write_str(name)
    }
}

/// Failure value returned by the pipeline in place of an image
#[derive(Debug, Error)]
#[error("{stage} stage: {source}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub source: BlurError,
}

impl PipelineFailure {
    pub fn new(stage: Stage, source: BlurError) -> Self {
        Self { stage, source }
    }

    /// Human readable description, never empty
    pub fn diagnostic(&self) -> String {
        self.to_string()
    }
}

pub type Result<T, E = BlurError> = std::result::Result<T, E>;
