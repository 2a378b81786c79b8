//! facereg-core: face descriptors for the identity registry.
//!
//! Defines the descriptor extractor contract used by the matching engine,
//! plus an ONNX Runtime backend: SCRFD for detection and ArcFace for
//! 512-dimensional face descriptors.

pub mod alignment;
pub mod detector;
pub mod extractor;
pub mod recognizer;
pub mod types;

pub use extractor::{encode_region, encode_source, DescriptorExtractor, ExtractError, OnnxExtractor};
pub use types::{BoundingBox, Descriptor, FaceLocation, ImageSource};

use std::path::PathBuf;

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default model directory: `$XDG_DATA_HOME/facereg/models`, falling back
/// to `~/.local/share/facereg/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facereg")
        .join("models")
}
