//! Descriptor extraction contract and source averaging.
//!
//! A [`DescriptorExtractor`] turns encoded image bytes into face boxes and
//! fixed-length descriptors. [`encode_source`] applies the registry rules on
//! top of it: one image yields its first face, a directory yields the mean
//! descriptor of every image that contains a face.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_DESCRIPTOR_DIM};
use crate::types::{BoundingBox, Descriptor, ImageSource};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions picked up when a directory is encoded.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("descriptor has {actual} values, extractor dimension is {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Black-box face descriptor capability.
///
/// Implementations may keep mutable inference state, so methods take
/// `&mut self`; callers serialize access (see the daemon's extractor worker).
pub trait DescriptorExtractor: Send {
    /// Length of every descriptor this extractor produces.
    fn dimension(&self) -> usize;

    /// All faces in the image, in detection order.
    fn detect(&mut self, image: &[u8]) -> Result<Vec<BoundingBox>, ExtractError>;

    /// Descriptor for `region`, or for the first detected face when no
    /// region is given. `Ok(None)` when there is no face to describe.
    fn describe(
        &mut self,
        image: &[u8],
        region: Option<&BoundingBox>,
    ) -> Result<Option<Descriptor>, ExtractError>;
}

/// One representative descriptor for `source`.
pub fn encode_source<E>(extractor: &mut E, source: &ImageSource) -> Result<Descriptor, ExtractError>
where
    E: DescriptorExtractor + ?Sized,
{
    match source {
        ImageSource::Bytes(bytes) => encode_one(extractor, bytes, None),
        ImageSource::Path(path) if path.is_dir() => encode_directory(extractor, path),
        ImageSource::Path(path) => encode_one(extractor, &read(path)?, None),
    }
}

/// Descriptor for one face region of a single image.
pub fn encode_region<E>(
    extractor: &mut E,
    image: &[u8],
    region: &BoundingBox,
) -> Result<Descriptor, ExtractError>
where
    E: DescriptorExtractor + ?Sized,
{
    encode_one(extractor, image, Some(region))
}

fn encode_one<E>(
    extractor: &mut E,
    image: &[u8],
    region: Option<&BoundingBox>,
) -> Result<Descriptor, ExtractError>
where
    E: DescriptorExtractor + ?Sized,
{
    let descriptor = extractor
        .describe(image, region)?
        .ok_or(ExtractError::NoFaceDetected)?;
    check_dimension(extractor.dimension(), &descriptor)?;
    Ok(descriptor)
}

/// Mean descriptor over every image file in `dir`; faceless images are skipped.
fn encode_directory<E>(extractor: &mut E, dir: &Path) -> Result<Descriptor, ExtractError>
where
    E: DescriptorExtractor + ?Sized,
{
    let entries = std::fs::read_dir(dir).map_err(|source| ExtractError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    files.sort();

    let mut samples = Vec::with_capacity(files.len());
    for file in &files {
        match extractor.describe(&read(file)?, None)? {
            Some(descriptor) => {
                check_dimension(extractor.dimension(), &descriptor)?;
                samples.push(descriptor);
            }
            None => tracing::debug!(path = %file.display(), "no face in image, skipped"),
        }
    }

    tracing::debug!(
        dir = %dir.display(),
        images = files.len(),
        faces = samples.len(),
        "averaged directory descriptors"
    );

    Descriptor::mean(&samples).ok_or(ExtractError::NoFaceDetected)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

fn read(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn check_dimension(expected: usize, descriptor: &Descriptor) -> Result<(), ExtractError> {
    if descriptor.len() != expected {
        return Err(ExtractError::DimensionMismatch {
            expected,
            actual: descriptor.len(),
        });
    }
    Ok(())
}

/// SCRFD + ArcFace extractor backed by ONNX Runtime.
pub struct OnnxExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxExtractor {
    /// Load both models; fails fast if either file is missing or invalid.
    pub fn load(detector_path: &str, recognizer_path: &str) -> Result<Self, ExtractError> {
        let detector = FaceDetector::load(detector_path)?;
        let recognizer = FaceRecognizer::load(recognizer_path)?;
        Ok(Self { detector, recognizer })
    }

    fn decode(image: &[u8]) -> Result<RgbImage, ExtractError> {
        let rgb = image::load_from_memory(image)?.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(ExtractError::InvalidImage("image has zero size".into()));
        }
        Ok(rgb)
    }
}

impl DescriptorExtractor for OnnxExtractor {
    fn dimension(&self) -> usize {
        ARCFACE_DESCRIPTOR_DIM
    }

    fn detect(&mut self, image: &[u8]) -> Result<Vec<BoundingBox>, ExtractError> {
        let rgb = Self::decode(image)?;
        Ok(self.detector.detect(&rgb)?)
    }

    fn describe(
        &mut self,
        image: &[u8],
        region: Option<&BoundingBox>,
    ) -> Result<Option<Descriptor>, ExtractError> {
        let rgb = Self::decode(image)?;

        let face = match region {
            Some(r) if r.landmarks.is_some() => Some(r.clone()),
            // Alignment needs landmarks: re-detect and take the best-overlapping face.
            Some(r) => best_overlap(self.detector.detect(&rgb)?, r),
            None => self.detector.detect(&rgb)?.into_iter().next(),
        };

        match face {
            Some(face) => Ok(Some(self.recognizer.extract(&rgb, &face)?)),
            None => Ok(None),
        }
    }
}

fn best_overlap(faces: Vec<BoundingBox>, region: &BoundingBox) -> Option<BoundingBox> {
    faces
        .into_iter()
        .map(|f| (f.iou(region), f))
        .filter(|(iou, _)| *iou > 0.0)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, f)| f)
}
