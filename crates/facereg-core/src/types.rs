use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bounding box for a detected face in source image pixels, with optional
/// facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Integer `(top, right, bottom, left)` location of this box.
    pub fn location(&self) -> FaceLocation {
        let px = |v: f32| v.max(0.0).round() as u32;
        FaceLocation {
            top: px(self.y),
            right: px(self.x + self.width),
            bottom: px(self.y + self.height),
            left: px(self.x),
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;

        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// Face position as `(top, right, bottom, left)` pixel edges, the tuple
/// order used by the request surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// Fixed-length face descriptor ("encoding").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }

    /// Component-wise arithmetic mean of `samples`.
    ///
    /// Returns `None` for an empty slice or when the samples disagree on length.
    pub fn mean(samples: &[Descriptor]) -> Option<Descriptor> {
        let first = samples.first()?;
        let dim = first.len();
        if samples.iter().any(|s| s.len() != dim) {
            return None;
        }

        let mut sum = vec![0.0f64; dim];
        for sample in samples {
            for (acc, v) in sum.iter_mut().zip(&sample.values) {
                *acc += f64::from(*v);
            }
        }

        let n = samples.len() as f64;
        Some(Descriptor::new(sum.into_iter().map(|v| (v / n) as f32).collect()))
    }
}

/// Where the images for one extraction come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// A single image file, or a directory whose images are averaged.
    Path(PathBuf),
}
