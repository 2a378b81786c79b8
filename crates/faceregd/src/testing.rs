//! Deterministic extractor used by the daemon tests.

use facereg_core::{BoundingBox, Descriptor, DescriptorExtractor, ExtractError};

/// The "image" is UTF-8 text with one face per line, each line a
/// comma-separated descriptor. Face `i` sits at `x = 10 * i`.
pub struct TextExtractor {
    dim: usize,
}

impl TextExtractor {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn faces(image: &[u8]) -> Result<Vec<Vec<f32>>, ExtractError> {
        let text =
            std::str::from_utf8(image).map_err(|e| ExtractError::InvalidImage(e.to_string()))?;
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.split(',').filter_map(|v| v.trim().parse().ok()).collect())
            .collect())
    }
}

impl DescriptorExtractor for TextExtractor {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn detect(&mut self, image: &[u8]) -> Result<Vec<BoundingBox>, ExtractError> {
        let count = Self::faces(image)?.len();
        Ok((0..count)
            .map(|i| BoundingBox {
                x: i as f32 * 10.0,
                y: 5.0,
                width: 10.0,
                height: 12.0,
                confidence: 0.9,
                landmarks: None,
            })
            .collect())
    }

    fn describe(
        &mut self,
        image: &[u8],
        region: Option<&BoundingBox>,
    ) -> Result<Option<Descriptor>, ExtractError> {
        let faces = Self::faces(image)?;
        let idx = region.map(|r| (r.x / 10.0) as usize).unwrap_or(0);
        Ok(faces.get(idx).cloned().map(Descriptor::new))
    }
}
