use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Similarity metric of a collection, fixed at creation time.
///
/// Variant names match the Qdrant `distance` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Cosine,
    Euclid,
    Dot,
}

impl Metric {
    /// Whether a higher score means a closer match.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Metric::Euclid)
    }

    /// Score of `b` relative to `a` under this metric.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => {
                let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                let denom = na.sqrt() * nb.sqrt();
                if denom > 0.0 { dot / denom } else { 0.0 }
            }
            Metric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Metric::Euclid => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
        }
    }

    /// Bring `vector` into the form the index stores it in. Qdrant keeps
    /// Cosine vectors unit-length; other metrics store them as given.
    pub fn normalize(self, vector: &mut [f32]) {
        if self != Metric::Cosine {
            return;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
    }

    /// Whether `score` is at least as close as a vector's score against itself.
    pub fn ties_best(self, score: f32, vector: &[f32]) -> bool {
        const EPSILON: f32 = 1e-4;
        let own = self.score(vector, vector);
        if self.higher_is_better() {
            score >= own - EPSILON
        } else {
            score <= own + EPSILON
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The one collection an index instance is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, dimension: usize, metric: Metric) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
        }
    }

    /// Human-readable `size/metric` pair used in mismatch errors.
    pub fn shape(&self) -> String {
        format!("size {} / {}", self.dimension, self.metric)
    }
}

/// A stored point: identity id, descriptor, and the `name` payload field.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub name: Option<String>,
}

/// A nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub name: Option<String>,
}

/// One page of a full enumeration, ordered by point id.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<Point>,
    /// Id to resume from; `None` once the last page has been returned.
    pub next_cursor: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_scores() {
        let a = [1.0, 0.0];
        let b = [3.0, 4.0];
        assert!((Metric::Cosine.score(&a, &b) - 0.6).abs() < 1e-6);
        assert!((Metric::Dot.score(&a, &b) - 3.0).abs() < 1e-6);
        assert!((Metric::Euclid.score(&a, &b) - 20.0f32.sqrt()).abs() < 1e-6);
        assert_eq!(Metric::Cosine.score(&[0.0, 0.0], &b), 0.0);
    }

    #[test]
    fn test_normalize_only_cosine() {
        let mut v = [3.0, 4.0];
        Metric::Cosine.normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);

        let mut zero = [0.0, 0.0];
        Metric::Cosine.normalize(&mut zero);
        assert_eq!(zero, [0.0, 0.0]);

        let mut raw = [3.0, 4.0];
        Metric::Dot.normalize(&mut raw);
        assert_eq!(raw, [3.0, 4.0]);
    }

    #[test]
    fn test_ties_best() {
        let v = [0.6, 0.8];
        assert!(Metric::Cosine.ties_best(1.0, &v));
        assert!(!Metric::Cosine.ties_best(0.99, &v));
        assert!(Metric::Euclid.ties_best(0.0, &v));
        assert!(!Metric::Euclid.ties_best(0.5, &v));
    }

    #[test]
    fn test_metric_serde_names() {
        assert_eq!(serde_json::to_string(&Metric::Cosine).unwrap(), "\"Cosine\"");
        let m: Metric = serde_json::from_str("\"Euclid\"").unwrap();
        assert_eq!(m, Metric::Euclid);
        assert!(!m.higher_is_better());
    }

    #[test]
    fn test_spec_shape() {
        let spec = CollectionSpec::new("faces", 512, Metric::Cosine);
        assert_eq!(spec.shape(), "size 512 / Cosine");
    }
}
