use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::IndexError;
use crate::index::{check_dimension, VectorIndex};
use crate::types::{CollectionSpec, Point, ScoredPoint, ScrollPage};

/// In-process index using brute-force scoring under the collection metric.
/// Intended for tests and small local deployments.
pub struct MemoryIndex {
    spec: CollectionSpec,
    state: RwLock<Option<BTreeMap<Uuid, Stored>>>,
}

struct Stored {
    vector: Vec<f32>,
    name: Option<String>,
}

impl MemoryIndex {
    /// A memory index bound to `spec`. The collection exists only after
    /// [`VectorIndex::ensure_collection`].
    pub fn new(spec: CollectionSpec) -> Self {
        Self {
            spec,
            state: RwLock::new(None),
        }
    }

    /// Number of stored points (0 before the collection exists).
    pub async fn len(&self) -> usize {
        self.state.read().await.as_ref().map_or(0, |m| m.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn missing(&self) -> IndexError {
        IndexError::CollectionNotFound(self.spec.name.clone())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn ensure_collection(&self) -> Result<(), IndexError> {
        let mut state = self.state.write().await;
        if state.is_none() {
            tracing::info!(collection = %self.spec.name, shape = %self.spec.shape(), "created memory collection");
            *state = Some(BTreeMap::new());
        }
        Ok(())
    }

    async fn upsert(&self, point: Point) -> Result<(), IndexError> {
        check_dimension(&self.spec, &point.vector)?;
        let mut state = self.state.write().await;
        let points = state.as_mut().ok_or_else(|| self.missing())?;
        points.insert(
            point.id,
            Stored {
                vector: point.vector,
                name: point.name,
            },
        );
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), IndexError> {
        let mut state = self.state.write().await;
        state.as_mut().ok_or_else(|| self.missing())?.remove(&id);
        Ok(())
    }

    async fn retrieve(&self, id: Uuid) -> Result<Option<Point>, IndexError> {
        let state = self.state.read().await;
        let points = state.as_ref().ok_or_else(|| self.missing())?;
        Ok(points.get(&id).map(|s| Point {
            id,
            vector: s.vector.clone(),
            name: s.name.clone(),
        }))
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError> {
        check_dimension(&self.spec, vector)?;
        let state = self.state.read().await;
        let points = state.as_ref().ok_or_else(|| self.missing())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let metric = self.spec.metric;
        let mut hits: Vec<ScoredPoint> = points
            .iter()
            .map(|(id, s)| ScoredPoint {
                id: *id,
                score: metric.score(vector, &s.vector),
                name: s.name.clone(),
            })
            .collect();

        if metric.higher_is_better() {
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        } else {
            hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        }
        hits.truncate(k);
        Ok(hits)
    }

    async fn scroll(&self, cursor: Option<Uuid>, limit: usize) -> Result<ScrollPage, IndexError> {
        let state = self.state.read().await;
        let points = state.as_ref().ok_or_else(|| self.missing())?;
        let limit = limit.max(1);

        let mut iter = match cursor {
            Some(start) => points.range(start..),
            None => points.range(..),
        };

        let page: Vec<Point> = iter
            .by_ref()
            .take(limit)
            .map(|(id, s)| Point {
                id: *id,
                vector: s.vector.clone(),
                name: s.name.clone(),
            })
            .collect();
        let next_cursor = iter.next().map(|(id, _)| *id);

        Ok(ScrollPage {
            points: page,
            next_cursor,
        })
    }
}
