use async_trait::async_trait;
use uuid::Uuid;

use crate::error::IndexError;
use crate::types::{CollectionSpec, Point, ScoredPoint, ScrollPage};

/// Similarity-search backend holding identity points for one collection.
///
/// Each call is atomic per point id on the backend side; nothing here spans
/// more than one call. Implementations must be safe for concurrent use.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name for status reporting.
    fn backend(&self) -> &'static str;

    /// The collection this index is bound to.
    fn spec(&self) -> &CollectionSpec;

    /// Create the collection if absent. Idempotent; an existing collection
    /// with a different dimension or metric is an error.
    async fn ensure_collection(&self) -> Result<(), IndexError>;

    /// Insert or replace a point.
    async fn upsert(&self, point: Point) -> Result<(), IndexError>;

    /// Remove a point by id. Removing an absent id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), IndexError>;

    /// Fetch a point by id, `None` when it does not exist.
    async fn retrieve(&self, id: Uuid) -> Result<Option<Point>, IndexError>;

    /// Up to `k` nearest points to `vector`, best match first.
    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError>;

    /// One page of points in id order, starting at `cursor` (inclusive).
    async fn scroll(&self, cursor: Option<Uuid>, limit: usize) -> Result<ScrollPage, IndexError>;
}

/// Every point in the collection, following scroll cursors to the end.
pub async fn scroll_all(index: &dyn VectorIndex, page_size: usize) -> Result<Vec<Point>, IndexError> {
    let page_size = page_size.max(1);
    let mut points = Vec::new();
    let mut cursor = None;
    loop {
        let page = index.scroll(cursor, page_size).await?;
        points.extend(page.points);
        match page.next_cursor {
            Some(next) if Some(next) != cursor => cursor = Some(next),
            _ => break,
        }
    }
    Ok(points)
}

/// Reject vectors whose length differs from the collection dimension.
pub fn check_dimension(spec: &CollectionSpec, vector: &[f32]) -> Result<(), IndexError> {
    if vector.len() != spec.dimension {
        return Err(IndexError::DimensionMismatch {
            expected: spec.dimension,
            actual: vector.len(),
        });
    }
    Ok(())
}
