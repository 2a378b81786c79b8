//! Identity matching engine.
//!
//! Owns every rule about identities: minting ids, the dimension check,
//! verify-after-write, match thresholds and the two-step delete. All
//! identity state lives in the [`VectorIndex`]; the engine keeps nothing
//! between calls.
//!
//! Create is upsert followed by a nearest-neighbour read-back. The two
//! calls are not atomic, so a concurrent delete of the new id in between
//! shows up as a verification mismatch.

use std::path::Path;
use std::sync::Arc;

use facereg_core::{Descriptor, ExtractError, FaceLocation, ImageSource};
use facereg_index::{IndexError, Point, ScoredPoint, VectorIndex};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::extractor::ExtractorHandle;

/// Name reported for faces and points without a stored name.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("extractor thread exited")]
    ExtractorUnavailable,
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("listing failed: {0}")]
    Listing(#[source] IndexError),
    #[error("descriptor has {actual} values, collection dimension is {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("write of identity {identity_id} could not be verified")]
    VerificationFailed { identity_id: Uuid },
    #[error("{0}")]
    InvalidInput(String),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-caused: bad image, no face, bad name, rejected vector.
    InvalidInput,
    NotFound,
    /// The vector index could not be reached.
    ServiceUnavailable,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Index(IndexError::ServiceUnavailable { .. }) => ErrorKind::ServiceUnavailable,
            EngineError::Extract(_)
            | EngineError::Index(_)
            | EngineError::DimensionMismatch { .. }
            | EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::ExtractorUnavailable
            | EngineError::Listing(_)
            | EngineError::VerificationFailed { .. } => ErrorKind::Internal,
        }
    }
}

/// What to do when the read-back after a create does not return the new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyPolicy {
    /// Log a warning and report success.
    #[default]
    Warn,
    /// Remove the point again and fail the create.
    Strict,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub verify: VerifyPolicy,
    /// Hits scoring worse than this are treated as no match.
    pub min_score: Option<f32>,
    /// Page size used by [`Engine::list`].
    pub page_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            verify: VerifyPolicy::Warn,
            min_score: None,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRecord {
    pub identity_id: Uuid,
    pub name: String,
    pub descriptor: Vec<f32>,
}

impl From<Point> for IdentityRecord {
    fn from(p: Point) -> Self {
        Self {
            identity_id: p.id,
            name: p.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            descriptor: p.vector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub identity_id: Uuid,
    pub name: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Match(MatchResult),
    NoMatch,
}

/// One face found by [`Engine::detect_and_match`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedFace {
    #[serde(flatten)]
    pub location: FaceLocation,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<Uuid>,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The point was removed and is no longer retrievable.
    Confirmed,
    /// The delete was rejected or the point is still retrievable.
    NotConfirmed,
    /// No point with this id existed.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityPage {
    pub identities: Vec<IdentityRecord>,
    pub next_cursor: Option<Uuid>,
}

pub struct Engine {
    index: Arc<dyn VectorIndex>,
    extractor: ExtractorHandle,
    options: EngineOptions,
}

impl Engine {
    /// Bind an extractor to an index. Their dimensions must agree.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        extractor: ExtractorHandle,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let expected = index.spec().dimension;
        if extractor.dimension() != expected {
            return Err(EngineError::DimensionMismatch {
                expected,
                actual: extractor.dimension(),
            });
        }
        Ok(Self {
            index,
            extractor,
            options,
        })
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Register a new identity from one image or a directory of images.
    pub async fn create(&self, name: &str, source: ImageSource) -> Result<IdentityRecord, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput("name must not be empty".into()));
        }

        let descriptor = self.extractor.encode(source).await?;
        self.check_dimension(&descriptor)?;

        let identity_id = Uuid::new_v4();
        let mut vector = descriptor.into_vec();
        self.index.spec().metric.normalize(&mut vector);
        self.index
            .upsert(Point {
                id: identity_id,
                vector: vector.clone(),
                name: Some(name.to_string()),
            })
            .await?;

        self.verify_write(identity_id, &vector).await?;

        tracing::info!(%identity_id, name, "identity created");
        Ok(IdentityRecord {
            identity_id,
            name: name.to_string(),
            descriptor: vector,
        })
    }

    async fn verify_write(&self, identity_id: Uuid, vector: &[f32]) -> Result<(), EngineError> {
        let top = match self.index.nearest(vector, 1).await {
            Ok(hits) => hits.into_iter().next(),
            Err(e) => {
                tracing::warn!(%identity_id, error = %e, "read-back query failed");
                None
            }
        };
        let verified = match &top {
            Some(hit) if hit.id == identity_id => true,
            // An identical descriptor already stored ties with the new point
            // and the index may rank either first.
            Some(hit) if self.index.spec().metric.ties_best(hit.score, vector) => {
                matches!(self.index.retrieve(identity_id).await, Ok(Some(_)))
            }
            _ => false,
        };
        if verified {
            return Ok(());
        }
        let top = top.map(|h| h.id);

        match self.options.verify {
            VerifyPolicy::Warn => {
                tracing::warn!(%identity_id, found = ?top, "write verification mismatch");
                Ok(())
            }
            VerifyPolicy::Strict => {
                tracing::warn!(%identity_id, found = ?top, "write verification failed; rolling back");
                if let Err(e) = self.index.delete(identity_id).await {
                    tracing::error!(%identity_id, error = %e, "rollback delete failed");
                }
                Err(EngineError::VerificationFailed { identity_id })
            }
        }
    }

    /// Remove an identity, then confirm it is gone.
    pub async fn delete(&self, identity_id: Uuid) -> DeleteOutcome {
        match self.index.retrieve(identity_id).await {
            Ok(None) => return DeleteOutcome::NotFound,
            Ok(Some(_)) => {}
            Err(e) => {
                tracing::warn!(%identity_id, error = %e, "pre-delete lookup failed");
                return DeleteOutcome::NotConfirmed;
            }
        }

        if let Err(e) = self.index.delete(identity_id).await {
            tracing::warn!(%identity_id, error = %e, "delete rejected by index");
            return DeleteOutcome::NotConfirmed;
        }

        match self.index.retrieve(identity_id).await {
            Ok(None) => {
                tracing::info!(%identity_id, "identity deleted");
                DeleteOutcome::Confirmed
            }
            Ok(Some(_)) => {
                tracing::warn!(%identity_id, "identity still present after delete");
                DeleteOutcome::NotConfirmed
            }
            Err(e) => {
                tracing::warn!(%identity_id, error = %e, "delete confirmation failed");
                DeleteOutcome::NotConfirmed
            }
        }
    }

    /// Best single match for the face in `source`.
    pub async fn search(&self, source: ImageSource) -> Result<SearchOutcome, EngineError> {
        let descriptor = self.extractor.encode(source).await?;
        let outcome = match self.best_match(&descriptor).await? {
            Some(m) => SearchOutcome::Match(m),
            None => SearchOutcome::NoMatch,
        };
        Ok(outcome)
    }

    /// Locate every face in one image and match each independently, in
    /// detection order.
    pub async fn detect_and_match(&self, source: ImageSource) -> Result<Vec<DetectedFace>, EngineError> {
        let image: Arc<[u8]> = match source {
            ImageSource::Bytes(bytes) => bytes.into(),
            ImageSource::Path(path) => read_single_image(&path).await?.into(),
        };

        let boxes = self.extractor.detect(image.clone()).await?;
        let mut faces = Vec::with_capacity(boxes.len());
        for region in boxes {
            let location = region.location();
            let descriptor = self.extractor.encode_region(image.clone(), region).await?;
            let face = match self.best_match(&descriptor).await? {
                Some(m) => DetectedFace {
                    location,
                    name: m.name,
                    identity_id: Some(m.identity_id),
                    score: m.score,
                },
                None => DetectedFace {
                    location,
                    name: UNKNOWN_NAME.to_string(),
                    identity_id: None,
                    score: 0.0,
                },
            };
            faces.push(face);
        }
        tracing::debug!(faces = faces.len(), "detect and match");
        Ok(faces)
    }

    /// One page of identities in index order, starting at `cursor`.
    pub async fn list_page(&self, cursor: Option<Uuid>, limit: usize) -> Result<IdentityPage, EngineError> {
        let page = self
            .index
            .scroll(cursor, limit.max(1))
            .await
            .map_err(EngineError::Listing)?;
        Ok(IdentityPage {
            identities: page.points.into_iter().map(IdentityRecord::from).collect(),
            next_cursor: page.next_cursor,
        })
    }

    /// Every identity in the index.
    pub async fn list(&self) -> Result<Vec<IdentityRecord>, EngineError> {
        let points = facereg_index::scroll_all(self.index.as_ref(), self.options.page_size)
            .await
            .map_err(EngineError::Listing)?;
        Ok(points.into_iter().map(IdentityRecord::from).collect())
    }

    async fn best_match(&self, descriptor: &Descriptor) -> Result<Option<MatchResult>, EngineError> {
        self.check_dimension(descriptor)?;
        let hit = self.index.nearest(descriptor.as_slice(), 1).await?.into_iter().next();
        Ok(hit.filter(|h| self.passes_threshold(h)).map(|h| MatchResult {
            identity_id: h.id,
            name: h.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            score: h.score,
        }))
    }

    fn passes_threshold(&self, hit: &ScoredPoint) -> bool {
        let Some(min) = self.options.min_score else {
            return true;
        };
        let ok = if self.index.spec().metric.higher_is_better() {
            hit.score >= min
        } else {
            hit.score <= min
        };
        if !ok {
            tracing::debug!(identity_id = %hit.id, score = hit.score, min, "best hit below threshold");
        }
        ok
    }

    fn check_dimension(&self, descriptor: &Descriptor) -> Result<(), EngineError> {
        let expected = self.index.spec().dimension;
        if descriptor.len() != expected {
            return Err(EngineError::DimensionMismatch {
                expected,
                actual: descriptor.len(),
            });
        }
        Ok(())
    }
}

async fn read_single_image(path: &Path) -> Result<Vec<u8>, EngineError> {
    if path.is_dir() {
        return Err(EngineError::InvalidInput(
            "face detection takes a single image".into(),
        ));
    }
    tokio::fs::read(path).await.map_err(|source| {
        EngineError::Extract(ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::spawn_extractor;
    use crate::testing::TextExtractor;
    use async_trait::async_trait;
    use facereg_index::{CollectionSpec, MemoryIndex, Metric, ScrollPage};

    fn img(text: &str) -> ImageSource {
        ImageSource::Bytes(text.as_bytes().to_vec())
    }

    async fn memory(dim: usize) -> Arc<MemoryIndex> {
        let idx = Arc::new(MemoryIndex::new(CollectionSpec::new("faces", dim, Metric::Cosine)));
        idx.ensure_collection().await.unwrap();
        idx
    }

    fn engine_on(index: Arc<dyn VectorIndex>, options: EngineOptions) -> Engine {
        let dim = index.spec().dimension;
        let extractor = spawn_extractor(TextExtractor::new(dim)).unwrap();
        Engine::new(index, extractor, options).unwrap()
    }

    async fn engine(options: EngineOptions) -> (Engine, Arc<MemoryIndex>) {
        let idx = memory(3).await;
        (engine_on(idx.clone(), options), idx)
    }

    /// Wraps a memory index with injectable misbehaviour.
    struct Faulty {
        inner: Arc<MemoryIndex>,
        ignore_deletes: bool,
        blind_search: bool,
    }

    #[async_trait]
    impl VectorIndex for Faulty {
        fn backend(&self) -> &'static str {
            "faulty"
        }
        fn spec(&self) -> &CollectionSpec {
            self.inner.spec()
        }
        async fn ensure_collection(&self) -> Result<(), IndexError> {
            self.inner.ensure_collection().await
        }
        async fn upsert(&self, point: Point) -> Result<(), IndexError> {
            self.inner.upsert(point).await
        }
        async fn delete(&self, id: Uuid) -> Result<(), IndexError> {
            if self.ignore_deletes {
                return Ok(());
            }
            self.inner.delete(id).await
        }
        async fn retrieve(&self, id: Uuid) -> Result<Option<Point>, IndexError> {
            self.inner.retrieve(id).await
        }
        async fn nearest(&self, v: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError> {
            if self.blind_search {
                return Ok(Vec::new());
            }
            self.inner.nearest(v, k).await
        }
        async fn scroll(&self, c: Option<Uuid>, l: usize) -> Result<ScrollPage, IndexError> {
            self.inner.scroll(c, l).await
        }
    }

    #[tokio::test]
    async fn test_create_then_search_round_trip() {
        let (engine, _) = engine(EngineOptions::default()).await;
        let alice = engine.create("Alice", img("1,0,0")).await.unwrap();
        engine.create("Bob", img("0,1,0")).await.unwrap();

        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.descriptor, vec![1.0, 0.0, 0.0]);

        match engine.search(img("1,0,0")).await.unwrap() {
            SearchOutcome::Match(m) => {
                assert_eq!(m.identity_id, alice.identity_id);
                assert_eq!(m.name, "Alice");
                assert!((m.score - 1.0).abs() < 1e-6);
            }
            SearchOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn test_create_mints_fresh_ids() {
        let (engine, idx) = engine(EngineOptions::default()).await;
        let a = engine.create("Same", img("1,0,0")).await.unwrap();
        engine.delete(a.identity_id).await;
        let b = engine.create("Same", img("1,0,0")).await.unwrap();
        assert_ne!(a.identity_id, b.identity_id);
        assert_eq!(idx.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_averages_directory() {
        let (engine, _) = engine(EngineOptions::default()).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), "1,0,0").unwrap();
        std::fs::write(dir.path().join("b.jpg"), "0,1,0").unwrap();
        std::fs::write(dir.path().join("c.jpeg"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "0,0,1").unwrap();

        let rec = engine
            .create("Carol", ImageSource::Path(dir.path().to_path_buf()))
            .await
            .unwrap();
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((rec.descriptor[0] - half).abs() < 1e-6);
        assert!((rec.descriptor[1] - half).abs() < 1e-6);
        assert_eq!(rec.descriptor[2], 0.0);
    }

    #[tokio::test]
    async fn test_created_descriptor_matches_stored_one() {
        let (engine, _) = engine(EngineOptions::default()).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), "3,0,0").unwrap();
        std::fs::write(dir.path().join("b.png"), "0,4,0").unwrap();

        let rec = engine
            .create("Dana", ImageSource::Path(dir.path().to_path_buf()))
            .await
            .unwrap();
        let norm: f32 = rec.descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);

        let listed = engine.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].descriptor, rec.descriptor);
    }

    #[tokio::test]
    async fn test_strict_accepts_duplicate_descriptors() {
        let options = EngineOptions {
            verify: VerifyPolicy::Strict,
            ..EngineOptions::default()
        };
        let (engine, idx) = engine(options).await;
        for i in 0..20 {
            engine.create(&format!("twin-{i}"), img("1,0,0")).await.unwrap();
        }
        assert_eq!(idx.len().await, 20);
    }

    #[tokio::test]
    async fn test_create_without_face_writes_nothing() {
        let (engine, idx) = engine(EngineOptions::default()).await;
        let err = engine.create("Nobody", img("")).await.unwrap_err();
        assert!(matches!(err, EngineError::Extract(ExtractError::NoFaceDetected)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(idx.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let (engine, idx) = engine(EngineOptions::default()).await;
        let err = engine.create("  ", img("1,0,0")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(idx.is_empty().await);
    }

    #[tokio::test]
    async fn test_wrong_length_descriptor_rejected() {
        let (engine, idx) = engine(EngineOptions::default()).await;
        let err = engine.create("Short", img("1,0")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(idx.is_empty().await);
        assert!(engine.search(img("1,0,0,0")).await.is_err());
    }

    #[tokio::test]
    async fn test_new_rejects_dimension_disagreement() {
        let idx = memory(4).await;
        let extractor = spawn_extractor(TextExtractor::new(3)).unwrap();
        let err = Engine::new(idx, extractor, EngineOptions::default()).err().unwrap();
        assert!(matches!(err, EngineError::DimensionMismatch { expected: 4, actual: 3 }));
    }

    #[tokio::test]
    async fn test_search_empty_index_is_no_match() {
        let (engine, _) = engine(EngineOptions::default()).await;
        assert_eq!(engine.search(img("1,0,0")).await.unwrap(), SearchOutcome::NoMatch);
    }

    #[tokio::test]
    async fn test_search_without_threshold_always_matches() {
        let (engine, _) = engine(EngineOptions::default()).await;
        engine.create("Alice", img("1,0,0")).await.unwrap();
        match engine.search(img("0,1,0")).await.unwrap() {
            SearchOutcome::Match(m) => assert!(m.score.abs() < 1e-6),
            SearchOutcome::NoMatch => panic!("expected nearest hit"),
        }
    }

    #[tokio::test]
    async fn test_search_threshold() {
        let options = EngineOptions {
            min_score: Some(0.5),
            ..Default::default()
        };
        let (engine, _) = engine(options).await;
        engine.create("Alice", img("1,0,0")).await.unwrap();
        assert_eq!(engine.search(img("0,1,0")).await.unwrap(), SearchOutcome::NoMatch);
        assert!(matches!(
            engine.search(img("0.9,0.1,0")).await.unwrap(),
            SearchOutcome::Match(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_is_final() {
        let (engine, _) = engine(EngineOptions::default()).await;
        let rec = engine.create("Dave", img("0,0,1")).await.unwrap();

        assert_eq!(engine.delete(rec.identity_id).await, DeleteOutcome::Confirmed);
        assert_eq!(engine.search(img("0,0,1")).await.unwrap(), SearchOutcome::NoMatch);
        assert!(engine.list().await.unwrap().is_empty());
        assert_eq!(engine.delete(rec.identity_id).await, DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let (engine, _) = engine(EngineOptions::default()).await;
        assert_eq!(engine.delete(Uuid::new_v4()).await, DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_delete_not_confirmed() {
        let inner = memory(3).await;
        let faulty = Arc::new(Faulty {
            inner: inner.clone(),
            ignore_deletes: true,
            blind_search: false,
        });
        let engine = engine_on(faulty, EngineOptions::default());
        let rec = engine.create("Eve", img("1,1,0")).await.unwrap();
        assert_eq!(engine.delete(rec.identity_id).await, DeleteOutcome::NotConfirmed);
        assert_eq!(inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_verify_mismatch_warns_by_default() {
        let inner = memory(3).await;
        let faulty = Arc::new(Faulty {
            inner: inner.clone(),
            ignore_deletes: false,
            blind_search: true,
        });
        let engine = engine_on(faulty, EngineOptions::default());
        let rec = engine.create("Frank", img("1,0,0")).await.unwrap();
        assert!(inner.retrieve(rec.identity_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_verify_strict_rolls_back() {
        let inner = memory(3).await;
        let faulty = Arc::new(Faulty {
            inner: inner.clone(),
            ignore_deletes: false,
            blind_search: true,
        });
        let options = EngineOptions {
            verify: VerifyPolicy::Strict,
            ..Default::default()
        };
        let engine = engine_on(faulty, options);
        let err = engine.create("Grace", img("1,0,0")).await.unwrap_err();
        assert!(matches!(err, EngineError::VerificationFailed { .. }));
        assert!(inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_verify_strict_passes_on_healthy_index() {
        let options = EngineOptions {
            verify: VerifyPolicy::Strict,
            ..Default::default()
        };
        let (engine, idx) = engine(options).await;
        engine.create("Heidi", img("0,1,0")).await.unwrap();
        assert_eq!(idx.len().await, 1);
    }

    #[tokio::test]
    async fn test_detect_and_match_each_face() {
        let options = EngineOptions {
            min_score: Some(0.5),
            ..Default::default()
        };
        let (engine, _) = engine(options).await;
        let alice = engine.create("Alice", img("1,0,0")).await.unwrap();

        let faces = engine
            .detect_and_match(img("0,0,1\n1,0,0\n"))
            .await
            .unwrap();
        assert_eq!(faces.len(), 2);

        assert_eq!(faces[0].name, UNKNOWN_NAME);
        assert_eq!(faces[0].identity_id, None);
        assert_eq!(faces[0].score, 0.0);
        assert_eq!(faces[0].location.left, 0);

        assert_eq!(faces[1].name, "Alice");
        assert_eq!(faces[1].identity_id, Some(alice.identity_id));
        assert_eq!(
            faces[1].location,
            FaceLocation { top: 5, right: 20, bottom: 17, left: 10 }
        );
    }

    #[tokio::test]
    async fn test_detect_empty_index_and_no_faces() {
        let (engine, _) = engine(EngineOptions::default()).await;
        let faces = engine.detect_and_match(img("1,0,0\n")).await.unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].name, UNKNOWN_NAME);

        assert!(engine.detect_and_match(img("")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detect_reads_file_and_rejects_directory() {
        let (engine, _) = engine(EngineOptions::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("group.png");
        std::fs::write(&file, "1,0,0\n0,1,0\n").unwrap();

        let faces = engine.detect_and_match(ImageSource::Path(file)).await.unwrap();
        assert_eq!(faces.len(), 2);

        let err = engine
            .detect_and_match(ImageSource::Path(dir.path().to_path_buf()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_list_walks_every_page() {
        let options = EngineOptions {
            page_size: 2,
            ..Default::default()
        };
        let (engine, _) = engine(options).await;
        let mut created = Vec::new();
        for i in 0..5 {
            let rec = engine
                .create(&format!("p{i}"), img(&format!("{},1,0", i + 1)))
                .await
                .unwrap();
            created.push(rec.identity_id);
        }

        let all = engine.list().await.unwrap();
        assert_eq!(all.len(), 5);
        for id in &created {
            assert!(all.iter().any(|r| r.identity_id == *id));
        }

        let first = engine.list_page(None, 2).await.unwrap();
        assert_eq!(first.identities.len(), 2);
        let second = engine.list_page(first.next_cursor, 2).await.unwrap();
        assert_eq!(second.identities.len(), 2);
        assert!(second
            .identities
            .iter()
            .all(|r| !first.identities.contains(r)));
    }

    #[tokio::test]
    async fn test_list_defaults_missing_name() {
        let (engine, idx) = engine(EngineOptions::default()).await;
        idx.upsert(Point {
            id: Uuid::new_v4(),
            vector: vec![0.0, 0.0, 1.0],
            name: None,
        })
        .await
        .unwrap();
        let all = engine.list().await.unwrap();
        assert_eq!(all[0].name, UNKNOWN_NAME);
    }

    #[test]
    fn test_error_kinds() {
        let unavailable = EngineError::Index(IndexError::ServiceUnavailable {
            attempts: 3,
            last: "refused".into(),
        });
        assert_eq!(unavailable.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(
            EngineError::Index(IndexError::Unreachable("x".into())).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            EngineError::Listing(IndexError::Unreachable("x".into())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(EngineError::ExtractorUnavailable.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_detected_face_json() {
        let face = DetectedFace {
            location: FaceLocation { top: 1, right: 2, bottom: 3, left: 4 },
            name: UNKNOWN_NAME.into(),
            identity_id: None,
            score: 0.0,
        };
        let v = serde_json::to_value(&face).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"top": 1, "right": 2, "bottom": 3, "left": 4, "name": "Unknown", "score": 0.0})
        );
    }
}
