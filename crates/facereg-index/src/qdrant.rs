//! Qdrant driver over the REST API.
//!
//! Writes are issued with `wait=true`, so a successful upsert or delete has
//! been applied to the collection by the time the call returns.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::IndexError;
use crate::index::{check_dimension, VectorIndex};
use crate::types::{CollectionSpec, Metric, Point, ScoredPoint, ScrollPage};

/// Where the Qdrant server listens.
#[derive(Debug, Clone)]
pub struct QdrantEndpoint {
    pub host: String,
    pub port: u16,
    /// Per-request timeout for all index I/O.
    pub timeout: Duration,
}

impl QdrantEndpoint {
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

pub struct QdrantIndex {
    client: Client,
    base_url: String,
    spec: CollectionSpec,
}

/// Qdrant response envelope.
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Serialize, Deserialize)]
struct VectorParams {
    size: usize,
    distance: Metric,
}

#[derive(Deserialize)]
struct RawPoint {
    id: Value,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawScroll {
    points: Vec<RawPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

impl QdrantIndex {
    pub fn new(endpoint: &QdrantEndpoint, spec: CollectionSpec) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(endpoint.timeout)
            .connect_timeout(endpoint.timeout)
            .build()
            .map_err(|e| IndexError::Unreachable(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoint.base_url(),
            spec,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.spec.name, suffix)
    }

    async fn fetch_collection(&self) -> Result<Option<VectorParams>, IndexError> {
        let resp = self.client.get(self.collection_url("")).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let info: CollectionInfo = read_result(resp).await?;
        Ok(Some(info.config.params.vectors))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn ensure_collection(&self) -> Result<(), IndexError> {
        match self.fetch_collection().await? {
            Some(existing) => {
                if existing.size != self.spec.dimension || existing.distance != self.spec.metric {
                    let actual = CollectionSpec::new(&self.spec.name, existing.size, existing.distance);
                    return Err(IndexError::CollectionMismatch {
                        name: self.spec.name.clone(),
                        expected: self.spec.shape(),
                        actual: actual.shape(),
                    });
                }
                tracing::info!(collection = %self.spec.name, "collection already exists");
            }
            None => {
                let body = json!({
                    "vectors": VectorParams {
                        size: self.spec.dimension,
                        distance: self.spec.metric,
                    }
                });
                let resp = self.client.put(self.collection_url("")).json(&body).send().await?;
                let _: Value = read_result(resp).await?;
                tracing::info!(collection = %self.spec.name, shape = %self.spec.shape(), "created collection");
            }
        }
        Ok(())
    }

    async fn upsert(&self, point: Point) -> Result<(), IndexError> {
        check_dimension(&self.spec, &point.vector)?;
        let body = json!({
            "points": [{
                "id": point.id,
                "vector": point.vector,
                "payload": Payload { name: point.name },
            }]
        });
        let resp = self
            .client
            .put(self.collection_url("/points?wait=true"))
            .json(&body)
            .send()
            .await?;
        let _: Value = read_result(resp).await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), IndexError> {
        let resp = self
            .client
            .post(self.collection_url("/points/delete?wait=true"))
            .json(&json!({ "points": [id] }))
            .send()
            .await?;
        let _: Value = read_result(resp).await?;
        Ok(())
    }

    async fn retrieve(&self, id: Uuid) -> Result<Option<Point>, IndexError> {
        let resp = self
            .client
            .get(self.collection_url(&format!("/points/{id}")))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawPoint = read_result(resp).await?;
        Ok(Some(raw.into_point()?))
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError> {
        check_dimension(&self.spec, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        let resp = self
            .client
            .post(self.collection_url("/points/search"))
            .json(&body)
            .send()
            .await?;
        let hits: Vec<RawHit> = read_result(resp).await?;
        hits.into_iter().map(RawHit::into_scored).collect()
    }

    async fn scroll(&self, cursor: Option<Uuid>, limit: usize) -> Result<ScrollPage, IndexError> {
        let body = json!({
            "limit": limit.max(1),
            "offset": cursor,
            "with_payload": true,
            "with_vector": true,
        });
        let resp = self
            .client
            .post(self.collection_url("/points/scroll"))
            .json(&body)
            .send()
            .await?;
        let raw: RawScroll = read_result(resp).await?;
        raw.into_page()
    }
}

impl RawPoint {
    fn into_point(self) -> Result<Point, IndexError> {
        Ok(Point {
            id: parse_id(&self.id)?,
            vector: self.vector.unwrap_or_default(),
            name: self.payload.unwrap_or_default().name,
        })
    }
}

impl RawHit {
    fn into_scored(self) -> Result<ScoredPoint, IndexError> {
        Ok(ScoredPoint {
            id: parse_id(&self.id)?,
            score: self.score,
            name: self.payload.unwrap_or_default().name,
        })
    }
}

impl RawScroll {
    fn into_page(self) -> Result<ScrollPage, IndexError> {
        let mut points = Vec::with_capacity(self.points.len());
        for raw in self.points {
            match raw.into_point() {
                Ok(p) => points.push(p),
                // Points written by other tools may carry integer ids.
                Err(e) => tracing::warn!(error = %e, "skipping point with foreign id"),
            }
        }
        let next_cursor = match self.next_page_offset {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_id(&v)?),
        };
        Ok(ScrollPage { points, next_cursor })
    }
}

fn parse_id(value: &Value) -> Result<Uuid, IndexError> {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| IndexError::Decode(format!("point id {value} is not a UUID")))
}

/// Unwrap the `result` field of a successful response.
async fn read_result<T: DeserializeOwned>(resp: Response) -> Result<T, IndexError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(IndexError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    decode_result(&bytes)
}

fn decode_result<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, IndexError> {
    serde_json::from_slice::<Envelope<T>>(bytes)
        .map(|env| env.result)
        .map_err(|e| IndexError::Decode(e.to_string()))
}
