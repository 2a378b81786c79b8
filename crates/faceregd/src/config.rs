use std::path::PathBuf;
use std::time::Duration;

use facereg_index::QdrantEndpoint;

/// Which [`facereg_index::VectorIndex`] driver backs the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    Qdrant,
    Memory,
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Index driver (default: qdrant).
    pub index_backend: IndexBackend,
    /// Vector index host (default: localhost).
    pub index_host: String,
    /// Vector index REST port (default: 6333).
    pub index_port: u16,
    /// Collection holding identity points.
    pub collection: String,
    /// Per-request timeout for index I/O.
    pub index_timeout_secs: u64,
    /// Startup attempts before the index is declared unavailable.
    pub connect_attempts: u32,
    /// Fixed delay between startup attempts.
    pub connect_retry_secs: u64,
    /// Address the HTTP server binds to.
    pub bind_host: String,
    pub bind_port: u16,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Minimum match score; below it a hit is reported as no match.
    pub min_score: Option<f32>,
    /// Roll back and fail a create whose read-back check does not match.
    pub verify_strict: bool,
    /// Page size used when enumerating the collection.
    pub page_size: usize,
    /// Maximum request body size for uploads.
    pub upload_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_backend: IndexBackend::Qdrant,
            index_host: "localhost".to_string(),
            index_port: 6333,
            collection: "face_encodings".to_string(),
            index_timeout_secs: 5,
            connect_attempts: 3,
            connect_retry_secs: 2,
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8000,
            model_dir: facereg_core::default_model_dir(),
            min_score: None,
            verify_strict: false,
            page_size: 100,
            upload_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from `FACEREG_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparsable values fall back
    /// to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let index_backend = match lookup("FACEREG_INDEX_BACKEND").as_deref() {
            Some(v) if v.eq_ignore_ascii_case("memory") => IndexBackend::Memory,
            Some(v) if !v.eq_ignore_ascii_case("qdrant") => {
                tracing::warn!(value = v, "unknown FACEREG_INDEX_BACKEND; using qdrant");
                IndexBackend::Qdrant
            }
            _ => IndexBackend::Qdrant,
        };

        Self {
            index_backend,
            index_host: lookup("FACEREG_INDEX_HOST").unwrap_or(d.index_host),
            index_port: parse(&lookup, "FACEREG_INDEX_PORT", d.index_port),
            collection: lookup("FACEREG_COLLECTION").unwrap_or(d.collection),
            index_timeout_secs: parse(&lookup, "FACEREG_INDEX_TIMEOUT_SECS", d.index_timeout_secs),
            connect_attempts: parse(&lookup, "FACEREG_CONNECT_ATTEMPTS", d.connect_attempts),
            connect_retry_secs: parse(&lookup, "FACEREG_CONNECT_RETRY_SECS", d.connect_retry_secs),
            bind_host: lookup("FACEREG_BIND_HOST").unwrap_or(d.bind_host),
            bind_port: parse(&lookup, "FACEREG_BIND_PORT", d.bind_port),
            model_dir: lookup("FACEREG_MODEL_DIR").map(PathBuf::from).unwrap_or(d.model_dir),
            min_score: lookup("FACEREG_MIN_SCORE").and_then(|v| v.trim().parse().ok()),
            verify_strict: lookup("FACEREG_VERIFY_STRICT")
                .map(|v| v != "0" && !v.is_empty())
                .unwrap_or(d.verify_strict),
            page_size: parse(&lookup, "FACEREG_PAGE_SIZE", d.page_size).max(1),
            upload_limit_bytes: parse(&lookup, "FACEREG_UPLOAD_LIMIT_BYTES", d.upload_limit_bytes),
        }
    }

    pub fn index_endpoint(&self) -> QdrantEndpoint {
        QdrantEndpoint {
            host: self.index_host.clone(),
            port: self.index_port,
            timeout: Duration::from_secs(self.index_timeout_secs),
        }
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(facereg_core::DETECTOR_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn recognizer_model_path(&self) -> String {
        self.model_dir
            .join(facereg_core::RECOGNIZER_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
