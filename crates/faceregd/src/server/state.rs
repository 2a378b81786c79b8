use std::sync::Arc;

use crate::engine::Engine;

/// Shared request state.
pub struct AppState {
    pub engine: Engine,
    /// Upper bound on a request body, uploads included.
    pub upload_limit_bytes: usize,
}

impl AppState {
    pub fn new(engine: Engine, upload_limit_bytes: usize) -> Arc<Self> {
        Arc::new(AppState {
            engine,
            upload_limit_bytes,
        })
    }
}
