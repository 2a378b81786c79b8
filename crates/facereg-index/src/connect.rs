use std::time::Duration;

use crate::error::IndexError;
use crate::index::VectorIndex;

/// Ensure the collection exists, retrying transient failures with a fixed
/// delay between attempts.
///
/// A collection that exists with the wrong shape is reported immediately;
/// waiting will not fix it.
pub async fn connect_with_retry(
    index: &dyn VectorIndex,
    attempts: u32,
    delay: Duration,
) -> Result<(), IndexError> {
    let attempts = attempts.max(1);
    let spec = index.spec();
    let mut last = String::new();

    for attempt in 1..=attempts {
        match index.ensure_collection().await {
            Ok(()) => {
                tracing::info!(
                    backend = index.backend(),
                    collection = %spec.name,
                    attempt,
                    "index ready"
                );
                return Ok(());
            }
            Err(e @ IndexError::CollectionMismatch { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, attempts, error = %e, "index not ready");
                last = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(IndexError::ServiceUnavailable { attempts, last })
}
