use std::sync::Arc;

use facereg_core::{BoundingBox, Descriptor, DescriptorExtractor, ExtractError, ImageSource};
use tokio::sync::{mpsc, oneshot};

use crate::engine::EngineError;

/// Messages sent from request handlers to the extractor thread.
enum ExtractorRequest {
    Encode {
        source: ImageSource,
        reply: oneshot::Sender<Result<Descriptor, ExtractError>>,
    },
    EncodeRegion {
        image: Arc<[u8]>,
        region: BoundingBox,
        reply: oneshot::Sender<Result<Descriptor, ExtractError>>,
    },
    Detect {
        image: Arc<[u8]>,
        reply: oneshot::Sender<Result<Vec<BoundingBox>, ExtractError>>,
    },
}

/// Clone-safe handle to the extractor thread.
#[derive(Clone)]
pub struct ExtractorHandle {
    tx: mpsc::Sender<ExtractorRequest>,
    dimension: usize,
}

impl ExtractorHandle {
    /// Descriptor length produced by the underlying extractor.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// One representative descriptor for a file, directory or byte buffer.
    pub async fn encode(&self, source: ImageSource) -> Result<Descriptor, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(ExtractorRequest::Encode { source, reply }).await?;
        Ok(rx.await.map_err(|_| EngineError::ExtractorUnavailable)??)
    }

    /// Descriptor for one face region of `image`.
    pub async fn encode_region(
        &self,
        image: Arc<[u8]>,
        region: BoundingBox,
    ) -> Result<Descriptor, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(ExtractorRequest::EncodeRegion { image, region, reply })
            .await?;
        Ok(rx.await.map_err(|_| EngineError::ExtractorUnavailable)??)
    }

    /// Every face in `image`, in detection order.
    pub async fn detect(&self, image: Arc<[u8]>) -> Result<Vec<BoundingBox>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(ExtractorRequest::Detect { image, reply }).await?;
        Ok(rx.await.map_err(|_| EngineError::ExtractorUnavailable)??)
    }

    async fn send(&self, req: ExtractorRequest) -> Result<(), EngineError> {
        self.tx
            .send(req)
            .await
            .map_err(|_| EngineError::ExtractorUnavailable)
    }
}

/// Run `extractor` on a dedicated OS thread.
///
/// Inference needs exclusive access to the model sessions, so requests are
/// serialized through a bounded channel. The thread exits once every handle
/// has been dropped.
pub fn spawn_extractor<E>(mut extractor: E) -> std::io::Result<ExtractorHandle>
where
    E: DescriptorExtractor + 'static,
{
    let dimension = extractor.dimension();
    let (tx, mut rx) = mpsc::channel::<ExtractorRequest>(16);

    std::thread::Builder::new()
        .name("facereg-extractor".into())
        .spawn(move || {
            tracing::info!(dimension, "extractor thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    ExtractorRequest::Encode { source, reply } => {
                        let result = facereg_core::encode_source(&mut extractor, &source);
                        let _ = reply.send(result);
                    }
                    ExtractorRequest::EncodeRegion { image, region, reply } => {
                        let result = facereg_core::encode_region(&mut extractor, &image, &region);
                        let _ = reply.send(result);
                    }
                    ExtractorRequest::Detect { image, reply } => {
                        let _ = reply.send(extractor.detect(&image));
                    }
                }
            }
            tracing::info!("extractor thread exiting");
        })?;

    Ok(ExtractorHandle { tx, dimension })
}
