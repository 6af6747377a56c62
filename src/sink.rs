use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for batch payloads produced by the layer.
///
/// Implementations carry one request body (a JSON array of formatted
/// events) to a backend. The layer calls `send_batch` from its background
/// task and never awaits it on the application thread.
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// Deliver one batch body.
    ///
    /// **Parameters**
    /// - `body`: non-empty JSON array produced by
    ///   [`BatchFormatter`](crate::batch::BatchFormatter).
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the batch.
    /// - `Err(..)` on network errors or a rejecting status. The layer
    ///   reports the failure through self-diagnostics and drops the batch;
    ///   there is no retry.
    async fn send_batch(&self, body: Vec<u8>) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush anything buffered inside the transport.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
