use crate::sink::LogTransport;
use async_trait::async_trait;
use std::error::Error;

/// A transport that simply drops every batch.
///
/// Useful for measuring the overhead of formatting and batching without
/// any network I/O, and for tests that don't care about delivery.
#[derive(Clone, Default)]
pub struct NoopTransport;

#[async_trait]
impl LogTransport for NoopTransport {
    async fn send_batch(&self, _body: Vec<u8>) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
