use async_trait::async_trait;
use tracing::warn;

use super::{Backend, BackendKind};
use crate::Result;
use crate::message::{Message, Reference, Response};

/// Fan-out combinator: broadcasts every operation to all supported members
/// in list order. Delivery is best-effort, so one member's failure never
/// stops dispatch to the rest.
pub struct MultiBackend {
    backends: Vec<Box<dyn Backend>>,
}

impl MultiBackend {
    pub fn new(backends: Vec<Box<dyn Backend>>) -> Self {
        Self { backends }
    }

    fn supported_members(&self) -> impl Iterator<Item = &dyn Backend> {
        self.backends
            .iter()
            .map(AsRef::as_ref)
            .filter(|b| b.supported())
    }

    /// Send to every supported member, returning the per-member results in
    /// list order.
    pub async fn send_all(&self, msg: &Message, wait: bool) -> Vec<Result<Response>> {
        let mut results = Vec::new();
        for backend in self.supported_members() {
            let result = backend.send(msg, wait).await;
            if let Err(err) = &result {
                warn!(backend = %backend.kind(), error = %err, "fan-out send failed");
            }
            results.push(result);
        }
        results
    }

    /// Dismiss on every supported member, returning the per-member results
    /// in list order.
    pub async fn dismiss_all(&self, reference: &Reference) -> Vec<Result<()>> {
        let mut results = Vec::new();
        for backend in self.supported_members() {
            let result = backend.dismiss(reference).await;
            if let Err(err) = &result {
                warn!(backend = %backend.kind(), error = %err, "fan-out dismiss failed");
            }
            results.push(result);
        }
        results
    }
}

#[async_trait]
impl Backend for MultiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Multi
    }

    fn supported(&self) -> bool {
        self.backends.iter().any(|b| b.supported())
    }

    /// Broadcast, then surface the first successful member's response. With
    /// no supported members this degrades to an unresolved response, like
    /// the null backend.
    async fn send(&self, msg: &Message, wait: bool) -> Result<Response> {
        let mut results = self.send_all(msg, wait).await;
        if results.is_empty() {
            return Ok(Response {
                backend: BackendKind::Multi,
                reference: Reference::fresh_token(),
                outcome: None,
            });
        }
        let first_ok = results.iter().position(Result::is_ok).unwrap_or(0);
        results.swap_remove(first_ok)
    }

    async fn dismiss(&self, reference: &Reference) -> Result<()> {
        self.dismiss_all(reference)
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()
            .map(drop)
    }

    async fn close(&self) -> Result<()> {
        let mut first_err = None;
        for backend in self.supported_members() {
            if let Err(err) = backend.close().await {
                warn!(backend = %backend.kind(), error = %err, "fan-out close failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
