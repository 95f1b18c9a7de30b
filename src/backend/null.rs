use async_trait::async_trait;

use super::{Backend, BackendKind, DEFAULT_APP_NAME};
use crate::Result;
use crate::message::{Message, Reference, Response};

/// Backend that silently drops everything. Lets callers run unmodified on
/// hosts without any notification surface.
#[derive(Clone, Debug)]
pub struct NullBackend {
    app_name: String,
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::with_app_name(DEFAULT_APP_NAME)
    }
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carry the caller's application name, like every other backend, even
    /// though nothing is ever shown under it.
    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }
}

#[async_trait]
impl Backend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn supported(&self) -> bool {
        false
    }

    async fn send(&self, _msg: &Message, _wait: bool) -> Result<Response> {
        Ok(Response {
            backend: BackendKind::Null,
            reference: Reference::fresh_token(),
            outcome: None,
        })
    }

    async fn dismiss(&self, _reference: &Reference) -> Result<()> {
        Ok(())
    }
}
