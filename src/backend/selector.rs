use tracing::debug;

use super::{
    Backend, BackendKind, BusBackend, DEFAULT_APP_NAME, NullBackend, ProcBackend,
};
use crate::Result;
use crate::error::Error;

/// Explicit backend registry: an ordered candidate list plus the options
/// handed to whichever backend gets constructed. Probing happens inside
/// construction, so selection failure carries every candidate's reason and
/// is surfaced once, at selection time.
#[derive(Clone, Debug)]
pub struct Selector {
    app_name: String,
    show_app_name: bool,
    allow_null: bool,
    candidates: Vec<BackendKind>,
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            show_app_name: false,
            allow_null: false,
            candidates: vec![BackendKind::Proc, BackendKind::Bus],
        }
    }
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    #[must_use]
    pub fn show_app_name(mut self, show: bool) -> Self {
        self.show_app_name = show;
        self
    }

    /// When set, selection always yields the null backend, regardless of
    /// what else is available.
    #[must_use]
    pub fn allow_null(mut self, allow: bool) -> Self {
        self.allow_null = allow;
        self
    }

    /// Override the candidate list and its probe order.
    #[must_use]
    pub fn candidates(mut self, candidates: Vec<BackendKind>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Pick the first constructible backend.
    ///
    /// # Errors
    ///
    /// [`Error::Unavailable`] with one reason per candidate when none can
    /// be constructed and the null fallback was not requested.
    pub async fn select(&self) -> Result<Box<dyn Backend>> {
        if self.allow_null {
            return Ok(Box::new(NullBackend::with_app_name(self.app_name.clone())));
        }

        let mut reasons = Vec::new();
        for kind in &self.candidates {
            match self.construct(*kind).await {
                Ok(backend) => {
                    debug!(backend = %kind, "selected notification backend");
                    return Ok(backend);
                }
                Err(reason) => reasons.push((kind.as_str(), reason)),
            }
        }
        Err(Error::Unavailable { reasons })
    }

    async fn construct(
        &self,
        kind: BackendKind,
    ) -> std::result::Result<Box<dyn Backend>, String> {
        match kind {
            BackendKind::Proc => ProcBackend::new(self.app_name.clone(), self.show_app_name)
                .map(|b| Box::new(b) as Box<dyn Backend>)
                .map_err(|err| err.to_string()),
            BackendKind::Bus => BusBackend::session(self.app_name.clone())
                .await
                .map(|b| Box::new(b) as Box<dyn Backend>)
                .map_err(|err| err.to_string()),
            BackendKind::Null => Ok(Box::new(NullBackend::with_app_name(self.app_name.clone()))),
            BackendKind::Multi => {
                Err("fan-out backend is composed explicitly, not selected".to_string())
            }
        }
    }
}
