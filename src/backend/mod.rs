mod bus;
mod multi;
mod null;
mod proc;
mod selector;

pub use bus::{BusBackend, BusEvent, BusTransport, NotifyRequest, ZbusTransport};
pub use multi::MultiBackend;
pub use null::NullBackend;
pub use proc::ProcBackend;
pub use selector::Selector;

use std::fmt::{self, Display};
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::error::Error;
use crate::message::{Message, Reference, Response};

pub(crate) const DEFAULT_APP_NAME: &str = "crossnotify";

/// Display duration used when a message neither carries a timeout nor any
/// actions.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendKind {
    Bus,
    Proc,
    Null,
    Multi,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bus => "bus",
            Self::Proc => "proc",
            Self::Null => "null",
            Self::Multi => "multi",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").field("kind", &self.kind()).finish()
    }
}

/// Contract shared by every notification backend.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// `false` only for backends that silently drop everything, so fan-out
    /// and selection logic can skip them.
    fn supported(&self) -> bool {
        true
    }

    /// Dispatch a message. With `wait` the call resolves the response's
    /// outcome before returning; without it the response comes back
    /// immediately, unresolved, holding a fresh reference.
    async fn send(&self, msg: &Message, wait: bool) -> Result<Response>;

    /// Request removal of a still-visible notification.
    async fn dismiss(&self, reference: &Reference) -> Result<()> {
        let _ = reference;
        Err(Error::Unsupported {
            backend: self.kind().as_str(),
            operation: "dismiss",
        })
    }

    /// Release backend-held resources. Idempotent.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
