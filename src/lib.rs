#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod backend;
pub mod error;
pub mod message;
pub mod telemetry;
pub mod util;

pub use backend::{Backend, BackendKind, MultiBackend, NullBackend, Selector};
pub use message::{Action, Message, Outcome, Reference, Response};

pub type Result<T> = std::result::Result<T, error::Error>;
