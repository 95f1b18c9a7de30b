use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no notification backend available:{}", format_reasons(.reasons))]
    Unavailable { reasons: Vec<(&'static str, String)> },
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("action id {id:?} is reserved for backend-generated outcomes")]
    ReservedActionId { id: String },
    #[error("action label {label:?} must not contain a comma")]
    IllegalActionLabel { label: String },
    #[error("duplicate action id {id:?}")]
    DuplicateActionId { id: String },
    #[error("reply and actions are mutually exclusive")]
    ReplyWithActions,
    #[error("dropdown label requires at least two actions")]
    DropdownWithoutActions,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session bus connection failed")]
    BusConnect {
        #[source]
        source: zbus::Error,
    },
    #[error("remote call {method} failed")]
    BusCall {
        method: &'static str,
        #[source]
        source: zbus::Error,
    },
    #[error("{program} not found on PATH: {message}")]
    ProgramNotFound { program: String, message: String },
    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("notifier produced unparsable output: {message}")]
    Output { message: String },
}

fn format_reasons(reasons: &[(&'static str, String)]) -> String {
    reasons
        .iter()
        .map(|(backend, reason)| format!("\n  {backend}: {reason}"))
        .collect()
}
