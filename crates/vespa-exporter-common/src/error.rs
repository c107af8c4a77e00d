use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("request to {target} failed: {source}")]
    Transport {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed response from {target}: {source}")]
    MalformedResponse {
        target: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no cluster topology has been discovered yet")]
    NoTopology,
    #[error(
        "metric {name} already registered with labels {registered:?}, observed with {observed:?}"
    )]
    RegistrationConflict {
        name: String,
        registered: Vec<String>,
        observed: Vec<String>,
    },
    #[error("label mismatch for {name}: expected {expected:?}, provided {provided:?}")]
    LabelMismatch {
        name: String,
        expected: Vec<String>,
        provided: Vec<String>,
    },
    #[error("metric already registered: {0}")]
    AlreadyRegistered(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExporterError>;
