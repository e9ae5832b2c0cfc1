use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BusError {
    /// No connection is currently live.
    #[error("Event bus disconnected")]
    Disconnected,

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Malformed bus message: {0}")]
    Codec(String),

    #[error("Event hub closed")]
    HubClosed,
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Codec(e.to_string())
    }
}
