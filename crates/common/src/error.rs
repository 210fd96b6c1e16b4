//! Error types for AppTest

use thiserror::Error;

/// Result type alias using AppTest Error
pub type Result<T> = std::result::Result<T, Error>;

/// AppTest error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Control name is required")]
    MissingControlName,

    #[error("Property name is required for control {control}")]
    MissingPropertyName { control: String },

    #[error("Cannot coerce {field} to {expected}: {payload:?}")]
    Coercion {
        field: String,
        expected: String,
        payload: String,
    },

    #[error("Property {0} is not supported by the provider")]
    UnsupportedProperty(String),

    #[error("Unknown field {field} on {record}")]
    UnknownField { record: String, field: String },

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Row index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("The published app is outdated and must be republished: {0}")]
    OutdatedApp(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// True when a provider round trip did not finish in time.
    ///
    /// A timeout says nothing about the remote value, so callers must not
    /// treat it like a blank or a failed coercion.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// True for failures raised by the transport rather than by the data model.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Transport(_) | Error::OutdatedApp(_)
        )
    }

    /// Reclassify a transport failure message.
    ///
    /// Messages containing one of `signatures` become [`Error::OutdatedApp`];
    /// everything else stays a plain [`Error::Transport`].
    pub fn from_transport<S: AsRef<str>>(message: impl Into<String>, signatures: &[S]) -> Self {
        let message = message.into();
        if signatures
            .iter()
            .any(|sig| !sig.as_ref().is_empty() && message.contains(sig.as_ref()))
        {
            Error::OutdatedApp(message)
        } else {
            Error::Transport(message)
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_reclassification() {
        let sigs = ["is not a function"];
        let err = Error::from_transport("getPropertyValue is not a function", &sigs);
        assert!(matches!(err, Error::OutdatedApp(_)));

        let err = Error::from_transport("socket closed", &sigs);
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_transport());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_empty_signature_never_matches() {
        let err = Error::from_transport("anything", &[""]);
        assert!(matches!(err, Error::Transport(_)));
    }
}
