//! Construction-time errors.
//!
//! Nothing inside `write` surfaces as an error: malformed records and
//! filtered severities are absorbed silently. Only misconfiguration detected
//! while building a writer or sink is reported through [`BridgeError`].

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// The connection descriptor could not be parsed by the reporting client.
    #[error("invalid DSN '{dsn}': {message}")]
    InvalidDsn { dsn: String, message: String },

    /// One of the ignore patterns is not a valid regular expression.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A configuration value is out of range or unparseable.
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfiguration { field: String, message: String },

    #[error("invalid CA certificate: {message}")]
    InvalidCertificate { message: String },

    #[error("invalid proxy '{proxy}': {message}")]
    InvalidProxy { proxy: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl BridgeError {
    pub fn invalid_dsn(dsn: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::InvalidDsn {
            dsn: dsn.into(),
            message: message.into(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::InvalidConfiguration {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn certificate(message: impl Into<String>) -> Self {
        BridgeError::InvalidCertificate {
            message: message.into(),
        }
    }

    pub fn proxy(proxy: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::InvalidProxy {
            proxy: proxy.into(),
            message: message.into(),
        }
    }
}
