//! Error types for device connections, cache state, and peripheral glue.

use thiserror::Error;

/// Errors that can occur anywhere in the device-to-operator pipeline.
#[derive(Error, Debug)]
pub enum FingerprintError {
    /// The requested device key is not present in the loaded configuration.
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    /// The requested user uid/user_id is not present on the device.
    #[error("unknown user {0} on device '{1}'")]
    UnknownUser(String, String),

    /// The device did not respond, or the TCP connection could not be
    /// established or was lost mid-operation.
    #[error("device '{0}' unreachable: {1}")]
    Offline(String, String),

    /// The device YAML configuration failed to parse or is missing
    /// required fields.
    #[error("invalid device configuration: {0}")]
    InvalidConfig(String),

    /// An operation requiring the write-mode guard could not acquire it,
    /// or the device rejected the authenticated session.
    #[error("authentication failure for device '{0}'")]
    AuthFailure(String),

    /// A write operation (set_user, set_time, set_fingerprint, ...) was
    /// accepted by the session but the device reported failure.
    #[error("write to device '{0}' failed: {1}")]
    RemoteWriteFailure(String, String),

    /// A peripheral dependency (object storage, HRIS, webhook) failed.
    #[error("peripheral failure ({0}): {1}")]
    PeripheralFailure(String, String),

    /// Re-entrant acquisition of an already-held device session.
    #[error("device '{0}' session is already held by this caller")]
    ReentrantSession(String),

    /// Wrapped I/O error (config file reads, socket setup).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped YAML parse error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapped HTTP client error (HRIS sync, webhook notifications).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Wrapped object storage error.
    #[error("s3 error: {0}")]
    S3(String),
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
