//! Error utilities

use std::fmt;

/// Failures that end an admission exchange with a message in the response.
#[derive(Debug)]
pub enum AdmissionError {
    /// The review envelope could not be decoded; the request uid is unknown.
    EnvelopeDecode(String),
    /// The envelope decoded but the embedded object did not.
    ObjectDecode(anyhow::Error),
    /// The cluster DNS service address could not be resolved.
    Resolution(anyhow::Error),
    /// The patch could not be built or serialized.
    PatchSerialization(anyhow::Error),
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::EnvelopeDecode(msg) => f.write_str(msg),
            AdmissionError::ObjectDecode(err) => write!(f, "{:#}", err),
            AdmissionError::Resolution(err) => {
                write!(f, "Failed to fetch DNS service IP: {:#}", err)
            }
            AdmissionError::PatchSerialization(err) => write!(f, "{:#}", err),
        }
    }
}

impl std::error::Error for AdmissionError {}

/// Describes error reason
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq, strum::EnumString, strum::AsRefStr)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    AlreadyExists,
    Forbidden,
    Unauthorized,
    /// Catch-all variant. Since this enum is non-exhaustive,
    /// it should be handled with `_` pattern
    Unknown,
}

/// Tries to classify k8s error
pub fn classify(error_reason: &str) -> ErrorClass {
    error_reason.parse().unwrap_or(ErrorClass::Unknown)
}

/// Tries to classify k8s error, wrapped in kube Error
pub fn classify_kube(error: &kube::Error) -> ErrorClass {
    match error {
        kube::Error::Api(api) => classify(&api.reason),
        _ => ErrorClass::Unknown,
    }
}
