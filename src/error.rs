/// Error kinds surfaced by the collaborators and shown by the popup
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::PageValue;

/// Field-level validation errors, keyed by changeset field
pub type FormErrors = BTreeMap<String, Vec<String>>;

/// Failures of the MOCO REST client
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("upgrade required")]
    UpgradeRequired,
    #[error("validation failed: {0:?}")]
    ValidationFailed(FormErrors),
    #[error("unexpected response ({status}): {message}")]
    Unknown { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not parse response: {0}")]
    Parse(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// What the popup renders instead of the form
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorType {
    Unauthorized,
    UpgradeRequired,
    Unknown,
}

impl From<&ApiError> for ErrorType {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Unauthorized => ErrorType::Unauthorized,
            ApiError::UpgradeRequired => ErrorType::UpgradeRequired,
            _ => ErrorType::Unknown,
        }
    }
}

/// Failures sending an HTTP request or reading its response
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

/// Failures crossing into the browser extension APIs
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    #[error("browser call failed: {0}")]
    Call(String),
    #[error("failed to (de)serialize message: {0}")]
    Serde(String),
}

/// Failures forwarding tracked time to a third-party tool
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("request timed out after {0} ms")]
    Timeout(u128),
    #[error("page did not provide {0:?}")]
    MissingPageValue(PageValue),
    #[error("third-party API responded with {0}")]
    Status(u16),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
