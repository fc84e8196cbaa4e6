//! Classified remote API errors

use thiserror::Error;

/// Classification of a failed API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 404: the requested test or batch does not exist
    NotFound,
    /// Any other 4xx
    Client,
    /// 5xx
    Server,
    /// Transport failure or undecodable response
    Unknown,
}

/// A failed call to the synthetics API
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("{endpoint} returned 404 (not found)")]
    NotFound { endpoint: String, body: String },

    #[error("{endpoint} returned {status} ({})", describe_status(.status))]
    Client {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} returned {status} (server error)")]
    Server {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} failed: {message}")]
    Unknown { endpoint: String, message: String },
}

fn describe_status(status: &u16) -> &'static str {
    match *status {
        401 | 403 => "authorization error",
        404 => "not found",
        429 => "rate limited",
        400..=499 => "client error",
        500..=599 => "server error",
        _ => "unknown error",
    }
}

impl ApiError {
    /// Classify an unsuccessful HTTP status
    pub fn from_status(endpoint: &str, status: u16, body: String) -> Self {
        let endpoint = endpoint.to_string();
        match status {
            404 => Self::NotFound { endpoint, body },
            400..=499 => Self::Client {
                endpoint,
                status,
                body,
            },
            500..=599 => Self::Server {
                endpoint,
                status,
                body,
            },
            _ => Self::Unknown {
                endpoint,
                message: format!("unexpected status {status}: {body}"),
            },
        }
    }

    pub fn unknown(endpoint: &str, message: impl ToString) -> Self {
        Self::Unknown {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Client { .. } => ErrorKind::Client,
            Self::Server { .. } => ErrorKind::Server,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::NotFound { endpoint, .. }
            | Self::Client { endpoint, .. }
            | Self::Server { endpoint, .. }
            | Self::Unknown { endpoint, .. } => endpoint,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Unknown { .. } => None,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::NotFound { body, .. }
            | Self::Client { body, .. }
            | Self::Server { body, .. } => body,
            Self::Unknown { message, .. } => message,
        }
    }

    /// Human-readable classification, e.g. "authorization error"
    pub fn describe(&self) -> &'static str {
        match self.status() {
            Some(status) => describe_status(&status),
            None => "unknown error",
        }
    }

    /// Remediation hint when credentials are implicated
    pub fn hint(&self) -> Option<&'static str> {
        match self.status() {
            Some(401 | 403) => Some(
                "Check that DATADOG_API_KEY and DATADOG_APP_KEY are valid and that DATADOG_SITE matches your account",
            ),
            _ => None,
        }
    }
}
