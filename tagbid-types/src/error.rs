use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the tagbid workspace.
///
/// This covers configuration problems, gateway (network) failures, malformed
/// upstream payloads, and unsupported feature selections.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagbidError {
    /// The partner configuration failed validation; carries every problem found.
    #[error("invalid config: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The bidder endpoint could not be reached or answered with a failure.
    #[error("{gateway} request failed: {msg}")]
    Gateway {
        /// Gateway name that failed.
        gateway: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The bidder endpoint answered with a payload that could not be parsed.
    #[error("malformed response from {gateway}: {msg}")]
    MalformedResponse {
        /// Gateway name that produced the payload.
        gateway: String,
        /// Parser diagnostics.
        msg: String,
    },

    /// The requested targeting type is not supported by this module.
    #[error("unsupported targeting type: {0}")]
    UnsupportedTargetingType(String),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl TagbidError {
    /// Helper: build a `Gateway` error with the gateway name and message.
    pub fn gateway(gateway: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Gateway {
            gateway: gateway.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `MalformedResponse` error.
    pub fn malformed(gateway: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            gateway: gateway.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build an `InvalidArg` error.
    #[must_use]
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    /// Returns true for failures of the upstream round trip.
    ///
    /// Malformed payloads count as upstream failures: an unparseable response is
    /// never partially trusted.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Gateway { .. } | Self::MalformedResponse { .. })
    }

    /// Problems carried by an `InvalidConfig` error, empty for other variants.
    #[must_use]
    pub fn problems(&self) -> &[String] {
        match self {
            Self::InvalidConfig(list) => list,
            _ => &[],
        }
    }
}
