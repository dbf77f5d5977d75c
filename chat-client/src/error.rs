//! Error types for huddle-client.
//!
//! Each component reports failures with its own enum; [`ClientError`]
//! aggregates them for callers that do not care which layer failed.

use huddle_core::ComposeError;
use huddle_types::{GroupId, ProjectId, UserId, WireError};

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::transport::TransportError;

/// Main error type for huddle-client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Push channel error.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// History load failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Membership operation failed.
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),

    /// Draft could not be composed.
    #[error("cannot send: {0}")]
    Compose(#[from] ComposeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed payload.
    #[error("parse error: {0}")]
    Parse(#[from] WireError),
}

/// Push channel errors. Always transient.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operation requires an established channel.
    #[error("not connected")]
    NotConnected,

    /// No CONNECTED frame within the handshake timeout.
    #[error("handshake timed out")]
    Timeout,

    /// Server answered CONNECT with an ERROR frame.
    #[error("server rejected connection: {0}")]
    Rejected(String),

    /// Server answered CONNECT with something other than CONNECTED.
    #[error("unexpected {0} frame during handshake")]
    UnexpectedFrame(String),

    /// Handshake frame could not be decoded.
    #[error("malformed frame: {0}")]
    Wire(#[from] WireError),

    /// Outgoing payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// History load failure. The timeline falls back to empty.
#[derive(Debug, thiserror::Error)]
#[error("failed to load history for {conversation}: {source}")]
pub struct FetchError {
    /// Which conversation was being loaded (e.g. `group:g1`).
    pub conversation: String,
    /// What went wrong.
    #[source]
    pub source: ApiError,
}

/// Group membership failures.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// Nobody to seed the group with; creation skipped.
    #[error("no candidate members for project {0}")]
    NoCandidates(ProjectId),

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Both removal variants failed.
    #[error("could not remove {user} from {group}: {source}")]
    RemoveFailed {
        /// Group being edited.
        group: GroupId,
        /// Member being removed.
        user: UserId,
        /// Error from the last attempt.
        #[source]
        source: ApiError,
    },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
