//! Error types for the todosync client

use thiserror::Error;
use todosync_runtime::StoreError;

/// Errors surfaced by client operations
#[derive(Debug, Error)]
pub enum TodoSyncError {
    /// Input rejected before any network call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// HTTP request could not be completed
    #[error("Request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// Service URL cannot be used as a base for API paths
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// An event stream line or event outgrew the decoder limit
    #[error("Event stream data exceeds {limit} bytes")]
    LineTooLong {
        /// Limit in bytes
        limit: usize,
    },

    /// The session store rejected an action
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for TodoSyncError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error.to_string())
    }
}

/// User input that fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Login with an empty display name
    #[error("User name must not be empty")]
    EmptyUserName,

    /// Creating a list without a name
    #[error("List name must not be empty")]
    EmptyListName,

    /// Creating a list without an owner
    #[error("List owner must not be empty")]
    EmptyOwner,

    /// Identifier that is empty or whitespace
    #[error("{0} id must not be empty")]
    BlankId(&'static str),
}

/// A stream message that cannot be turned into a patch event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventDecodeError {
    /// Payload is not valid JSON or has the wrong shape
    #[error("Invalid event JSON: {0}")]
    InvalidJson(String),

    /// The `type` discriminator is absent
    #[error("Event is missing its type")]
    MissingKind,

    /// `type` names no known event kind
    #[error("Unknown event type: {0:?}")]
    UnknownKind(String),

    /// The kind-specific payload object is absent
    #[error("Event {kind} is missing its {field} payload")]
    MissingPayload {
        /// Wire name of the event kind
        kind: &'static str,
        /// Name of the missing payload field
        field: &'static str,
    },

    /// A required field inside the payload is absent or empty
    #[error("Event {kind} is missing required field {field}")]
    MissingField {
        /// Wire name of the event kind
        kind: &'static str,
        /// Dotted path of the missing field
        field: &'static str,
    },

    /// A list payload contains the same item id twice
    #[error("List {list} contains item {item} more than once")]
    DuplicateItem {
        /// List identifier
        list: String,
        /// Repeated item identifier
        item: String,
    },
}

/// Unknown connection state name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown connection state: {0:?}")]
pub struct ParseConnectionError(pub String);

/// Result alias for client operations
pub type Result<T> = std::result::Result<T, TodoSyncError>;
