//! # todosync Client
//!
//! Client side of a collaborative todo-list service. Users log in with a
//! display name, edit shared lists, and see everyone's changes live.
//!
//! The server is the single source of truth. Commands are sent over HTTP and
//! never change local state; the collection only changes when the server
//! broadcasts the resulting event on its server-sent event stream.
//!
//! ```text
//! command ─▶ CommandClient ─▶ server ─▶ GET /events ─▶ EventStreamClient
//!                                                          │
//!                             view ◀─ TodoCollection ◀─ patch applier
//! ```
//!
//! ## Modules
//!
//! - [`types`]: entity model and the normalized [`TodoCollection`]
//! - [`event`]: wire format and boundary validation of patch events
//! - [`patch`]: the patch applier
//! - [`connection`]: connection state machine
//! - [`stream`]: event stream client with automatic reconnect
//! - [`api`]: command client
//! - [`reducer`]: session reducer tying it together
//! - [`session`]: [`TodoSession`], the owned session container
//!
//! ## Example
//!
//! ```no_run
//! use todosync_client::{ClientConfig, SessionAction, TodoSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env();
//!     let mut session = TodoSession::connect("ada", &config)?;
//!
//!     session
//!         .send(SessionAction::CreateList { name: "groceries".to_string() })
//!         .await?;
//!
//!     let mut actions = session.subscribe_actions();
//!     while let Ok(action) = actions.recv().await {
//!         if matches!(action, SessionAction::Patch(_)) {
//!             println!("{} lists", session.lists().await.len());
//!         }
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod patch;
pub mod reducer;
pub mod session;
pub mod stream;
pub mod types;

// Re-export main types for convenience
pub use api::{CommandClient, TodoApi};
pub use config::ClientConfig;
pub use connection::{ConnectionEvent, ConnectionState, Connectivity};
pub use error::{EventDecodeError, ParseConnectionError, TodoSyncError, ValidationError};
pub use event::{EventKind, PatchEvent};
pub use patch::{PatchOutcome, apply, apply_in_place};
pub use reducer::{
    CommandKind, Diagnostic, DiagnosticSource, SessionAction, SessionEnvironment, SessionReducer,
    SessionState,
};
pub use session::{SessionStore, TodoSession};
pub use stream::{EventStreamClient, SseDecoder, SseFrame, StreamSignal, StreamSink, Subscription};
pub use types::{ItemId, ListId, NewList, TodoCollection, TodoItem, TodoList};
