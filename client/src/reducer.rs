//! Session reducer: the single place where session state changes.
//!
//! Three kinds of input arrive here:
//!
//! - **Commands** from the user are validated and turned into one
//!   [`Effect::Future`] each that calls the remote API. They never touch
//!   `lists`.
//! - **Stream input** (patch events, rejected messages, connectivity) is
//!   folded into the collection through the patch applier. Patches are only
//!   applied while the stream is connected.
//! - **Feedback** from finished commands is recorded for the user.

use crate::api::TodoApi;
use crate::connection::Connectivity;
use crate::error::{Result, ValidationError};
use crate::event::PatchEvent;
use crate::patch::apply_in_place;
use crate::stream::StreamSignal;
use crate::types::{ItemId, ListId, NewList, TodoCollection, TodoItem};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use todosync_core::effect::Effect;
use todosync_core::environment::Clock;
use todosync_core::reducer::Reducer;
use todosync_core::{SmallVec, smallvec};

/// Number of diagnostics kept when no capacity is configured.
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 50;

/// Where a diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSource {
    /// User input rejected before any request
    Validation,
    /// A remote command failed
    Command,
    /// A stream message was discarded
    Stream,
}

/// One entry of the session's error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// When it was recorded
    pub at: DateTime<Utc>,
    /// Origin
    pub source: DiagnosticSource,
    /// Human-readable description
    pub message: String,
}

/// The remote operation a command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Create a list
    CreateList,
    /// Delete a list
    DeleteList,
    /// Append a blank item
    AddItem,
    /// Change an item's text
    UpdateItem,
    /// Delete an item
    DeleteItem,
}

impl CommandKind {
    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateList => "create-list",
            Self::DeleteList => "delete-list",
            Self::AddItem => "add-item",
            Self::UpdateItem => "update-item",
            Self::DeleteItem => "delete-item",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one logged-in session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Display name used as owner of new lists
    pub owner: String,
    /// Normalized collection rendered by views
    pub lists: TodoCollection,
    /// Whether the event stream is delivering
    pub connection: Connectivity,
    /// Bumped every time `lists` actually changes
    pub revision: u64,
    /// Most recent error shown to the user, cleared by a successful command
    pub last_error: Option<String>,
    /// Bounded error channel, oldest first
    pub diagnostics: VecDeque<Diagnostic>,
    diagnostics_capacity: usize,
}

impl SessionState {
    /// Empty session for `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            lists: TodoCollection::new(),
            connection: Connectivity::Disconnected,
            revision: 0,
            last_error: None,
            diagnostics: VecDeque::new(),
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
        }
    }

    /// Keep at most `capacity` diagnostics (at least one).
    #[must_use]
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity.max(1);
        self
    }

    /// Same session starting from an existing collection.
    #[must_use]
    pub fn with_lists(mut self, lists: TodoCollection) -> Self {
        self.lists = lists;
        self
    }

    /// Same session with the given connectivity.
    #[must_use]
    pub const fn with_connection(mut self, connection: Connectivity) -> Self {
        self.connection = connection;
        self
    }

    fn record(&mut self, at: DateTime<Utc>, source: DiagnosticSource, message: String) {
        while self.diagnostics.len() >= self.diagnostics_capacity {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(Diagnostic {
            at,
            source,
            message,
        });
    }
}

/// Every input the session reducer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    // Commands
    /// Create a list owned by the session user
    CreateList {
        /// List name
        name: String,
    },
    /// Delete a list
    DeleteList {
        /// List to delete
        list: ListId,
    },
    /// Append a blank item to a list
    AddItem {
        /// Target list
        list: ListId,
    },
    /// Send an item with new text
    UpdateItemText {
        /// Item carrying the new text
        item: TodoItem,
    },
    /// Delete an item
    DeleteItem {
        /// Owning list
        list: ListId,
        /// Item to delete
        item: ItemId,
    },

    // Stream input
    /// A validated event from the stream
    Patch(PatchEvent),
    /// A stream message that was discarded
    EventRejected {
        /// Why it was rejected
        reason: String,
    },
    /// The stream started or stopped delivering
    ConnectivityChanged(Connectivity),

    // Feedback
    /// The server accepted a command
    CommandSucceeded {
        /// Which command
        command: CommandKind,
    },
    /// A command could not be completed
    CommandFailed {
        /// Which command
        command: CommandKind,
        /// Error description
        reason: String,
    },
}

impl From<StreamSignal> for SessionAction {
    fn from(signal: StreamSignal) -> Self {
        match signal {
            StreamSignal::Event(event) => Self::Patch(event),
            StreamSignal::Rejected { reason } => Self::EventRejected { reason },
            StreamSignal::Connectivity(connectivity) => Self::ConnectivityChanged(connectivity),
        }
    }
}

/// Injected dependencies of the session reducer.
#[derive(Debug, Clone)]
pub struct SessionEnvironment<A, C> {
    /// Remote API used by commands
    pub api: A,
    /// Timestamps for diagnostics
    pub clock: C,
}

impl<A, C> SessionEnvironment<A, C> {
    /// Bundle the dependencies.
    #[must_use]
    pub const fn new(api: A, clock: C) -> Self {
        Self { api, clock }
    }
}

/// Reducer for [`SessionState`].
#[derive(Debug, Clone)]
pub struct SessionReducer<A, C> {
    _phantom: std::marker::PhantomData<(A, C)>,
}

impl<A, C> SessionReducer<A, C> {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<A, C> Default for SessionReducer<A, C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one API call and report how it went.
fn command<F>(command: CommandKind, call: F) -> Effect<SessionAction>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    Effect::future(async move {
        Some(match call.await {
            Ok(()) => SessionAction::CommandSucceeded { command },
            Err(error) => SessionAction::CommandFailed {
                command,
                reason: error.to_string(),
            },
        })
    })
}

impl<A, C> Reducer for SessionReducer<A, C>
where
    A: TodoApi + Clone + 'static,
    C: Clock + Clone + 'static,
{
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment<A, C>;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // Commands
            // ═══════════════════════════════════════════════════════════════
            SessionAction::CreateList { name } => {
                if name.trim().is_empty() {
                    let error = ValidationError::EmptyListName.to_string();
                    tracing::debug!(%error, "Rejected create-list");
                    state.record(env.clock.now(), DiagnosticSource::Validation, error.clone());
                    state.last_error = Some(error);
                    return SmallVec::new();
                }

                let api = env.api.clone();
                let body = NewList::new(name, state.owner.clone());
                smallvec![command(CommandKind::CreateList, async move {
                    api.create_list(&body).await
                })]
            },
            SessionAction::DeleteList { list } => {
                let api = env.api.clone();
                smallvec![command(CommandKind::DeleteList, async move {
                    api.delete_list(&list).await
                })]
            },
            SessionAction::AddItem { list } => {
                let api = env.api.clone();
                smallvec![command(CommandKind::AddItem, async move {
                    api.add_item(&list).await
                })]
            },
            SessionAction::UpdateItemText { item } => {
                let api = env.api.clone();
                smallvec![command(CommandKind::UpdateItem, async move {
                    api.update_item(&item).await
                })]
            },
            SessionAction::DeleteItem { list, item } => {
                let api = env.api.clone();
                smallvec![command(CommandKind::DeleteItem, async move {
                    api.delete_item(&list, &item).await
                })]
            },

            // ═══════════════════════════════════════════════════════════════
            // Stream input
            // ═══════════════════════════════════════════════════════════════
            SessionAction::Patch(event) => {
                if !state.connection.is_connected() {
                    tracing::debug!(kind = %event.kind(), "Ignoring patch while disconnected");
                    return SmallVec::new();
                }

                let kind = event.kind();
                let outcome = apply_in_place(&mut state.lists, event);
                if outcome.changed() {
                    state.revision += 1;
                }
                tracing::trace!(%kind, ?outcome, revision = state.revision, "Applied patch");
                SmallVec::new()
            },
            SessionAction::EventRejected { reason } => {
                state.record(env.clock.now(), DiagnosticSource::Stream, reason);
                SmallVec::new()
            },
            SessionAction::ConnectivityChanged(connectivity) => {
                state.connection = connectivity;
                SmallVec::new()
            },

            // ═══════════════════════════════════════════════════════════════
            // Feedback
            // ═══════════════════════════════════════════════════════════════
            SessionAction::CommandSucceeded { command } => {
                tracing::debug!(%command, "Command accepted");
                state.last_error = None;
                SmallVec::new()
            },
            SessionAction::CommandFailed { command, reason } => {
                metrics::counter!("commands.failed", "command" => command.as_str()).increment(1);
                tracing::warn!(%command, %reason, "Command failed");
                let message = format!("{command} failed: {reason}");
                state.record(env.clock.now(), DiagnosticSource::Command, message.clone());
                state.last_error = Some(message);
                SmallVec::new()
            },
        }
    }
}
