//! A logged-in session: the session store plus its event stream.
//!
//! The store owns the normalized collection from login until the session is
//! dropped. The event stream feeds it; user commands go through the same
//! store and reach the server as effects.

use crate::api::{CommandClient, TodoApi, endpoint};
use crate::config::ClientConfig;
use crate::connection::ConnectionState;
use crate::error::{Result, TodoSyncError, ValidationError};
use crate::reducer::{SessionAction, SessionEnvironment, SessionReducer, SessionState};
use crate::stream::{EventStreamClient, StreamSignal, StreamSink};
use crate::types::TodoCollection;
use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;
use todosync_core::environment::{Clock, SystemClock};
use todosync_runtime::{EffectHandle, Store};
use tokio::sync::{broadcast, watch};

/// Store type driving a session.
pub type SessionStore<A, C = SystemClock> =
    Store<SessionState, SessionAction, SessionEnvironment<A, C>, SessionReducer<A, C>>;

impl<A, C> StreamSink for SessionStore<A, C>
where
    A: TodoApi + Clone + 'static,
    C: Clock + Clone + 'static,
{
    fn deliver(&self, signal: StreamSignal) -> impl Future<Output = ()> + Send {
        let action = SessionAction::from(signal);
        async move {
            if let Err(error) = self.send(action).await {
                tracing::debug!(%error, "Session store no longer accepts stream input");
            }
        }
    }
}

/// A user's live view of the shared todo lists.
///
/// # Example
///
/// ```no_run
/// use todosync_client::{ClientConfig, SessionAction, TodoSession};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = TodoSession::connect("ada", &ClientConfig::from_env())?;
/// session.send(SessionAction::CreateList { name: "groceries".into() }).await?;
///
/// for list in session.lists().await.lists() {
///     println!("{} ({})", list.name, list.owner);
/// }
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct TodoSession<A = CommandClient>
where
    A: TodoApi + Clone + 'static,
{
    store: SessionStore<A>,
    stream: EventStreamClient,
    close_timeout: Duration,
}

impl TodoSession<CommandClient> {
    /// Log in against the service named in `config` over HTTP.
    ///
    /// Commands and the event stream share one connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::Validation`] for an empty display name and
    /// [`TodoSyncError::InvalidUrl`] for an unusable service URL.
    pub fn connect(user: &str, config: &ClientConfig) -> Result<Self> {
        let http = Client::new();
        let base = service_url(config)?;
        let api = CommandClient::with_client(http.clone(), base)?;
        Self::start(user, config, api, http)
    }
}

impl<A> TodoSession<A>
where
    A: TodoApi + Clone + 'static,
{
    /// Log in with a display name and start listening for changes.
    ///
    /// The name is not checked against anything; it only becomes the owner
    /// of lists created in this session. Must be called from within a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::Validation`] for an empty display name and
    /// [`TodoSyncError::InvalidUrl`] for an unusable service URL.
    pub fn login(user: &str, config: &ClientConfig, api: A) -> Result<Self> {
        Self::start(user, config, api, Client::new())
    }

    fn start(user: &str, config: &ClientConfig, api: A, http: Client) -> Result<Self> {
        let user = user.trim();
        if user.is_empty() {
            return Err(ValidationError::EmptyUserName.into());
        }

        let events = endpoint(&service_url(config)?, &["events"])?;
        let state = SessionState::new(user).with_diagnostics_capacity(config.diagnostics_capacity);
        let store = Store::new(
            state,
            SessionReducer::new(),
            SessionEnvironment::new(api, SystemClock),
        );

        tracing::info!(%user, %events, "Logged in");
        let stream = EventStreamClient::spawn(http, events, config.retry_policy(), store.clone());

        Ok(Self {
            store,
            stream,
            close_timeout: config.close_timeout(),
        })
    }

    /// Current collection.
    pub async fn lists(&self) -> TodoCollection {
        self.store.state(|s| s.lists.clone()).await
    }

    /// Copy of the whole session state.
    pub async fn snapshot(&self) -> SessionState {
        self.store.state(SessionState::clone).await
    }

    /// Read part of the session state without copying the rest.
    pub async fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        self.store.state(f).await
    }

    /// Dispatch a user command (or any other action).
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::Store`] if the session is shutting down.
    pub async fn send(&self, action: SessionAction) -> Result<EffectHandle> {
        Ok(self.store.send(action).await?)
    }

    /// Observe every action after it has been applied.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<SessionAction> {
        self.store.subscribe_actions()
    }

    /// State of the event stream connection.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    /// Watch the event stream connection state.
    #[must_use]
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.stream.subscribe_state()
    }

    /// Stop listening for changes and wait for in-flight commands.
    ///
    /// The stream closes first, so no server event lands after this returns.
    /// New actions are refused from then on. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::Store`] if commands are still running when
    /// the configured close timeout elapses. The session is closed anyway.
    pub async fn close(&mut self) -> Result<()> {
        self.stream.close().await;
        self.store.shutdown(self.close_timeout).await?;
        tracing::info!("Session closed");
        Ok(())
    }
}

fn service_url(config: &ClientConfig) -> Result<Url> {
    Url::parse(&config.service_url).map_err(|e| TodoSyncError::InvalidUrl(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code can use unwrap

    use super::*;

    #[tokio::test]
    async fn login_requires_a_name() {
        let config = ClientConfig::default();
        let error = TodoSession::connect("  ", &config).err().unwrap();
        assert!(matches!(
            error,
            TodoSyncError::Validation(ValidationError::EmptyUserName)
        ));
    }

    #[tokio::test]
    async fn login_rejects_bad_service_urls() {
        let config = ClientConfig::default().with_service_url("::not a url::");
        assert!(matches!(
            TodoSession::connect("ada", &config),
            Err(TodoSyncError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn new_session_starts_empty_and_closes_twice() {
        // Nothing listens here, so the stream keeps retrying.
        let config = ClientConfig::default()
            .with_service_url("http://127.0.0.1:9")
            .with_diagnostics_capacity(7);
        let mut session = TodoSession::connect(" ada ", &config).unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.owner, "ada");
        assert!(state.lists.is_empty());
        assert_eq!(state.revision, 0);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.connection_state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn closed_session_refuses_commands() {
        let config = ClientConfig::default().with_service_url("http://127.0.0.1:9");
        let mut session = TodoSession::connect("ada", &config).unwrap();
        session.close().await.unwrap();

        let error = session
            .send(SessionAction::CreateList {
                name: "groceries".to_string(),
            })
            .await
            .err()
            .unwrap();
        assert!(matches!(
            error,
            TodoSyncError::Store(todosync_runtime::StoreError::ShutdownInProgress)
        ));
    }
}
