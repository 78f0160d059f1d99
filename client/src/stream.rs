//! Event stream client.
//!
//! Keeps one long-lived `GET /events` subscription open, decodes the
//! server-sent events it carries and hands them to a [`StreamSink`] strictly
//! in transport order. Lost connections are retried with exponential
//! backoff; the sink only hears about connectivity changes, never about
//! individual attempts.
//!
//! # Example
//!
//! ```no_run
//! use todosync_client::stream::{EventStreamClient, StreamSignal};
//! use todosync_runtime::RetryPolicy;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<StreamSignal>();
//! let url = reqwest::Url::parse("http://localhost:2000/events")?;
//! let mut client = EventStreamClient::spawn(reqwest::Client::new(), url, RetryPolicy::default(), tx);
//!
//! while let Some(signal) = rx.recv().await {
//!     println!("{signal:?}");
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use crate::connection::{ConnectionEvent, ConnectionState, Connectivity};
use crate::error::TodoSyncError;
use crate::event::PatchEvent;
use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Url, header};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use todosync_runtime::RetryPolicy;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// One decoded unit of a text/event-stream body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Data of a complete event (multi-line data joined with `\n`)
    Data(String),
    /// Server-suggested reconnect delay
    Retry(Duration),
}

/// Longest line, or joined event data, an [`SseDecoder`] accepts by default.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Incremental text/event-stream parser.
///
/// Bytes may be split anywhere, including inside a UTF-8 sequence; only
/// complete lines are decoded. Every byte is scanned once, and a line or
/// event growing past the configured limit is an error.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    scanned: usize,
    data: Option<String>,
    max_line: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty decoder with its own line limit in bytes.
    #[must_use]
    pub const fn with_max_line_length(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            data: None,
            max_line,
        }
    }

    /// Feed a chunk and collect every frame it completes.
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::LineTooLong`] once a line or the data of a
    /// single event exceeds the limit. The decoder is unusable afterwards.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, TodoSyncError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            self.scanned = end + 1;

            let raw = &self.buffer[start..end];
            if raw.len() > self.max_line {
                return Err(TodoSyncError::LineTooLong { limit: self.max_line });
            }
            let line = String::from_utf8_lossy(raw);
            if let Some(frame) =
                Self::line(&mut self.data, self.max_line, line.trim_end_matches('\r'))?
            {
                frames.push(frame);
            }
            start = self.scanned;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        if self.buffer.len() > self.max_line {
            return Err(TodoSyncError::LineTooLong { limit: self.max_line });
        }
        Ok(frames)
    }

    fn line(
        data: &mut Option<String>,
        max_line: usize,
        line: &str,
    ) -> Result<Option<SseFrame>, TodoSyncError> {
        if line.is_empty() {
            return Ok(data.take().map(SseFrame::Data));
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = line
            .split_once(':')
            .map_or((line, ""), |(field, value)| {
                (field, value.strip_prefix(' ').unwrap_or(value))
            });

        match field {
            "data" => {
                match data {
                    Some(data) => {
                        if data.len() + 1 + value.len() > max_line {
                            return Err(TodoSyncError::LineTooLong { limit: max_line });
                        }
                        data.push('\n');
                        data.push_str(value);
                    },
                    None => *data = Some(value.to_string()),
                }
                Ok(None)
            },
            "retry" => Ok(value
                .trim()
                .parse::<u64>()
                .ok()
                .map(|ms| SseFrame::Retry(Duration::from_millis(ms)))),
            _ => Ok(None),
        }
    }
}

/// What the stream hands to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// A validated patch event
    Event(PatchEvent),
    /// A message that failed validation and was discarded
    Rejected {
        /// Why it was rejected
        reason: String,
    },
    /// The stream started or stopped delivering events
    Connectivity(Connectivity),
}

/// Guard between the transport and the consumer.
///
/// Owns the [`ConnectionState`] and only lets messages through while
/// `Connected`. Anything received in another state is ignored.
#[derive(Debug, Default)]
pub struct Subscription {
    state: ConnectionState,
}

impl Subscription {
    /// A subscription in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drive the state machine and return the consumer notification, if any.
    ///
    /// Events that are not valid in the current state leave it unchanged.
    pub fn transition(&mut self, event: ConnectionEvent) -> Option<Connectivity> {
        let Some(next) = self.state.on(event) else {
            tracing::trace!(state = %self.state, ?event, "Ignoring connection event");
            return None;
        };
        let prev = std::mem::replace(&mut self.state, next);
        let notification = Connectivity::between(prev, next);
        if let Some(connectivity) = notification {
            tracing::info!(%connectivity, "Event stream connectivity changed");
        }
        notification
    }

    /// Turn one message into a signal for the consumer.
    ///
    /// Returns `None` unless the subscription is `Connected`.
    pub fn accept(&self, data: &str) -> Option<StreamSignal> {
        if !self.state.is_connected() {
            tracing::debug!(state = %self.state, "Ignoring event while not connected");
            return None;
        }

        metrics::counter!("stream.events.received").increment(1);
        match PatchEvent::decode(data) {
            Ok(event) => {
                tracing::debug!(kind = %event.kind(), list = %event.list_id(), "Dispatching event");
                Some(StreamSignal::Event(event))
            },
            Err(error) => {
                metrics::counter!("stream.events.rejected").increment(1);
                tracing::warn!(%error, "Discarding malformed event");
                Some(StreamSignal::Rejected {
                    reason: error.to_string(),
                })
            },
        }
    }
}

/// Consumer of stream signals.
///
/// `deliver` is awaited before the next message is read, so signals arrive
/// in transport order.
pub trait StreamSink: Send + Sync + 'static {
    /// Hand one signal to the consumer.
    fn deliver(&self, signal: StreamSignal) -> impl Future<Output = ()> + Send;
}

impl StreamSink for mpsc::UnboundedSender<StreamSignal> {
    fn deliver(&self, signal: StreamSignal) -> impl Future<Output = ()> + Send {
        if self.send(signal).is_err() {
            tracing::trace!("Stream consumer is gone");
        }
        std::future::ready(())
    }
}

/// Handle to a running event stream subscription.
///
/// The connection lives in a background task. [`EventStreamClient::close`]
/// shuts it down and waits for it; dropping the handle aborts it.
#[derive(Debug)]
pub struct EventStreamClient {
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl EventStreamClient {
    /// Start subscribing to `url` and deliver signals to `sink`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn<S: StreamSink>(http: Client, url: Url, policy: RetryPolicy, sink: S) -> Self {
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(StreamTask {
            http,
            url,
            policy,
            sink,
            state: state_tx,
            shutdown: shutdown_rx,
            subscription: Subscription::new(),
        }));

        Self {
            state,
            shutdown,
            task: Some(task),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes, including reconnect attempts.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Shut the subscription down and release the connection.
    ///
    /// Nothing is delivered to the sink after this returns. Calling it again
    /// does nothing.
    pub async fn close(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "Event stream task did not finish cleanly");
            }
        }
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct StreamTask<S> {
    http: Client,
    url: Url,
    policy: RetryPolicy,
    sink: S,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
    subscription: Subscription,
}

impl<S: StreamSink> StreamTask<S> {
    async fn transition(&mut self, event: ConnectionEvent) {
        let notification = self.subscription.transition(event);
        self.state.send_replace(self.subscription.state());
        if let Some(connectivity) = notification {
            self.sink
                .deliver(StreamSignal::Connectivity(connectivity))
                .await;
        }
    }

    /// One connection attempt: open the stream and pump it until it ends.
    async fn pump(&mut self, retry_hint: &mut Option<Duration>) -> Result<(), TodoSyncError> {
        let response = self
            .http
            .get(self.url.clone())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TodoSyncError::Api {
                status: status.as_u16(),
                message,
            });
        }

        self.transition(ConnectionEvent::Opened).await;

        let mut frames = sse_frames(response);
        while let Some(frame) = frames.next().await {
            match frame? {
                SseFrame::Data(data) => {
                    if let Some(signal) = self.subscription.accept(&data) {
                        self.sink.deliver(signal).await;
                    }
                },
                SseFrame::Retry(delay) => *retry_hint = Some(delay),
            }
        }

        Ok(())
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means shut down.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn run<S: StreamSink>(mut task: StreamTask<S>) {
    let mut shutdown = task.shutdown.clone();
    let mut attempt = 0usize;
    let mut retry_hint = None;

    'connect: loop {
        if *shutdown.borrow() {
            break;
        }

        task.transition(ConnectionEvent::Connect).await;
        tracing::debug!(url = %task.url, attempt, "Connecting to event stream");

        let result = tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break 'connect,
            result = task.pump(&mut retry_hint) => result,
        };

        match result {
            Ok(()) => tracing::info!("Event stream ended"),
            Err(error) => tracing::warn!(%error, "Event stream failed"),
        }

        if task.subscription.state().is_connected() {
            attempt = 0;
        }
        task.transition(ConnectionEvent::Lost).await;

        if let Some(delay) = retry_hint.take() {
            task.policy = task.policy.with_initial_delay(delay);
        }

        if !task.policy.should_retry(attempt) {
            tracing::error!(attempt, "Giving up on event stream");
            shutdown_requested(&mut shutdown).await;
            break;
        }

        let delay = task.policy.delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        metrics::counter!("stream.reconnects").increment(1);
        tracing::debug!(?delay, "Reconnecting after backoff");

        tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break 'connect,
            () = tokio::time::sleep(delay) => {},
        }
    }

    task.transition(ConnectionEvent::Shutdown).await;
    tracing::debug!("Event stream closed");
}

/// Decode a response body into SSE frames as bytes arrive.
fn sse_frames(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<SseFrame, TodoSyncError>> + Send>> {
    let byte_stream = response.bytes_stream();

    Box::pin(stream! {
        let mut decoder = SseDecoder::new();

        for await chunk in byte_stream {
            match chunk {
                Ok(bytes) => match decoder.feed(&bytes) {
                    Ok(frames) => {
                        for frame in frames {
                            yield Ok(frame);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                },
                Err(e) => {
                    yield Err(TodoSyncError::Request(e.to_string()));
                    break;
                }
            }
        }
    })
}
