//! Connection state machine of the event stream.
//!
//! ```text
//! Disconnected --Connect--> Connecting --Opened--> Connected
//!      ^                        |                      |
//!      +----------Lost----------+----------Lost--------+
//!
//! any state but Closed --Shutdown--> Closed
//! ```
//!
//! Consumers only hear about [`Connectivity`]: entering and leaving
//! `Connected`. Individual reconnect attempts stay internal.

use crate::error::ParseConnectionError;
use std::fmt;
use std::str::FromStr;

/// State of an event stream subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected; a connect attempt may follow
    #[default]
    Disconnected,
    /// Request sent, waiting for the stream to open
    Connecting,
    /// Stream open; events are dispatched
    Connected,
    /// Shut down for good
    Closed,
}

/// Input to the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Start a connection attempt
    Connect,
    /// The server accepted the stream
    Opened,
    /// The attempt failed or the open stream ended
    Lost,
    /// Explicit shutdown
    Shutdown,
}

impl ConnectionState {
    /// Next state for `event`, or `None` when the event is not valid here.
    #[must_use]
    pub const fn on(self, event: ConnectionEvent) -> Option<Self> {
        match (self, event) {
            (Self::Closed, _) => None,
            (_, ConnectionEvent::Shutdown) => Some(Self::Closed),
            (Self::Disconnected, ConnectionEvent::Connect) => Some(Self::Connecting),
            (Self::Connecting, ConnectionEvent::Opened) => Some(Self::Connected),
            (Self::Connecting | Self::Connected, ConnectionEvent::Lost) => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Whether events are being dispatched.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the subscription has been shut down.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Lower-case name, as shown in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = ParseConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disconnected" => Ok(Self::Disconnected),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "closed" => Ok(Self::Closed),
            other => Err(ParseConnectionError(other.to_string())),
        }
    }
}

/// Connectivity as reported to consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// Events are flowing
    Connected,
    /// Events are not flowing
    #[default]
    Disconnected,
}

impl Connectivity {
    /// The notification for a state change, if any.
    ///
    /// `Connected` on entering [`ConnectionState::Connected`], `Disconnected`
    /// on leaving it, nothing otherwise.
    #[must_use]
    pub const fn between(prev: ConnectionState, next: ConnectionState) -> Option<Self> {
        match (prev.is_connected(), next.is_connected()) {
            (false, true) => Some(Self::Connected),
            (true, false) => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Whether events are flowing.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}
