//! Connection state machine for huddle.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the push channel lifecycle. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The actual I/O (opening the socket, sending frames, arming timers) is
//! performed by huddle-client, not by this module.
//!
//! Reconnection uses a fixed delay. Retries are unbounded unless the policy
//! sets a maximum.

use std::time::Duration;

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel. A reconnect timer may be armed.
    Disconnected,
    /// Handshake in progress.
    Connecting {
        /// 0 for the initial attempt, then 1, 2, ... for retries.
        attempt: u32,
    },
    /// Handshake completed; subscribe and publish may proceed.
    Connected,
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions in order.
    pub fn on_event(self, event: Event, policy: &ReconnectPolicy) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested) => {
                (Self::Connecting { attempt: 0 }, vec![Action::OpenTransport])
            }
            (Self::Disconnected, Event::ReconnectTimer { attempt }) => {
                (Self::Connecting { attempt }, vec![Action::OpenTransport])
            }
            (Self::Disconnected, Event::DisconnectRequested) => {
                (Self::Disconnected, vec![Action::CancelReconnect])
            }

            // From Connecting
            (Self::Connecting { .. }, Event::ConnectSucceeded) => (
                Self::Connected,
                vec![
                    Action::Emit(ConnectionEvent::Connected),
                    Action::RestoreSubscriptions,
                ],
            ),
            (Self::Connecting { attempt }, Event::ConnectFailed { error })
            | (Self::Connecting { attempt }, Event::Dropped { reason: error }) => {
                retry_or_give_up(attempt, error, policy)
            }
            (Self::Connecting { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![Action::CloseTransport, Action::CancelReconnect],
            ),

            // From Connected
            (Self::Connected, Event::Dropped { reason }) => {
                let mut actions = vec![
                    Action::ForgetSubscriptions,
                    Action::CloseTransport,
                    Action::Emit(ConnectionEvent::Disconnected {
                        reason: reason.clone(),
                    }),
                ];
                if policy.allows(1) {
                    actions.push(Action::StartReconnectTimer {
                        delay: policy.delay,
                        attempt: 1,
                    });
                }
                (Self::Disconnected, actions)
            }
            (Self::Connected, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::ReleaseSubscriptions,
                    Action::CloseTransport,
                    Action::Emit(ConnectionEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a handshake is in progress.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

fn retry_or_give_up(
    attempt: u32,
    error: String,
    policy: &ReconnectPolicy,
) -> (ConnectionState, Vec<Action>) {
    let next_attempt = attempt.saturating_add(1);
    if policy.allows(next_attempt) {
        (
            ConnectionState::Disconnected,
            vec![
                Action::CloseTransport,
                Action::Emit(ConnectionEvent::ConnectFailed { attempt, error }),
                Action::StartReconnectTimer {
                    delay: policy.delay,
                    attempt: next_attempt,
                },
            ],
        )
    } else {
        (
            ConnectionState::Disconnected,
            vec![
                Action::CloseTransport,
                Action::Emit(ConnectionEvent::ConnectFailed {
                    attempt,
                    error: error.clone(),
                }),
                Action::Emit(ConnectionEvent::Disconnected {
                    reason: format!("giving up after {next_attempt} attempts: {error}"),
                }),
            ],
        )
    }
}

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before every retry.
    pub delay: Duration,
    /// Maximum number of retries. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Retry forever with the given fixed delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Cap the number of retries.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Whether retry number `attempt` (1-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller requested a connection.
    ConnectRequested,
    /// STOMP CONNECTED frame received.
    ConnectSucceeded,
    /// Socket or handshake failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Established channel was lost (socket closed or heartbeat timeout).
    Dropped {
        /// Reason for the drop.
        reason: String,
    },
    /// Caller requested teardown.
    DisconnectRequested,
    /// Reconnect timer fired.
    ReconnectTimer {
        /// The retry number the timer was armed for.
        attempt: u32,
    },
}

/// Actions to be executed by huddle-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the socket and perform the STOMP handshake.
    OpenTransport,
    /// Close the socket.
    CloseTransport,
    /// Re-establish the focused subscription (the `onConnect` hook).
    RestoreSubscriptions,
    /// UNSUBSCRIBE every live handle before closing.
    ReleaseSubscriptions,
    /// The server already dropped our handles; forget them locally.
    ForgetSubscriptions,
    /// Arm a reconnect timer.
    StartReconnectTimer {
        /// Delay before the retry.
        delay: Duration,
        /// The retry number.
        attempt: u32,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
    /// Emit an event to listeners.
    Emit(ConnectionEvent),
}

/// Lifecycle events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Channel established (initially or after a reconnect).
    Connected,
    /// A connection attempt failed.
    ConnectFailed {
        /// Which attempt this was (0 = initial).
        attempt: u32,
        /// Error message describing the failure.
        error: String,
    },
    /// Channel is down.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
}
