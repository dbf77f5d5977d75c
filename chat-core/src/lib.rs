//! # huddle-core
//!
//! Pure logic for huddle (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms of the
//! conversation sync engine without any network access, enabling fast unit
//! tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`timeline`] folds history snapshots and live deliveries into one sequence
//! - [`connection`] drives the push channel lifecycle as events and actions
//! - [`selector`] tracks focus and rejects stale async results
//! - [`route`] maps conversations to destinations
//!
//! The actual I/O (sockets, HTTP, timers) is performed by `huddle-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compose;
pub mod connection;
pub mod membership;
pub mod route;
pub mod selector;
pub mod timeline;

pub use compose::{compose, ComposeError, Composed};
pub use connection::{
    Action, ConnectionEvent, ConnectionState, Event, ReconnectPolicy, DEFAULT_RECONNECT_DELAY,
};
pub use membership::{default_group_name, seed_members};
pub use route::{belongs_to_private, Channel, Destinations, DEFAULT_APP_PREFIX};
pub use selector::{ConversationSelector, Focus, FocusTicket, Transition};
pub use timeline::{MergeOutcome, Timeline};
