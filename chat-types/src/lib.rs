//! # huddle-types
//!
//! Wire format and domain types for the huddle conversation sync engine.
//!
//! This crate provides the foundational types used across all huddle crates:
//! - [`UserId`], [`GroupId`], [`ProjectId`], [`MessageId`], [`SubscriptionId`] - Identity types
//! - [`Message`], [`Conversation`] - The canonical timeline model
//! - [`RawMessage`] - Adapter from heterogeneous backend field names
//! - [`stomp`] - STOMP 1.2 frame codec for the push channel
//! - [`WireError`] - Decoding errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod message;
mod raw;
pub mod stomp;

pub use error::WireError;
pub use ids::{GroupId, MessageId, ProjectId, SubscriptionId, UserId};
pub use message::{ChatStatus, Conversation, Message, OutgoingChat};
pub use raw::{parse_user_ids, RawMessage};
