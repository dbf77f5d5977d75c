//! # huddle-client
//!
//! I/O layer of the huddle conversation sync engine.
//!
//! Applications drive a [`ChatSession`]: focus a conversation, read
//! [`Update`]s as the timeline reconciles, send drafts. Underneath, the
//! session coordinates:
//!
//! - **ConnectionManager**: one STOMP-over-WebSocket channel with heartbeats
//!   and fixed-delay reconnection
//! - **SubscriptionRouter**: the standing inbox plus the focused group
//!   channel, filtered to the focused conversation
//! - **HistoryLoader**: REST snapshots normalized into [`Message`]s
//! - **GroupMembershipService**: project groups, created at most once
//! - **MessageComposer**: validated, optimistic sends
//!
//! Both network seams are traits ([`Transport`], [`ChatApi`]) with mock
//! implementations for tests.
//!
//! ## Example
//!
//! ```ignore
//! use huddle_client::{ChatSession, ClientConfig, Update};
//!
//! let config = ClientConfig::from_file(path)?;
//! let mut session = ChatSession::from_config(&config);
//! session.start().await?;
//! session.open_project(&"p1".into(), None).await?;
//!
//! while let Some(update) = session.next_update().await {
//!     if let Update::Timeline(_) = update {
//!         render(session.timeline());
//!     }
//! }
//! ```
//!
//! [`Message`]: huddle_types::Message

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod composer;
pub mod config;
pub mod connection;
pub mod error;
pub mod history;
pub mod membership;
pub mod router;
pub mod session;
pub mod transport;

pub use api::{ApiError, ChatApi, CreateGroup, MockApi, RemoveMethod, RestApi};
pub use composer::{MessageComposer, DEFAULT_TIMESTAMP_FORMAT};
pub use config::{ClientConfig, ConfigError};
pub use connection::{
    ConnectHook, ConnectionManager, ConnectionSettings, Delivery, Handler, Topic,
};
pub use error::{ClientError, ConnectionError, FetchError, MembershipError, Result};
pub use history::HistoryLoader;
pub use membership::GroupMembershipService;
pub use router::{Routed, SubscriptionRouter};
pub use session::{ChatSession, Notice, SessionOptions, Update};
pub use transport::{MockTransport, Transport, TransportError, WsTransport};
