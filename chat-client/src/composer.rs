//! MessageComposer - validated, optimistic outgoing messages.

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, warn};

use huddle_core::{compose, ComposeError, Composed, Destinations};
use huddle_types::{Conversation, Message, UserId};

use crate::connection::ConnectionManager;
use crate::error::{ClientError, ConnectionError};
use crate::transport::Transport;

/// Display format for optimistic timestamps when none is configured.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%H:%M";

/// Builds outgoing messages and publishes them on the push channel.
pub struct MessageComposer<T: Transport + 'static> {
    connection: Arc<ConnectionManager<T>>,
    destinations: Destinations,
    me: UserId,
    timestamp_format: String,
}

impl<T: Transport + 'static> MessageComposer<T> {
    /// Composer for `me`. An unusable `timestamp_format` falls back to
    /// [`DEFAULT_TIMESTAMP_FORMAT`].
    pub fn new(
        connection: Arc<ConnectionManager<T>>,
        me: UserId,
        destinations: Destinations,
        timestamp_format: impl Into<String>,
    ) -> Self {
        let mut timestamp_format = timestamp_format.into();
        if StrftimeItems::new(&timestamp_format).any(|item| matches!(item, Item::Error)) {
            warn!(format = %timestamp_format, "invalid timestamp format, using default");
            timestamp_format = DEFAULT_TIMESTAMP_FORMAT.to_string();
        }
        Self {
            connection,
            destinations,
            me,
            timestamp_format,
        }
    }

    /// Validate `text` for `target` and stamp the optimistic entry with the
    /// current local time.
    pub fn compose(
        &self,
        text: &str,
        target: Option<&Conversation>,
    ) -> Result<Composed, ComposeError> {
        let timestamp = Local::now().format(&self.timestamp_format).to_string();
        compose(text, &self.me, target, timestamp)
    }

    /// Publish a composed message to `target`'s destination.
    pub async fn publish(
        &self,
        composed: &Composed,
        target: &Conversation,
    ) -> Result<(), ConnectionError> {
        let destination = self.destinations.publish(target);
        self.connection
            .publish(&destination, &composed.payload)
            .await?;
        debug!(%destination, %target, "message published");
        Ok(())
    }

    /// Compose and publish. Returns the optimistic entry to append.
    pub async fn send(&self, text: &str, target: &Conversation) -> Result<Message, ClientError> {
        let composed = self.compose(text, Some(target))?;
        self.publish(&composed, target).await?;
        Ok(composed.optimistic)
    }
}
