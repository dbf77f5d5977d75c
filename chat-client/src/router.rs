//! SubscriptionRouter - binds the live stream to the focused conversation.
//!
//! The connection carries at most two logical channels: the standing
//! private inbox `/user/{me}/private` and the focused group's channel.
//! [`SubscriptionRouter::focus`] is the only way to change which one feeds
//! the timeline, and [`SubscriptionRouter::route`] decides what each
//! delivery means for the current focus.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use huddle_core::{belongs_to_private, Channel};
use huddle_types::{Conversation, GroupId, Message, SubscriptionId, UserId};

use crate::connection::{ConnectionManager, Delivery, Topic};
use crate::error::ConnectionError;
use crate::transport::Transport;

/// What a delivery means for the focused conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Belongs in the visible timeline.
    Timeline(Message),
    /// Inbox message from a peer that is not focused.
    Background {
        /// Who wrote it.
        from: UserId,
        /// The message.
        message: Message,
    },
    /// Someone joined the focused group.
    Membership {
        /// The group.
        group_id: GroupId,
        /// Who joined.
        user_id: UserId,
    },
    /// Not for us, stale, or malformed.
    Dropped(String),
}

#[derive(Debug, Default)]
struct RouterState {
    focused: Option<Conversation>,
    group: Option<SubscriptionId>,
    inbox: Option<SubscriptionId>,
}

/// Owns every subscription on the push channel.
pub struct SubscriptionRouter<T: Transport + 'static> {
    connection: Arc<ConnectionManager<T>>,
    me: UserId,
    // Held across a whole focus or resubscribe.
    serial: tokio::sync::Mutex<()>,
    // Never held across an await.
    state: Mutex<RouterState>,
}

impl<T: Transport + 'static> SubscriptionRouter<T> {
    /// Router for the local user `me`.
    pub fn new(connection: Arc<ConnectionManager<T>>, me: UserId) -> Self {
        Self {
            connection,
            me,
            serial: tokio::sync::Mutex::new(()),
            state: Mutex::new(RouterState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Focus `target`.
    ///
    /// The previous group handle is released before anything new is
    /// installed. While disconnected the target is only recorded; the
    /// subscription follows on the next [`resubscribe`](Self::resubscribe).
    /// Calls are serialized.
    pub async fn focus(&self, target: Conversation) -> Result<(), ConnectionError> {
        let _serial = self.serial.lock().await;

        let previous = self.state().group.take();
        if let Some(id) = previous {
            if let Err(e) = self.connection.unsubscribe(&id).await {
                warn!(%id, error = %e, "failed to release group subscription");
            }
        }
        debug!(target = %target, "focus");
        self.state().focused = Some(target);

        if !self.connection.is_connected() {
            debug!("disconnected, subscription deferred");
            return Ok(());
        }
        self.install().await
    }

    /// Restore the inbox and the focused group channel after a handshake.
    ///
    /// Handles the connection still holds are kept, so frames already
    /// queued for them stay routable. Handles lost with a previous
    /// connection are replaced. Safe to run more than once.
    pub async fn resubscribe(&self) -> Result<(), ConnectionError> {
        let _serial = self.serial.lock().await;
        {
            let mut guard = self.state();
            let state = &mut *guard;
            for slot in [&mut state.group, &mut state.inbox] {
                if slot.as_ref().is_some_and(|id| !self.connection.holds(id)) {
                    if let Some(id) = slot.take() {
                        debug!(%id, "handle lost with previous connection");
                    }
                }
            }
        }
        self.install().await
    }

    /// Subscribe whatever the current focus needs and does not have yet.
    async fn install(&self) -> Result<(), ConnectionError> {
        let (need_inbox, group) = {
            let state = self.state();
            let group = match (&state.focused, &state.group) {
                (Some(Conversation::Group { group_id, .. }), None) => Some(group_id.clone()),
                _ => None,
            };
            (state.inbox.is_none(), group)
        };

        if need_inbox {
            let id = self
                .connection
                .subscribe(Channel::Inbox(self.me.clone()))
                .await?;
            self.state().inbox = Some(id);
        }
        if let Some(group_id) = group {
            let id = self.connection.subscribe(Channel::Group(group_id)).await?;
            self.state().group = Some(id);
        }
        Ok(())
    }

    /// Classify a delivery against the current focus.
    pub fn route(&self, delivery: Delivery) -> Routed {
        let state = self.state();

        if let Some(id) = &delivery.subscription {
            if state.group.as_ref() != Some(id) && state.inbox.as_ref() != Some(id) {
                return Routed::Dropped(format!("stale subscription {id}"));
            }
        }

        if delivery.topic == Topic::Membership {
            return self.route_membership(&state, &delivery);
        }

        let message = match delivery.payload.to_message(&self.me) {
            Ok(message) => message,
            Err(e) => {
                warn!(channel = ?delivery.channel, error = %e, "dropping malformed delivery");
                return Routed::Dropped(format!("malformed payload: {e}"));
            }
        };

        match (&delivery.channel, &state.focused) {
            (Channel::Group(group), Some(Conversation::Group { group_id, .. }))
                if group == group_id =>
            {
                Routed::Timeline(message)
            }
            (Channel::Group(group), _) => Routed::Dropped(format!("group {group} not focused")),
            (Channel::Inbox(owner), _) if owner != &self.me => {
                Routed::Dropped(format!("inbox of {owner}"))
            }
            (Channel::Inbox(_), focused) => {
                let receiver = delivery.payload.receiver_id();
                let sender = message.sender_id.clone();
                if let Some(Conversation::Private { peer_user_id }) = focused {
                    if belongs_to_private(&self.me, peer_user_id, &sender, receiver.as_ref()) {
                        return Routed::Timeline(message);
                    }
                }
                if sender == self.me {
                    Routed::Dropped("own message to an unfocused peer".into())
                } else {
                    Routed::Background {
                        from: sender,
                        message,
                    }
                }
            }
        }
    }

    fn route_membership(&self, state: &RouterState, delivery: &Delivery) -> Routed {
        let group = delivery.payload.group_id().or_else(|| match &delivery.channel {
            Channel::Group(group) => Some(group.clone()),
            Channel::Inbox(_) => None,
        });
        let focused = state.focused.as_ref().and_then(Conversation::group_id);
        match (group, delivery.payload.sender_id()) {
            (Some(group), Some(user)) if focused == Some(&group) => Routed::Membership {
                group_id: group,
                user_id: user,
            },
            (Some(group), Some(_)) => Routed::Dropped(format!("join for unfocused group {group}")),
            _ => Routed::Dropped("join without group or user".into()),
        }
    }

    /// Focused conversation, if any.
    pub fn focused(&self) -> Option<Conversation> {
        self.state().focused.clone()
    }

    /// Handle of the focused group channel.
    pub fn group_handle(&self) -> Option<SubscriptionId> {
        self.state().group.clone()
    }

    /// Handle of the standing inbox.
    pub fn inbox_handle(&self) -> Option<SubscriptionId> {
        self.state().inbox.clone()
    }
}
