//! Push channel destinations and client-side delivery filters.
//!
//! Subscriptions:
//! - `/group/{groupId}/messages`: one channel per group
//! - `/user/{userId}/private`: the local user's standing inbox
//!
//! Publishes go to `{app_prefix}/group-message` or
//! `{app_prefix}/private-message`.

use huddle_types::{Conversation, GroupId, UserId};

/// Default application destination prefix.
pub const DEFAULT_APP_PREFIX: &str = "/app";

/// A parsed subscription destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A group's message channel.
    Group(GroupId),
    /// A user's private inbox.
    Inbox(UserId),
}

impl Channel {
    /// The channel a conversation listens on.
    ///
    /// Private conversations share the local user's inbox.
    pub fn for_conversation(conversation: &Conversation, me: &UserId) -> Self {
        match conversation {
            Conversation::Group { group_id, .. } => Self::Group(group_id.clone()),
            Conversation::Private { .. } => Self::Inbox(me.clone()),
        }
    }

    /// Subscription destination string.
    pub fn destination(&self) -> String {
        match self {
            Self::Group(group_id) => format!("/group/{group_id}/messages"),
            Self::Inbox(user_id) => format!("/user/{user_id}/private"),
        }
    }

    /// Parse a destination header back into a channel.
    pub fn parse(destination: &str) -> Option<Self> {
        let parts: Vec<&str> = destination.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            ["group", id, "messages"] if !id.is_empty() => Some(Self::Group(GroupId::from(*id))),
            ["user", id, "private"] if !id.is_empty() => Some(Self::Inbox(UserId::from(*id))),
            _ => None,
        }
    }
}

/// Publish destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    app_prefix: String,
}

impl Destinations {
    /// Build with the given application prefix (e.g. `/app`).
    pub fn new(app_prefix: impl Into<String>) -> Self {
        let prefix: String = app_prefix.into();
        Self {
            app_prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Where a message addressed to `target` is published.
    pub fn publish(&self, target: &Conversation) -> String {
        match target {
            Conversation::Group { .. } => format!("{}/group-message", self.app_prefix),
            Conversation::Private { .. } => format!("{}/private-message", self.app_prefix),
        }
    }
}

impl Default for Destinations {
    fn default() -> Self {
        Self::new(DEFAULT_APP_PREFIX)
    }
}

/// Whether an inbox message belongs to the private conversation with `peer`.
///
/// Incoming: sent by `peer` to us (a missing receiver counts as us, since
/// the frame arrived on our inbox). Outgoing echo: sent by us to `peer`.
pub fn belongs_to_private(
    me: &UserId,
    peer: &UserId,
    sender: &UserId,
    receiver: Option<&UserId>,
) -> bool {
    let from_peer = sender == peer && receiver.map_or(true, |r| r == me);
    let to_peer = sender == me && receiver == Some(peer);
    from_peer || to_peer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> UserId {
        UserId::from("A")
    }

    #[test]
    fn group_channel_destination() {
        let channel = Channel::for_conversation(&Conversation::group("g1", "p1"), &me());
        assert_eq!(channel.destination(), "/group/g1/messages");
    }

    #[test]
    fn private_conversations_share_inbox() {
        let b = Channel::for_conversation(&Conversation::private("B"), &me());
        let c = Channel::for_conversation(&Conversation::private("C"), &me());
        assert_eq!(b, c);
        assert_eq!(b.destination(), "/user/A/private");
    }

    #[test]
    fn destinations_parse_back() {
        assert_eq!(
            Channel::parse("/group/g1/messages"),
            Some(Channel::Group(GroupId::from("g1")))
        );
        assert_eq!(
            Channel::parse("/user/A/private"),
            Some(Channel::Inbox(UserId::from("A")))
        );
        assert_eq!(Channel::parse("/topic/other"), None);
        assert_eq!(Channel::parse("/group//messages"), None);
    }

    #[test]
    fn publish_destinations() {
        let d = Destinations::new("/app/");
        assert_eq!(
            d.publish(&Conversation::group("g1", "p1")),
            "/app/group-message"
        );
        assert_eq!(
            d.publish(&Conversation::private("B")),
            "/app/private-message"
        );
        assert_eq!(
            Destinations::default().publish(&Conversation::private("B")),
            "/app/private-message"
        );
    }

    // ===========================================
    // Private Filter Tests
    // ===========================================

    #[test]
    fn message_from_focused_peer_passes() {
        let b = UserId::from("B");
        assert!(belongs_to_private(&me(), &b, &b, Some(&me())));
        assert!(belongs_to_private(&me(), &b, &b, None));
    }

    #[test]
    fn own_echo_to_focused_peer_passes() {
        let b = UserId::from("B");
        assert!(belongs_to_private(&me(), &b, &me(), Some(&b)));
    }

    #[test]
    fn other_peers_are_filtered() {
        let b = UserId::from("B");
        let c = UserId::from("C");
        assert!(!belongs_to_private(&me(), &b, &c, Some(&me())));
        assert!(!belongs_to_private(&me(), &b, &me(), Some(&c)));
        assert!(!belongs_to_private(&me(), &b, &b, Some(&c)));
    }
}
