//! Canonical conversation types.
//!
//! Everything downstream of the field-name adapter (see [`crate::RawMessage`])
//! works with these shapes only.

use serde::{Deserialize, Serialize};

use crate::{GroupId, MessageId, ProjectId, UserId};

/// A single timeline entry.
///
/// Identity for deduplication is the server `id` when both sides carry one,
/// otherwise the composite `(sender_id, trim(content), timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id. Absent on optimistic entries until the echo arrives.
    pub id: Option<MessageId>,
    /// Author of the message.
    pub sender_id: UserId,
    /// Message body as sent.
    pub content: String,
    /// Display timestamp, compared verbatim.
    pub timestamp: String,
    /// Whether the local user authored this message.
    pub is_own: bool,
}

impl Message {
    /// Build a message with no server id.
    pub fn new(
        sender_id: UserId,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            sender_id,
            content: content.into(),
            timestamp: timestamp.into(),
            is_own: false,
        }
    }

    /// Attach a server id.
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Recompute `is_own` for the given local identity.
    pub fn tagged_for(mut self, me: &UserId) -> Self {
        self.is_own = &self.sender_id == me;
        self
    }

    /// Server id, unless missing or blank.
    pub fn server_id(&self) -> Option<&MessageId> {
        self.id.as_ref().filter(|id| !id.is_blank())
    }

    /// Whether `self` and `other` denote the same logical message.
    pub fn same_identity(&self, other: &Message) -> bool {
        match (self.server_id(), other.server_id()) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.sender_id == other.sender_id
                    && self.content.trim() == other.content.trim()
                    && self.timestamp == other.timestamp
            }
        }
    }
}

/// Which conversation a timeline, subscription or publish belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conversation {
    /// The project-scoped group conversation.
    Group {
        /// Backend group id.
        group_id: GroupId,
        /// Project the group belongs to.
        project_id: ProjectId,
        /// Member snapshot at the time the conversation was built.
        member_ids: Vec<UserId>,
    },
    /// A two-party conversation with one peer.
    Private {
        /// The other participant.
        peer_user_id: UserId,
    },
}

impl Conversation {
    /// Shorthand for a group conversation with no member snapshot.
    pub fn group(group_id: impl Into<GroupId>, project_id: impl Into<ProjectId>) -> Self {
        Self::Group {
            group_id: group_id.into(),
            project_id: project_id.into(),
            member_ids: Vec::new(),
        }
    }

    /// Shorthand for a private conversation.
    pub fn private(peer: impl Into<UserId>) -> Self {
        Self::Private {
            peer_user_id: peer.into(),
        }
    }

    /// The group id, for group conversations.
    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            Self::Group { group_id, .. } => Some(group_id),
            Self::Private { .. } => None,
        }
    }

    /// The peer, for private conversations.
    pub fn peer(&self) -> Option<&UserId> {
        match self {
            Self::Group { .. } => None,
            Self::Private { peer_user_id } => Some(peer_user_id),
        }
    }

    /// Whether two conversations address the same target.
    ///
    /// Member snapshots are ignored.
    pub fn same_target(&self, other: &Conversation) -> bool {
        match (self, other) {
            (Self::Group { group_id: a, .. }, Self::Group { group_id: b, .. }) => a == b,
            (Self::Private { peer_user_id: a }, Self::Private { peer_user_id: b }) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group { group_id, .. } => write!(f, "group:{group_id}"),
            Self::Private { peer_user_id } => write!(f, "private:{peer_user_id}"),
        }
    }
}

/// The `status` discriminator carried by push payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatStatus {
    /// A private message.
    Message,
    /// A group message.
    GroupMessage,
    /// A member joined a group.
    Join,
}

/// Body of an outgoing publish frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingChat {
    /// Local user.
    pub sender_id: UserId,
    /// Target group, for group messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Target peer, for private messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    /// Message body.
    pub message: String,
    /// Payload kind.
    pub status: ChatStatus,
}

impl OutgoingChat {
    /// Build the payload addressed to `target`.
    pub fn to(target: &Conversation, sender_id: UserId, message: impl Into<String>) -> Self {
        let message = message.into();
        match target {
            Conversation::Group { group_id, .. } => Self {
                sender_id,
                group_id: Some(group_id.clone()),
                receiver_id: None,
                message,
                status: ChatStatus::GroupMessage,
            },
            Conversation::Private { peer_user_id } => Self {
                sender_id,
                group_id: None,
                receiver_id: Some(peer_user_id.clone()),
                message,
                status: ChatStatus::Message,
            },
        }
    }
}
