//! Outgoing message composition.
//!
//! A draft becomes two things at once: the payload published on the push
//! channel, and the optimistic timeline entry shown before the echo lands.

use huddle_types::{Conversation, Message, OutgoingChat, UserId};
use thiserror::Error;

/// Why a draft could not be composed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// The draft is empty after trimming.
    #[error("message is empty")]
    Empty,
    /// There is no focused conversation to send into.
    #[error("no conversation focused")]
    NoTarget,
}

/// A composed outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    /// Body to publish.
    pub payload: OutgoingChat,
    /// Entry appended locally, marked as own and without a server id.
    pub optimistic: Message,
}

/// Compose `text` from `me` into `target`.
///
/// Content is trimmed. `timestamp` is the display time the optimistic entry
/// carries; the server echo must present the same value for the two to be
/// reconciled by the composite key.
pub fn compose(
    text: &str,
    me: &UserId,
    target: Option<&Conversation>,
    timestamp: impl Into<String>,
) -> Result<Composed, ComposeError> {
    let content = text.trim();
    if content.is_empty() {
        return Err(ComposeError::Empty);
    }
    let target = target.ok_or(ComposeError::NoTarget)?;

    let payload = OutgoingChat::to(target, me.clone(), content);
    let optimistic = Message::new(me.clone(), content, timestamp).tagged_for(me);
    Ok(Composed {
        payload,
        optimistic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::ChatStatus;

    fn me() -> UserId {
        UserId::from("A")
    }

    #[test]
    fn whitespace_only_is_rejected() {
        let target = Conversation::group("g1", "p1");
        assert_eq!(
            compose("   \n\t", &me(), Some(&target), "10:00"),
            Err(ComposeError::Empty)
        );
        assert_eq!(
            compose("", &me(), Some(&target), "10:00"),
            Err(ComposeError::Empty)
        );
    }

    #[test]
    fn missing_target_is_rejected() {
        assert_eq!(
            compose("hi", &me(), None, "10:00"),
            Err(ComposeError::NoTarget)
        );
    }

    #[test]
    fn empty_wins_over_missing_target() {
        assert_eq!(compose(" ", &me(), None, "10:00"), Err(ComposeError::Empty));
    }

    #[test]
    fn group_compose_trims_and_marks_own() {
        let target = Conversation::group("g1", "p1");
        let composed = compose("  hello  ", &me(), Some(&target), "10:00").unwrap();

        assert_eq!(composed.payload.message, "hello");
        assert_eq!(composed.payload.status, ChatStatus::GroupMessage);
        assert_eq!(composed.payload.group_id, Some("g1".into()));

        assert_eq!(composed.optimistic.content, "hello");
        assert_eq!(composed.optimistic.timestamp, "10:00");
        assert!(composed.optimistic.is_own);
        assert!(composed.optimistic.id.is_none());
    }

    #[test]
    fn private_compose_addresses_peer() {
        let target = Conversation::private("B");
        let composed = compose("psst", &me(), Some(&target), "10:00").unwrap();
        assert_eq!(composed.payload.receiver_id, Some("B".into()));
        assert_eq!(composed.payload.status, ChatStatus::Message);
    }

    #[test]
    fn echo_matches_optimistic_entry() {
        let target = Conversation::group("g1", "p1");
        let composed = compose("hello ", &me(), Some(&target), "10:00").unwrap();
        let echo = Message::new(me(), "hello", "10:00").with_id("99");
        assert!(composed.optimistic.same_identity(&echo));
    }
}
