//! Plain-text rendering of timeline entries.

use huddle_types::{Conversation, Message, UserId};

/// One timeline line: `[10:00] bob: hi`, own messages marked with `*`.
pub fn message_line(message: &Message) -> String {
    let marker = if message.is_own { "*" } else { " " };
    let time = if message.timestamp.is_empty() {
        "--:--"
    } else {
        message.timestamp.as_str()
    };
    format!("[{time}]{marker}{}: {}", message.sender_id, message.content)
}

/// Comma-separated member list, or `(none)`.
pub fn member_list(members: &[UserId]) -> String {
    if members.is_empty() {
        return "(none)".to_string();
    }
    members
        .iter()
        .map(UserId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Header printed when focus changes.
pub fn focus_banner(target: &Conversation) -> String {
    match target {
        Conversation::Group {
            group_id,
            project_id,
            ..
        } => format!("=== project {project_id} (group {group_id}) ==="),
        Conversation::Private { peer_user_id } => format!("=== private with {peer_user_id} ==="),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lines() {
        let theirs = Message::new("bob".into(), "hi", "10:00");
        assert_eq!(message_line(&theirs), "[10:00] bob: hi");

        let mine = Message::new("alice".into(), "yo", "").tagged_for(&"alice".into());
        assert_eq!(message_line(&mine), "[--:--]*alice: yo");
    }

    #[test]
    fn member_lists() {
        assert_eq!(member_list(&[]), "(none)");
        assert_eq!(member_list(&["a".into(), "b".into()]), "a, b");
    }

    #[test]
    fn banners() {
        assert_eq!(
            focus_banner(&Conversation::group("g1", "p1")),
            "=== project p1 (group g1) ==="
        );
        assert_eq!(
            focus_banner(&Conversation::private("bob")),
            "=== private with bob ==="
        );
    }
}
