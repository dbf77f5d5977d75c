//! Conversation focus state machine.
//!
//! Exactly one conversation is focused at a time. Every call to
//! [`ConversationSelector::focus`] bumps a generation counter and hands back a
//! [`FocusTicket`] capturing it. Async work started for a focus (the history
//! fetch) carries its ticket; when the result comes back, the selector only
//! [accepts](ConversationSelector::accepts) it if no other focus happened in
//! between.

use huddle_types::{Conversation, GroupId, ProjectId, UserId};

/// Observable focus state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
    /// Nothing focused yet.
    Unfocused,
    /// The project's group conversation.
    Group {
        /// Focused group.
        group_id: GroupId,
        /// Owning project.
        project_id: ProjectId,
    },
    /// A private conversation.
    Private(UserId),
}

/// Captured focus generation for an in-flight async result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTicket {
    generation: u64,
    target: Conversation,
}

impl FocusTicket {
    /// Generation at issue time.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Conversation the ticket was issued for.
    pub fn target(&self) -> &Conversation {
        &self.target
    }
}

/// Result of a focus change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// What was focused before, if anything.
    pub previous: Option<Conversation>,
    /// Ticket for work started on behalf of the new focus.
    pub ticket: FocusTicket,
}

/// Chooses which conversation is focused.
#[derive(Debug, Clone, Default)]
pub struct ConversationSelector {
    current: Option<Conversation>,
    generation: u64,
}

impl ConversationSelector {
    /// Start unfocused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Focus `target`, invalidating every outstanding ticket.
    ///
    /// Refocusing the current conversation still starts a new generation so
    /// that a fresh snapshot replaces any in-flight one.
    pub fn focus(&mut self, target: Conversation) -> Transition {
        self.generation = self.generation.wrapping_add(1);
        let previous = self.current.replace(target.clone());
        Transition {
            previous,
            ticket: FocusTicket {
                generation: self.generation,
                target,
            },
        }
    }

    /// Whether a result issued under `ticket` may still be applied.
    pub fn accepts(&self, ticket: &FocusTicket) -> bool {
        ticket.generation == self.generation
            && self
                .current
                .as_ref()
                .is_some_and(|c| c.same_target(&ticket.target))
    }

    /// Currently focused conversation.
    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_ref()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Observable state.
    pub fn state(&self) -> Focus {
        match &self.current {
            None => Focus::Unfocused,
            Some(Conversation::Group {
                group_id,
                project_id,
                ..
            }) => Focus::Group {
                group_id: group_id.clone(),
                project_id: project_id.clone(),
            },
            Some(Conversation::Private { peer_user_id }) => Focus::Private(peer_user_id.clone()),
        }
    }

    /// Replace the member snapshot of the focused group after a resync.
    ///
    /// Does not change the generation. Ignored unless `group` is focused.
    pub fn update_members(&mut self, group: &GroupId, members: Vec<UserId>) {
        if let Some(Conversation::Group {
            group_id,
            member_ids,
            ..
        }) = self.current.as_mut()
        {
            if group_id == group {
                *member_ids = members;
            }
        }
    }
}
