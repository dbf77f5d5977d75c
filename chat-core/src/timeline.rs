//! Timeline reconciliation.
//!
//! A conversation timeline is fed from two sources that race each other: the
//! history snapshot and the live stream. [`Timeline::merge`] folds both into
//! one deduplicated sequence:
//!
//! - An incoming message that matches an existing entry (by id when both
//!   have a non-blank one, else by `(sender_id, trim(content), timestamp)`)
//!   is already represented and does not add an entry.
//! - Anything else is appended at the tail.
//! - Existing entries are never reordered or removed. Position reflects
//!   arrival order, not timestamp order.
//!
//! The one in-place change: an entry without a server id (an optimistic
//! send) adopts the id of the echo that matched it.

use huddle_types::Message;

/// What a merge did to the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entries appended at the tail.
    pub appended: usize,
    /// Incoming messages that were already represented.
    pub absorbed: usize,
    /// Existing entries that adopted a server id from an echo.
    pub adopted: usize,
}

impl MergeOutcome {
    /// Whether the timeline grew.
    pub fn grew(&self) -> bool {
        self.appended > 0
    }

    /// Whether anything observable changed.
    pub fn changed(&self) -> bool {
        self.appended > 0 || self.adopted > 0
    }

    fn add(&mut self, other: MergeOutcome) {
        self.appended += other.appended;
        self.absorbed += other.absorbed;
        self.adopted += other.adopted;
    }
}

/// An append-only, deduplicated message sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    entries: Vec<Message>,
}

impl Timeline {
    /// Create an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in arrival order.
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the timeline is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    /// Drop every entry. Only used when focus changes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Merge one or more incoming messages.
    ///
    /// Messages within `incoming` are deduplicated against each other as well.
    pub fn merge<I>(&mut self, incoming: I) -> MergeOutcome
    where
        I: IntoIterator<Item = Message>,
    {
        let mut outcome = MergeOutcome::default();
        for message in incoming {
            outcome.add(self.merge_one(message));
        }
        outcome
    }

    /// Merge a single message.
    pub fn merge_one(&mut self, incoming: Message) -> MergeOutcome {
        match self.entries.iter_mut().find(|e| e.same_identity(&incoming)) {
            Some(existing) => {
                if existing.server_id().is_none() && incoming.server_id().is_some() {
                    existing.id = incoming.id;
                    MergeOutcome {
                        absorbed: 1,
                        adopted: 1,
                        ..Default::default()
                    }
                } else {
                    MergeOutcome {
                        absorbed: 1,
                        ..Default::default()
                    }
                }
            }
            None => {
                self.entries.push(incoming);
                MergeOutcome {
                    appended: 1,
                    ..Default::default()
                }
            }
        }
    }
}

/// Functional form of [`Timeline::merge`].
pub fn merge<I>(timeline: &Timeline, incoming: I) -> Timeline
where
    I: IntoIterator<Item = Message>,
{
    let mut next = timeline.clone();
    next.merge(incoming);
    next
}
