//! Group seeding rules.

use std::collections::HashSet;

use huddle_types::{ProjectId, UserId};

/// Initial member list for a project's group: owners first, then
/// collaborators, with blanks and duplicates dropped.
pub fn seed_members<O, C>(owners: O, collaborators: C) -> Vec<UserId>
where
    O: IntoIterator<Item = UserId>,
    C: IntoIterator<Item = UserId>,
{
    let mut seen = HashSet::new();
    owners
        .into_iter()
        .chain(collaborators)
        .filter(|id| !id.is_blank())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Name used when a project's group is created implicitly.
pub fn default_group_name(project: &ProjectId) -> String {
    format!("Project {project}")
}
