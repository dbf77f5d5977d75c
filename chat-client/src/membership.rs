//! GroupMembershipService - project groups and their members.
//!
//! The backend is authoritative. The local cache is refreshed from
//! [`GroupMembershipService::list_members`] after every mutation and on
//! every group focus. When that refresh fails after a mutation went
//! through, the mutation is applied to the cache instead.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use huddle_core::{default_group_name, seed_members};
use huddle_types::{parse_user_ids, GroupId, ProjectId, UserId};

use crate::api::{ApiError, ChatApi, CreateGroup, RemoveMethod};
use crate::error::MembershipError;

/// Resolves, creates and edits project groups.
#[derive(Debug)]
pub struct GroupMembershipService<A> {
    api: A,
    guards: DashMap<ProjectId, Arc<Mutex<()>>>,
    cache: DashMap<GroupId, Vec<UserId>>,
}

impl<A: ChatApi> GroupMembershipService<A> {
    /// Service backed by `api`.
    pub fn new(api: A) -> Self {
        Self {
            api,
            guards: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Owners then collaborators of `project`, deduplicated.
    pub async fn candidate_members(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<UserId>, MembershipError> {
        let owners = user_list(self.api.project_owners(project).await?)?;
        let collaborators = user_list(self.api.project_collaborators(project).await?)?;
        Ok(seed_members(owners, collaborators))
    }

    /// Group bound to `project`, created from `candidates` if absent.
    ///
    /// Calls for the same project are serialized: a caller that waited on
    /// another's creation re-queries and gets the same id.
    pub async fn ensure_group(
        &self,
        project: &ProjectId,
        candidates: Vec<UserId>,
    ) -> Result<GroupId, MembershipError> {
        let guard = Arc::clone(self.guards.entry(project.clone()).or_default().value());
        let result = {
            let _held = guard.lock().await;
            self.resolve_or_create(project, candidates).await
        };
        drop(guard);
        // Last one out removes the guard.
        self.guards
            .remove_if(project, |_, guard| Arc::strong_count(guard) == 1);
        result
    }

    async fn resolve_or_create(
        &self,
        project: &ProjectId,
        candidates: Vec<UserId>,
    ) -> Result<GroupId, MembershipError> {
        if let Some(group) = self.api.project_group(project).await? {
            debug!(%project, %group, "project group exists");
            return Ok(group);
        }

        let members = seed_members(candidates, Vec::new());
        if members.is_empty() {
            return Err(MembershipError::NoCandidates(project.clone()));
        }

        let request = CreateGroup {
            name: default_group_name(project),
            project_id: project.clone(),
            members,
        };
        let group = self.api.create_group(&request).await?;
        info!(%project, %group, members = request.members.len(), "created project group");
        self.cache.insert(group.clone(), request.members);
        Ok(group)
    }

    /// Authoritative member list; refreshes the cache.
    pub async fn list_members(&self, group: &GroupId) -> Result<Vec<UserId>, MembershipError> {
        let members = user_list(self.api.group_members(group).await?)?;
        self.cache.insert(group.clone(), members.clone());
        Ok(members)
    }

    /// Add `user` to `group`, then resync.
    pub async fn add_member(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Vec<UserId>, MembershipError> {
        self.api.add_member(group, user).await?;
        info!(%group, %user, "member added");
        Ok(self
            .resync_after(group, |members| {
                if !members.contains(user) {
                    members.push(user.clone());
                }
            })
            .await)
    }

    /// Remove `user` from `group`, then resync.
    ///
    /// `DELETE` first, `POST` if that is refused.
    pub async fn remove_member(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Vec<UserId>, MembershipError> {
        if let Err(e) = self.api.remove_member(group, user, RemoveMethod::Delete).await {
            warn!(%group, %user, error = %e, "DELETE removal refused, retrying with POST");
            self.api
                .remove_member(group, user, RemoveMethod::Post)
                .await
                .map_err(|source| MembershipError::RemoveFailed {
                    group: group.clone(),
                    user: user.clone(),
                    source,
                })?;
        }
        info!(%group, %user, "member removed");
        Ok(self
            .resync_after(group, |members| members.retain(|m| m != user))
            .await)
    }

    /// Resync after a successful mutation, falling back to applying
    /// `edit` to the cached list.
    async fn resync_after(
        &self,
        group: &GroupId,
        edit: impl FnOnce(&mut Vec<UserId>),
    ) -> Vec<UserId> {
        match self.list_members(group).await {
            Ok(members) => members,
            Err(e) => {
                warn!(%group, error = %e, "member resync failed, updating cache locally");
                let mut entry = self.cache.entry(group.clone()).or_default();
                edit(entry.value_mut());
                entry.value().clone()
            }
        }
    }

    /// Last known members of `group`, without a backend call.
    pub fn cached(&self, group: &GroupId) -> Option<Vec<UserId>> {
        self.cache.get(group).map(|entry| entry.value().clone())
    }
}

fn user_list(body: serde_json::Value) -> Result<Vec<UserId>, ApiError> {
    parse_user_ids(body).map_err(|e| ApiError::Body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApi;
    use serde_json::json;
    use std::time::Duration;

    fn ids(list: &[&str]) -> Vec<UserId> {
        list.iter().map(|s| UserId::from(*s)).collect()
    }

    // ===========================================
    // Ensure Group Tests
    // ===========================================

    #[tokio::test]
    async fn existing_group_is_returned() {
        let api = MockApi::new();
        api.add_group("p1", "g1", ids(&["A"]));
        let service = GroupMembershipService::new(api.clone());

        let group = service
            .ensure_group(&"p1".into(), ids(&["A", "B"]))
            .await
            .unwrap();

        assert_eq!(group, GroupId::from("g1"));
        assert!(api.created_groups().is_empty());
    }

    #[tokio::test]
    async fn missing_group_is_created_with_deduplicated_members() {
        let api = MockApi::new();
        let service = GroupMembershipService::new(api.clone());

        let group = service
            .ensure_group(&"p1".into(), ids(&["A", "B", "A", " "]))
            .await
            .unwrap();

        let created = api.created_groups();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "Project p1");
        assert_eq!(created[0].members, ids(&["A", "B"]));
        assert_eq!(service.cached(&group), Some(ids(&["A", "B"])));
    }

    #[tokio::test]
    async fn empty_candidates_skip_creation() {
        let api = MockApi::new();
        let service = GroupMembershipService::new(api.clone());

        let err = service.ensure_group(&"p1".into(), vec![]).await.unwrap_err();

        assert!(matches!(err, MembershipError::NoCandidates(p) if p == ProjectId::from("p1")));
        assert!(api.created_groups().is_empty());
    }

    #[tokio::test]
    async fn concurrent_ensure_creates_one_group() {
        let api = MockApi::new();
        api.delay_create(Duration::from_millis(50));
        let service = Arc::new(GroupMembershipService::new(api.clone()));
        let project = ProjectId::from("p1");

        let (a, b) = tokio::join!(
            service.ensure_group(&project, ids(&["A"])),
            service.ensure_group(&project, ids(&["B"])),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(api.created_groups().len(), 1);
        assert!(service.guards.is_empty());
    }

    #[tokio::test]
    async fn guards_are_released_after_each_call() {
        let api = MockApi::new();
        let service = GroupMembershipService::new(api.clone());

        service.ensure_group(&"p1".into(), ids(&["A"])).await.unwrap();
        let _ = service.ensure_group(&"p2".into(), vec![]).await;

        assert!(service.guards.is_empty());
    }

    #[tokio::test]
    async fn different_projects_do_not_block_each_other() {
        let api = MockApi::new();
        let service = GroupMembershipService::new(api.clone());
        let (p1, p2) = (ProjectId::from("p1"), ProjectId::from("p2"));

        let (a, b) = tokio::join!(
            service.ensure_group(&p1, ids(&["A"])),
            service.ensure_group(&p2, ids(&["A"])),
        );

        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(api.created_groups().len(), 2);
    }

    // ===========================================
    // Candidate Tests
    // ===========================================

    #[tokio::test]
    async fn candidates_put_owners_first() {
        let api = MockApi::new();
        api.set_owners("p1", json!([{"id": "O"}]));
        api.set_collaborators("p1", json!(["C", {"userId": "O"}, {"_id": "D"}]));
        let service = GroupMembershipService::new(api);

        let candidates = service.candidate_members(&"p1".into()).await.unwrap();
        assert_eq!(candidates, ids(&["O", "C", "D"]));
    }

    #[tokio::test]
    async fn non_list_roster_is_api_error() {
        let api = MockApi::new();
        api.set_owners("p1", json!({"owners": []}));
        let service = GroupMembershipService::new(api);

        let err = service.candidate_members(&"p1".into()).await.unwrap_err();
        assert!(matches!(err, MembershipError::Api(ApiError::Body(_))));
    }

    // ===========================================
    // Mutation Tests
    // ===========================================

    #[tokio::test]
    async fn add_member_resyncs_cache() {
        let api = MockApi::new();
        api.add_group("p1", "g1", ids(&["A"]));
        let service = GroupMembershipService::new(api);
        let group = GroupId::from("g1");

        let members = service.add_member(&group, &"B".into()).await.unwrap();

        assert_eq!(members, ids(&["A", "B"]));
        assert_eq!(service.cached(&group), Some(ids(&["A", "B"])));
    }

    #[tokio::test]
    async fn remove_member_uses_delete_first() {
        let api = MockApi::new();
        api.add_group("p1", "g1", ids(&["A", "B"]));
        let service = GroupMembershipService::new(api.clone());

        let members = service
            .remove_member(&"g1".into(), &"B".into())
            .await
            .unwrap();

        assert_eq!(members, ids(&["A"]));
        let methods: Vec<_> = api.removals().into_iter().map(|(_, _, m)| m).collect();
        assert_eq!(methods, vec![RemoveMethod::Delete]);
    }

    #[tokio::test]
    async fn remove_member_falls_back_to_post() {
        let api = MockApi::new();
        api.add_group("p1", "g1", ids(&["A", "B"]));
        api.reject_delete();
        let service = GroupMembershipService::new(api.clone());

        let members = service
            .remove_member(&"g1".into(), &"B".into())
            .await
            .unwrap();

        assert_eq!(members, ids(&["A"]));
        let methods: Vec<_> = api.removals().into_iter().map(|(_, _, m)| m).collect();
        assert_eq!(methods, vec![RemoveMethod::Delete, RemoveMethod::Post]);
    }

    #[tokio::test]
    async fn add_succeeds_when_resync_fails() {
        let api = MockApi::new();
        api.add_group("p1", "g1", ids(&["A"]));
        let service = GroupMembershipService::new(api.clone());
        let group = GroupId::from("g1");
        service.list_members(&group).await.unwrap();

        api.fail_next_member_listing("timeout");
        let members = service.add_member(&group, &"B".into()).await.unwrap();

        assert_eq!(members, ids(&["A", "B"]));
        assert_eq!(service.cached(&group), Some(ids(&["A", "B"])));
        assert_eq!(api.members_of(&group), ids(&["A", "B"]));
    }

    #[tokio::test]
    async fn remove_succeeds_when_resync_fails() {
        let api = MockApi::new();
        api.add_group("p1", "g1", ids(&["A", "B"]));
        let service = GroupMembershipService::new(api.clone());
        let group = GroupId::from("g1");
        service.list_members(&group).await.unwrap();

        api.fail_next_member_listing("timeout");
        let members = service.remove_member(&group, &"B".into()).await.unwrap();

        assert_eq!(members, ids(&["A"]));
        assert_eq!(api.members_of(&group), ids(&["A"]));
    }

    #[tokio::test]
    async fn remove_from_unknown_group_is_remove_failed() {
        let api = MockApi::new();
        let service = GroupMembershipService::new(api);

        let err = service
            .remove_member(&"nope".into(), &"B".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MembershipError::RemoveFailed { source: ApiError::Status { status: 404, .. }, .. }
        ));
    }
}
