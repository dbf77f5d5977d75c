//! Mock backend for testing.
//!
//! Holds an in-memory model of groups and histories and records every
//! mutating call. Optional latencies make races observable.

use async_trait::async_trait;
use huddle_types::{GroupId, ProjectId, UserId};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ApiError, ChatApi, CreateGroup, RemoveMethod};

/// Mock implementation of [`ChatApi`].
#[derive(Debug, Default, Clone)]
pub struct MockApi {
    inner: Arc<Mutex<MockApiInner>>,
}

#[derive(Debug, Default)]
struct MockApiInner {
    group_history: HashMap<GroupId, Value>,
    private_history: HashMap<(UserId, UserId), Value>,
    owners: HashMap<ProjectId, Value>,
    collaborators: HashMap<ProjectId, Value>,
    project_groups: HashMap<ProjectId, GroupId>,
    members: HashMap<GroupId, Vec<UserId>>,
    created: Vec<CreateGroup>,
    removals: Vec<(GroupId, UserId, RemoveMethod)>,
    reject_delete: bool,
    group_history_delay: Option<Duration>,
    create_delay: Option<Duration>,
    fail_next_request: Option<String>,
    fail_next_member_listing: Option<String>,
}

impl MockApi {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockApiInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `body` for `GET /group/{group}/messages`.
    pub fn set_group_history(&self, group: impl Into<GroupId>, body: Value) {
        self.lock().group_history.insert(group.into(), body);
    }

    /// Serve `body` for the private history between `a` and `b`, whichever
    /// order they are requested in.
    pub fn set_private_history(&self, a: impl Into<UserId>, b: impl Into<UserId>, body: Value) {
        let (a, b) = (a.into(), b.into());
        let mut inner = self.lock();
        inner.private_history.insert((a.clone(), b.clone()), body.clone());
        inner.private_history.insert((b, a), body);
    }

    /// Serve `body` for the project's owners.
    pub fn set_owners(&self, project: impl Into<ProjectId>, body: Value) {
        self.lock().owners.insert(project.into(), body);
    }

    /// Serve `body` for the project's collaborators.
    pub fn set_collaborators(&self, project: impl Into<ProjectId>, body: Value) {
        self.lock().collaborators.insert(project.into(), body);
    }

    /// Bind an existing group to a project.
    pub fn add_group(
        &self,
        project: impl Into<ProjectId>,
        group: impl Into<GroupId>,
        members: Vec<UserId>,
    ) {
        let group = group.into();
        let mut inner = self.lock();
        inner.project_groups.insert(project.into(), group.clone());
        inner.members.insert(group, members);
    }

    /// Every create request received.
    pub fn created_groups(&self) -> Vec<CreateGroup> {
        self.lock().created.clone()
    }

    /// Every removal attempt received.
    pub fn removals(&self) -> Vec<(GroupId, UserId, RemoveMethod)> {
        self.lock().removals.clone()
    }

    /// Current members of `group`.
    pub fn members_of(&self, group: &GroupId) -> Vec<UserId> {
        self.lock().members.get(group).cloned().unwrap_or_default()
    }

    /// Answer 405 to `DELETE` removals, forcing the `POST` fallback.
    pub fn reject_delete(&self) {
        self.lock().reject_delete = true;
    }

    /// Delay every group history response.
    pub fn delay_group_history(&self, delay: Duration) {
        self.lock().group_history_delay = Some(delay);
    }

    /// Delay every group creation.
    pub fn delay_create(&self, delay: Duration) {
        self.lock().create_delay = Some(delay);
    }

    /// Cause the next request, whatever it is, to fail.
    pub fn fail_next_request(&self, error: &str) {
        self.lock().fail_next_request = Some(error.to_string());
    }

    /// Cause the next `GET /group/{id}/members` to fail.
    pub fn fail_next_member_listing(&self, error: &str) {
        self.lock().fail_next_member_listing = Some(error.to_string());
    }

    fn take_failure(&self) -> Result<(), ApiError> {
        match self.lock().fail_next_request.take() {
            Some(error) => Err(ApiError::Request(error)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn group_messages(&self, group: &GroupId) -> Result<Value, ApiError> {
        self.take_failure()?;
        let delay = self.lock().group_history_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .lock()
            .group_history
            .get(group)
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    async fn private_messages(&self, a: &UserId, b: &UserId) -> Result<Value, ApiError> {
        self.take_failure()?;
        Ok(self
            .lock()
            .private_history
            .get(&(a.clone(), b.clone()))
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    async fn project_owners(&self, project: &ProjectId) -> Result<Value, ApiError> {
        self.take_failure()?;
        Ok(self
            .lock()
            .owners
            .get(project)
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    async fn project_collaborators(&self, project: &ProjectId) -> Result<Value, ApiError> {
        self.take_failure()?;
        Ok(self
            .lock()
            .collaborators
            .get(project)
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    async fn group_members(&self, group: &GroupId) -> Result<Value, ApiError> {
        self.take_failure()?;
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_member_listing.take() {
            return Err(ApiError::Request(error));
        }
        let members = inner.members.get(group).ok_or(ApiError::Status {
            status: 404,
            path: format!("/group/{group}/members"),
        })?;
        Ok(json!(members))
    }

    async fn project_group(&self, project: &ProjectId) -> Result<Option<GroupId>, ApiError> {
        self.take_failure()?;
        Ok(self.lock().project_groups.get(project).cloned())
    }

    async fn create_group(&self, request: &CreateGroup) -> Result<GroupId, ApiError> {
        self.take_failure()?;
        let delay = self.lock().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        inner.created.push(request.clone());
        let group = GroupId::from(format!("group-{}", inner.created.len()));
        inner
            .project_groups
            .insert(request.project_id.clone(), group.clone());
        inner.members.insert(group.clone(), request.members.clone());
        Ok(group)
    }

    async fn add_member(&self, group: &GroupId, user: &UserId) -> Result<(), ApiError> {
        self.take_failure()?;
        let mut inner = self.lock();
        let members = inner.members.get_mut(group).ok_or(ApiError::Status {
            status: 404,
            path: format!("/group/{group}/add-user/{user}"),
        })?;
        if !members.contains(user) {
            members.push(user.clone());
        }
        Ok(())
    }

    async fn remove_member(
        &self,
        group: &GroupId,
        user: &UserId,
        method: RemoveMethod,
    ) -> Result<(), ApiError> {
        self.take_failure()?;
        let mut inner = self.lock();
        inner.removals.push((group.clone(), user.clone(), method));
        let path = format!("/group/{group}/remove-user/{user}");
        if method == RemoveMethod::Delete && inner.reject_delete {
            return Err(ApiError::Status { status: 405, path });
        }
        let members = inner
            .members
            .get_mut(group)
            .ok_or(ApiError::Status { status: 404, path })?;
        members.retain(|m| m != user);
        Ok(())
    }
}
