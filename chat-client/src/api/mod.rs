//! Request/response collaborators.
//!
//! [`ChatApi`] covers the backend calls the engine needs: history
//! snapshots, project rosters, and group membership. Responses that carry
//! messages or user lists come back as raw JSON; normalization happens in
//! the loader and membership service, through the shared field-name adapter.

mod mock;
mod rest;

pub use mock::MockApi;
pub use rest::RestApi;

use async_trait::async_trait;
use huddle_types::{GroupId, ProjectId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Backend call errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed.
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success HTTP status.
    #[error("{path} returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
    },

    /// Response body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Body(String),
}

/// Which HTTP method a member removal uses.
///
/// Some deployments only route `POST` for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMethod {
    /// `DELETE /group/{id}/remove-user/{userId}`
    Delete,
    /// `POST /group/{id}/remove-user/{userId}`
    Post,
}

/// Body of `POST /group/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroup {
    /// Display name.
    pub name: String,
    /// Owning project.
    pub project_id: ProjectId,
    /// Initial members.
    pub members: Vec<UserId>,
}

/// Backend operations used by the sync engine.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /group/{groupId}/messages`
    async fn group_messages(&self, group: &GroupId) -> Result<Value, ApiError>;

    /// `GET /messages/private/{userA}/{userB}`
    async fn private_messages(&self, a: &UserId, b: &UserId) -> Result<Value, ApiError>;

    /// `GET /group/project/{projectId}/owners`
    async fn project_owners(&self, project: &ProjectId) -> Result<Value, ApiError>;

    /// `GET /group/project/{projectId}/collaborators`
    async fn project_collaborators(&self, project: &ProjectId) -> Result<Value, ApiError>;

    /// `GET /group/{groupId}/members`
    async fn group_members(&self, group: &GroupId) -> Result<Value, ApiError>;

    /// `GET /group/project/{projectId}`; `None` when the backend answers 404.
    async fn project_group(&self, project: &ProjectId) -> Result<Option<GroupId>, ApiError>;

    /// `POST /group/create`
    async fn create_group(&self, request: &CreateGroup) -> Result<GroupId, ApiError>;

    /// `POST /group/{id}/add-user/{userId}`
    async fn add_member(&self, group: &GroupId, user: &UserId) -> Result<(), ApiError>;

    /// `DELETE` or `POST /group/{id}/remove-user/{userId}`
    async fn remove_member(
        &self,
        group: &GroupId,
        user: &UserId,
        method: RemoveMethod,
    ) -> Result<(), ApiError>;
}

/// Pull a group id out of a resolve/create response.
///
/// Accepts `{"groupId": ..}`, `{"id": ..}`, `{"_id": ..}`, or a bare scalar.
pub(crate) fn group_id_from(value: &Value) -> Option<GroupId> {
    let scalar = match value {
        Value::Object(map) => ["groupId", "id", "_id"]
            .iter()
            .find_map(|key| map.get(*key))?,
        other => other,
    };
    match scalar {
        Value::String(s) if !s.trim().is_empty() => Some(GroupId::from(s.as_str())),
        Value::Number(n) => Some(GroupId::from(n.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn group_id_variants() {
        assert_eq!(group_id_from(&json!({"groupId": "g1"})), Some("g1".into()));
        assert_eq!(group_id_from(&json!({"id": 7})), Some("7".into()));
        assert_eq!(group_id_from(&json!({"_id": "g2"})), Some("g2".into()));
        assert_eq!(group_id_from(&json!("g3")), Some("g3".into()));
        assert_eq!(group_id_from(&json!({"name": "x"})), None);
        assert_eq!(group_id_from(&json!({"groupId": ""})), None);
        assert_eq!(group_id_from(&Value::Null), None);
    }

    #[test]
    fn create_group_body_shape() {
        let body = CreateGroup {
            name: "Project p1".into(),
            project_id: "p1".into(),
            members: vec!["A".into(), "B".into()],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "Project p1", "projectId": "p1", "members": ["A", "B"]})
        );
    }
}
