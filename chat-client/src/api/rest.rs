//! `reqwest` implementation of [`ChatApi`].

use async_trait::async_trait;
use huddle_types::{GroupId, ProjectId, UserId};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{group_id_from, ApiError, ChatApi, CreateGroup, RemoveMethod};

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ApiError::Status {
                status: status.as_u16(),
                path: e.url().map(|u| u.path().to_string()).unwrap_or_default(),
            },
            None if e.is_decode() => ApiError::Body(e.to_string()),
            None => ApiError::Request(e.to_string()),
        }
    }
}

/// REST client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct RestApi {
    http: Client,
    base_url: String,
    token: String,
}

impl RestApi {
    /// Client for `base_url` (e.g. `https://api.example.com`).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&CreateGroup>,
    ) -> Result<reqwest::Response, ApiError> {
        debug!(%method, path, "api request");
        let mut request = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let response = self.send(Method::GET, path, None).await?;
        Ok(response.error_for_status()?.json().await?)
    }

    async fn expect_success(&self, method: Method, path: &str) -> Result<(), ApiError> {
        self.send(method, path, None).await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl ChatApi for RestApi {
    async fn group_messages(&self, group: &GroupId) -> Result<Value, ApiError> {
        self.get_json(&format!("/group/{group}/messages")).await
    }

    async fn private_messages(&self, a: &UserId, b: &UserId) -> Result<Value, ApiError> {
        self.get_json(&format!("/messages/private/{a}/{b}")).await
    }

    async fn project_owners(&self, project: &ProjectId) -> Result<Value, ApiError> {
        self.get_json(&format!("/group/project/{project}/owners"))
            .await
    }

    async fn project_collaborators(&self, project: &ProjectId) -> Result<Value, ApiError> {
        self.get_json(&format!("/group/project/{project}/collaborators"))
            .await
    }

    async fn group_members(&self, group: &GroupId) -> Result<Value, ApiError> {
        self.get_json(&format!("/group/{group}/members")).await
    }

    async fn project_group(&self, project: &ProjectId) -> Result<Option<GroupId>, ApiError> {
        let path = format!("/group/project/{project}");
        let response = self.send(Method::GET, &path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response.error_for_status()?.json().await?;
        Ok(group_id_from(&body))
    }

    async fn create_group(&self, request: &CreateGroup) -> Result<GroupId, ApiError> {
        let response = self
            .send(Method::POST, "/group/create", Some(request))
            .await?;
        let body: Value = response.error_for_status()?.json().await?;
        group_id_from(&body)
            .ok_or_else(|| ApiError::Body("create response has no group id".into()))
    }

    async fn add_member(&self, group: &GroupId, user: &UserId) -> Result<(), ApiError> {
        self.expect_success(Method::POST, &format!("/group/{group}/add-user/{user}"))
            .await
    }

    async fn remove_member(
        &self,
        group: &GroupId,
        user: &UserId,
        method: RemoveMethod,
    ) -> Result<(), ApiError> {
        let method = match method {
            RemoveMethod::Delete => Method::DELETE,
            RemoveMethod::Post => Method::POST,
        };
        self.expect_success(method, &format!("/group/{group}/remove-user/{user}"))
            .await
    }
}
