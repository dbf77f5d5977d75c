//! HistoryLoader - snapshot fetch for a conversation.

use serde_json::Value;
use tracing::{debug, warn};

use huddle_types::{Conversation, GroupId, Message, RawMessage, UserId};

use crate::api::{ApiError, ChatApi};
use crate::error::FetchError;

/// Fetches message history through a [`ChatApi`].
///
/// Every record is normalized with [`RawMessage::to_message`] and tagged
/// for the local user. Records missing a sender or body are skipped.
#[derive(Debug, Clone)]
pub struct HistoryLoader<A> {
    api: A,
    me: UserId,
}

impl<A: ChatApi> HistoryLoader<A> {
    /// Loader for the local user `me`.
    pub fn new(api: A, me: UserId) -> Self {
        Self { api, me }
    }

    /// Ordered history of `group`.
    pub async fn fetch_group_history(&self, group: &GroupId) -> Result<Vec<Message>, FetchError> {
        let context = format!("group:{group}");
        let body = self
            .api
            .group_messages(group)
            .await
            .map_err(|source| fetch_error(&context, source))?;
        self.normalize(&context, body)
    }

    /// Ordered history between `a` and `b`.
    pub async fn fetch_private_history(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Vec<Message>, FetchError> {
        let context = format!("private:{a}:{b}");
        let body = self
            .api
            .private_messages(a, b)
            .await
            .map_err(|source| fetch_error(&context, source))?;
        self.normalize(&context, body)
    }

    /// History of whichever conversation `target` names, seen from `me`.
    pub async fn fetch(&self, target: &Conversation) -> Result<Vec<Message>, FetchError> {
        match target {
            Conversation::Group { group_id, .. } => self.fetch_group_history(group_id).await,
            Conversation::Private { peer_user_id } => {
                self.fetch_private_history(&self.me, peer_user_id).await
            }
        }
    }

    fn normalize(&self, context: &str, body: Value) -> Result<Vec<Message>, FetchError> {
        let records = match body {
            Value::Array(records) => records,
            other => {
                let source = ApiError::Body(format!("expected an array, got {}", kind(&other)));
                return Err(fetch_error(context, source));
            }
        };

        let total = records.len();
        let messages: Vec<Message> = records
            .into_iter()
            .filter_map(|record| {
                match RawMessage::from_value(record).and_then(|raw| raw.to_message(&self.me)) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        warn!(context, error = %e, "skipping malformed history record");
                        None
                    }
                }
            })
            .collect();
        debug!(context, total, kept = messages.len(), "history loaded");
        Ok(messages)
    }
}

fn fetch_error(context: &str, source: ApiError) -> FetchError {
    FetchError {
        conversation: context.to_string(),
        source,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApi;
    use serde_json::json;

    fn loader(api: &MockApi) -> HistoryLoader<MockApi> {
        HistoryLoader::new(api.clone(), UserId::from("A"))
    }

    // ===========================================
    // Normalization Tests
    // ===========================================

    #[tokio::test]
    async fn group_history_is_normalized_and_tagged() {
        let api = MockApi::new();
        api.set_group_history(
            "g1",
            json!([
                {"id": 1, "senderId": "B", "message": "hi", "time": "10:00"},
                {"_id": "2", "sender": "A", "content": "hello", "timestamp": "10:01"},
            ]),
        );

        let messages = loader(&api)
            .fetch_group_history(&"g1".into())
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert!(!messages[0].is_own);
        assert_eq!(messages[1].sender_id, UserId::from("A"));
        assert!(messages[1].is_own);
        assert_eq!(messages[1].timestamp, "10:01");
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let api = MockApi::new();
        api.set_group_history(
            "g1",
            json!([
                {"senderId": "B", "message": "ok", "time": "1"},
                {"message": "no sender"},
                "not an object",
                {"senderId": "C", "message": "also ok", "time": "2"},
            ]),
        );

        let messages = loader(&api)
            .fetch_group_history(&"g1".into())
            .await
            .unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["ok", "also ok"]);
    }

    #[tokio::test]
    async fn private_fetch_uses_local_user_and_peer() {
        let api = MockApi::new();
        api.set_private_history(
            "B",
            "A",
            json!([{"senderId": "A", "receiverId": "B", "message": "yo", "time": "1"}]),
        );

        let messages = loader(&api)
            .fetch(&Conversation::private("B"))
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_own);
    }

    #[tokio::test]
    async fn empty_history_is_empty_list() {
        let api = MockApi::new();
        let messages = loader(&api)
            .fetch(&Conversation::group("g9", "p1"))
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    // ===========================================
    // Failure Tests
    // ===========================================

    #[tokio::test]
    async fn non_array_body_fails() {
        let api = MockApi::new();
        api.set_group_history("g1", json!({"messages": []}));

        let err = loader(&api)
            .fetch_group_history(&"g1".into())
            .await
            .unwrap_err();
        assert_eq!(err.conversation, "group:g1");
        assert!(matches!(err.source, ApiError::Body(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_fetch_error() {
        let api = MockApi::new();
        api.fail_next_request("connection reset");

        let err = loader(&api)
            .fetch_private_history(&"A".into(), &"B".into())
            .await
            .unwrap_err();
        assert_eq!(err.conversation, "private:A:B");
        assert!(err.to_string().contains("connection reset"));
    }
}
