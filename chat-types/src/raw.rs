//! Field-name adapter for backend payloads.
//!
//! History endpoints and push frames disagree on field names
//! (`id|messageId|_id`, `message|content`, `time|timestamp|createdAt`).
//! [`RawMessage`] absorbs that variance so the rest of the engine only ever
//! sees [`Message`].

use serde_json::{Map, Value};

use crate::{ChatStatus, GroupId, Message, MessageId, UserId, WireError};

const ID_FIELDS: &[&str] = &["id", "messageId", "_id"];
const SENDER_FIELDS: &[&str] = &["senderId", "sender", "userId", "sender_id"];
const RECEIVER_FIELDS: &[&str] = &["receiverId", "receiver", "receiver_id"];
const GROUP_FIELDS: &[&str] = &["groupId", "group_id"];
const CONTENT_FIELDS: &[&str] = &["message", "content"];
const TIME_FIELDS: &[&str] = &["time", "timestamp", "createdAt"];

/// An untyped message record as delivered by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    fields: Map<String, Value>,
}

impl RawMessage {
    /// Wrap a JSON value. Only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(WireError::NotAnObject(kind_of(&other))),
        }
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Server id, if any. Blank ids count as absent.
    pub fn id(&self) -> Option<MessageId> {
        ID_FIELDS
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .filter_map(scalar_to_string)
            .find(|id| !id.trim().is_empty())
            .map(MessageId::new)
    }

    /// Author.
    pub fn sender_id(&self) -> Option<UserId> {
        self.pick(SENDER_FIELDS).map(UserId::new)
    }

    /// Addressee, on private messages.
    pub fn receiver_id(&self) -> Option<UserId> {
        self.pick(RECEIVER_FIELDS).map(UserId::new)
    }

    /// Group, on group messages.
    pub fn group_id(&self) -> Option<GroupId> {
        self.pick(GROUP_FIELDS).map(GroupId::new)
    }

    /// Message body.
    pub fn content(&self) -> Option<String> {
        self.pick(CONTENT_FIELDS)
    }

    /// Display timestamp.
    pub fn timestamp(&self) -> Option<String> {
        self.pick(TIME_FIELDS)
    }

    /// Payload kind, when the record carries one.
    pub fn status(&self) -> Option<ChatStatus> {
        self.fields
            .get("status")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Normalize into the canonical shape, tagging `is_own` for `me`.
    pub fn to_message(&self, me: &UserId) -> Result<Message, WireError> {
        let sender_id = self
            .sender_id()
            .ok_or(WireError::MissingField("senderId"))?;
        let content = self.content().ok_or(WireError::MissingField("message"))?;
        let timestamp = self.timestamp().unwrap_or_default();

        Ok(Message {
            id: self.id(),
            sender_id,
            content,
            timestamp,
            is_own: false,
        }
        .tagged_for(me))
    }

    /// First non-null value among `keys`, rendered as a string.
    fn pick(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .find_map(scalar_to_string)
    }
}

/// Parse a list of user ids.
///
/// Accepts an array of scalars (`["a", 7]`) or of objects carrying
/// `id|userId|_id`. Entries that carry no usable id are skipped.
pub fn parse_user_ids(value: Value) -> Result<Vec<UserId>, WireError> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(WireError::NotAnArray(kind_of(&other))),
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::Object(fields) => ["id", "userId", "_id"]
                .iter()
                .filter_map(|key| fields.get(*key))
                .find_map(scalar_to_string),
            other => scalar_to_string(other),
        })
        .filter(|id| !id.trim().is_empty())
        .map(UserId::new)
        .collect())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        // Mongo-style `{"$oid": "..."}`
        Value::Object(map) => map.get("$oid").and_then(scalar_to_string),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn me() -> UserId {
        UserId::from("A")
    }

    // ===========================================
    // Field Name Variance Tests
    // ===========================================

    #[test]
    fn canonical_field_names() {
        let raw = RawMessage::from_value(json!({
            "id": "1", "senderId": "A", "content": "hi", "timestamp": "10:00"
        }))
        .unwrap();
        let msg = raw.to_message(&me()).unwrap();

        assert_eq!(msg.id, Some(MessageId::from("1")));
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.timestamp, "10:00");
        assert!(msg.is_own);
    }

    #[test]
    fn alternate_field_names() {
        let raw = RawMessage::from_value(json!({
            "messageId": 17, "senderId": "B", "message": "yo", "time": "10:05"
        }))
        .unwrap();
        let msg = raw.to_message(&me()).unwrap();

        assert_eq!(msg.id, Some(MessageId::from("17")));
        assert_eq!(msg.content, "yo");
        assert_eq!(msg.timestamp, "10:05");
        assert!(!msg.is_own);
    }

    #[test]
    fn mongo_style_id_and_created_at() {
        let raw = RawMessage::from_value(json!({
            "_id": {"$oid": "abc"}, "sender": "B", "message": "x", "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        let msg = raw.to_message(&me()).unwrap();

        assert_eq!(msg.id, Some(MessageId::from("abc")));
        assert_eq!(msg.sender_id, UserId::from("B"));
        assert_eq!(msg.timestamp, "2024-05-01T10:00:00Z");
    }

    #[test]
    fn null_id_is_absent() {
        let raw = RawMessage::from_value(json!({
            "id": null, "senderId": "A", "message": "x", "time": "t"
        }))
        .unwrap();
        assert_eq!(raw.to_message(&me()).unwrap().id, None);
    }

    #[test]
    fn blank_id_is_absent() {
        let raw = RawMessage::from_value(json!({
            "id": "", "_id": "  ", "senderId": "A", "message": "x", "time": "t"
        }))
        .unwrap();
        assert_eq!(raw.id(), None);
        assert_eq!(raw.to_message(&me()).unwrap().id, None);
    }

    #[test]
    fn push_routing_fields() {
        let raw = RawMessage::from_json(
            r#"{"senderId":"B","receiverId":"A","message":"hey","status":"MESSAGE"}"#,
        )
        .unwrap();
        assert_eq!(raw.receiver_id(), Some(UserId::from("A")));
        assert_eq!(raw.status(), Some(ChatStatus::Message));
        assert_eq!(raw.group_id(), None);
    }

    // ===========================================
    // Error Tests
    // ===========================================

    #[test]
    fn missing_sender_is_rejected() {
        let raw = RawMessage::from_value(json!({"message": "x"})).unwrap();
        assert!(matches!(
            raw.to_message(&me()),
            Err(WireError::MissingField("senderId"))
        ));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            RawMessage::from_value(json!([1, 2])),
            Err(WireError::NotAnObject("array"))
        ));
        assert!(matches!(
            RawMessage::from_json("not json"),
            Err(WireError::Json(_))
        ));
    }

    // ===========================================
    // User List Tests
    // ===========================================

    #[test]
    fn user_ids_from_scalars_and_objects() {
        let ids = parse_user_ids(json!(["a", 7, {"userId": "b"}, {"id": ""}, {"name": "x"}])).unwrap();
        assert_eq!(
            ids,
            vec![UserId::from("a"), UserId::from("7"), UserId::from("b")]
        );
    }
}
