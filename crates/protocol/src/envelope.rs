//! RPC message envelopes.
//!
//! Three frame shapes travel over the channel:
//! - [`Request`]: carries an `id`, expects a correlated [`Response`]
//! - [`Notification`]: one-way, no `id`, never answered
//! - [`Response`]: correlates to a request by `id`, carries result or error
//!
//! Incoming frames are decoded through the untagged [`Message`] union:
//! a frame with an `id` and no `method` is a response, a frame with a
//! `method` and no `id` is a notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound call expecting a correlated response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request ID for correlating the response
    pub id: u32,
    /// Method name to invoke
    pub method: String,
    /// Positional parameters as a JSON array
    pub params: Value,
}

/// One-way message in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Method name
    pub method: String,
    /// Positional parameters as a JSON array
    pub params: Value,
}

/// Response to a [`Request`], correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response correlates to
    pub id: u32,
    /// Success result (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error result (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// Error details reported by the worker for a failed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error message
    pub message: String,
    /// Error type name, if the worker supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remote stack trace, if available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Discriminated union of incoming frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Response message (has `id`, no `method`)
    Response(Response),
    /// Notification message (has `method`, no `id`)
    Notification(Notification),
    /// Unknown frame shape (forward-compatible catch-all)
    Unknown(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserialization_response() {
        let json = r#"{"id": 42, "result": {"delivered": true}}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        match message {
            Message::Response(response) => {
                assert_eq!(response.id, 42);
                assert!(response.result.is_some());
                assert!(response.error.is_none());
            }
            _ => panic!("Expected Response"),
        }
    }

    #[test]
    fn test_message_deserialization_notification() {
        let json = r#"{"method": "NotifyTitleChanged", "params": [1, "hello"]}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        match message {
            Message::Notification(notification) => {
                assert_eq!(notification.method, "NotifyTitleChanged");
                assert_eq!(notification.params[0], 1);
                assert_eq!(notification.params[1], "hello");
            }
            _ => panic!("Expected Notification"),
        }
    }

    #[test]
    fn test_message_deserialization_error_response() {
        let json = r#"{"id": 7, "error": {"message": "no such browser", "name": "ArgumentError"}}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        match message {
            Message::Response(response) => {
                assert_eq!(response.id, 7);
                let error = response.error.unwrap();
                assert_eq!(error.message, "no such browser");
                assert_eq!(error.name.as_deref(), Some("ArgumentError"));
                assert!(error.stack.is_none());
            }
            _ => panic!("Expected Response"),
        }
    }

    #[test]
    fn test_notification_serialization_omits_id() {
        let notification = Notification {
            method: "CloseHost".to_string(),
            params: serde_json::json!([]),
        };

        let value = serde_json::to_value(&notification).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["method"], "CloseHost");
    }
}
