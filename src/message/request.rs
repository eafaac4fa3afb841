//! Client → relay kinds

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Header, Kind};

/// Request to join the relay under the sender's name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    #[serde(flatten)]
    header: Header,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            header: Header::new(username),
        }
    }

    pub fn at(datetime: DateTime<Utc>, username: impl Into<String>) -> Self {
        Self {
            header: Header::at(datetime, username),
        }
    }

    /// Requested username (the sender)
    pub fn username(&self) -> &str {
        self.header.sender()
    }
}

impl Kind for LoginRequest {
    const TAG: &'static str = "ca.uwo.eng.se3313.lab4.network.request.LoginRequest";
    const NAME: &'static str = "login";

    fn header(&self) -> &Header {
        &self.header
    }

    fn write_fields(&self, _object: &mut Map<String, Value>) {}
}

/// Chat line sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageRequest {
    #[serde(flatten)]
    header: Header,
    content: String,
}

impl MessageRequest {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::at(super::datetime::now(), sender, content)
    }

    pub fn at(
        datetime: DateTime<Utc>,
        sender: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            header: Header::at(datetime, sender),
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl Kind for MessageRequest {
    const TAG: &'static str = "ca.uwo.eng.se3313.lab4.network.request.MessageRequest";
    const NAME: &'static str = "message";

    fn header(&self) -> &Header {
        &self.header
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("content".to_string(), Value::String(self.content.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_request_decode() {
        let object = json!({
            "datetime": "2016-11-02 13:05:09.000000 +0000",
            "sender": "alice",
            "content": "hello",
        });
        let request = MessageRequest::from_object(&object).unwrap();
        assert_eq!(request.sender(), "alice");
        assert_eq!(request.content(), "hello");
    }

    #[test]
    fn test_message_request_requires_content() {
        let object = json!({
            "datetime": "2016-11-02 13:05:09.000000 +0000",
            "sender": "alice",
        });
        assert!(MessageRequest::from_object(&object).is_err());
    }

    #[test]
    fn test_login_request_rejects_bad_datetime() {
        let object = json!({ "datetime": "noon", "sender": "alice" });
        assert!(LoginRequest::from_object(&object).is_err());
    }

    #[test]
    fn test_login_request_rejects_non_object() {
        assert!(LoginRequest::from_object(&json!("alice")).is_err());
    }
}
