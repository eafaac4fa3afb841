//! Relay → client kinds
//!
//! All three are originated by the relay, so their constructors stamp
//! `SERVER_SENDER` as the sender.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{datetime, ErrorCode, Header, Kind, SERVER_SENDER, UNKNOWN_SENDER};
use crate::error::{ProtocolError, Rejection};

/// Announces that a user joined
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    header: Header,
    joining_username: String,
}

impl LoginResponse {
    pub fn new(joining_username: impl Into<String>) -> Self {
        Self::at(datetime::now(), SERVER_SENDER, joining_username)
    }

    pub fn at(
        datetime: DateTime<Utc>,
        sender: impl Into<String>,
        joining_username: impl Into<String>,
    ) -> Self {
        Self {
            header: Header::at(datetime, sender),
            joining_username: joining_username.into(),
        }
    }

    pub fn joining_username(&self) -> &str {
        &self.joining_username
    }
}

impl Kind for LoginResponse {
    const TAG: &'static str = "ca.uwo.eng.se3313.lab4.network.response.LoginResponse";
    const NAME: &'static str = "login";

    fn header(&self) -> &Header {
        &self.header
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "joiningUsername".to_string(),
            Value::String(self.joining_username.clone()),
        );
    }
}

/// Chat line relayed to every peer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    header: Header,
    originator: String,
    content: String,
}

impl MessageResponse {
    pub fn new(originator: impl Into<String>, content: impl Into<String>) -> Self {
        Self::at(datetime::now(), SERVER_SENDER, originator, content)
    }

    pub fn at(
        datetime: DateTime<Utc>,
        sender: impl Into<String>,
        originator: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            header: Header::at(datetime, sender),
            originator: originator.into(),
            content: content.into(),
        }
    }

    /// Who wrote the line
    pub fn originator(&self) -> &str {
        &self.originator
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl Kind for MessageResponse {
    const TAG: &'static str = "ca.uwo.eng.se3313.lab4.network.response.MessageResponse";
    const NAME: &'static str = "message";

    fn header(&self) -> &Header {
        &self.header
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("originator".to_string(), Value::String(self.originator.clone()));
        object.insert("content".to_string(), Value::String(self.content.clone()));
    }
}

/// Typed failure reported back to a peer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    #[serde(flatten)]
    header: Header,
    originator: String,
    code: ErrorCode,
    message: String,
}

impl ErrorResponse {
    pub fn new(originator: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::at(datetime::now(), SERVER_SENDER, originator, code, message)
    }

    pub fn at(
        datetime: DateTime<Utc>,
        sender: impl Into<String>,
        originator: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            header: Header::at(datetime, sender),
            originator: originator.into(),
            code,
            message: message.into(),
        }
    }

    /// Who found the error
    pub fn originator(&self) -> &str {
        &self.originator
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable description
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Kind for ErrorResponse {
    const TAG: &'static str = "ca.uwo.eng.se3313.lab4.network.response.ServerError";
    const NAME: &'static str = "error";

    fn header(&self) -> &Header {
        &self.header
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("code".to_string(), Value::from(self.code.code()));
        object.insert("message".to_string(), Value::String(self.message.clone()));
        object.insert("originator".to_string(), Value::String(self.originator.clone()));
    }
}

/// Convert ProtocolError to ErrorResponse for peer notification
///
/// A missing tag and an unknown tag share `MALFORMED_REQUEST_NO_TYPE` on the
/// wire; the message text tells them apart.
impl From<ProtocolError> for ErrorResponse {
    fn from(err: ProtocolError) -> Self {
        let code = match &err {
            ProtocolError::Parse(_) => ErrorCode::MalformedRequestUnknown,
            ProtocolError::MalformedEnvelope { .. } => ErrorCode::MalformedRequestNoType,
            ProtocolError::UnknownType { .. } => ErrorCode::MalformedRequestNoType,
            ProtocolError::BadObject { .. } => ErrorCode::MalformedRequestBadObjectDef,
        };
        ErrorResponse::new(UNKNOWN_SENDER, code, err.to_string())
    }
}

/// Convert Rejection to ErrorResponse for peer notification
impl From<Rejection> for ErrorResponse {
    fn from(err: Rejection) -> Self {
        let code = match &err {
            Rejection::UserNameInUse(_) => ErrorCode::UserNameInUse,
            Rejection::InvalidUserName => ErrorCode::InvalidUserName,
            Rejection::AlreadyLoggedIn(_)
            | Rejection::NotLoggedIn
            | Rejection::UnknownConnection => ErrorCode::InvalidRequestFromClient,
        };
        ErrorResponse::new(SERVER_SENDER, code, err.to_string())
    }
}
