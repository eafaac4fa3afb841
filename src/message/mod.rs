//! Message envelope model
//!
//! Every protocol object travels in the same two-level shape:
//!
//! ```text
//! { "type": <tag>, "object": { "datetime": ..., "sender": ..., <kind fields> } }
//! ```
//!
//! Each kind implements [`Kind`], which knows its stable tag and how to move
//! between the typed value and the inner `object` tree. [`Envelope`] is the
//! closed sum over the kinds this crate ships.

pub mod codec;
pub mod datetime;
mod error_code;
mod request;
mod response;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ProtocolError;

pub use error_code::ErrorCode;
pub use request::{LoginRequest, MessageRequest};
pub use response::{ErrorResponse, LoginResponse, MessageResponse};

/// Outer field holding the tag
pub const PROPERTY_TYPE: &str = "type";
/// Outer field holding the inner object
pub const PROPERTY_OBJECT: &str = "object";
/// Inner field naming who sent the object
pub const PROPERTY_SENDER: &str = "sender";
/// Inner field holding the send time
pub const PROPERTY_DATETIME: &str = "datetime";

/// Sender identity the relay uses for everything it originates
pub const SERVER_SENDER: &str = "@server";
/// Originator used when a request cannot be attributed
pub const UNKNOWN_SENDER: &str = "@unknown";

/// Fields common to every kind
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Header {
    #[serde(deserialize_with = "datetime::deserialize")]
    datetime: DateTime<Utc>,
    sender: String,
}

impl Header {
    /// Header stamped with the current time
    pub fn new(sender: impl Into<String>) -> Self {
        Self::at(datetime::now(), sender)
    }

    /// Header with an explicit timestamp
    pub fn at(datetime: DateTime<Utc>, sender: impl Into<String>) -> Self {
        Self {
            datetime,
            sender: sender.into(),
        }
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    fn base_object(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert(
            PROPERTY_DATETIME.to_string(),
            Value::String(datetime::format(&self.datetime)),
        );
        object.insert(PROPERTY_SENDER.to_string(), Value::String(self.sender.clone()));
        object
    }
}

/// A protocol object kind
///
/// `TAG` is the wire identity and must be unique within a registry.
/// Decoding goes through serde; encoding writes the header followed by the
/// kind's own fields.
pub trait Kind: DeserializeOwned + Into<Envelope> {
    /// Stable type tag
    const TAG: &'static str;

    /// Short name used in error messages
    const NAME: &'static str;

    fn header(&self) -> &Header;

    /// Write the kind-specific fields into the inner object
    fn write_fields(&self, object: &mut Map<String, Value>);

    fn sender(&self) -> &str {
        self.header().sender()
    }

    fn datetime(&self) -> DateTime<Utc> {
        self.header().datetime()
    }

    /// Inner `object` tree
    fn to_object(&self) -> Value {
        let mut object = self.header().base_object();
        self.write_fields(&mut object);
        Value::Object(object)
    }

    /// Full envelope tree
    fn to_value(&self) -> Value {
        wrap(Self::TAG, self.to_object())
    }

    /// Decode the inner `object` tree
    fn from_object(object: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(object)
    }
}

/// Build the outer tree around an inner object
pub fn wrap(tag: &str, object: Value) -> Value {
    let mut outer = Map::new();
    outer.insert(PROPERTY_TYPE.to_string(), Value::String(tag.to_string()));
    outer.insert(PROPERTY_OBJECT.to_string(), object);
    Value::Object(outer)
}

/// Split a tree into its tag and inner object
///
/// A missing `type` or `object`, or a `type` that is not a string, is a
/// malformed envelope.
pub fn split(tree: &Value) -> Result<(&str, &Value), ProtocolError> {
    let tag = tree.get(PROPERTY_TYPE).and_then(Value::as_str);
    let object = tree.get(PROPERTY_OBJECT);

    match (tag, object) {
        (Some(tag), Some(object)) => Ok((tag, object)),
        _ => Err(ProtocolError::MalformedEnvelope {
            tree: codec::serialize(tree, false),
        }),
    }
}

/// Decode an inner object as kind `K`
pub fn decode_object<K: Kind>(object: &Value) -> Result<K, ProtocolError> {
    K::from_object(object).map_err(|source| ProtocolError::BadObject {
        kind: K::NAME,
        payload: codec::serialize(object, false),
        source,
    })
}

/// Any protocol object known to this crate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    LoginRequest(LoginRequest),
    MessageRequest(MessageRequest),
    LoginResponse(LoginResponse),
    MessageResponse(MessageResponse),
    Error(ErrorResponse),
}

impl Envelope {
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::LoginRequest(_) => LoginRequest::TAG,
            Envelope::MessageRequest(_) => MessageRequest::TAG,
            Envelope::LoginResponse(_) => LoginResponse::TAG,
            Envelope::MessageResponse(_) => MessageResponse::TAG,
            Envelope::Error(_) => ErrorResponse::TAG,
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Envelope::LoginRequest(inner) => inner.header(),
            Envelope::MessageRequest(inner) => inner.header(),
            Envelope::LoginResponse(inner) => inner.header(),
            Envelope::MessageResponse(inner) => inner.header(),
            Envelope::Error(inner) => inner.header(),
        }
    }

    pub fn sender(&self) -> &str {
        self.header().sender()
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.header().datetime()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error(_))
    }

    /// Encode to the wire tree
    pub fn to_value(&self) -> Value {
        match self {
            Envelope::LoginRequest(inner) => inner.to_value(),
            Envelope::MessageRequest(inner) => inner.to_value(),
            Envelope::LoginResponse(inner) => inner.to_value(),
            Envelope::MessageResponse(inner) => inner.to_value(),
            Envelope::Error(inner) => inner.to_value(),
        }
    }

    /// Encode to wire text
    pub fn to_json(&self, pretty: bool) -> String {
        codec::serialize(&self.to_value(), pretty)
    }

    /// Decode any known kind from a tree
    ///
    /// Unlike a registry this knows every kind in the crate, so it is mostly
    /// useful to peers that just want to inspect traffic.
    pub fn from_value(tree: &Value) -> Result<Envelope, ProtocolError> {
        let (tag, object) = split(tree)?;
        match tag {
            LoginRequest::TAG => decode_object::<LoginRequest>(object).map(Into::into),
            MessageRequest::TAG => decode_object::<MessageRequest>(object).map(Into::into),
            LoginResponse::TAG => decode_object::<LoginResponse>(object).map(Into::into),
            MessageResponse::TAG => decode_object::<MessageResponse>(object).map(Into::into),
            ErrorResponse::TAG => decode_object::<ErrorResponse>(object).map(Into::into),
            other => Err(ProtocolError::UnknownType {
                tag: other.to_string(),
            }),
        }
    }

    /// Decode any known kind from wire text
    pub fn from_json(text: &str) -> Result<Envelope, ProtocolError> {
        Self::from_value(&codec::parse(text)?)
    }
}

impl From<LoginRequest> for Envelope {
    fn from(inner: LoginRequest) -> Self {
        Envelope::LoginRequest(inner)
    }
}

impl From<MessageRequest> for Envelope {
    fn from(inner: MessageRequest) -> Self {
        Envelope::MessageRequest(inner)
    }
}

impl From<LoginResponse> for Envelope {
    fn from(inner: LoginResponse) -> Self {
        Envelope::LoginResponse(inner)
    }
}

impl From<MessageResponse> for Envelope {
    fn from(inner: MessageResponse) -> Self {
        Envelope::MessageResponse(inner)
    }
}

impl From<ErrorResponse> for Envelope {
    fn from(inner: ErrorResponse) -> Self {
        Envelope::Error(inner)
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(envelope: Envelope) {
        let decoded = Envelope::from_json(&envelope.to_json(false)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_login_request_round_trip() {
        let request = LoginRequest::new("alice");
        let decoded = Envelope::from_value(&request.to_value()).unwrap();
        match decoded {
            Envelope::LoginRequest(login) => {
                assert_eq!(login.sender(), "alice");
                assert_eq!(login.datetime(), request.datetime());
            }
            other => panic!("Wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_every_kind_round_trips() {
        round_trip(MessageRequest::new("alice", "hi there").into());
        round_trip(LoginResponse::new("bob").into());
        round_trip(MessageResponse::new("bob", "hello").into());
        round_trip(
            ErrorResponse::new(UNKNOWN_SENDER, ErrorCode::MalformedRequestNoType, "bad").into(),
        );
    }

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::from(MessageResponse::new("alice", "hi"));
        let tree = envelope.to_value();

        assert_eq!(tree[PROPERTY_TYPE], json!(MessageResponse::TAG));
        let object = &tree[PROPERTY_OBJECT];
        assert_eq!(object["sender"], json!(SERVER_SENDER));
        assert_eq!(object["originator"], json!("alice"));
        assert_eq!(object["content"], json!("hi"));
        assert!(object["datetime"].is_string());
    }

    #[test]
    fn test_split_requires_type_and_object() {
        assert!(split(&json!({ "object": {} })).is_err());
        assert!(split(&json!({ "type": "x" })).is_err());
        assert!(split(&json!({ "type": 4, "object": {} })).is_err());

        let tree = json!({ "type": "x", "object": { "a": 1 } });
        let (tag, object) = split(&tree).unwrap();
        assert_eq!(tag, "x");
        assert_eq!(object, &json!({ "a": 1 }));
    }

    #[test]
    fn test_unknown_tag_is_reported() {
        let err = Envelope::from_value(&json!({ "type": "nope", "object": {} })).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType { tag } if tag == "nope"));
    }

    #[test]
    fn test_missing_header_field_is_bad_object() {
        let tree = json!({
            "type": LoginRequest::TAG,
            "object": { "sender": "alice" },
        });
        let err = Envelope::from_value(&tree).unwrap_err();
        assert!(matches!(err, ProtocolError::BadObject { kind: "login", .. }));
    }
}
