//! Error codes carried by `ErrorResponse`
//!
//! The numeric values are part of the wire contract.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error codes for `ErrorResponse`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// No error
    None = 0,
    /// The username already exists on the server
    UserNameInUse = 1,
    /// The username was invalid (e.g. empty)
    InvalidUserName = 2,
    /// Valid request, but invalid timing
    InvalidRequestFromClient = 50,
    /// The request could not be read at all
    MalformedRequestUnknown = 200,
    /// The envelope has no `type` (or no `object`)
    MalformedRequestNoType = 201,
    MalformedRequestUnknownType = 202,
    /// The inner object does not decode for its tag
    MalformedRequestBadObjectDef = 203,
    MalformedRequestNoObj = 210,
}

impl ErrorCode {
    /// Every code, in wire order
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::None,
        ErrorCode::UserNameInUse,
        ErrorCode::InvalidUserName,
        ErrorCode::InvalidRequestFromClient,
        ErrorCode::MalformedRequestUnknown,
        ErrorCode::MalformedRequestNoType,
        ErrorCode::MalformedRequestUnknownType,
        ErrorCode::MalformedRequestBadObjectDef,
        ErrorCode::MalformedRequestNoObj,
    ];

    /// Numeric wire value
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Symbolic name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::None => "NONE",
            ErrorCode::UserNameInUse => "USER_NAME_IN_USE",
            ErrorCode::InvalidUserName => "INVALID_USER_NAME",
            ErrorCode::InvalidRequestFromClient => "INVALID_REQUEST_FROM_CLIENT",
            ErrorCode::MalformedRequestUnknown => "MALFORMED_REQUEST_UNKNOWN",
            ErrorCode::MalformedRequestNoType => "MALFORMED_REQUEST_NO_TYPE",
            ErrorCode::MalformedRequestUnknownType => "MALFORMED_REQUEST_UNKNOWN_TYPE",
            ErrorCode::MalformedRequestBadObjectDef => "MALFORMED_REQUEST_BAD_OBJECT_DEF",
            ErrorCode::MalformedRequestNoObj => "MALFORMED_REQUEST_NO_OBJ",
        }
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|code| code.code() == value)
            .ok_or(value)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.as_str(), self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Some peers emit every scalar as a string, so "203" is accepted too.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCode {
            Number(u16),
            Text(String),
        }

        let value = match RawCode::deserialize(deserializer)? {
            RawCode::Number(value) => value,
            RawCode::Text(text) => text.trim().parse::<u16>().map_err(|_| {
                serde::de::Error::custom(format!("error code is not numeric: {text:?}"))
            })?,
        };

        ErrorCode::try_from(value)
            .map_err(|value| serde::de::Error::custom(format!("unknown error code {value}")))
    }
}
