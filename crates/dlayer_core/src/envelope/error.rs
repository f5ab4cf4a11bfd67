//! Status errors and the error type carried inside an `OpResult`.

use crate::driver::DriverError;
use chrono::{DateTime, FixedOffset};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const NOT_FOUND_CODE: u16 = 404;
pub const NOT_FOUND_MESSAGE: &str = "Resource not found";

const DRIVER_ERROR_CODE: u16 = 500;

/// Coded error value. Its `Display` form is its JSON representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusError {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: u16,
    #[serde(rename = "message", default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,
}

impl StatusError {
    /// Creates an error stamped with the current time.
    pub fn new(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            time: Some(super::now()),
        }
    }

    pub fn not_found() -> Self {
        Self::new(NOT_FOUND_CODE, NOT_FOUND_MESSAGE)
    }
}

impl Display for StatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serde_json::to_string(self).unwrap_or_default())
    }
}

impl Error for StatusError {}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

/// Error emitted through a result stream.
#[derive(Debug)]
pub enum AccessError {
    Status(StatusError),
    Driver(DriverError),
}

impl AccessError {
    pub fn not_found() -> Self {
        Self::Status(StatusError::not_found())
    }

    /// Status code; driver failures report 500.
    pub fn code(&self) -> u16 {
        match self {
            Self::Status(status) => status.code,
            Self::Driver(_) => DRIVER_ERROR_CODE,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == NOT_FOUND_CODE
    }

    /// Status view of this error, used for serialization.
    pub fn to_status(&self) -> StatusError {
        match self {
            Self::Status(status) => status.clone(),
            Self::Driver(err) => StatusError {
                code: DRIVER_ERROR_CODE,
                msg: err.to_string(),
                time: None,
            },
        }
    }
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Driver(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Status(status) => Some(status),
            Self::Driver(err) => Some(err),
        }
    }
}

/// Status errors compare field-wise; driver errors by their message.
impl PartialEq for AccessError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Status(a), Self::Status(b)) => a == b,
            (Self::Driver(a), Self::Driver(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Serialize for AccessError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let status = self.to_status();
        let len = 1 + usize::from(!status.msg.is_empty()) + usize::from(status.time.is_some());
        let mut state = serializer.serialize_struct("AccessError", len)?;
        state.serialize_field("code", &status.code)?;
        if !status.msg.is_empty() {
            state.serialize_field("message", &status.msg)?;
        }
        if let Some(time) = &status.time {
            state.serialize_field("time", time)?;
        }
        state.end()
    }
}

impl From<StatusError> for AccessError {
    fn from(value: StatusError) -> Self {
        Self::Status(value)
    }
}

impl From<DriverError> for AccessError {
    fn from(value: DriverError) -> Self {
        Self::Driver(value)
    }
}
