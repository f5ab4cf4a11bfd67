//! The result envelope emitted by repository operations.

use crate::envelope::error::AccessError;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Operation-type tag set by `OpResult::from_error`.
pub const ERROR_KIND: &str = "error";

/// One emission of a repository stream.
///
/// Holds at most one of {value, error} in meaning: when `error` is set the
/// envelope is a failure regardless of `value`.
#[derive(Debug, PartialEq, Serialize)]
pub struct OpResult<T> {
    /// Options the operation ran with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    /// Operation-type tag.
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub number: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AccessError>,
    /// Secondary payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Emission time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,
}

impl<T> Default for OpResult<T> {
    fn default() -> Self {
        Self {
            options: None,
            value: None,
            kind: String::new(),
            number: 0,
            message: String::new(),
            error: None,
            data: None,
            time: None,
        }
    }
}

impl<T> OpResult<T> {
    /// Success envelope stamped with the current time.
    pub fn from_value(value: T) -> Self {
        Self {
            value: Some(value),
            time: Some(super::now()),
            ..Self::default()
        }
    }

    /// Failure envelope tagged `error` and stamped with the current time.
    pub fn from_error(error: impl Into<AccessError>) -> Self {
        Self {
            kind: ERROR_KIND.to_string(),
            error: Some(error.into()),
            time: Some(super::now()),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: impl Into<Value>) -> Self {
        self.options = Some(options.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_number(mut self, number: i64) -> Self {
        self.number = number;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_time(mut self, time: Option<DateTime<FixedOffset>>) -> Self {
        self.time = time;
        self
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_ok(&self) -> bool {
        !self.is_err()
    }

    /// The value, unless this envelope is a failure.
    pub fn value(&self) -> Option<&T> {
        if self.is_err() {
            None
        } else {
            self.value.as_ref()
        }
    }

    pub fn error(&self) -> Option<&AccessError> {
        self.error.as_ref()
    }

    /// Collapses the envelope; the error wins over the value.
    ///
    /// An envelope with neither is reported as not found.
    pub fn into_result(self) -> Result<T, AccessError> {
        match (self.error, self.value) {
            (Some(err), _) => Err(err),
            (None, Some(value)) => Ok(value),
            (None, None) => Err(AccessError::not_found()),
        }
    }
}

impl<T: Serialize> Display for OpResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serde_json::to_string(self).unwrap_or_default())
    }
}

fn is_zero(number: &i64) -> bool {
    *number == 0
}

#[cfg(test)]
mod tests {
    use super::OpResult;
    use crate::envelope::{AccessError, StatusError};
    use serde_json::json;

    #[test]
    fn from_error_is_tagged_and_never_a_value() {
        let mut result = OpResult::from_error(StatusError::new(0, "test"));
        result.value = Some(1);
        assert_eq!(result.kind, "error");
        assert!(result.is_err());
        assert_eq!(result.value(), None);
        assert!(result.into_result().is_err());
    }

    #[test]
    fn renders_non_empty_fields_only() {
        let result: OpResult<()> = OpResult::default()
            .with_options(json!({"range": 1}))
            .with_message("testmsg");
        let result = OpResult {
            error: Some(AccessError::Status(StatusError {
                code: 401,
                msg: "Unauthorized".to_string(),
                time: None,
            })),
            ..result
        };

        assert_eq!(
            result.to_string(),
            r#"{"options":{"range":1},"message":"testmsg","error":{"code":401,"message":"Unauthorized"}}"#
        );
    }

    #[test]
    fn equality_ignores_nothing_but_treats_unset_times_alike() {
        let a = OpResult::from_value("x").with_kind("test").with_time(None);
        let b = OpResult::from_value("x").with_kind("test").with_time(None);
        assert_eq!(a, b);

        let c = OpResult::from_value("x").with_kind("test");
        assert_ne!(a, c);

        let d = OpResult::from_value("x").with_kind("test").with_message("other").with_time(None);
        assert_ne!(a, d);
    }

    #[test]
    fn empty_envelope_collapses_to_not_found() {
        let err = OpResult::<u8>::default().into_result().unwrap_err();
        assert!(err.is_not_found());
    }
}
