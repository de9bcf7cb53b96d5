#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::FieldErrors;

/// Final wire snapshot of the wizard's values plus the requester's
/// language tag. Field keys sit flat next to `language`, matching the
/// browser payload shape this endpoint has always accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub language: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SubmissionPayload {
    pub fn new(language: &str, fields: Map<String, Value>) -> Self {
        Self {
            language: language.to_string(),
            fields,
        }
    }

    pub fn fields_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// One result per submission attempt; lives only for the HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub field_errors: Option<BTreeMap<String, Vec<String>>>,
}

impl SubmissionResult {
    pub fn accepted(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            request_id: Some(request_id.into()),
            field_errors: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            request_id: None,
            field_errors: None,
        }
    }

    pub fn invalid(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            request_id: None,
            field_errors: Some(field_errors.into_map()),
        }
    }
}
