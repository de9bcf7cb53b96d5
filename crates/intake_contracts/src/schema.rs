#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde_json::Value;

use crate::common::{FieldErrors, Language, SchemaVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    Contact,
    DataRequest,
}

impl FormKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FormKind::Contact => "contact",
            FormKind::DataRequest => "data_request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    MultiSelect,
    Consent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldFormat {
    Email,
}

/// One declarative rule per form field. Rules are immutable after load:
/// the catalogs in `forms` are `&'static` tables shared verbatim by the
/// wizard and the request handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub label_en: &'static str,
    pub label_ja: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub format: Option<FieldFormat>,
    pub allowed: Option<&'static [&'static str]>,
}

impl FieldRule {
    pub fn label(&self, language: Language) -> &'static str {
        match language {
            Language::En => self.label_en,
            Language::Ja => self.label_ja,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Selections(Vec<String>),
    Flag(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_selections(&self) -> Option<&[String]> {
        match self {
            FieldValue::Selections(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

/// Snapshot of a submission after schema validation: trimmed text,
/// scalar selections coerced to singletons, absent optionals omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSubmission {
    pub form: FormKind,
    pub language: Language,
    pub values: BTreeMap<String, FieldValue>,
}

impl NormalizedSubmission {
    pub fn text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(FieldValue::as_text)
    }

    pub fn selections(&self, field: &str) -> Option<&[String]> {
        self.values.get(field).and_then(FieldValue::as_selections)
    }

    pub fn flag(&self, field: &str) -> Option<bool> {
        self.values.get(field).and_then(FieldValue::as_flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormSchema {
    pub form: FormKind,
    pub version: SchemaVersion,
    pub fields: &'static [FieldRule],
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldRule> {
        self.fields.iter().find(|rule| rule.name == name)
    }

    /// Validates a raw JSON object against the full field set. Every field
    /// is evaluated independently and ALL violations are collected; a bad
    /// value in one field never hides or causes a violation in another.
    /// Extra keys in `data` are ignored.
    pub fn validate(
        &self,
        data: &Value,
        language: Language,
    ) -> Result<NormalizedSubmission, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut values = BTreeMap::new();
        for rule in self.fields {
            match check_rule(rule, data.get(rule.name)) {
                Ok(Some(value)) => {
                    values.insert(rule.name.to_string(), value);
                }
                Ok(None) => {}
                Err(messages) => {
                    for message in messages {
                        errors.push(rule.name, message);
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(NormalizedSubmission {
                form: self.form,
                language,
                values,
            })
        } else {
            Err(errors)
        }
    }

    /// Same evaluation restricted to a subset of field names. Used by the
    /// wizard to validate one step at a time. Returns an empty map when
    /// the subset is clean.
    pub fn validate_fields(&self, data: &Value, subset: &[&str]) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for rule in self.fields {
            if !subset.contains(&rule.name) {
                continue;
            }
            if let Err(messages) = check_rule(rule, data.get(rule.name)) {
                for message in messages {
                    errors.push(rule.name, message);
                }
            }
        }
        errors
    }
}

fn check_rule(rule: &FieldRule, raw: Option<&Value>) -> Result<Option<FieldValue>, Vec<String>> {
    match rule.kind {
        FieldKind::Text => check_text(rule, raw),
        FieldKind::MultiSelect => check_multi_select(rule, raw),
        FieldKind::Consent => check_consent(rule, raw),
    }
}

fn check_text(rule: &FieldRule, raw: Option<&Value>) -> Result<Option<FieldValue>, Vec<String>> {
    let trimmed = match raw {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(vec!["must be text".to_string()]),
    };
    // An empty optional field is absent, not a zero-length violation.
    if trimmed.is_empty() {
        return if rule.required {
            Err(vec!["is required".to_string()])
        } else {
            Ok(None)
        };
    }

    let mut messages = Vec::new();
    let char_count = trimmed.chars().count();
    if let Some(min) = rule.min_length {
        if char_count < min {
            messages.push(format!("must be at least {min} characters"));
        }
    }
    if let Some(max) = rule.max_length {
        if char_count > max {
            messages.push(format!("must be at most {max} characters"));
        }
    }
    if matches!(rule.format, Some(FieldFormat::Email)) && !email_shaped(trimmed) {
        messages.push("must be a valid email address".to_string());
    }
    if messages.is_empty() {
        Ok(Some(FieldValue::Text(trimmed.to_string())))
    } else {
        Err(messages)
    }
}

fn check_multi_select(
    rule: &FieldRule,
    raw: Option<&Value>,
) -> Result<Option<FieldValue>, Vec<String>> {
    let selections: Vec<String> = match raw {
        None | Some(Value::Null) => Vec::new(),
        // A scalar where a selection list is expected is coerced to a
        // singleton at this boundary instead of silently failing.
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        }
        Some(Value::Array(items)) => {
            let mut out = Vec::new();
            for item in items {
                match item {
                    Value::String(s) => {
                        let trimmed = s.trim();
                        if !trimmed.is_empty() {
                            out.push(trimmed.to_string());
                        }
                    }
                    _ => return Err(vec!["must be a list of text selections".to_string()]),
                }
            }
            out
        }
        Some(_) => return Err(vec!["must be a selection or a list of selections".to_string()]),
    };

    let mut messages = Vec::new();
    if let Some(allowed) = rule.allowed {
        for selection in &selections {
            if !allowed.contains(&selection.as_str()) {
                messages.push(format!("unsupported selection '{selection}'"));
            }
        }
    }
    if selections.is_empty() && rule.required {
        messages.push("at least one option must be selected".to_string());
    }
    if !messages.is_empty() {
        return Err(messages);
    }
    if selections.is_empty() {
        Ok(None)
    } else {
        Ok(Some(FieldValue::Selections(selections)))
    }
}

fn check_consent(rule: &FieldRule, raw: Option<&Value>) -> Result<Option<FieldValue>, Vec<String>> {
    let flag = match raw {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        // Checkbox values arrive as strings from some clients.
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" | "" => Some(false),
            _ => return Err(vec!["must be a boolean".to_string()]),
        },
        Some(_) => return Err(vec!["must be a boolean".to_string()]),
    };
    match flag {
        // A required consent field must be literally true for the
        // submission to be accepted, regardless of every other field.
        Some(true) => Ok(Some(FieldValue::Flag(true))),
        Some(false) | None if rule.required => Err(vec!["must be accepted".to_string()]),
        Some(false) => Ok(Some(FieldValue::Flag(false))),
        None => Ok(None),
    }
}

fn email_shaped(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.split_once('.') {
        Some((head, tail)) => !head.is_empty() && !tail.is_empty() && !tail.ends_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms;
    use serde_json::json;

    fn valid_contact_body() -> Value {
        json!({
            "name": "Taro",
            "email": "taro@example.com",
            "message": "We would like to discuss an annotation project.",
            "consent": true,
        })
    }

    fn valid_data_request_body() -> Value {
        json!({
            "name": "Taro",
            "email": "taro@example.com",
            "company": "Example Inc.",
            "dataTypes": ["image", "text"],
            "backgroundPurpose": "Training data for a vision model.",
            "consent": true,
        })
    }

    #[test]
    fn at_schema_01_valid_contact_submission_passes() {
        let schema = forms::contact_v1();
        let out = schema
            .validate(&valid_contact_body(), Language::En)
            .unwrap();
        assert_eq!(out.form, FormKind::Contact);
        assert_eq!(out.text("name"), Some("Taro"));
        assert_eq!(out.flag("consent"), Some(true));
    }

    #[test]
    fn at_schema_02_missing_required_field_is_reported_alone() {
        let schema = forms::contact_v1();
        let mut body = valid_contact_body();
        body.as_object_mut().unwrap().remove("email");
        let errors = schema.validate(&body, Language::En).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.messages("email").unwrap(), &["is required".to_string()]);
    }

    #[test]
    fn at_schema_03_background_purpose_minimum_is_five_chars_after_trim() {
        let schema = forms::data_request_v1();
        let mut body = valid_data_request_body();
        body["backgroundPurpose"] = json!("  abcde  ");
        assert!(schema.validate(&body, Language::En).is_ok());

        body["backgroundPurpose"] = json!("abcd");
        let errors = schema.validate(&body, Language::En).unwrap_err();
        assert_eq!(
            errors.messages("backgroundPurpose").unwrap(),
            &["must be at least 5 characters".to_string()]
        );
    }

    #[test]
    fn at_schema_04_declined_consent_rejects_otherwise_valid_submission() {
        let schema = forms::data_request_v1();
        let mut body = valid_data_request_body();
        body["consent"] = json!(false);
        let errors = schema.validate(&body, Language::Ja).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.messages("consent").unwrap(),
            &["must be accepted".to_string()]
        );
    }

    #[test]
    fn at_schema_05_scalar_selection_is_coerced_to_singleton() {
        let schema = forms::data_request_v1();
        let mut body = valid_data_request_body();
        body["dataTypes"] = json!("audio");
        let out = schema.validate(&body, Language::En).unwrap();
        assert_eq!(out.selections("dataTypes").unwrap(), &["audio".to_string()]);
    }

    #[test]
    fn at_schema_06_unknown_selection_is_a_field_violation() {
        let schema = forms::data_request_v1();
        let mut body = valid_data_request_body();
        body["dataTypes"] = json!(["image", "hologram"]);
        let errors = schema.validate(&body, Language::En).unwrap_err();
        assert_eq!(
            errors.messages("dataTypes").unwrap(),
            &["unsupported selection 'hologram'".to_string()]
        );
    }

    #[test]
    fn at_schema_07_empty_optional_field_is_absent_not_a_violation() {
        let schema = forms::data_request_v1();
        let mut body = valid_data_request_body();
        body["dataVolume"] = json!("   ");
        let out = schema.validate(&body, Language::En).unwrap();
        assert_eq!(out.text("dataVolume"), None);
    }

    #[test]
    fn at_schema_08_all_violations_are_collected_together() {
        let schema = forms::data_request_v1();
        let mut body = valid_data_request_body();
        body["email"] = json!("not-an-email");
        body["backgroundPurpose"] = json!("abc");
        body["consent"] = json!(false);
        let errors = schema.validate(&body, Language::En).unwrap_err();
        assert!(errors.contains("email"));
        assert!(errors.contains("backgroundPurpose"));
        assert!(errors.contains("consent"));
        assert!(!errors.contains("name"));
    }

    #[test]
    fn at_schema_09_extra_keys_are_ignored() {
        let schema = forms::contact_v1();
        let mut body = valid_contact_body();
        body.as_object_mut()
            .unwrap()
            .insert("tracking".to_string(), json!("utm_campaign"));
        assert!(schema.validate(&body, Language::En).is_ok());
    }

    #[test]
    fn at_schema_10_email_format_check_rejects_malformed_addresses() {
        assert!(email_shaped("taro@example.com"));
        assert!(email_shaped("a.b+c@sub.example.co.jp"));
        assert!(!email_shaped("taro@example"));
        assert!(!email_shaped("@example.com"));
        assert!(!email_shaped("taro@"));
        assert!(!email_shaped("taro example@example.com"));
        assert!(!email_shaped("taro@example.com."));
    }

    #[test]
    fn at_schema_11_wrong_value_type_is_a_field_violation_not_an_abort() {
        let schema = forms::contact_v1();
        let mut body = valid_contact_body();
        body["name"] = json!(42);
        let errors = schema.validate(&body, Language::En).unwrap_err();
        assert_eq!(errors.messages("name").unwrap(), &["must be text".to_string()]);
        assert!(!errors.contains("email"));
    }

    #[test]
    fn at_schema_12_length_and_format_violations_stack_in_order() {
        let rule = FieldRule {
            name: "workEmail",
            label_en: "Work email",
            label_ja: "勤務先メールアドレス",
            kind: FieldKind::Text,
            required: true,
            min_length: Some(6),
            max_length: None,
            format: Some(FieldFormat::Email),
            allowed: None,
        };
        let messages = check_rule(&rule, Some(&json!("a@b"))).unwrap_err();
        assert_eq!(
            messages,
            vec![
                "must be at least 6 characters".to_string(),
                "must be a valid email address".to_string()
            ]
        );
    }
}
