#![forbid(unsafe_code)]

use crate::common::SchemaVersion;
use crate::schema::{FieldFormat, FieldKind, FieldRule, FormKind, FormSchema};

pub const CONTACT_SCHEMA_VERSION: SchemaVersion = SchemaVersion(1);
pub const DATA_REQUEST_SCHEMA_VERSION: SchemaVersion = SchemaVersion(1);

pub const DATA_TYPE_OPTIONS: &[&str] = &["image", "video", "audio", "text", "sensor", "other"];

// Field catalogs are the single source of validation truth: the wizard and
// the request handler validate against the same tables, so the two sides
// cannot drift.

const CONTACT_FIELDS: &[FieldRule] = &[
    FieldRule {
        name: "name",
        label_en: "Name",
        label_ja: "お名前",
        kind: FieldKind::Text,
        required: true,
        min_length: None,
        max_length: Some(100),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "email",
        label_en: "Email",
        label_ja: "メールアドレス",
        kind: FieldKind::Text,
        required: true,
        min_length: None,
        max_length: Some(254),
        format: Some(FieldFormat::Email),
        allowed: None,
    },
    FieldRule {
        name: "company",
        label_en: "Company",
        label_ja: "会社名",
        kind: FieldKind::Text,
        required: false,
        min_length: None,
        max_length: Some(200),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "message",
        label_en: "Message",
        label_ja: "お問い合わせ内容",
        kind: FieldKind::Text,
        required: true,
        min_length: Some(10),
        max_length: Some(2000),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "consent",
        label_en: "Privacy policy agreement",
        label_ja: "個人情報の取り扱いへの同意",
        kind: FieldKind::Consent,
        required: true,
        min_length: None,
        max_length: None,
        format: None,
        allowed: None,
    },
];

const DATA_REQUEST_FIELDS: &[FieldRule] = &[
    FieldRule {
        name: "name",
        label_en: "Name",
        label_ja: "お名前",
        kind: FieldKind::Text,
        required: true,
        min_length: None,
        max_length: Some(100),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "email",
        label_en: "Email",
        label_ja: "メールアドレス",
        kind: FieldKind::Text,
        required: true,
        min_length: None,
        max_length: Some(254),
        format: Some(FieldFormat::Email),
        allowed: None,
    },
    FieldRule {
        name: "company",
        label_en: "Company",
        label_ja: "会社名",
        kind: FieldKind::Text,
        required: true,
        min_length: None,
        max_length: Some(200),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "phone",
        label_en: "Phone",
        label_ja: "電話番号",
        kind: FieldKind::Text,
        required: false,
        min_length: None,
        max_length: Some(40),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "dataTypes",
        label_en: "Requested data types",
        label_ja: "ご希望のデータ種別",
        kind: FieldKind::MultiSelect,
        required: true,
        min_length: None,
        max_length: None,
        format: None,
        allowed: Some(DATA_TYPE_OPTIONS),
    },
    FieldRule {
        name: "dataVolume",
        label_en: "Estimated volume",
        label_ja: "想定データ量",
        kind: FieldKind::Text,
        required: false,
        min_length: None,
        max_length: Some(200),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "backgroundPurpose",
        label_en: "Background and purpose",
        label_ja: "背景・目的",
        kind: FieldKind::Text,
        required: true,
        min_length: Some(5),
        max_length: Some(2000),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "deadline",
        label_en: "Desired deadline",
        label_ja: "ご希望の納期",
        kind: FieldKind::Text,
        required: false,
        min_length: None,
        max_length: Some(100),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "notes",
        label_en: "Additional notes",
        label_ja: "補足事項",
        kind: FieldKind::Text,
        required: false,
        min_length: None,
        max_length: Some(2000),
        format: None,
        allowed: None,
    },
    FieldRule {
        name: "consent",
        label_en: "Privacy policy agreement",
        label_ja: "個人情報の取り扱いへの同意",
        kind: FieldKind::Consent,
        required: true,
        min_length: None,
        max_length: None,
        format: None,
        allowed: None,
    },
];

pub fn contact_v1() -> FormSchema {
    FormSchema {
        form: FormKind::Contact,
        version: CONTACT_SCHEMA_VERSION,
        fields: CONTACT_FIELDS,
    }
}

pub fn data_request_v1() -> FormSchema {
    FormSchema {
        form: FormKind::DataRequest,
        version: DATA_REQUEST_SCHEMA_VERSION,
        fields: DATA_REQUEST_FIELDS,
    }
}

pub fn schema_for(form: FormKind) -> FormSchema {
    match form {
        FormKind::Contact => contact_v1(),
        FormKind::DataRequest => data_request_v1(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub id: &'static str,
    pub title_en: &'static str,
    pub title_ja: &'static str,
    pub fields: &'static [&'static str],
}

/// Linear step ordering, no branching. Steps reference fields by name;
/// `consistency_check` enforces that every referenced field has exactly
/// one schema entry and appears in exactly one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardPlan {
    pub form: FormKind,
    pub steps: &'static [StepDefinition],
}

impl WizardPlan {
    pub fn consistency_check(&self, schema: &FormSchema) -> Result<(), String> {
        if self.form != schema.form {
            return Err(format!(
                "wizard plan form {} does not match schema form {}",
                self.form.as_str(),
                schema.form.as_str()
            ));
        }
        if self.steps.is_empty() {
            return Err("wizard plan must have at least one step".to_string());
        }
        let mut seen: Vec<&str> = Vec::new();
        for step in self.steps {
            for field in step.fields {
                if schema.field(field).is_none() {
                    return Err(format!(
                        "wizard step '{}' references unknown field '{field}'",
                        step.id
                    ));
                }
                if seen.contains(field) {
                    return Err(format!(
                        "field '{field}' appears in more than one wizard step"
                    ));
                }
                seen.push(field);
            }
        }
        Ok(())
    }

    pub fn step_index_for_field(&self, field: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.fields.contains(&field))
    }
}

const CONTACT_STEPS: &[StepDefinition] = &[StepDefinition {
    id: "inquiry",
    title_en: "Your inquiry",
    title_ja: "お問い合わせ",
    fields: &["name", "email", "company", "message", "consent"],
}];

const DATA_REQUEST_STEPS: &[StepDefinition] = &[
    StepDefinition {
        id: "basic_info",
        title_en: "Basic information",
        title_ja: "基本情報",
        fields: &["name", "email", "company", "phone"],
    },
    StepDefinition {
        id: "project_details",
        title_en: "Project details",
        title_ja: "プロジェクト詳細",
        fields: &["dataTypes", "dataVolume", "backgroundPurpose", "deadline"],
    },
    StepDefinition {
        id: "confirm",
        title_en: "Confirm and submit",
        title_ja: "確認・送信",
        fields: &["notes", "consent"],
    },
];

pub fn contact_wizard_v1() -> WizardPlan {
    WizardPlan {
        form: FormKind::Contact,
        steps: CONTACT_STEPS,
    }
}

pub fn data_request_wizard_v1() -> WizardPlan {
    WizardPlan {
        form: FormKind::DataRequest,
        steps: DATA_REQUEST_STEPS,
    }
}

pub fn wizard_for(form: FormKind) -> WizardPlan {
    match form {
        FormKind::Contact => contact_wizard_v1(),
        FormKind::DataRequest => data_request_wizard_v1(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_forms_01_contact_plan_is_consistent_with_contact_schema() {
        assert!(contact_wizard_v1()
            .consistency_check(&contact_v1())
            .is_ok());
    }

    #[test]
    fn at_forms_02_data_request_plan_is_consistent_with_schema() {
        assert!(data_request_wizard_v1()
            .consistency_check(&data_request_v1())
            .is_ok());
    }

    #[test]
    fn at_forms_03_plan_rejects_unknown_field_reference() {
        const BAD_STEPS: &[StepDefinition] = &[StepDefinition {
            id: "basic_info",
            title_en: "Basic information",
            title_ja: "基本情報",
            fields: &["name", "faxNumber"],
        }];
        let plan = WizardPlan {
            form: FormKind::DataRequest,
            steps: BAD_STEPS,
        };
        let err = plan.consistency_check(&data_request_v1()).unwrap_err();
        assert!(err.contains("faxNumber"));
    }

    #[test]
    fn at_forms_04_step_index_lookup_finds_owning_step() {
        let plan = data_request_wizard_v1();
        assert_eq!(plan.step_index_for_field("email"), Some(0));
        assert_eq!(plan.step_index_for_field("backgroundPurpose"), Some(1));
        assert_eq!(plan.step_index_for_field("consent"), Some(2));
        assert_eq!(plan.step_index_for_field("missing"), None);
    }
}
