#![forbid(unsafe_code)]

use std::env;

use intake_contracts::forms;
use intake_contracts::mailer::TemplateKind;
use intake_contracts::schema::{FormKind, NormalizedSubmission};
use intake_contracts::submission::SubmissionResult;
use intake_contracts::{Language, ReasonCodeId};
use intake_engines::ids::new_request_id;
use intake_engines::mailer::{MailerConfig, MailerRuntime};
use serde_json::Value;

pub mod reason_codes {
    use intake_contracts::ReasonCodeId;

    // Intake pipeline reason-code namespace.
    pub const INTAKE_OK_SUBMISSION: ReasonCodeId = ReasonCodeId(0x4954_0001);

    pub const INTAKE_FAIL_MALFORMED_BODY: ReasonCodeId = ReasonCodeId(0x4954_00F1);
    pub const INTAKE_FAIL_VALIDATION: ReasonCodeId = ReasonCodeId(0x4954_00F2);
    pub const INTAKE_FAIL_BUSINESS_DISPATCH: ReasonCodeId = ReasonCodeId(0x4954_00F3);
    pub const INTAKE_FAIL_ACK_DISPATCH: ReasonCodeId = ReasonCodeId(0x4954_00F4);
}

/// The asymmetry between the two outbound emails is a named choice, not
/// a side effect of call ordering: the business notification is always
/// delivery-critical, the acknowledgment is tolerated by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckFailurePolicy {
    Tolerate,
    FailRequest,
}

impl AckFailurePolicy {
    fn from_env_value(raw: Option<String>) -> Self {
        match raw
            .as_deref()
            .map(str::trim)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("fail_request") => Self::FailRequest,
            _ => Self::Tolerate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tolerate => "tolerate",
            Self::FailRequest => "fail_request",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub default_language: Language,
    pub ack_failure_policy: AckFailurePolicy,
    pub mailer: MailerConfig,
}

impl IntakeConfig {
    pub fn from_env() -> Self {
        Self {
            default_language: env::var("INTAKE_DEFAULT_LANGUAGE")
                .ok()
                .and_then(|v| Language::from_tag(&v))
                .unwrap_or(Language::Ja),
            ack_failure_policy: AckFailurePolicy::from_env_value(
                env::var("INTAKE_ACK_FAILURE_POLICY").ok(),
            ),
            mailer: MailerConfig::from_env(),
        }
    }
}

/// HTTP status class for one handled submission; the bin maps this to
/// 200/400/500.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Ok,
    BadRequest,
    Internal,
}

/// Stateless request pipeline: parse, re-validate against the shared
/// schema (the client is never trusted), dispatch the two emails, answer.
/// Nothing is persisted; the request id exists for correlation only.
#[derive(Debug, Clone)]
pub struct IntakeRuntime {
    config: IntakeConfig,
    mailer: MailerRuntime,
}

impl IntakeRuntime {
    pub fn new(config: IntakeConfig) -> Self {
        let mailer = MailerRuntime::new(config.mailer.clone());
        Self { config, mailer }
    }

    pub fn from_env() -> Self {
        Self::new(IntakeConfig::from_env())
    }

    pub fn provider_configured(&self) -> bool {
        self.mailer.provider_configured()
    }

    pub fn default_language(&self) -> Language {
        self.config.default_language
    }

    pub fn handle_submission(
        &self,
        form: FormKind,
        raw_body: &str,
    ) -> (SubmissionStatus, SubmissionResult) {
        let fallback = self.config.default_language;
        let body: Value = match serde_json::from_str(raw_body) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) => {
                return self.refuse_malformed(form, fallback, "body is not a JSON object");
            }
            Err(err) => {
                return self.refuse_malformed(form, fallback, &err.to_string());
            }
        };

        // An unsupported tag falls back to the site default; rendering
        // never sees an unknown language.
        let language = body
            .get("language")
            .and_then(Value::as_str)
            .and_then(Language::from_tag)
            .unwrap_or(fallback);

        let schema = forms::schema_for(form);
        let submission = match schema.validate(&body, language) {
            Ok(submission) => submission,
            Err(field_errors) => {
                log_outcome(
                    form,
                    "bad_request",
                    reason_codes::INTAKE_FAIL_VALIDATION,
                    &format!("invalid_fields={}", field_errors.len()),
                );
                return (
                    SubmissionStatus::BadRequest,
                    SubmissionResult::invalid(message_validation(language), field_errors),
                );
            }
        };

        let request_id = new_request_id();
        if let Err(outcome) = self.dispatch_emails(form, &submission, &request_id) {
            return outcome;
        }

        log_outcome(
            form,
            "ok",
            reason_codes::INTAKE_OK_SUBMISSION,
            &format!("request_id={request_id}"),
        );
        (
            SubmissionStatus::Ok,
            SubmissionResult::accepted(request_id, message_accepted(language)),
        )
    }

    fn dispatch_emails(
        &self,
        form: FormKind,
        submission: &NormalizedSubmission,
        request_id: &str,
    ) -> Result<(), (SubmissionStatus, SubmissionResult)> {
        let language = submission.language;

        // Business first, so its failure is detected before the
        // acknowledgment attempt. Its failure must surface to the user.
        match self.mailer.send(TemplateKind::Business, submission, request_id) {
            Ok(record) => log_dispatch(form, request_id, &record.provider_message_id, "business"),
            Err(failure) => {
                log_outcome(
                    form,
                    "internal",
                    reason_codes::INTAKE_FAIL_BUSINESS_DISPATCH,
                    &format!("request_id={request_id} {}", failure.safe_detail()),
                );
                return Err((
                    SubmissionStatus::Internal,
                    SubmissionResult::failed(message_dispatch_failed(language)),
                ));
            }
        }

        match self
            .mailer
            .send(TemplateKind::Acknowledgment, submission, request_id)
        {
            Ok(record) => {
                log_dispatch(form, request_id, &record.provider_message_id, "acknowledgment")
            }
            Err(failure) => {
                log_outcome(
                    form,
                    "ack_dispatch_failed",
                    reason_codes::INTAKE_FAIL_ACK_DISPATCH,
                    &format!("request_id={request_id} {}", failure.safe_detail()),
                );
                if self.config.ack_failure_policy == AckFailurePolicy::FailRequest {
                    return Err((
                        SubmissionStatus::Internal,
                        SubmissionResult::failed(message_dispatch_failed(language)),
                    ));
                }
            }
        }
        Ok(())
    }

    fn refuse_malformed(
        &self,
        form: FormKind,
        language: Language,
        detail: &str,
    ) -> (SubmissionStatus, SubmissionResult) {
        // Full parse detail stays server-side; the response carries only
        // a generic localized message.
        log_outcome(
            form,
            "bad_request",
            reason_codes::INTAKE_FAIL_MALFORMED_BODY,
            detail,
        );
        (
            SubmissionStatus::BadRequest,
            SubmissionResult::failed(message_malformed(language)),
        )
    }
}

fn message_malformed(language: Language) -> &'static str {
    match language {
        Language::En => "The request could not be read. Please reload the page and try again.",
        Language::Ja => "リクエストの形式が正しくありません。ページを再読み込みしてお試しください。",
    }
}

fn message_validation(language: Language) -> &'static str {
    match language {
        Language::En => "Please review the highlighted fields.",
        Language::Ja => "入力内容をご確認ください。",
    }
}

fn message_dispatch_failed(language: Language) -> &'static str {
    match language {
        Language::En => "The submission could not be processed. Please try again shortly.",
        Language::Ja => "送信を処理できませんでした。時間をおいて再度お試しください。",
    }
}

fn message_accepted(language: Language) -> &'static str {
    match language {
        Language::En => "Thank you. Your submission has been received.",
        Language::Ja => "お問い合わせを受け付けました。ありがとうございます。",
    }
}

fn log_outcome(form: FormKind, status: &str, reason_code: ReasonCodeId, detail: &str) {
    eprintln!(
        "intake_adapter submission form={} status={status} reason_code={:#010x} {detail}",
        form.as_str(),
        reason_code.0
    );
}

fn log_dispatch(form: FormKind, request_id: &str, provider_message_id: &str, kind: &str) {
    println!(
        "intake_adapter dispatch form={} request_id={request_id} kind={kind} provider_message_id={provider_message_id}",
        form.as_str()
    );
}
