#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use intake_contracts::mailer::{
    DispatchFailure, EmailDispatchRecord, EmailMessage, TemplateKind,
};
use intake_contracts::schema::NormalizedSubmission;
use intake_contracts::ReasonCodeId;
use serde::{Deserialize, Serialize};

use crate::ids::now_unix_ms;
use crate::templates;

pub mod reason_codes {
    use intake_contracts::ReasonCodeId;

    // Mailer reason-code namespace.
    pub const MAILER_OK_SEND: ReasonCodeId = ReasonCodeId(0x4D4C_0001);

    pub const MAILER_FAIL_MISSING_CONFIG: ReasonCodeId = ReasonCodeId(0x4D4C_00F1);
    pub const MAILER_FAIL_MISSING_RECIPIENT: ReasonCodeId = ReasonCodeId(0x4D4C_00F2);
    pub const MAILER_FAIL_PROVIDER_HTTP: ReasonCodeId = ReasonCodeId(0x4D4C_00F3);
    pub const MAILER_FAIL_TRANSPORT: ReasonCodeId = ReasonCodeId(0x4D4C_00F4);
    pub const MAILER_FAIL_BAD_PROVIDER_BODY: ReasonCodeId = ReasonCodeId(0x4D4C_00F5);
    pub const MAILER_FAIL_FIXTURE: ReasonCodeId = ReasonCodeId(0x4D4C_00F6);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureOutcome {
    Deliver,
    Fail,
}

/// Short-circuits the provider call per template kind so tests and local
/// runs stay deterministic and offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailerFixture {
    pub business: FixtureOutcome,
    pub acknowledgment: FixtureOutcome,
}

impl MailerFixture {
    pub fn deliver_all() -> Self {
        Self {
            business: FixtureOutcome::Deliver,
            acknowledgment: FixtureOutcome::Deliver,
        }
    }

    fn outcome_for(&self, kind: TemplateKind) -> FixtureOutcome {
        match kind {
            TemplateKind::Business => self.business,
            TemplateKind::Acknowledgment => self.acknowledgment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from_address: String,
    pub business_to: String,
    pub site_base_url: String,
    pub timeout_ms: u32,
    pub user_agent: String,
    pub fixture: Option<MailerFixture>,
}

impl MailerConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("INTAKE_EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            api_key: env::var("INTAKE_EMAIL_API_KEY").ok().and_then(trim_non_empty),
            from_address: env::var("INTAKE_EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
            business_to: env::var("INTAKE_BUSINESS_EMAIL_TO")
                .unwrap_or_else(|_| "ops@localhost".to_string()),
            site_base_url: env::var("INTAKE_SITE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            timeout_ms: env::var("INTAKE_EMAIL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| (100..=30_000).contains(v))
                .unwrap_or(5_000),
            user_agent: env::var("INTAKE_HTTP_USER_AGENT")
                .unwrap_or_else(|_| "intake-mailer/1.0".to_string()),
            fixture: None,
        }
    }
}

fn trim_non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Serialize)]
struct ProviderSendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ProviderSendResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct MailerRuntime {
    config: MailerConfig,
}

impl MailerRuntime {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MailerConfig {
        &self.config
    }

    pub fn provider_configured(&self) -> bool {
        self.config.api_key.is_some() || self.config.fixture.is_some()
    }

    /// Renders and dispatches one message. The caller sends the business
    /// notification first so its failure is detected before the
    /// acknowledgment attempt; this function makes exactly one provider
    /// call under the configured timeout.
    pub fn send(
        &self,
        kind: TemplateKind,
        submission: &NormalizedSubmission,
        request_id: &str,
    ) -> Result<EmailDispatchRecord, DispatchFailure> {
        let recipient = match kind {
            TemplateKind::Business => self.config.business_to.clone(),
            TemplateKind::Acknowledgment => submission
                .text("email")
                .map(str::to_string)
                .ok_or(DispatchFailure {
                    kind,
                    reason_code: reason_codes::MAILER_FAIL_MISSING_RECIPIENT,
                    error_kind: "missing_recipient",
                    http_status: None,
                })?,
        };
        let rendered = templates::render(kind, submission, request_id, &self.config.site_base_url);

        if let Some(fixture) = &self.config.fixture {
            return match fixture.outcome_for(kind) {
                FixtureOutcome::Deliver => Ok(EmailDispatchRecord {
                    kind,
                    provider_message_id: format!("fixture_msg_{}_{request_id}", kind.as_str()),
                    recipient,
                    subject: rendered.subject,
                    sent_at_unix_ms: now_unix_ms(),
                }),
                FixtureOutcome::Fail => Err(DispatchFailure {
                    kind,
                    reason_code: reason_codes::MAILER_FAIL_FIXTURE,
                    error_kind: "fixture_forced_failure",
                    http_status: None,
                }),
            };
        }

        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(DispatchFailure {
                kind,
                reason_code: reason_codes::MAILER_FAIL_MISSING_CONFIG,
                error_kind: "missing_api_key",
                http_status: None,
            });
        };

        let message = EmailMessage {
            from: self.config.from_address.clone(),
            to: recipient,
            subject: rendered.subject,
            text_body: rendered.text_body,
            html_body: rendered.html_body,
        };
        let provider_message_id = provider_send(&self.config, api_key, &message)
            .map_err(|(reason_code, error_kind, http_status)| DispatchFailure {
                kind,
                reason_code,
                error_kind,
                http_status,
            })?;

        Ok(EmailDispatchRecord {
            kind,
            provider_message_id,
            recipient: message.to,
            subject: message.subject,
            sent_at_unix_ms: now_unix_ms(),
        })
    }
}

fn provider_send(
    config: &MailerConfig,
    api_key: &str,
    message: &EmailMessage,
) -> Result<String, (ReasonCodeId, &'static str, Option<u16>)> {
    let agent = build_http_agent(config.timeout_ms, &config.user_agent);
    let response = agent
        .post(&config.api_url)
        .set("Content-Type", "application/json")
        .set("Authorization", &format!("Bearer {api_key}"))
        .set("Accept", "application/json")
        .send_json(ProviderSendRequest {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text_body,
            html: &message.html_body,
        })
        .map_err(|err| match err {
            ureq::Error::Status(status, _) => (
                reason_codes::MAILER_FAIL_PROVIDER_HTTP,
                "http_non_2xx",
                Some(status),
            ),
            ureq::Error::Transport(transport) => {
                let combined = format!("{:?} {transport}", transport.kind());
                (
                    reason_codes::MAILER_FAIL_TRANSPORT,
                    classify_transport_error_kind(&combined),
                    None,
                )
            }
        })?;

    let parsed: ProviderSendResponse = serde_json::from_reader(response.into_reader())
        .map_err(|_| {
            (
                reason_codes::MAILER_FAIL_BAD_PROVIDER_BODY,
                "json_parse",
                None,
            )
        })?;
    Ok(parsed.id)
}

fn build_http_agent(timeout_ms: u32, user_agent: &str) -> ureq::Agent {
    let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(user_agent)
        .build()
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_contracts::forms;
    use intake_contracts::Language;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn offline_config(fixture: Option<MailerFixture>) -> MailerConfig {
        MailerConfig {
            api_url: "https://api.mail.invalid/send".to_string(),
            api_key: None,
            from_address: "no-reply@annotation.example.com".to_string(),
            business_to: "ops@annotation.example.com".to_string(),
            site_base_url: "https://annotation.example.com".to_string(),
            timeout_ms: 1_000,
            user_agent: "intake-mailer/test".to_string(),
            fixture,
        }
    }

    fn contact_submission() -> NormalizedSubmission {
        forms::contact_v1()
            .validate(
                &json!({
                    "name": "Taro",
                    "email": "taro@example.com",
                    "message": "We would like to discuss an annotation project.",
                    "consent": true,
                }),
                Language::Ja,
            )
            .unwrap()
    }

    #[test]
    fn at_mailer_01_fixture_deliver_returns_record_with_message_id() {
        let runtime = MailerRuntime::new(offline_config(Some(MailerFixture::deliver_all())));
        let record = runtime
            .send(TemplateKind::Business, &contact_submission(), "req_t1")
            .unwrap();
        assert_eq!(record.provider_message_id, "fixture_msg_business_req_t1");
        assert_eq!(record.recipient, "ops@annotation.example.com");
        assert!(record.sent_at_unix_ms > 0);
    }

    #[test]
    fn at_mailer_02_acknowledgment_goes_to_the_submitter() {
        let runtime = MailerRuntime::new(offline_config(Some(MailerFixture::deliver_all())));
        let record = runtime
            .send(TemplateKind::Acknowledgment, &contact_submission(), "req_t2")
            .unwrap();
        assert_eq!(record.recipient, "taro@example.com");
        assert_eq!(record.subject, "お問い合わせを受け付けました");
    }

    #[test]
    fn at_mailer_03_fixture_failure_is_reported_with_kind() {
        let fixture = MailerFixture {
            business: FixtureOutcome::Fail,
            acknowledgment: FixtureOutcome::Deliver,
        };
        let runtime = MailerRuntime::new(offline_config(Some(fixture)));
        let failure = runtime
            .send(TemplateKind::Business, &contact_submission(), "req_t3")
            .unwrap_err();
        assert_eq!(failure.kind, TemplateKind::Business);
        assert_eq!(failure.reason_code, reason_codes::MAILER_FAIL_FIXTURE);
        assert!(runtime
            .send(TemplateKind::Acknowledgment, &contact_submission(), "req_t3")
            .is_ok());
    }

    #[test]
    fn at_mailer_04_missing_api_key_fails_closed_without_network() {
        let runtime = MailerRuntime::new(offline_config(None));
        let failure = runtime
            .send(TemplateKind::Business, &contact_submission(), "req_t4")
            .unwrap_err();
        assert_eq!(failure.reason_code, reason_codes::MAILER_FAIL_MISSING_CONFIG);
        assert_eq!(failure.error_kind, "missing_api_key");
        assert!(!runtime.provider_configured());
    }

    #[test]
    fn at_mailer_05_acknowledgment_without_email_value_is_missing_recipient() {
        let runtime = MailerRuntime::new(offline_config(Some(MailerFixture::deliver_all())));
        let submission = NormalizedSubmission {
            form: intake_contracts::schema::FormKind::Contact,
            language: Language::En,
            values: BTreeMap::new(),
        };
        let failure = runtime
            .send(TemplateKind::Acknowledgment, &submission, "req_t5")
            .unwrap_err();
        assert_eq!(
            failure.reason_code,
            reason_codes::MAILER_FAIL_MISSING_RECIPIENT
        );
    }

    #[test]
    fn at_mailer_06_transport_error_classification() {
        assert_eq!(classify_transport_error_kind("Dns failure"), "dns");
        assert_eq!(classify_transport_error_kind("connection refused"), "connection");
        assert_eq!(classify_transport_error_kind("io timeout reached"), "timeout");
        assert_eq!(classify_transport_error_kind("weird"), "transport");
    }
}
