#![forbid(unsafe_code)]

use std::time::Duration;

use intake_contracts::submission::{SubmissionPayload, SubmissionResult};
use intake_contracts::Language;

/// Seam between the wizard and the network so the state machine is
/// testable without a server.
pub trait SubmitTransport {
    fn submit(&self, payload: &SubmissionPayload) -> SubmissionResult;
}

/// One request/response exchange per submit. No retries, no streaming;
/// retry is a manual user action.
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    endpoint_url: String,
    timeout_ms: u32,
    user_agent: String,
    language: Language,
}

impl SubmissionClient {
    pub fn new(endpoint_url: impl Into<String>, language: Language) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            timeout_ms: 10_000,
            user_agent: "intake-wizard/1.0".to_string(),
            language,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

impl SubmitTransport for SubmissionClient {
    fn submit(&self, payload: &SubmissionPayload) -> SubmissionResult {
        let timeout = Duration::from_millis(u64::from(self.timeout_ms).max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(&self.user_agent)
            .build();
        let response = agent
            .post(&self.endpoint_url)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_json(payload);
        match response {
            Ok(response) => result_from_body(&read_body(response), self.language),
            // The server answers 400/500 with the same result shape; a
            // non-parseable body still becomes a generic failure instead
            // of a propagated parse error.
            Err(ureq::Error::Status(_, response)) => {
                result_from_body(&read_body(response), self.language)
            }
            Err(ureq::Error::Transport(_)) => generic_failure(self.language),
        }
    }
}

fn read_body(response: ureq::Response) -> String {
    response.into_string().unwrap_or_default()
}

fn result_from_body(body: &str, language: Language) -> SubmissionResult {
    serde_json::from_str::<SubmissionResult>(body).unwrap_or_else(|_| generic_failure(language))
}

fn generic_failure(language: Language) -> SubmissionResult {
    SubmissionResult::failed(match language {
        Language::En => "The submission could not be completed. Please try again.",
        Language::Ja => "送信に失敗しました。時間をおいて再度お試しください。",
    })
}
