#![forbid(unsafe_code)]

use crate::common::ReasonCodeId;

/// The two emails dispatched per accepted submission. The business
/// notification is delivery-critical; the acknowledgment to the submitter
/// is best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Business,
    Acknowledgment,
}

impl TemplateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Business => "business",
            TemplateKind::Acknowledgment => "acknowledgment",
        }
    }
}

/// A fully rendered outbound message, ready for the provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Ephemeral proof of one provider send. Nothing persists it; it exists
/// to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDispatchRecord {
    pub kind: TemplateKind,
    pub provider_message_id: String,
    pub recipient: String,
    pub subject: String,
    pub sent_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub kind: TemplateKind,
    pub reason_code: ReasonCodeId,
    pub error_kind: &'static str,
    pub http_status: Option<u16>,
}

impl DispatchFailure {
    /// Detail safe for server-side log lines: provider classification and
    /// status only, never response bodies or addresses.
    pub fn safe_detail(&self) -> String {
        match self.http_status {
            Some(status) => format!(
                "kind={} error={} status={status}",
                self.kind.as_str(),
                self.error_kind
            ),
            None => format!("kind={} error={}", self.kind.as_str(), self.error_kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_mail_contract_01_safe_detail_includes_status_only_when_present() {
        let failure = DispatchFailure {
            kind: TemplateKind::Business,
            reason_code: ReasonCodeId(0x4D4C_00F2),
            error_kind: "http_non_2xx",
            http_status: Some(503),
        };
        assert_eq!(failure.safe_detail(), "kind=business error=http_non_2xx status=503");

        let failure = DispatchFailure {
            kind: TemplateKind::Acknowledgment,
            reason_code: ReasonCodeId(0x4D4C_00F3),
            error_kind: "timeout",
            http_status: None,
        };
        assert_eq!(failure.safe_detail(), "kind=acknowledgment error=timeout");
    }
}
