#![forbid(unsafe_code)]

use intake_contracts::forms;
use intake_contracts::mailer::TemplateKind;
use intake_contracts::schema::{FieldValue, FormKind, NormalizedSubmission};
use intake_contracts::Language;

/// Rendering is a pure function of (kind, submission, request id, site
/// base url). The submission's language is already resolved at the
/// payload boundary, so no fallback logic lives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

pub fn render(
    kind: TemplateKind,
    submission: &NormalizedSubmission,
    request_id: &str,
    site_base_url: &str,
) -> RenderedEmail {
    let language = submission.language;
    let subject = subject_line(kind, submission.form, language, request_id);
    let intro = intro_line(kind, submission, language);
    let request_label = match language {
        Language::En => "Request ID",
        Language::Ja => "受付番号",
    };

    let schema = forms::schema_for(submission.form);
    let mut text_body = String::new();
    text_body.push_str(&intro);
    text_body.push_str("\n\n");
    let mut html_rows = String::new();
    for rule in schema.fields {
        let Some(value) = submission.values.get(rule.name) else {
            continue;
        };
        let label = rule.label(language);
        let display = display_value(value, language);
        text_body.push_str(&format!("{label}: {display}\n"));
        html_rows.push_str(&format!(
            "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
            escape_html(label),
            escape_html(&display)
        ));
    }
    text_body.push_str(&format!("\n{request_label}: {request_id}\n{site_base_url}\n"));

    let html_body = format!(
        "<html><body><p>{}</p><table>{}</table><p>{}: {}</p><p><a href=\"{}\">{}</a></p></body></html>",
        escape_html(&intro),
        html_rows,
        escape_html(request_label),
        escape_html(request_id),
        escape_html(site_base_url),
        escape_html(site_base_url),
    );

    RenderedEmail {
        subject,
        text_body,
        html_body,
    }
}

fn subject_line(
    kind: TemplateKind,
    form: FormKind,
    language: Language,
    request_id: &str,
) -> String {
    match (kind, form, language) {
        (TemplateKind::Business, FormKind::Contact, Language::En) => {
            format!("[intake] New contact inquiry ({request_id})")
        }
        (TemplateKind::Business, FormKind::Contact, Language::Ja) => {
            format!("【お問い合わせ】新規のお問い合わせ ({request_id})")
        }
        (TemplateKind::Business, FormKind::DataRequest, Language::En) => {
            format!("[intake] New data request ({request_id})")
        }
        (TemplateKind::Business, FormKind::DataRequest, Language::Ja) => {
            format!("【データリクエスト】新規のデータリクエスト ({request_id})")
        }
        (TemplateKind::Acknowledgment, FormKind::Contact, Language::En) => {
            "We received your inquiry".to_string()
        }
        (TemplateKind::Acknowledgment, FormKind::Contact, Language::Ja) => {
            "お問い合わせを受け付けました".to_string()
        }
        (TemplateKind::Acknowledgment, FormKind::DataRequest, Language::En) => {
            "We received your data request".to_string()
        }
        (TemplateKind::Acknowledgment, FormKind::DataRequest, Language::Ja) => {
            "データリクエストを受け付けました".to_string()
        }
    }
}

fn intro_line(kind: TemplateKind, submission: &NormalizedSubmission, language: Language) -> String {
    match kind {
        TemplateKind::Business => match language {
            Language::En => "A new submission arrived through the website.".to_string(),
            Language::Ja => "ウェブサイトから新しい送信が届きました。".to_string(),
        },
        TemplateKind::Acknowledgment => {
            let name = submission.text("name").unwrap_or("");
            match language {
                Language::En => format!(
                    "Dear {name}, thank you for your submission. Our team will get back to you shortly."
                ),
                Language::Ja => format!(
                    "{name} 様、お問い合わせいただきありがとうございます。担当者より折り返しご連絡いたします。"
                ),
            }
        }
    }
}

fn display_value(value: &FieldValue, language: Language) -> String {
    match value {
        FieldValue::Text(v) => v.clone(),
        FieldValue::Selections(v) => v.join(", "),
        FieldValue::Flag(true) => match language {
            Language::En => "Agreed".to_string(),
            Language::Ja => "同意済み".to_string(),
        },
        FieldValue::Flag(false) => match language {
            Language::En => "Not agreed".to_string(),
            Language::Ja => "未同意".to_string(),
        },
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_contracts::forms;
    use serde_json::json;

    fn data_request_submission(language: Language) -> NormalizedSubmission {
        forms::data_request_v1()
            .validate(
                &json!({
                    "name": "Taro",
                    "email": "taro@example.com",
                    "company": "Example Inc.",
                    "dataTypes": ["image", "audio"],
                    "backgroundPurpose": "Training data for a vision model.",
                    "consent": true,
                }),
                language,
            )
            .unwrap()
    }

    #[test]
    fn at_templates_01_business_subject_carries_the_request_id() {
        let submission = data_request_submission(Language::En);
        let rendered = render(
            TemplateKind::Business,
            &submission,
            "req_abc123",
            "https://intake.example.com",
        );
        assert!(rendered.subject.contains("req_abc123"));
        assert!(rendered.text_body.contains("Requested data types: image, audio"));
    }

    #[test]
    fn at_templates_02_japanese_acknowledgment_uses_japanese_labels() {
        let submission = data_request_submission(Language::Ja);
        let rendered = render(
            TemplateKind::Acknowledgment,
            &submission,
            "req_abc123",
            "https://intake.example.com",
        );
        assert_eq!(rendered.subject, "データリクエストを受け付けました");
        assert!(rendered.text_body.contains("Taro 様"));
        assert!(rendered.text_body.contains("ご希望のデータ種別: image, audio"));
        assert!(rendered.text_body.contains("受付番号: req_abc123"));
        assert!(rendered.text_body.contains("https://intake.example.com"));
    }

    #[test]
    fn at_templates_03_html_body_escapes_user_content() {
        let submission = forms::contact_v1()
            .validate(
                &json!({
                    "name": "Taro <script>",
                    "email": "taro@example.com",
                    "message": "a <b> tag & a quote \"",
                    "consent": true,
                }),
                Language::En,
            )
            .unwrap();
        let rendered = render(
            TemplateKind::Business,
            &submission,
            "req_1",
            "https://intake.example.com",
        );
        assert!(rendered.html_body.contains("Taro &lt;script&gt;"));
        assert!(rendered.html_body.contains("a &lt;b&gt; tag &amp; a quote &quot;"));
        assert!(!rendered.html_body.contains("<script>"));
    }

    #[test]
    fn at_templates_04_consent_flag_renders_localized() {
        let submission = data_request_submission(Language::Ja);
        let rendered = render(
            TemplateKind::Business,
            &submission,
            "req_1",
            "https://intake.example.com",
        );
        assert!(rendered.text_body.contains("個人情報の取り扱いへの同意: 同意済み"));
    }
}
