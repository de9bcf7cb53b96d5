#![forbid(unsafe_code)]

use std::env;
use std::io::{self, BufRead, Write};

use intake_contracts::forms;
use intake_contracts::schema::{FieldKind, FormKind};
use intake_contracts::Language;
use intake_wizard::{AdvanceOutcome, FinalOutcome, SubmissionClient, WizardState};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let form = match args.first().map(String::as_str) {
        Some("contact") => FormKind::Contact,
        Some("data-request") => FormKind::DataRequest,
        _ => return Err("usage: intake_wizard <contact|data-request> [en|ja]".to_string()),
    };
    let language = match args.get(1) {
        Some(tag) => Language::from_tag(tag)
            .ok_or_else(|| "usage: intake_wizard <contact|data-request> [en|ja]".to_string())?,
        None => Language::Ja,
    };

    let base_url = env::var("INTAKE_SERVER_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let endpoint = match form {
        FormKind::Contact => format!("{base_url}/api/contact"),
        FormKind::DataRequest => format!("{base_url}/api/request-data"),
    };
    let client = SubmissionClient::new(endpoint, language);

    let schema = forms::schema_for(form);
    let plan = forms::wizard_for(form);
    let mut wizard = WizardState::new(schema, plan, language)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let step = wizard.step();
        let title = match language {
            Language::En => step.title_en,
            Language::Ja => step.title_ja,
        };
        println!(
            "-- step {}/{}: {title}",
            wizard.current_step() + 1,
            wizard.step_count()
        );
        for field in step.fields {
            let rule = schema
                .field(field)
                .ok_or_else(|| format!("unknown field '{field}'"))?;
            let marker = if rule.required { "*" } else { "" };
            match rule.kind {
                FieldKind::Text => {
                    let input = prompt(&mut lines, &format!("{}{marker}: ", rule.label(language)))?;
                    wizard.set_text(field, &input);
                }
                FieldKind::MultiSelect => {
                    let options = rule.allowed.unwrap_or(&[]).join(", ");
                    let input = prompt(
                        &mut lines,
                        &format!("{}{marker} [{options}] (comma separated): ", rule.label(language)),
                    )?;
                    let selections: Vec<&str> = input
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .collect();
                    wizard.set_selections(field, &selections);
                }
                FieldKind::Consent => {
                    let input =
                        prompt(&mut lines, &format!("{}{marker} (yes/no): ", rule.label(language)))?;
                    let accepted = matches!(
                        input.trim().to_ascii_lowercase().as_str(),
                        "y" | "yes" | "はい"
                    );
                    wizard.set_flag(field, accepted);
                }
            }
        }

        match wizard.advance() {
            AdvanceOutcome::Advanced { .. } => continue,
            AdvanceOutcome::Rejected => {
                print_errors(&wizard);
                continue;
            }
            AdvanceOutcome::AtLastStep => match wizard.submit_final(&client) {
                FinalOutcome::RejectedLocally { jumped_to_step } => {
                    println!("-- returning to step {}", jumped_to_step + 1);
                    print_errors(&wizard);
                }
                FinalOutcome::AlreadyInFlight => {
                    println!("-- a submission is already in flight");
                }
                FinalOutcome::Submitted(result) => {
                    if result.success {
                        println!(
                            "submitted request_id={}",
                            result.request_id.as_deref().unwrap_or("-")
                        );
                        return Ok(());
                    }
                    return Err(result
                        .message
                        .unwrap_or_else(|| "submission failed".to_string()));
                }
            },
        }
    }
}

fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> Result<String, String> {
    print!("{label}");
    io::stdout().flush().map_err(|e| e.to_string())?;
    match lines.next() {
        Some(line) => line.map_err(|e| e.to_string()),
        None => Err("stdin closed before the wizard finished".to_string()),
    }
}

fn print_errors(wizard: &WizardState) {
    for (field, messages) in wizard.errors().as_map() {
        for message in messages {
            println!("  {field}: {message}");
        }
    }
}
