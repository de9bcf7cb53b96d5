#![forbid(unsafe_code)]

use intake_contracts::forms::{StepDefinition, WizardPlan};
use intake_contracts::schema::FormSchema;
use intake_contracts::submission::{SubmissionPayload, SubmissionResult};
use intake_contracts::{FieldErrors, Language};
use serde_json::{Map, Value};

use crate::client::SubmitTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced { step: usize },
    Rejected,
    AtLastStep,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinalOutcome {
    RejectedLocally { jumped_to_step: usize },
    AlreadyInFlight,
    Submitted(SubmissionResult),
}

/// In-memory wizard state for one user session. Values persist across
/// every navigation; errors are recomputed only on an advance attempt or
/// a final submit, never while the user is still typing.
#[derive(Debug, Clone)]
pub struct WizardState {
    schema: FormSchema,
    plan: WizardPlan,
    language: Language,
    current_step: usize,
    values: Map<String, Value>,
    errors: FieldErrors,
    is_submitting: bool,
    completed: bool,
}

impl WizardState {
    pub fn new(schema: FormSchema, plan: WizardPlan, language: Language) -> Result<Self, String> {
        plan.consistency_check(&schema)?;
        Ok(Self {
            schema,
            plan,
            language,
            current_step: 0,
            values: Map::new(),
            errors: FieldErrors::new(),
            is_submitting: false,
            completed: false,
        })
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn step_count(&self) -> usize {
        self.plan.steps.len()
    }

    pub fn step(&self) -> &'static StepDefinition {
        &self.plan.steps[self.current_step]
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Stores input without validating it. Errors only appear after an
    /// explicit advance or submit action.
    pub fn set_value(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
    }

    pub fn set_text(&mut self, field: &str, value: &str) {
        self.set_value(field, Value::String(value.to_string()));
    }

    pub fn set_selections(&mut self, field: &str, values: &[&str]) {
        self.set_value(
            field,
            Value::Array(values.iter().map(|v| Value::String(v.to_string())).collect()),
        );
    }

    pub fn set_flag(&mut self, field: &str, value: bool) {
        self.set_value(field, Value::Bool(value));
    }

    /// Validates only the current step's fields. On any violation the
    /// step does not change and errors for those fields are populated;
    /// values entered on other steps are never touched.
    pub fn advance(&mut self) -> AdvanceOutcome {
        let step_fields = self.plan.steps[self.current_step].fields;
        let data = Value::Object(self.values.clone());
        let step_errors = self.schema.validate_fields(&data, step_fields);
        self.replace_errors_for(step_fields, step_errors.clone());
        if !step_errors.is_empty() {
            return AdvanceOutcome::Rejected;
        }
        if self.current_step + 1 >= self.plan.steps.len() {
            return AdvanceOutcome::AtLastStep;
        }
        self.current_step += 1;
        AdvanceOutcome::Advanced {
            step: self.current_step,
        }
    }

    /// Always succeeds; no validation runs and values stay untouched.
    pub fn retreat(&mut self) -> bool {
        if self.current_step == 0 {
            return false;
        }
        self.current_step -= 1;
        true
    }

    /// Validates the full field set. On failure jumps to the first step
    /// containing a violating field. On success hands the payload to the
    /// transport; a success response is the wizard's only terminal state.
    /// Nothing is reset on a failure response, so input is never lost and
    /// retry stays a manual action.
    pub fn submit_final<T: SubmitTransport>(&mut self, transport: &T) -> FinalOutcome {
        if self.is_submitting {
            return FinalOutcome::AlreadyInFlight;
        }
        let data = Value::Object(self.values.clone());
        match self.schema.validate(&data, self.language) {
            Err(errors) => {
                let jumped_to_step = errors
                    .fields()
                    .filter_map(|field| self.plan.step_index_for_field(field))
                    .min()
                    .unwrap_or(0);
                self.errors = errors;
                self.current_step = jumped_to_step;
                FinalOutcome::RejectedLocally { jumped_to_step }
            }
            Ok(_) => {
                let payload =
                    SubmissionPayload::new(self.language.as_str(), self.values.clone());
                self.is_submitting = true;
                let result = transport.submit(&payload);
                self.is_submitting = false;
                if result.success {
                    self.completed = true;
                    self.errors = FieldErrors::new();
                } else if let Some(field_errors) = &result.field_errors {
                    let mut errors = FieldErrors::new();
                    for (field, messages) in field_errors {
                        for message in messages {
                            errors.push(field, message.clone());
                        }
                    }
                    self.errors = errors;
                }
                FinalOutcome::Submitted(result)
            }
        }
    }

    fn replace_errors_for(&mut self, fields: &[&str], step_errors: FieldErrors) {
        let mut kept = FieldErrors::new();
        for (field, messages) in self.errors.as_map() {
            if fields.contains(&field.as_str()) {
                continue;
            }
            for message in messages {
                kept.push(field, message.clone());
            }
        }
        kept.merge(step_errors);
        self.errors = kept;
    }

    #[cfg(test)]
    fn force_in_flight(&mut self) {
        self.is_submitting = true;
    }
}
