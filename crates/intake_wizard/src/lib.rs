#![forbid(unsafe_code)]

pub mod client;
pub mod state;

pub use client::{SubmissionClient, SubmitTransport};
pub use state::{AdvanceOutcome, FinalOutcome, WizardState};
