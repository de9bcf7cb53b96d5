#![forbid(unsafe_code)]

pub mod common;
pub mod forms;
pub mod mailer;
pub mod schema;
pub mod submission;

pub use common::{FieldErrors, Language, ReasonCodeId, SchemaVersion};
