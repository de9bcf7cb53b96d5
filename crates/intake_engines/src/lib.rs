#![forbid(unsafe_code)]

pub mod ids;
pub mod mailer;
pub mod templates;
