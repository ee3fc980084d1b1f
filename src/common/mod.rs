// Common module - configuration, errors, state and shared utilities

pub mod config;
pub mod error;
pub mod helpers;
pub mod id_generator;
pub mod migrations;
pub mod state;
pub mod validation;

pub use error::AuthError;
pub use helpers::{safe_email_log, safe_token_log};
pub use id_generator::generate_identity_id;
pub use state::AppState;
pub use validation::{ValidationResult, Validator};
