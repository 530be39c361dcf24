use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] misebox_core::Error),
    #[error(transparent)]
    Auth(#[from] misebox_core::auth::AuthError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unknown {registry} route: {key}")]
    UnknownRoute { registry: &'static str, key: String },
    #[error("Role attributes must look like key=value, got: {0}")]
    InvalidAttribute(String),
}

impl CliError {
    /// Text for the shell's inline message line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Core(error) => error.user_message(),
            Self::Auth(error) => error.to_string(),
            other => other.to_string(),
        }
    }
}
