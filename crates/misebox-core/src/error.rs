//! Error types for misebox-core

use thiserror::Error;

/// Result type alias using misebox-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in misebox-core operations.
///
/// Every variant is recoverable at the UI boundary; none of them is meant to
/// terminate the process.
#[derive(Error, Debug)]
pub enum Error {
    /// The authentication provider rejected the credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A read or write against the document store failed
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// An expected document is absent
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A listener delivered a payload that could not be decoded
    #[error("Listener error: {0}")]
    Listener(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Short text for the inline message shown next to the triggering control.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationFailed(message) => message.clone(),
            Self::SyncFailed(_) => "We couldn't save your changes. Try again later.".to_string(),
            Self::NotFound(_) => "Nothing was found for this account.".to_string(),
            Self::InvalidInput(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_keeps_provider_text_for_auth_failures() {
        let error = Error::AuthenticationFailed("Invalid login credentials".to_string());
        assert_eq!(error.user_message(), "Invalid login credentials");
    }

    #[test]
    fn user_message_hides_sync_details() {
        let error = Error::SyncFailed("permission denied on misebox-users/u1".to_string());
        assert!(!error.user_message().contains("permission"));
    }
}
