//! Authentication provider seam and shared credential types.

mod local;
mod supabase;

use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::normalize_text_option;

pub use local::LocalAuthProvider;
pub use supabase::{normalize_auth_url, AuthSession, SessionPersistence, SupabaseAuthProvider};

/// Identity returned by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// Whether an email sign-in creates an account or uses an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailIntent {
    #[default]
    NewUser,
    ReturningUser,
}

/// Supported ways to sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Anonymous,
    Google,
    Apple,
    Email,
}

impl CredentialKind {
    /// Name recorded in a profile's linked providers.
    pub const fn provider_name(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Google => "google",
            Self::Apple => "apple",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_name())
    }
}

/// Everything a provider needs to verify one sign-in attempt.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Anonymous,
    Google {
        id_token: String,
    },
    Apple {
        id_token: String,
        nonce: Option<String>,
    },
    Email {
        email: String,
        password: String,
        intent: EmailIntent,
    },
}

impl Credential {
    pub const fn kind(&self) -> CredentialKind {
        match self {
            Self::Anonymous => CredentialKind::Anonymous,
            Self::Google { .. } => CredentialKind::Google,
            Self::Apple { .. } => CredentialKind::Apple,
            Self::Email { .. } => CredentialKind::Email,
        }
    }

    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => formatter.write_str("Anonymous"),
            Self::Google { .. } => formatter
                .debug_struct("Google")
                .field("id_token", &"[REDACTED]")
                .finish(),
            Self::Apple { nonce, .. } => formatter
                .debug_struct("Apple")
                .field("id_token", &"[REDACTED]")
                .field("nonce", nonce)
                .finish(),
            Self::Email { email, intent, .. } => formatter
                .debug_struct("Email")
                .field("email", email)
                .field("password", &"[REDACTED]")
                .field("intent", intent)
                .finish(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured for this build.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Check your inbox to confirm your email address, then sign in.")]
    ConfirmationRequired,
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for crate::Error {
    fn from(error: AuthError) -> Self {
        Self::AuthenticationFailed(error.to_string())
    }
}

/// External credential verification.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credential: &Credential) -> AuthResult<AuthUser>;

    /// Invalidate the provider-side session, if any.
    async fn sign_out(&self) -> AuthResult<()>;
}

/// Pair a Supabase URL and anon key, requiring both or neither.
pub fn resolve_optional_supabase_config(
    url: Option<String>,
    anon_key: Option<String>,
) -> AuthResult<Option<(String, String)>> {
    let url = normalize_text_option(url);
    let anon_key = normalize_text_option(anon_key);

    match (url, anon_key) {
        (None, None) => Ok(None),
        (Some(url), Some(anon_key)) => Ok(Some((url, anon_key))),
        _ => Err(AuthError::NotConfigured),
    }
}

pub(crate) fn validate_email_credentials(email: &str, password: &str) -> AuthResult<()> {
    static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::Rejected("Email is required".to_string()));
    }
    let pattern = EMAIL_PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
    if pattern.as_ref().is_some_and(|pattern| !pattern.is_match(email)) {
        return Err(AuthError::Rejected(
            "Enter a valid email address".to_string(),
        ));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Rejected("Password is required".to_string()));
    }
    Ok(())
}
