//! Onboarding: the sign-in screen shown until a session is authenticated.

use crate::auth::{Credential, CredentialKind, EmailIntent};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::state::AuthState;
use crate::util::capitalize;

/// Which top-level screen to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    SignIn,
    Content,
}

impl Gate {
    pub const fn for_state(state: AuthState) -> Self {
        if state.is_authenticated() {
            Self::Content
        } else {
            Self::SignIn
        }
    }
}

/// State of the sign-in screen and its email sheet.
#[derive(Debug, Clone)]
pub struct SignInScreen {
    messages: Vec<String>,
    welcome_index: usize,
    pub show_email_sheet: bool,
    pub email: String,
    pub password: String,
    pub intent: EmailIntent,
    /// Identity token handed over by the platform Google/Apple sheet
    pub identity_token: String,
    pub nonce: Option<String>,
    error_message: Option<String>,
}

impl SignInScreen {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            messages: config.welcome_messages(),
            welcome_index: 0,
            show_email_sheet: false,
            email: String::new(),
            password: String::new(),
            intent: EmailIntent::default(),
            identity_token: String::new(),
            nonce: None,
            error_message: None,
        }
    }

    pub fn welcome(&self) -> &str {
        self.messages
            .get(self.welcome_index)
            .map_or("", String::as_str)
    }

    pub const fn welcome_index(&self) -> usize {
        self.welcome_index
    }

    /// Rotate to the next welcome message, wrapping around.
    pub fn advance_welcome(&mut self) -> &str {
        if !self.messages.is_empty() {
            self.welcome_index = (self.welcome_index + 1) % self.messages.len();
        }
        self.welcome()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Build the credential for a sign-in button.
    pub fn request(&self, kind: CredentialKind) -> Result<Credential> {
        match kind {
            CredentialKind::Anonymous => Ok(Credential::Anonymous),
            CredentialKind::Google => Ok(Credential::Google {
                id_token: self.require_token(kind)?,
            }),
            CredentialKind::Apple => Ok(Credential::Apple {
                id_token: self.require_token(kind)?,
                nonce: self.nonce.clone(),
            }),
            CredentialKind::Email => {
                let email = self.email.trim();
                if email.is_empty() || self.password.is_empty() {
                    return Err(Error::InvalidInput(
                        "Enter both email and password".to_string(),
                    ));
                }
                Ok(Credential::Email {
                    email: email.to_string(),
                    password: self.password.clone(),
                    intent: self.intent,
                })
            }
        }
    }

    /// Show the outcome of a sign-in attempt on the inline message line.
    pub fn record_result<T>(&mut self, result: &Result<T>) {
        match result {
            Ok(_) => {
                self.error_message = None;
                self.show_email_sheet = false;
                self.password.clear();
                self.identity_token.clear();
            }
            Err(error) => self.error_message = Some(error.user_message()),
        }
    }

    fn require_token(&self, kind: CredentialKind) -> Result<String> {
        let token = self.identity_token.trim();
        if token.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} sign-in did not return an identity token",
                capitalize(kind.provider_name())
            )));
        }
        Ok(token.to_string())
    }
}
