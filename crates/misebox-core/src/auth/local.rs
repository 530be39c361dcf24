//! Offline authentication provider for local development and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::normalize_key;

use super::{
    validate_email_credentials, AuthError, AuthProvider, AuthResult, AuthUser, Credential,
    EmailIntent,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LocalAccount {
    user_id: String,
    /// Name-based uuid over the user id and password; the password itself is
    /// never kept.
    password_digest: String,
}

impl LocalAccount {
    fn new(user_id: String, password: &str) -> Self {
        let password_digest = password_digest(&user_id, password);
        Self {
            user_id,
            password_digest,
        }
    }

    fn accepts(&self, password: &str) -> bool {
        self.password_digest == password_digest(&self.user_id, password)
    }
}

fn password_digest(user_id: &str, password: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{user_id}:{password}").as_bytes()).to_string()
}

#[derive(Default)]
struct LocalState {
    /// Keyed by lowercased email
    accounts: HashMap<String, LocalAccount>,
    signed_in: Option<AuthUser>,
    /// Account file rewritten after every new account
    accounts_path: Option<PathBuf>,
}

/// Verifies credentials without any network access.
///
/// - anonymous sign-ins get a fresh time-ordered id,
/// - Google/Apple identity tokens map to a stable id per provider and token,
/// - email accounts live in memory, or in a JSON file when the provider is
///   opened with [`LocalAuthProvider::open`].
#[derive(Clone, Default)]
pub struct LocalAuthProvider {
    state: Arc<Mutex<LocalState>>,
}

impl LocalAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose email accounts are kept in the file at `path`.
    ///
    /// A missing file starts an empty account table.
    pub fn open(path: impl Into<PathBuf>) -> AuthResult<Self> {
        let path = path.into();
        let accounts = if path.exists() {
            let payload = std::fs::read_to_string(&path)
                .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
            serde_json::from_str(&payload)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            state: Arc::new(Mutex::new(LocalState {
                accounts,
                signed_in: None,
                accounts_path: Some(path),
            })),
        })
    }

    /// Seed an email account; returns its user id.
    pub fn register(&self, email: &str, password: &str) -> AuthResult<String> {
        validate_email_credentials(email, password)?;
        let mut state = self.lock()?;
        Self::insert_account(&mut state, email, password)
    }

    pub fn signed_in_user(&self) -> Option<AuthUser> {
        self.lock().ok().and_then(|state| state.signed_in.clone())
    }

    fn insert_account(state: &mut LocalState, email: &str, password: &str) -> AuthResult<String> {
        let key = normalize_key(email);
        if state.accounts.contains_key(&key) {
            return Err(AuthError::Rejected(
                "An account with this email already exists".to_string(),
            ));
        }
        let user_id = Uuid::now_v7().to_string();
        state
            .accounts
            .insert(key, LocalAccount::new(user_id.clone(), password));
        if let Some(path) = &state.accounts_path {
            save_accounts(path, &state.accounts)?;
        }
        Ok(user_id)
    }

    fn identity_user(provider: &str, id_token: &str) -> AuthResult<AuthUser> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(AuthError::Rejected(format!(
                "The {provider} sign-in did not return an identity token"
            )));
        }
        let id = Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("{provider}:{id_token}").as_bytes(),
        );
        Ok(AuthUser {
            id: id.to_string(),
            email: None,
        })
    }

    fn lock(&self) -> AuthResult<MutexGuard<'_, LocalState>> {
        self.state
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

fn save_accounts(path: &Path, accounts: &HashMap<String, LocalAccount>) -> AuthResult<()> {
    let storage_error = |error: std::io::Error| AuthError::SecureStorage(error.to_string());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(storage_error)?;
    }
    let payload = serde_json::to_string_pretty(accounts)?;
    std::fs::write(path, payload).map_err(storage_error)
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn authenticate(&self, credential: &Credential) -> AuthResult<AuthUser> {
        let user = match credential {
            Credential::Anonymous => AuthUser {
                id: Uuid::now_v7().to_string(),
                email: None,
            },
            Credential::Google { id_token } => Self::identity_user("google", id_token)?,
            Credential::Apple { id_token, .. } => Self::identity_user("apple", id_token)?,
            Credential::Email {
                email,
                password,
                intent,
            } => {
                validate_email_credentials(email, password)?;
                let mut state = self.lock()?;
                let user_id = match intent {
                    EmailIntent::NewUser => Self::insert_account(&mut state, email, password)?,
                    EmailIntent::ReturningUser => {
                        let account = state
                            .accounts
                            .get(&normalize_key(email))
                            .filter(|account| account.accepts(password))
                            .ok_or_else(|| {
                                AuthError::Rejected("Invalid email or password".to_string())
                            })?;
                        account.user_id.clone()
                    }
                };
                AuthUser {
                    id: user_id,
                    email: Some(email.trim().to_string()),
                }
            }
        };

        self.lock()?.signed_in = Some(user.clone());
        tracing::debug!("Local provider authenticated {} as {}", credential.kind(), user.id);
        Ok(user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.lock()?.signed_in = None;
        Ok(())
    }
}
