//! Auth provider selection with secure keychain persistence for Supabase
//! sessions.

#[cfg(test)]
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use misebox_core::auth::{
    resolve_optional_supabase_config, AuthError, AuthProvider, AuthResult, AuthSession, AuthUser,
    LocalAuthProvider, SessionPersistence, SupabaseAuthProvider,
};
use misebox_core::config::ClientConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "misebox-cli";

/// Keychain slot holding the Supabase session of one project.
#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn new(project_url: &str) -> Self {
        Self {
            username: format!("supabase_session:{}", project_url.trim_end_matches('/')),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// Which provider backs the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Local,
    Supabase,
}

pub enum SelectedProvider {
    Local(Arc<LocalAuthProvider>),
    Supabase(Arc<SupabaseAuthProvider<SessionStore>>),
}

impl SelectedProvider {
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Local(_) => ProviderKind::Local,
            Self::Supabase(_) => ProviderKind::Supabase,
        }
    }

    pub fn shared(&self) -> Arc<dyn AuthProvider> {
        match self {
            Self::Local(provider) => provider.clone(),
            Self::Supabase(provider) => provider.clone(),
        }
    }

    /// User of a still-valid session left in the keychain by an earlier run.
    pub async fn stored_user(&self) -> AuthResult<Option<AuthUser>> {
        match self {
            Self::Local(_) => Ok(None),
            Self::Supabase(provider) => Ok(provider
                .restore_session()
                .await?
                .map(|session| session.user)),
        }
    }
}

/// Pick the Supabase provider when the config names a project, otherwise the
/// offline provider with its accounts kept at `accounts_path`.
pub fn build_provider(
    config: &ClientConfig,
    offline: bool,
    accounts_path: &Path,
) -> AuthResult<SelectedProvider> {
    let local = || -> AuthResult<SelectedProvider> {
        Ok(SelectedProvider::Local(Arc::new(LocalAuthProvider::open(
            accounts_path,
        )?)))
    };
    if offline {
        return local();
    }
    let resolved = resolve_optional_supabase_config(
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
    )?;
    let Some((url, anon_key)) = resolved else {
        return local();
    };

    let provider = SupabaseAuthProvider::new(&url, anon_key, SessionStore::new(&url))?;
    tracing::info!("Using Supabase auth at {}", url);
    Ok(SelectedProvider::Supabase(Arc::new(provider)))
}
