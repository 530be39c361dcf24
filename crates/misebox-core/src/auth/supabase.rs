//! Supabase (GoTrue) authentication provider.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    validate_email_credentials, AuthError, AuthProvider, AuthResult, AuthUser, Credential,
    EmailIntent,
};
use crate::util::{compact_text, is_http_url, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Where a provider keeps the signed-in session between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// One GoTrue exchange that may yield a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant<'a> {
    Anonymous,
    SignUp {
        email: &'a str,
        password: &'a str,
    },
    Password {
        email: &'a str,
        password: &'a str,
    },
    IdToken {
        provider: &'static str,
        id_token: &'a str,
        nonce: Option<&'a str>,
    },
    Refresh {
        refresh_token: &'a str,
    },
}

impl Grant<'_> {
    /// Endpoint below `/auth/v1` and the `grant_type` query, if any.
    const fn endpoint(&self) -> (&'static str, Option<&'static str>) {
        match self {
            Self::Anonymous | Self::SignUp { .. } => ("signup", None),
            Self::Password { .. } => ("token", Some("password")),
            Self::IdToken { .. } => ("token", Some("id_token")),
            Self::Refresh { .. } => ("token", Some("refresh_token")),
        }
    }

    fn payload(&self) -> Value {
        match *self {
            Self::Anonymous => json!({ "data": {} }),
            Self::SignUp { email, password } | Self::Password { email, password } => {
                json!({ "email": email.trim(), "password": password })
            }
            Self::IdToken {
                provider,
                id_token,
                nonce,
            } => {
                let mut payload = json!({ "provider": provider, "id_token": id_token });
                if let Some(nonce) = nonce {
                    payload["nonce"] = Value::String(nonce.to_string());
                }
                payload
            }
            Self::Refresh { refresh_token } => json!({ "refresh_token": refresh_token }),
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous sign-up",
            Self::SignUp { .. } => "Sign-up",
            Self::Password { .. } => "Sign-in",
            Self::IdToken { .. } => "Identity token sign-in",
            Self::Refresh { .. } => "Refresh",
        }
    }
}

#[derive(Clone)]
pub struct SupabaseAuthProvider<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthProvider<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
        })
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// A session that cannot be refreshed is cleared and reported as absent.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };
        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!(user = %stored.user.id, "Dropping stored session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }
        self.require_session(Grant::Refresh { refresh_token }).await
    }

    /// Run a grant; `Ok(None)` means GoTrue accepted it without opening a session.
    async fn exchange(&self, grant: Grant<'_>) -> AuthResult<Option<AuthSession>> {
        let (path, grant_type) = grant.endpoint();
        let mut request = self
            .client
            .post(format!("{}/{path}", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&grant.payload());
        if let Some(grant_type) = grant_type {
            request = request.query(&[("grant_type", grant_type)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let session = response.json::<GoTrueResponse>().await?.into_session()?;
        if let Some(session) = &session {
            self.store.save_session(session)?;
        }
        Ok(session)
    }

    async fn require_session(&self, grant: Grant<'_>) -> AuthResult<AuthSession> {
        let label = grant.label();
        self.exchange(grant).await?.ok_or_else(|| {
            AuthError::Api(format!("{label} response did not include an active session"))
        })
    }

    async fn identity_token(
        &self,
        provider: &'static str,
        id_token: &str,
        nonce: Option<&str>,
    ) -> AuthResult<AuthSession> {
        if id_token.trim().is_empty() {
            return Err(AuthError::Rejected(format!(
                "The {provider} sign-in did not return an identity token"
            )));
        }
        self.require_session(Grant::IdToken {
            provider,
            id_token,
            nonce,
        })
        .await
    }
}

#[async_trait]
impl<S: SessionPersistence> AuthProvider for SupabaseAuthProvider<S> {
    async fn authenticate(&self, credential: &Credential) -> AuthResult<AuthUser> {
        let session = match credential {
            Credential::Anonymous => self.require_session(Grant::Anonymous).await?,
            Credential::Google { id_token } => {
                self.identity_token("google", id_token, None).await?
            }
            Credential::Apple { id_token, nonce } => {
                self.identity_token("apple", id_token, nonce.as_deref())
                    .await?
            }
            Credential::Email {
                email,
                password,
                intent,
            } => {
                validate_email_credentials(email, password)?;
                match intent {
                    // Projects with email confirmation return a user but no session.
                    EmailIntent::NewUser => self
                        .exchange(Grant::SignUp { email, password })
                        .await?
                        .ok_or(AuthError::ConfirmationRequired)?,
                    EmailIntent::ReturningUser => {
                        self.require_session(Grant::Password { email, password })
                            .await?
                    }
                }
            }
        };
        tracing::info!(user = %session.user.id, method = %credential.kind(), "Supabase sign-in");
        Ok(session.user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let Some(session) = self.store.load_session()? else {
            return Ok(());
        };
        // The local session is dropped even when the revoke request fails.
        self.store.clear_session()?;

        let response = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let status = response.status();
        // An already revoked token still counts as signed out.
        if !(status.is_success() || status == StatusCode::UNAUTHORIZED) {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }
}

/// Turn a project URL into the GoTrue base URL (`.../auth/v1`).
pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    Ok(if trimmed.ends_with("/auth/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/auth/v1")
    })
}

/// Token fields GoTrue returns either at the top level or under `session`.
#[derive(Debug, Default, Deserialize)]
struct TokenFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<GoTrueUser>,
}

impl TokenFields {
    fn or(self, fallback: Self) -> Self {
        Self {
            access_token: self.access_token.or(fallback.access_token),
            refresh_token: self.refresh_token.or(fallback.refresh_token),
            expires_at: self.expires_at.or(fallback.expires_at),
            expires_in: self.expires_in.or(fallback.expires_in),
            user: self.user.or(fallback.user),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueResponse {
    #[serde(flatten)]
    fields: TokenFields,
    session: Option<TokenFields>,
}

impl GoTrueResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let fields = self.fields.or(self.session.unwrap_or_default());
        let expires_at = fields.expires_at.or_else(|| {
            fields
                .expires_in
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });

        match (
            fields.access_token,
            fields.refresh_token,
            expires_at,
            fields.user,
        ) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user: user.into(),
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(value: GoTrueUser) -> Self {
        Self {
            id: value.id,
            email: value.email.filter(|email| !email.trim().is_empty()),
        }
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    let code = status.as_u16();
    let message = serde_json::from_str::<Value>(body).ok().and_then(|payload| {
        ["message", "msg", "error_description", "error"]
            .into_iter()
            .find_map(|key| payload.get(key)?.as_str().map(str::trim).map(str::to_string))
    });
    if let Some(message) = message {
        return format!("{message} ({code})");
    }

    let body = compact_text(body);
    if body.is_empty() {
        format!("HTTP {code}")
    } else {
        format!("{body} ({code})")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Clone, Default)]
    struct MemorySessionStore {
        session: Arc<Mutex<Option<AuthSession>>>,
    }

    impl SessionPersistence for MemorySessionStore {
        fn load_session(&self) -> AuthResult<Option<AuthSession>> {
            Ok(self.session.lock().unwrap().clone())
        }

        fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
            *self.session.lock().unwrap() = Some(session.clone());
            Ok(())
        }

        fn clear_session(&self) -> AuthResult<()> {
            *self.session.lock().unwrap() = None;
            Ok(())
        }
    }

    fn provider() -> SupabaseAuthProvider<MemorySessionStore> {
        SupabaseAuthProvider::new("https://demo.supabase.co", "anon", MemorySessionStore::default())
            .unwrap()
    }

    #[test]
    fn auth_url_gets_a_single_auth_suffix() {
        assert_eq!(
            normalize_auth_url("https://demo.supabase.co").unwrap(),
            "https://demo.supabase.co/auth/v1"
        );
        assert_eq!(
            normalize_auth_url("https://demo.supabase.co/auth/v1/").unwrap(),
            "https://demo.supabase.co/auth/v1"
        );
        assert!(normalize_auth_url("demo.supabase.co").is_err());
    }

    #[test]
    fn blank_anon_key_is_rejected() {
        let result =
            SupabaseAuthProvider::new("https://demo.supabase.co", "  ", MemorySessionStore::default());
        assert!(matches!(result, Err(AuthError::InvalidConfiguration(_))));
    }

    #[test]
    fn grants_target_their_endpoints() {
        assert_eq!(Grant::Anonymous.endpoint(), ("signup", None));
        let apple = Grant::IdToken {
            provider: "apple",
            id_token: "tok",
            nonce: Some("n-1"),
        };
        assert_eq!(apple.endpoint(), ("token", Some("id_token")));
        assert_eq!(
            apple.payload(),
            json!({ "provider": "apple", "id_token": "tok", "nonce": "n-1" })
        );
        let google = Grant::IdToken {
            provider: "google",
            id_token: "tok",
            nonce: None,
        };
        assert!(google.payload().get("nonce").is_none());
        assert_eq!(
            Grant::Password {
                email: " ana@example.com ",
                password: "pw"
            }
            .payload(),
            json!({ "email": "ana@example.com", "password": "pw" })
        );
    }

    #[test]
    fn user_without_tokens_means_confirmation_pending() {
        let response: GoTrueResponse =
            serde_json::from_str(r#"{ "user": { "id": "u1", "email": "ana@example.com" } }"#)
                .unwrap();
        assert!(response.into_session().unwrap().is_none());
    }

    #[test]
    fn nested_session_fields_are_used() {
        let response: GoTrueResponse = serde_json::from_str(
            r#"{
                "session": {
                    "access_token": "a",
                    "refresh_token": "r",
                    "expires_in": 3600,
                    "user": { "id": "u1", "email": "" }
                }
            }"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.email, None);
        assert!(!session.is_expired());
    }

    #[test]
    fn partial_token_fields_are_an_error() {
        let response: GoTrueResponse =
            serde_json::from_str(r#"{ "access_token": "a", "user": { "id": "u1" } }"#).unwrap();
        assert!(matches!(response.into_session(), Err(AuthError::Api(_))));
    }

    #[test]
    fn api_errors_prefer_message_fields() {
        assert_eq!(
            parse_api_error(
                StatusCode::BAD_REQUEST,
                r#"{"error_description":"Invalid login credentials"}"#
            ),
            "Invalid login credentials (400)"
        );
        assert_eq!(
            parse_api_error(StatusCode::UNPROCESSABLE_ENTITY, "upstream said no"),
            "upstream said no (422)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let session = AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: "u1".to_string(),
                email: None,
            },
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(session.is_expired());
    }

    #[tokio::test]
    async fn sign_out_without_stored_session_is_a_no_op() {
        let provider = provider();
        provider.sign_out().await.unwrap();
        assert!(provider.restore_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_revoke_still_clears_the_stored_session() {
        let provider =
            SupabaseAuthProvider::new("http://127.0.0.1:9", "anon", MemorySessionStore::default())
                .unwrap();
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: unix_timestamp_now() + 3600,
            user: AuthUser {
                id: "u1".to_string(),
                email: None,
            },
        };
        provider.store.save_session(&session).unwrap();

        assert!(provider.sign_out().await.is_err());
        assert!(provider.store.load_session().unwrap().is_none());
        assert!(provider.restore_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unexpired_stored_session_is_restored_without_a_request() {
        let provider = provider();
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: unix_timestamp_now() + 3600,
            user: AuthUser {
                id: "u1".to_string(),
                email: None,
            },
        };
        provider.store.save_session(&session).unwrap();
        assert_eq!(provider.restore_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn credentials_are_checked_before_any_request() {
        let provider = provider();
        let error = provider
            .authenticate(&Credential::Email {
                email: "nobody".to_string(),
                password: "pw".to_string(),
                intent: EmailIntent::ReturningUser,
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AuthError::Rejected(_)));

        let error = provider
            .authenticate(&Credential::Google {
                id_token: " ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "The google sign-in did not return an identity token"
        );
    }
}
