//! Session manager.
//!
//! Owns the signed-in user's [`UserProfile`] and [`ExtendedProfile`],
//! drives authentication transitions and keeps both entities in sync with the
//! document store. All mutation happens through `&mut self` on the owner's
//! task; listener deliveries are queued and applied when the owner drains
//! them.

use std::future::poll_fn;
use std::sync::Arc;
use std::task::Poll;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;

use crate::auth::{AuthProvider, AuthResult, AuthUser, Credential, CredentialKind};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{ExtendedProfile, FullName, UserProfile, UserRole};
use crate::state::{AuthState, Observable};
use crate::sync::{
    write_entity, CollectionListener, DocumentSnapshot, DocumentStore, ListenerHandle, SyncEntity,
};
use crate::util::normalize_key;

/// Everything the rendering layer reads about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: AuthState,
    pub user: UserProfile,
    pub profile: ExtendedProfile,
}

impl SessionSnapshot {
    pub const fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub const fn is_anonymous(&self) -> bool {
        self.state.is_anonymous()
    }
}

/// Token for an in-flight verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthAttempt {
    generation: u64,
    kind: CredentialKind,
}

impl AuthAttempt {
    pub const fn kind(self) -> CredentialKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Authenticated { user_id: String, anonymous: bool },
    /// The session moved on (sign-out or a newer attempt) before the
    /// provider answered; the result was dropped.
    Discarded,
}

/// Entities that can be kept live through a document listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenedEntity {
    User,
    Profile,
}

impl ListenedEntity {
    pub const ALL: [Self; 2] = [Self::User, Self::Profile];

    pub fn collection(self, config: &ClientConfig) -> &str {
        match self {
            Self::User => &config.users_collection,
            Self::Profile => &config.profiles_collection,
        }
    }
}

#[derive(Debug)]
struct AttachedListener {
    entity: ListenedEntity,
    handle: ListenerHandle,
    events: UnboundedReceiver<Result<DocumentSnapshot>>,
}

pub struct SessionManager {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    config: ClientConfig,
    state: AuthState,
    user: UserProfile,
    profile: ExtendedProfile,
    /// Bumped by every new attempt and by sign-out
    generation: u64,
    listeners: Vec<AttachedListener>,
    snapshot: Observable<SessionSnapshot>,
}

impl SessionManager {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        config: ClientConfig,
    ) -> Self {
        Self {
            auth,
            store,
            config,
            state: AuthState::Unauthenticated,
            user: UserProfile::default(),
            profile: ExtendedProfile::default(),
            generation: 0,
            listeners: Vec::new(),
            snapshot: Observable::default(),
        }
    }

    pub const fn state(&self) -> AuthState {
        self.state
    }

    pub const fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub const fn is_anonymous(&self) -> bool {
        self.state.is_anonymous()
    }

    pub const fn user(&self) -> &UserProfile {
        &self.user
    }

    pub const fn profile(&self) -> &ExtendedProfile {
        &self.profile
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Entities with a live document listener.
    pub fn attached_listeners(&self) -> Vec<ListenedEntity> {
        self.listeners.iter().map(|listener| listener.entity).collect()
    }

    /// Verify a credential with the provider and set up the signed-in user.
    pub async fn verify(&mut self, credential: Credential) -> Result<VerifyOutcome> {
        let attempt = self.begin_verification(credential.kind());
        let result = self.auth.authenticate(&credential).await;
        self.complete_verification(attempt, result).await
    }

    /// Enter `Authenticating` and hand out the token the result must carry.
    pub fn begin_verification(&mut self, kind: CredentialKind) -> AuthAttempt {
        self.generation += 1;
        self.state = AuthState::Authenticating;
        self.publish();
        tracing::info!("Verifying {} credential", kind);
        AuthAttempt {
            generation: self.generation,
            kind,
        }
    }

    /// Apply a provider result for `attempt`.
    ///
    /// Results that arrive after a sign-out or a newer attempt are discarded
    /// and leave the session untouched.
    pub async fn complete_verification(
        &mut self,
        attempt: AuthAttempt,
        result: AuthResult<AuthUser>,
    ) -> Result<VerifyOutcome> {
        if attempt.generation != self.generation || self.state != AuthState::Authenticating {
            tracing::warn!(
                "Discarding stale {} verification result (attempt {}, session {})",
                attempt.kind,
                attempt.generation,
                self.generation
            );
            return Ok(VerifyOutcome::Discarded);
        }

        let auth_user = match result {
            Ok(auth_user) => auth_user,
            Err(error) => {
                tracing::info!("{} verification failed: {}", attempt.kind, error);
                self.state = AuthState::Unauthenticated;
                self.publish();
                return Err(error.into());
            }
        };

        let anonymous = attempt.kind == CredentialKind::Anonymous;
        if self.user.id != auth_user.id {
            self.detach_listeners();
            self.user = UserProfile::default();
            self.profile = ExtendedProfile::default();
        }
        self.user.assign_id(&auth_user.id);
        self.profile.assign_id(&auth_user.id);
        let linked = self.profile.link_provider(attempt.kind.provider_name());
        self.state = AuthState::Authenticated { anonymous };
        self.publish();
        tracing::info!("Signed in {} ({})", auth_user.id, attempt.kind);

        if self.user_exists().await? {
            self.refresh_from_remote().await?;
            if self.profile.link_provider(attempt.kind.provider_name()) {
                self.persist_profile().await?;
            }
        } else {
            if !linked {
                tracing::debug!("Provider {} already linked", attempt.kind);
            }
            self.persist_profile().await?;
        }

        Ok(VerifyOutcome::Authenticated {
            user_id: auth_user.id,
            anonymous,
        })
    }

    /// Prime and write both documents.
    ///
    /// Both writes are attempted even when the first one fails; failures are
    /// reported together and nothing is rolled back.
    pub async fn persist_profile(&mut self) -> Result<()> {
        if self.user.id.is_empty() {
            return Err(Error::InvalidInput(
                "cannot save a profile before signing in".to_string(),
            ));
        }
        if self.user.prime(&self.config.default_image_url) {
            tracing::debug!("Primed image url for {}", self.user.id);
        }
        if self.profile.id != self.user.id {
            self.profile.assign_id(&self.user.id);
        }
        self.publish();

        let store = self.store.as_ref();
        let user_write = write_entity(store, &self.config.users_collection, &self.user).await;
        let profile_write =
            write_entity(store, &self.config.profiles_collection, &self.profile).await;

        let failures: Vec<String> = [user_write, profile_write]
            .into_iter()
            .filter_map(|write| write.err())
            .map(|error| match error {
                Error::SyncFailed(message) => message,
                other => other.to_string(),
            })
            .collect();
        if failures.is_empty() {
            tracing::info!("Saved profile {}", self.user.id);
            Ok(())
        } else {
            tracing::warn!("Saving profile {} failed: {}", self.user.id, failures.join("; "));
            Err(Error::SyncFailed(failures.join("; ")))
        }
    }

    /// Sign out locally; remote documents are left as they are.
    pub async fn sign_out(&mut self) {
        self.generation += 1;
        if let Err(error) = self.auth.sign_out().await {
            tracing::warn!("Provider sign-out failed: {}", error);
        }
        self.detach_listeners();
        self.user = UserProfile::default();
        self.profile = ExtendedProfile::default();
        self.state = AuthState::Unauthenticated;
        self.publish();
        tracing::info!("Signed out");
    }

    pub async fn user_exists(&self) -> Result<bool> {
        if self.user.id.is_empty() {
            return Ok(false);
        }
        self.store
            .document_exists(&self.config.users_collection, &self.user.id)
            .await
    }

    /// Read both documents and hydrate the entities from them.
    ///
    /// A missing profile document leaves the extended profile as it is.
    pub async fn refresh_from_remote(&mut self) -> Result<()> {
        let id = self.require_id()?.to_string();
        let user_fields = self
            .store
            .read_document(&self.config.users_collection, &id)
            .await?;
        let profile_fields = match self
            .store
            .read_document(&self.config.profiles_collection, &id)
            .await
        {
            Ok(fields) => Some(fields),
            Err(Error::NotFound(_)) => {
                tracing::debug!("No extended profile stored for {}", id);
                None
            }
            Err(error) => return Err(error),
        };

        let mut user = self.user.clone();
        user.apply_fields(&user_fields)?;
        user.prime(&self.config.default_image_url);
        let mut profile = self.profile.clone();
        if let Some(fields) = &profile_fields {
            profile.apply_fields(fields)?;
        }
        self.user = user;
        self.profile = profile;
        self.publish();
        tracing::info!("Hydrated profile {} from remote", id);
        Ok(())
    }

    /// Start listening to the entity's document. Attaching twice returns the
    /// existing handle.
    pub fn attach_listener(&mut self, entity: ListenedEntity) -> Result<ListenerHandle> {
        if let Some(listener) = self.listeners.iter().find(|listener| listener.entity == entity) {
            return Ok(listener.handle);
        }
        let id = self.require_id()?;
        let listener = self
            .store
            .add_document_listener(entity.collection(&self.config), id)?;
        tracing::debug!("Listening to {:?} document {}", entity, id);
        let handle = listener.handle;
        self.listeners.push(AttachedListener {
            entity,
            handle,
            events: listener.events,
        });
        Ok(handle)
    }

    pub fn detach_listeners(&mut self) {
        for listener in self.listeners.drain(..) {
            self.store.remove_listener(listener.handle);
        }
    }

    /// Apply every queued delivery without waiting. Returns how many were
    /// applied.
    pub fn process_remote_changes(&mut self) -> usize {
        let mut pending = Vec::new();
        let mut closed = Vec::new();
        for (index, listener) in self.listeners.iter_mut().enumerate() {
            loop {
                match listener.events.try_recv() {
                    Ok(event) => pending.push((listener.entity, event)),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed.push(index);
                        break;
                    }
                }
            }
        }
        for index in closed.into_iter().rev() {
            let listener = self.listeners.remove(index);
            tracing::debug!("Listener for {:?} closed", listener.entity);
        }

        pending
            .into_iter()
            .filter(|(entity, event)| self.apply_delivery(*entity, event))
            .count()
    }

    /// Wait for the next delivery that applies cleanly.
    ///
    /// Returns `None` once no listener is attached.
    pub async fn next_remote_change(&mut self) -> Option<ListenedEntity> {
        loop {
            let listeners = &mut self.listeners;
            let (index, event) = poll_fn(|cx| {
                if listeners.is_empty() {
                    return Poll::Ready(None);
                }
                for (index, listener) in listeners.iter_mut().enumerate() {
                    if let Poll::Ready(event) = listener.events.poll_recv(cx) {
                        return Poll::Ready(Some((index, event)));
                    }
                }
                Poll::Pending
            })
            .await?;

            let entity = self.listeners[index].entity;
            match event {
                Some(event) => {
                    if self.apply_delivery(entity, &event) {
                        return Some(entity);
                    }
                }
                None => {
                    self.listeners.remove(index);
                    tracing::debug!("Listener for {:?} closed", entity);
                }
            }
        }
    }

    /// Listen to the whole users collection.
    pub fn watch_users(&self) -> Result<UserFeed> {
        let listener = self
            .store
            .add_collection_listener(&self.config.users_collection)?;
        Ok(UserFeed {
            store: Arc::clone(&self.store),
            listener,
            placeholder: self.config.default_image_url.clone(),
        })
    }

    pub fn update_username(&mut self, username: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidInput("Username cannot be empty".to_string()));
        }
        self.user.username = username.to_string();
        self.publish();
        Ok(())
    }

    pub fn add_role(&mut self, role: UserRole) {
        self.user.upsert_role(role);
        self.publish();
    }

    pub fn remove_role(&mut self, role: &str) -> bool {
        let removed = self.user.remove_role(&normalize_key(role));
        if removed {
            self.publish();
        }
        removed
    }

    pub fn set_full_name(&mut self, full_name: FullName) {
        self.profile.full_name = full_name;
        self.publish();
    }

    fn apply_delivery(&mut self, entity: ListenedEntity, event: &Result<DocumentSnapshot>) -> bool {
        let snapshot = match event {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!("Dropping {:?} listener error: {}", entity, error);
                return false;
            }
        };
        let applied = match entity {
            ListenedEntity::User => self.user.apply_snapshot(snapshot),
            ListenedEntity::Profile => self.profile.apply_snapshot(snapshot),
        };
        match applied {
            Ok(()) => {
                tracing::debug!("Applied remote {:?} change for {}", entity, snapshot.id);
                self.publish();
                true
            }
            Err(error) => {
                tracing::warn!("Dropping {:?} payload for {}: {}", entity, snapshot.id, error);
                false
            }
        }
    }

    fn require_id(&self) -> Result<&str> {
        if self.user.id.is_empty() {
            return Err(Error::InvalidInput("no signed-in user".to_string()));
        }
        Ok(&self.user.id)
    }

    fn publish(&self) {
        self.snapshot.set(SessionSnapshot {
            state: self.state,
            user: self.user.clone(),
            profile: self.profile.clone(),
        });
    }
}

/// Decoded change feed of the users collection. Dropping it removes the
/// listener.
pub struct UserFeed {
    store: Arc<dyn DocumentStore>,
    listener: CollectionListener,
    placeholder: String,
}

impl UserFeed {
    pub const fn handle(&self) -> ListenerHandle {
        self.listener.handle
    }

    /// Wait for the next listing. `None` once the store drops the feed.
    pub async fn next(&mut self) -> Option<Vec<UserProfile>> {
        loop {
            match self.listener.events.recv().await? {
                Ok(documents) => return Some(decode_listing(&documents, &self.placeholder)),
                Err(error) => tracing::warn!("Dropping users listing: {}", error),
            }
        }
    }

    /// The latest queued listing, if any, discarding older ones.
    pub fn latest(&mut self) -> Option<Vec<UserProfile>> {
        let mut latest = None;
        while let Ok(event) = self.listener.events.try_recv() {
            match event {
                Ok(documents) => latest = Some(documents),
                Err(error) => tracing::warn!("Dropping users listing: {}", error),
            }
        }
        latest.map(|documents| decode_listing(&documents, &self.placeholder))
    }
}

impl Drop for UserFeed {
    fn drop(&mut self) {
        self.store.remove_listener(self.listener.handle);
    }
}

fn decode_listing(documents: &[DocumentSnapshot], placeholder: &str) -> Vec<UserProfile> {
    documents
        .iter()
        .filter_map(|document| {
            UserProfile::from_document(&document.id, &document.fields, placeholder)
                .map_err(|error| tracing::warn!("Skipping user {}: {}", document.id, error))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::auth::{AuthError, EmailIntent, LocalAuthProvider};
    use crate::models::DEFAULT_IMAGE_URL;
    use crate::sync::{Fields, MemoryDocumentStore};

    const USERS: &str = "misebox-users";
    const PROFILES: &str = "misebox-user-profiles";

    /// Accepts every credential as the same user.
    struct FixedProvider {
        user_id: &'static str,
    }

    #[async_trait]
    impl AuthProvider for FixedProvider {
        async fn authenticate(&self, _credential: &Credential) -> AuthResult<AuthUser> {
            Ok(AuthUser {
                id: self.user_id.to_string(),
                email: None,
            })
        }

        async fn sign_out(&self) -> AuthResult<()> {
            Ok(())
        }
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn email(intent: EmailIntent) -> Credential {
        Credential::Email {
            email: "ana@example.com".to_string(),
            password: "secret-pass".to_string(),
            intent,
        }
    }

    fn session_for(user_id: &'static str) -> (SessionManager, MemoryDocumentStore) {
        let store = MemoryDocumentStore::new();
        let session = SessionManager::new(
            Arc::new(FixedProvider { user_id }),
            Arc::new(store.clone()),
            ClientConfig::default(),
        );
        (session, store)
    }

    #[tokio::test]
    async fn new_email_user_gets_id_on_both_entities() {
        let (mut session, store) = session_for("u1");

        let outcome = session.verify(email(EmailIntent::NewUser)).await.unwrap();

        assert_eq!(
            outcome,
            VerifyOutcome::Authenticated {
                user_id: "u1".to_string(),
                anonymous: false,
            }
        );
        assert_eq!(session.user().id, "u1");
        assert_eq!(session.profile().id, "u1");
        assert_eq!(session.profile().account_providers, vec!["email".to_string()]);
        assert!(session.is_authenticated());
        assert!(!session.is_anonymous());

        let snapshot = store.snapshot().unwrap();
        assert_eq!(
            snapshot.collections[USERS]["u1"]["image_url"],
            json!(DEFAULT_IMAGE_URL)
        );
        assert_eq!(
            snapshot.collections[PROFILES]["u1"]["account_providers"],
            json!(["email"])
        );
    }

    #[tokio::test]
    async fn anonymous_sign_in_is_flagged() {
        let store = MemoryDocumentStore::new();
        let mut session = SessionManager::new(
            Arc::new(LocalAuthProvider::new()),
            Arc::new(store),
            ClientConfig::default(),
        );

        let outcome = session.verify(Credential::Anonymous).await.unwrap();
        let VerifyOutcome::Authenticated { user_id, anonymous } = outcome else {
            panic!("expected authenticated outcome");
        };
        assert!(anonymous);
        assert!(session.is_anonymous());
        assert_eq!(session.user().id, user_id);
    }

    #[tokio::test]
    async fn rejected_credentials_return_to_unauthenticated() {
        let mut session = SessionManager::new(
            Arc::new(LocalAuthProvider::new()),
            Arc::new(MemoryDocumentStore::new()),
            ClientConfig::default(),
        );

        let error = session
            .verify(email(EmailIntent::ReturningUser))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::AuthenticationFailed(_)));
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert!(session.user().id.is_empty());
    }

    #[tokio::test]
    async fn late_success_after_sign_out_is_discarded() {
        let (mut session, store) = session_for("u1");

        let attempt = session.begin_verification(CredentialKind::Google);
        assert_eq!(session.state(), AuthState::Authenticating);
        session.sign_out().await;

        let outcome = session
            .complete_verification(
                attempt,
                Ok(AuthUser {
                    id: "u1".to_string(),
                    email: None,
                }),
            )
            .await
            .unwrap();

        assert_eq!(outcome, VerifyOutcome::Discarded);
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert!(session.user().id.is_empty());
        assert!(store.snapshot().unwrap().collections.is_empty());
    }

    #[tokio::test]
    async fn newer_attempt_supersedes_older_one() {
        let (mut session, _store) = session_for("u1");

        let first = session.begin_verification(CredentialKind::Apple);
        let second = session.begin_verification(CredentialKind::Anonymous);
        let user = || {
            Ok(AuthUser {
                id: "u1".to_string(),
                email: None,
            })
        };

        assert_eq!(
            session.complete_verification(first, user()).await.unwrap(),
            VerifyOutcome::Discarded
        );
        assert!(matches!(
            session.complete_verification(second, user()).await.unwrap(),
            VerifyOutcome::Authenticated { anonymous: true, .. }
        ));
    }

    #[tokio::test]
    async fn failed_result_reports_provider_message() {
        let (mut session, _store) = session_for("u1");
        let attempt = session.begin_verification(CredentialKind::Email);

        let error = session
            .complete_verification(attempt, Err(AuthError::Rejected("Invalid login".to_string())))
            .await
            .unwrap_err();

        assert_eq!(error.user_message(), "Invalid login");
        assert_eq!(session.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn returning_user_is_hydrated_instead_of_overwritten() {
        let (mut session, store) = session_for("u1");
        store
            .write_document(
                USERS,
                "u1",
                fields(json!({
                    "username": "chef_ana",
                    "image_url": "https://cdn.example.com/ana.png",
                    "verified": true,
                    "user_roles": [{ "role": "chef", "kitchen": "Nordic" }],
                })),
            )
            .await
            .unwrap();
        store
            .write_document(
                PROFILES,
                "u1",
                fields(json!({
                    "full_name": { "first": "Ana", "middle": "", "last": "Lind" },
                    "account_providers": ["google"],
                })),
            )
            .await
            .unwrap();

        session.verify(email(EmailIntent::ReturningUser)).await.unwrap();

        assert_eq!(session.user().username, "chef_ana");
        assert!(session.user().verified);
        assert!(session.user().has_role("chef"));
        assert_eq!(session.profile().display_name(), "Ana Lind");
        assert_eq!(
            session.profile().account_providers,
            vec!["google".to_string(), "email".to_string()]
        );

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.collections[USERS]["u1"]["username"], json!("chef_ana"));
        assert_eq!(
            snapshot.collections[PROFILES]["u1"]["account_providers"],
            json!(["google", "email"])
        );
    }

    #[tokio::test]
    async fn persist_primes_image_before_writing_and_reports_failures() {
        let (mut session, store) = session_for("u1");
        session.verify(Credential::Anonymous).await.unwrap();
        session.user.image_url.clear();
        store.fail_writes(USERS, "offline").unwrap();

        let error = session.persist_profile().await.unwrap_err();

        assert!(matches!(error, Error::SyncFailed(ref message) if message.contains("offline")));
        assert_eq!(session.user().image_url, DEFAULT_IMAGE_URL);
        assert!(store.snapshot().unwrap().collections[PROFILES].contains_key("u1"));
    }

    #[tokio::test]
    async fn persist_requires_a_signed_in_user() {
        let (mut session, store) = session_for("u1");
        let error = session.persist_profile().await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(store.snapshot().unwrap().collections.is_empty());
    }

    #[tokio::test]
    async fn listener_delivery_updates_only_changed_fields() {
        let (mut session, store) = session_for("u1");
        session.verify(Credential::Anonymous).await.unwrap();
        session.update_username("ana").unwrap();
        session.persist_profile().await.unwrap();

        session.attach_listener(ListenedEntity::User).unwrap();
        assert_eq!(session.process_remote_changes(), 1);

        store
            .merge_document(USERS, "u1", fields(json!({ "verified": true })))
            .unwrap();
        assert_eq!(session.process_remote_changes(), 1);

        let expected = UserProfile {
            id: "u1".to_string(),
            username: "ana".to_string(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
            verified: true,
            roles: Vec::new(),
        };
        assert_eq!(session.user(), &expected);
    }

    #[tokio::test]
    async fn malformed_delivery_keeps_prior_values() {
        let (mut session, store) = session_for("u1");
        session.verify(Credential::Anonymous).await.unwrap();
        session.attach_listener(ListenedEntity::User).unwrap();
        session.process_remote_changes();
        let before = session.user().clone();

        store
            .merge_document(
                USERS,
                "u1",
                fields(json!({ "verified": true, "user_roles": [{ "kitchen": "x" }] })),
            )
            .unwrap();

        assert_eq!(session.process_remote_changes(), 0);
        assert_eq!(session.user(), &before);
    }

    #[tokio::test]
    async fn next_remote_change_waits_for_a_delivery() {
        let (mut session, store) = session_for("u1");
        assert_eq!(session.next_remote_change().await, None);

        session.verify(Credential::Anonymous).await.unwrap();
        session.attach_listener(ListenedEntity::Profile).unwrap();
        assert_eq!(session.next_remote_change().await, Some(ListenedEntity::Profile));

        store
            .merge_document(
                PROFILES,
                "u1",
                fields(json!({ "full_name": { "first": "Ana", "middle": "", "last": "" } })),
            )
            .unwrap();
        assert_eq!(session.next_remote_change().await, Some(ListenedEntity::Profile));
        assert_eq!(session.profile().name(), "Ana");
    }

    #[tokio::test]
    async fn sign_out_clears_entities_and_detaches_listeners() {
        let (mut session, store) = session_for("u1");
        session.verify(Credential::Anonymous).await.unwrap();
        session.attach_listener(ListenedEntity::User).unwrap();
        session.attach_listener(ListenedEntity::Profile).unwrap();
        assert_eq!(store.listener_count(), 2);

        session.sign_out().await;

        assert_eq!(store.listener_count(), 0);
        assert!(session.attached_listeners().is_empty());
        assert_eq!(session.user(), &UserProfile::default());
        assert_eq!(session.profile(), &ExtendedProfile::default());
        assert!(store.snapshot().unwrap().collections[USERS].contains_key("u1"));
    }

    #[tokio::test]
    async fn refresh_reports_missing_user_document() {
        let (mut session, store) = session_for("u1");
        session.verify(Credential::Anonymous).await.unwrap();
        let mut snapshot = store.snapshot().unwrap();
        snapshot.collections.clear();
        let empty = MemoryDocumentStore::from_snapshot(snapshot);
        session.store = Arc::new(empty);

        let error = session.refresh_from_remote().await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
        assert_eq!(session.user().id, "u1");
    }

    #[tokio::test]
    async fn refresh_fills_missing_image_with_placeholder() {
        let (mut session, store) = session_for("u1");
        session.verify(Credential::Anonymous).await.unwrap();
        store
            .write_document(USERS, "u1", fields(json!({ "username": "ana" })))
            .await
            .unwrap();
        session.user.image_url.clear();

        session.refresh_from_remote().await.unwrap();
        assert_eq!(session.user().username, "ana");
        assert_eq!(session.user().image_url, DEFAULT_IMAGE_URL);
    }

    #[tokio::test]
    async fn local_mutations_publish_snapshots() {
        let (mut session, _store) = session_for("u1");
        let mut receiver = session.subscribe();
        session.verify(Credential::Anonymous).await.unwrap();
        receiver.borrow_and_update();

        session.add_role(UserRole::new("Chef").unwrap());
        session.set_full_name(FullName::new("Ana", "", "Lind"));
        assert!(receiver.has_changed().unwrap());
        let snapshot = receiver.borrow_and_update().clone();
        assert!(snapshot.user.has_role("chef"));
        assert_eq!(snapshot.profile.display_name(), "Ana Lind");

        assert!(session.remove_role(" CHEF "));
        assert!(!session.remove_role("chef"));
        assert!(session.update_username("   ").is_err());
    }

    #[tokio::test]
    async fn watch_users_skips_malformed_entries() {
        let (session, store) = session_for("u1");
        store
            .write_document(USERS, "good", fields(json!({ "username": "ana" })))
            .await
            .unwrap();
        store
            .write_document(USERS, "bad", fields(json!({ "username": 7 })))
            .await
            .unwrap();

        let mut feed = session.watch_users().unwrap();
        let users = feed.next().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "good");
        assert_eq!(users[0].image_url, DEFAULT_IMAGE_URL);

        store
            .write_document(USERS, "chef", fields(json!({ "username": "bo" })))
            .await
            .unwrap();
        assert_eq!(feed.latest().map(|users| users.len()), Some(2));

        drop(feed);
        assert_eq!(store.listener_count(), 0);
    }
}
