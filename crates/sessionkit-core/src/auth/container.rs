//! The auth state container.
//!
//! `AuthContainer` owns the in-memory `AuthState` and is the only thing that
//! changes it. Every transition runs under a single transition lock, so
//! concurrent callers are applied one after another in lock order and a
//! read-modify-write such as `update_photo` never interleaves with a login
//! or logout.
//!
//! Failures never escape as `Err`: each transition settles the state first
//! and then reports what happened through a [`Transition`].

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::{AuthError, AuthState, Credentials, UserSession, SESSION_KEY};
use crate::api::AuthGateway;
use crate::config::SoftFailurePolicy;
use crate::notify::Notifier;
use crate::store::{SessionStore, StoreError};

/// Published when the gateway rejects a login without saying why.
const DEFAULT_LOGIN_FAILURE_MESSAGE: &str = "Login failed";

/// Outcome of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Transition {
    rejection: Option<AuthError>,
    storage_warning: Option<String>,
}

impl Transition {
    fn fulfilled() -> Self {
        Self {
            rejection: None,
            storage_warning: None,
        }
    }

    fn rejected(error: AuthError) -> Self {
        Self {
            rejection: Some(error),
            storage_warning: None,
        }
    }

    fn with_storage_warning(mut self, warning: String) -> Self {
        self.storage_warning = Some(warning);
        self
    }

    pub fn is_fulfilled(&self) -> bool {
        self.rejection.is_none()
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }

    pub fn rejection(&self) -> Option<&AuthError> {
        self.rejection.as_ref()
    }

    /// A storage failure that did not change the outcome, e.g. the session
    /// could not be persisted after an otherwise successful login.
    pub fn storage_warning(&self) -> Option<&str> {
        self.storage_warning.as_deref()
    }
}

struct Shared {
    store: Box<dyn SessionStore>,
    gateway: Box<dyn AuthGateway>,
    notifier: Box<dyn Notifier>,
    transition_lock: Mutex<()>,
    state: watch::Sender<AuthState>,
}

/// Shared handle to the auth state. Clone is cheap; clones see the same state.
#[derive(Clone)]
pub struct AuthContainer {
    shared: Arc<Shared>,
    policy: SoftFailurePolicy,
}

impl AuthContainer {
    /// Start logged out with the given collaborators
    pub fn new(
        store: impl SessionStore + 'static,
        gateway: impl AuthGateway + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::logged_out());
        Self {
            shared: Arc::new(Shared {
                store: Box::new(store),
                gateway: Box::new(gateway),
                notifier: Box::new(notifier),
                transition_lock: Mutex::new(()),
                state,
            }),
            policy: SoftFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SoftFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AuthState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that sees every state a transition applies
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.shared.state.subscribe()
    }

    /// Load the persisted session, if any. Run once at app start.
    ///
    /// A missing or unparseable record leaves the user logged out and is
    /// rejected with [`AuthError::NotFound`].
    pub async fn restore_session(&self) -> Transition {
        let _guard = self.shared.transition_lock.lock().await;

        match self.read_session().await {
            Ok(Some(user)) => {
                info!(user_id = %user.id, "Session restored");
                self.apply(AuthState::logged_in(user));
                Transition::fulfilled()
            }
            Ok(None) => {
                debug!("No session to restore");
                self.apply(AuthState::logged_out());
                Transition::rejected(AuthError::NotFound)
            }
            Err(e) => {
                warn!(error = %e, "Failed to read session store");
                self.apply(AuthState::logged_out());
                Transition::rejected(AuthError::Storage(e.to_string()))
            }
        }
    }

    /// Authenticate against the gateway.
    ///
    /// On rejection the gateway's message is published exactly once and the
    /// state is forced to logged out. On success the user is persisted when
    /// `credentials.keep` is set; a failed write only shows up as a
    /// storage warning.
    pub async fn login(&self, credentials: Credentials) -> Transition {
        let _guard = self.shared.transition_lock.lock().await;

        if let Err(message) = credentials.validate() {
            debug!(%message, "Login form rejected");
            self.shared.notifier.publish(&message);
            self.apply(AuthState::logged_out());
            return Transition::rejected(AuthError::InvalidCredentials(message));
        }

        let username = credentials.username.trim();
        let response = self
            .shared
            .gateway
            .login(username, &credentials.password)
            .await;

        let Some(user) = response.data else {
            let message = response
                .message
                .unwrap_or_else(|| DEFAULT_LOGIN_FAILURE_MESSAGE.to_string());
            info!(username, %message, "Login rejected");
            self.shared.notifier.publish(&message);
            self.apply(AuthState::logged_out());
            return Transition::rejected(AuthError::Unauthorized(message));
        };

        let mut outcome = Transition::fulfilled();
        if credentials.keep {
            if let Err(e) = self.write_session(&user).await {
                warn!(error = %e, "Failed to persist session after login");
                outcome = outcome.with_storage_warning(self.soft_failure("Could not save session", &e));
            }
        }

        info!(username, user_id = %user.id, persisted = credentials.keep, "Login successful");
        self.apply(AuthState::logged_in(user));
        outcome
    }

    /// Forget the session in memory and in the store.
    /// Always ends logged out; a failed removal is only a storage warning.
    pub async fn logout(&self) -> Transition {
        let _guard = self.shared.transition_lock.lock().await;

        let mut outcome = Transition::fulfilled();
        if let Err(e) = self.shared.store.remove(SESSION_KEY).await {
            warn!(error = %e, "Failed to remove stored session");
            outcome = outcome.with_storage_warning(self.soft_failure("Could not clear saved session", &e));
        }

        info!("Logged out");
        self.apply(AuthState::logged_out());
        outcome
    }

    /// Replace the profile image of the stored session. Other fields are
    /// untouched.
    ///
    /// The in-memory user follows only when it is the same user as the
    /// stored one; a logged-out state stays logged out and a different
    /// logged-in user is not swapped out.
    ///
    /// Without a stored session this is rejected with
    /// [`AuthError::NotFound`]; any read, parse or write failure is rejected
    /// with [`AuthError::Storage`]. State is left as it was in both cases.
    pub async fn update_photo(&self, image: impl Into<String>) -> Transition {
        let _guard = self.shared.transition_lock.lock().await;

        let raw = match self.shared.store.get(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored session, photo not updated");
                return Transition::rejected(AuthError::NotFound);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read session for photo update");
                let message = self.soft_failure("Could not update photo", &e);
                return Transition::rejected(AuthError::Storage(message));
            }
        };

        let mut user = match UserSession::from_json(&raw) {
            Ok(user) => user,
            Err(e) => {
                let e = StoreError::from(e);
                warn!(error = %e, "Stored session is not valid, photo not updated");
                let message = self.soft_failure("Could not update photo", &e);
                return Transition::rejected(AuthError::Storage(message));
            }
        };

        user.image = image.into();
        if let Err(e) = self.write_session(&user).await {
            warn!(error = %e, "Failed to write updated session");
            let message = self.soft_failure("Could not update photo", &e);
            return Transition::rejected(AuthError::Storage(message));
        }

        let same_user = self
            .shared
            .state
            .borrow()
            .user()
            .is_some_and(|current| current.id == user.id);
        debug!(user_id = %user.id, in_memory = same_user, "Profile photo updated");
        if same_user {
            self.apply(AuthState::logged_in(user));
        }
        Transition::fulfilled()
    }

    async fn read_session(&self) -> Result<Option<UserSession>, StoreError> {
        let raw = match self.shared.store.get(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            // The backend could not decode what it holds; same as no record
            Err(StoreError::Serialization(e)) => {
                debug!(error = %e, "Stored record unreadable, treating as absent");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        match UserSession::from_json(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                debug!(error = %e, "Stored session unreadable, treating as absent");
                Ok(None)
            }
        }
    }

    async fn write_session(&self, user: &UserSession) -> Result<(), StoreError> {
        let json = user.to_json()?;
        self.shared.store.set(SESSION_KEY, &json).await
    }

    /// Format a storage failure and surface it if the policy asks for it
    fn soft_failure(&self, context: &str, error: &StoreError) -> String {
        let message = format!("{}: {}", context, error);
        if self.policy == SoftFailurePolicy::Notify {
            self.shared.notifier.publish(&message);
        }
        message
    }

    fn apply(&self, state: AuthState) {
        self.shared.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockGateway;
    use crate::notify::ChannelNotifier;
    use crate::store::{FileStore, MemoryStore, SealedStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn ada() -> UserSession {
        UserSession::new("42", "Ada Lovelace", "img://ada/original").with_token("ada-token")
    }

    fn grace() -> UserSession {
        UserSession::new("7", "Grace Hopper", "img://grace/original")
    }

    fn gateway() -> Arc<MockGateway> {
        Arc::new(
            MockGateway::new()
                .with_user("a", "good", ada())
                .with_user("g", "good", grace()),
        )
    }

    struct Harness {
        auth: AuthContainer,
        store: Arc<MemoryStore>,
        gateway: Arc<MockGateway>,
        notifications: UnboundedReceiver<String>,
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryStore::new()))
    }

    fn harness_with(store: Arc<MemoryStore>) -> Harness {
        let gateway = gateway();
        let (notifier, notifications) = ChannelNotifier::new();
        let auth = AuthContainer::new(Arc::clone(&store), Arc::clone(&gateway), notifier);
        Harness {
            auth,
            store,
            gateway,
            notifications,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn assert_invariant(state: &AuthState) {
        assert_eq!(state.is_logged_in(), state.user().is_some());
    }

    /// Store whose operations can be made to fail on demand
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_get: AtomicBool,
        fail_set: AtomicBool,
        fail_remove: AtomicBool,
    }

    fn broken(key: &str) -> StoreError {
        StoreError::io(key, std::io::Error::other("disk on fire"))
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(broken(key));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.fail_set.load(Ordering::SeqCst) {
                return Err(broken(key));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err(broken(key));
            }
            self.inner.remove(key).await
        }
    }

    // -------------------------------------------------------------------------
    // restore_session
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_restore_with_empty_store() {
        let h = harness();
        let outcome = h.auth.restore_session().await;

        assert_eq!(outcome.rejection(), Some(&AuthError::NotFound));
        assert_eq!(h.auth.state(), AuthState::logged_out());
    }

    #[tokio::test]
    async fn test_restore_with_corrupt_record_is_like_no_record() {
        let h = harness();
        h.store.set(SESSION_KEY, "{ definitely not json").await.unwrap();

        let outcome = h.auth.restore_session().await;
        assert_eq!(outcome.rejection(), Some(&AuthError::NotFound));
        assert_eq!(h.auth.state(), AuthState::logged_out());
    }

    #[tokio::test]
    async fn test_restore_with_corrupt_session_file_is_like_no_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("auth.json"), "{ truncated").unwrap();
        let (notifier, _rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(FileStore::new(dir.path().to_path_buf()), gateway(), notifier);

        let outcome = auth.restore_session().await;
        assert_eq!(outcome.rejection(), Some(&AuthError::NotFound));
        assert_eq!(auth.state(), AuthState::logged_out());
    }

    #[tokio::test]
    async fn test_restore_read_failure_stays_logged_out() {
        let store = Arc::new(FlakyStore::default());
        store.fail_get.store(true, Ordering::SeqCst);
        let (notifier, mut rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(Arc::clone(&store), gateway(), notifier);

        let outcome = auth.restore_session().await;
        assert!(matches!(outcome.rejection(), Some(AuthError::Storage(_))));
        assert_eq!(auth.state(), AuthState::logged_out());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_restore_over_sealed_store_with_wrong_key() {
        let disk = Arc::new(MemoryStore::new());
        let writer = SealedStore::new(Arc::clone(&disk), &[1u8; 32]);
        writer.set(SESSION_KEY, &ada().to_json().unwrap()).await.unwrap();

        let reader = SealedStore::new(Arc::clone(&disk), &[2u8; 32]);
        let (notifier, _rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(reader, gateway(), notifier);

        let outcome = auth.restore_session().await;
        assert!(outcome.is_rejected());
        assert_eq!(auth.state(), AuthState::logged_out());
    }

    // -------------------------------------------------------------------------
    // login
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_rejected_publishes_once() {
        let mut h = harness();
        let outcome = h.auth.login(Credentials::new("a", "bad")).await;

        assert_eq!(
            outcome.rejection(),
            Some(&AuthError::Unauthorized("Invalid username or password".to_string()))
        );
        assert_eq!(h.auth.state(), AuthState::logged_out());
        assert_eq!(drain(&mut h.notifications), vec!["Invalid username or password"]);
    }

    #[tokio::test]
    async fn test_login_rejected_after_login_forces_logout() {
        let mut h = harness();
        let _ = h.auth.login(Credentials::new("a", "good")).await;
        assert!(h.auth.state().is_logged_in());

        let _ = h.auth.login(Credentials::new("a", "bad")).await;
        assert_eq!(h.auth.state(), AuthState::logged_out());
        assert_eq!(drain(&mut h.notifications).len(), 1);
    }

    #[tokio::test]
    async fn test_login_without_keep_does_not_persist() {
        let mut h = harness();
        let outcome = h.auth.login(Credentials::new("a", "good")).await;

        assert!(outcome.is_fulfilled());
        assert_eq!(h.auth.state(), AuthState::logged_in(ada()));
        assert!(!h.store.contains(SESSION_KEY).await);
        assert!(drain(&mut h.notifications).is_empty());
    }

    #[tokio::test]
    async fn test_login_keep_then_restart_restores_same_user() {
        let h = harness();
        let outcome = h.auth.login(Credentials::new("a", "good").keep(true)).await;
        assert!(outcome.is_fulfilled());
        assert!(h.store.contains(SESSION_KEY).await);

        // New container over the same store simulates an app restart
        let restarted = harness_with(Arc::clone(&h.store));
        assert_eq!(restarted.auth.state(), AuthState::logged_out());

        let outcome = restarted.auth.restore_session().await;
        assert!(outcome.is_fulfilled());
        assert_eq!(restarted.auth.state().user(), Some(&ada()));
    }

    #[tokio::test]
    async fn test_login_invalid_form_never_reaches_gateway() {
        let mut h = harness();
        let outcome = h.auth.login(Credentials::new("", "")).await;

        assert_eq!(
            outcome.rejection(),
            Some(&AuthError::InvalidCredentials("Username and password required".to_string()))
        );
        assert_eq!(h.gateway.calls(), 0);
        assert_eq!(drain(&mut h.notifications), vec!["Username and password required"]);
    }

    #[tokio::test]
    async fn test_login_trims_username() {
        let h = harness();
        let outcome = h.auth.login(Credentials::new("  a ", "good")).await;
        assert!(outcome.is_fulfilled());
    }

    #[tokio::test]
    async fn test_login_persist_failure_is_swallowed() {
        let store = Arc::new(FlakyStore::default());
        store.fail_set.store(true, Ordering::SeqCst);
        let (notifier, mut rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(Arc::clone(&store), gateway(), notifier);

        let outcome = auth.login(Credentials::new("a", "good").keep(true)).await;
        assert!(outcome.is_fulfilled());
        assert!(outcome.storage_warning().is_some());
        assert_eq!(auth.state(), AuthState::logged_in(ada()));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_login_persist_failure_notified_under_notify_policy() {
        let store = Arc::new(FlakyStore::default());
        store.fail_set.store(true, Ordering::SeqCst);
        let (notifier, mut rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(Arc::clone(&store), gateway(), notifier)
            .with_policy(SoftFailurePolicy::Notify);

        let outcome = auth.login(Credentials::new("a", "good").keep(true)).await;
        assert!(outcome.is_fulfilled());
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Could not save session"));
    }

    // -------------------------------------------------------------------------
    // logout
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_logout_clears_state_and_store() {
        let h = harness();
        let _ = h.auth.login(Credentials::new("a", "good").keep(true)).await;

        let outcome = h.auth.logout().await;
        assert!(outcome.is_fulfilled());
        assert_eq!(h.auth.state(), AuthState::logged_out());
        assert!(!h.store.contains(SESSION_KEY).await);
    }

    #[tokio::test]
    async fn test_logout_remove_failure_still_logs_out() {
        let store = Arc::new(FlakyStore::default());
        let (notifier, mut rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(Arc::clone(&store), gateway(), notifier);
        let _ = auth.login(Credentials::new("a", "good").keep(true)).await;

        store.fail_remove.store(true, Ordering::SeqCst);
        let outcome = auth.logout().await;

        assert!(outcome.is_fulfilled());
        assert!(outcome.storage_warning().is_some());
        assert_eq!(auth.state(), AuthState::logged_out());
        assert!(drain(&mut rx).is_empty());
    }

    // -------------------------------------------------------------------------
    // update_photo
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_photo_without_session_is_noop() {
        let h = harness();
        let outcome = h.auth.update_photo("img://new").await;

        assert_eq!(outcome.rejection(), Some(&AuthError::NotFound));
        assert_eq!(h.auth.state(), AuthState::logged_out());
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_photo_changes_only_image() {
        let h = harness();
        let _ = h.auth.login(Credentials::new("a", "good").keep(true)).await;

        let outcome = h.auth.update_photo("img://ada/new").await;
        assert!(outcome.is_fulfilled());

        let expected = UserSession {
            image: "img://ada/new".to_string(),
            ..ada()
        };
        assert_eq!(h.auth.state().user(), Some(&expected));

        let stored = h.store.get(SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(UserSession::from_json(&stored).unwrap(), expected);

        // Repeating the same update changes nothing
        let _ = h.auth.update_photo("img://ada/new").await;
        assert_eq!(h.auth.state().user(), Some(&expected));
        let stored_again = h.store.get(SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(UserSession::from_json(&stored_again).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_update_photo_after_rejected_login_stays_logged_out() {
        let h = harness();
        let _ = h.auth.login(Credentials::new("a", "good").keep(true)).await;
        let _ = h.auth.login(Credentials::new("a", "bad")).await;
        assert_eq!(h.auth.state(), AuthState::logged_out());

        let outcome = h.auth.update_photo("img://ada/new").await;
        assert!(outcome.is_fulfilled());
        assert_eq!(h.auth.state(), AuthState::logged_out());

        // The kept record still picks up the new photo
        let stored = h.store.get(SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(UserSession::from_json(&stored).unwrap().image, "img://ada/new");
    }

    #[tokio::test]
    async fn test_update_photo_after_failed_logout_removal_stays_logged_out() {
        let store = Arc::new(FlakyStore::default());
        let (notifier, _rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(Arc::clone(&store), gateway(), notifier);
        let _ = auth.login(Credentials::new("a", "good").keep(true)).await;

        store.fail_remove.store(true, Ordering::SeqCst);
        let _ = auth.logout().await;
        assert!(store.get(SESSION_KEY).await.unwrap().is_some());

        let _ = auth.update_photo("img://ada/new").await;
        assert_eq!(auth.state(), AuthState::logged_out());
    }

    #[tokio::test]
    async fn test_update_photo_does_not_switch_to_stored_user() {
        let h = harness();
        let _ = h.auth.login(Credentials::new("a", "good").keep(true)).await;
        let _ = h.auth.login(Credentials::new("g", "good")).await;
        assert_eq!(h.auth.state(), AuthState::logged_in(grace()));

        let outcome = h.auth.update_photo("img://ada/new").await;
        assert!(outcome.is_fulfilled());
        assert_eq!(h.auth.state(), AuthState::logged_in(grace()));

        let stored = h.store.get(SESSION_KEY).await.unwrap().unwrap();
        let stored = UserSession::from_json(&stored).unwrap();
        assert_eq!(stored.id, "42");
        assert_eq!(stored.image, "img://ada/new");
    }

    #[tokio::test]
    async fn test_update_photo_with_corrupt_record_keeps_state() {
        let h = harness();
        let _ = h.auth.login(Credentials::new("a", "good")).await;
        h.store.set(SESSION_KEY, "garbage").await.unwrap();

        let outcome = h.auth.update_photo("img://new").await;
        assert!(matches!(outcome.rejection(), Some(AuthError::Storage(_))));
        assert_eq!(h.auth.state(), AuthState::logged_in(ada()));
    }

    #[tokio::test]
    async fn test_update_photo_write_failure_keeps_state() {
        let store = Arc::new(FlakyStore::default());
        let (notifier, mut rx) = ChannelNotifier::new();
        let auth = AuthContainer::new(Arc::clone(&store), gateway(), notifier)
            .with_policy(SoftFailurePolicy::Notify);
        let _ = auth.login(Credentials::new("a", "good").keep(true)).await;

        store.fail_set.store(true, Ordering::SeqCst);
        let outcome = auth.update_photo("img://new").await;

        assert!(matches!(outcome.rejection(), Some(AuthError::Storage(_))));
        assert_eq!(auth.state(), AuthState::logged_in(ada()));
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Could not update photo"));
    }

    // -------------------------------------------------------------------------
    // Concurrency and observation
    // -------------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_keep_invariant() {
        let h = harness();
        let mut tasks = Vec::new();
        for i in 0..32 {
            let auth = h.auth.clone();
            tasks.push(tokio::spawn(async move {
                match i % 4 {
                    0 => auth.login(Credentials::new("a", "good").keep(true)).await,
                    1 => auth.logout().await,
                    2 => auth.update_photo(format!("img://{}", i)).await,
                    _ => auth.restore_session().await,
                }
            }));
        }
        for task in tasks {
            let _ = task.await.unwrap();
            assert_invariant(&h.auth.state());
        }

        // Store and memory agree once everything has settled
        let restored = h.store.get(SESSION_KEY).await.unwrap();
        let _ = h.auth.restore_session().await;
        assert_eq!(
            h.auth.state().user().cloned(),
            restored.map(|raw| UserSession::from_json(&raw).unwrap())
        );
    }

    #[tokio::test]
    async fn test_login_and_logout_race_resolves_to_one_of_them() {
        let h = harness();
        let (a, b) = tokio::join!(
            h.auth.login(Credentials::new("a", "good").keep(true)),
            h.auth.logout()
        );
        assert!(a.is_fulfilled() && b.is_fulfilled());

        let state = h.auth.state();
        assert_invariant(&state);
        // Whichever ran last decides both memory and store
        assert_eq!(state.is_logged_in(), h.store.contains(SESSION_KEY).await);
    }

    #[tokio::test]
    async fn test_subscribers_see_applied_states() {
        let h = harness();
        let mut rx = h.auth.subscribe();
        assert!(!rx.borrow_and_update().is_logged_in());

        let _ = h.auth.login(Credentials::new("a", "good")).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().user(), Some(&ada()));

        let _ = h.auth.logout().await;
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_logged_in());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let h = harness();
        let other = h.auth.clone();
        let _ = other.login(Credentials::new("a", "good")).await;
        assert!(h.auth.state().is_logged_in());
    }
}
