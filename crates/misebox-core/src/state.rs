//! Shared cross-platform state types.
//!
//! State holders publish through [`Observable`]; the rendering layer keeps a
//! receiver, waits for `changed()` and re-reads the value to redraw.

use tokio::sync::watch;

/// Authentication state of the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated {
        anonymous: bool,
    },
}

impl AuthState {
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub const fn is_anonymous(self) -> bool {
        matches!(self, Self::Authenticated { anonymous: true })
    }
}

/// A value with a subscribe/notify contract.
///
/// Every mutation notifies subscribers, even when nobody is currently
/// listening.
#[derive(Debug)]
pub struct Observable<T> {
    sender: watch::Sender<T>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        let (sender, _receiver) = watch::channel(value);
        Self { sender }
    }

    /// Register a new subscriber; the receiver sees the current value as seen.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Mutate in place and notify subscribers.
    pub fn modify(&self, update: impl FnOnce(&mut T)) {
        self.sender.send_modify(update);
    }

    /// Mutate in place, notifying only when `update` reports a change.
    pub fn modify_if(&self, update: impl FnOnce(&mut T) -> bool) -> bool {
        self.sender.send_if_modified(update)
    }

    /// Read the current value without cloning it.
    pub fn with<U>(&self, read: impl FnOnce(&T) -> U) -> U {
        read(&self.sender.borrow())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Observable<T> {
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
