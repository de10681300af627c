//! Session store - holds the signed-in principal, if any

use tokio::sync::watch;

use crate::models::{Principal, User};

/// Holds at most one authenticated principal for the life of the process.
///
/// Setting or clearing the principal notifies every subscriber. Clearing does
/// not revoke the remote session; see [`crate::store::AuthService::log_out`].
pub struct SessionStore {
    principal: watch::Sender<Option<Principal>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (principal, _) = watch::channel(None);
        SessionStore { principal }
    }

    /// Replace the held principal. No validation.
    pub fn set_principal(&self, principal: Principal) {
        tracing::info!(user = %principal.user.username, "Principal set");
        self.principal.send_replace(Some(principal));
    }

    /// Drop the held principal, returning it
    pub fn clear_principal(&self) -> Option<Principal> {
        let previous = self.principal.send_replace(None);
        if let Some(p) = &previous {
            tracing::info!(user = %p.user.username, "Principal cleared");
        }
        previous
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.principal.borrow().as_ref().map(|p| p.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.principal.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(name: &str) -> Principal {
        Principal::new(
            User {
                id: format!("id-{}", name),
                username: name.into(),
                email: None,
            },
            format!("r:{}", name),
        )
    }

    #[test]
    fn test_set_replaces_and_clear_drops() {
        let store = SessionStore::new();
        assert!(!store.is_authenticated());

        store.set_principal(principal("ana"));
        store.set_principal(principal("bob"));
        assert_eq!(store.current_user().unwrap().username, "bob");

        let cleared = store.clear_principal();
        assert_eq!(cleared, Some(principal("bob")));
        assert!(store.principal().is_none());
        assert_eq!(store.clear_principal(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.set_principal(principal("ana"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().user.username, "ana");

        store.clear_principal();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
