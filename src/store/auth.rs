//! Login, sign-up, logout and session restore

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::backend::{Backend, NewAccount};
use crate::error::{ErrorKind, StoreError, StoreResult};
use crate::models::{Principal, User};
use crate::storage::Storage;
use crate::store::session::SessionStore;

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn required<'a>(field: &str, value: &'a str) -> StoreResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::validation(format!("{} is required", field)));
    }
    Ok(value)
}

/// Authentication flows on top of the [`SessionStore`].
///
/// With a [`Storage`] attached, the session survives restarts. Storage
/// failures are logged and never fail the flow itself.
pub struct AuthService {
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
    storage: Option<Storage>,
}

impl AuthService {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<SessionStore>) -> Self {
        AuthService {
            backend,
            session,
            storage: None,
        }
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn log_in(&self, username: &str, password: &str) -> StoreResult<User> {
        let username = required("username", username)?;
        if password.is_empty() {
            return Err(StoreError::validation("password is required"));
        }

        let principal = self.backend.log_in(username, password).await?;
        let user = principal.user.clone();
        self.persist(&principal);
        self.session.set_principal(principal);
        Ok(user)
    }

    /// Register an account. The new user is not signed in.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> StoreResult<User> {
        let username = required("username", username)?;
        let email = required("email", email)?;
        if password.is_empty() {
            return Err(StoreError::validation("password is required"));
        }
        if !email_regex().is_match(email) {
            return Err(StoreError::validation(format!("'{}' is not a valid email", email)));
        }

        let user = self
            .backend
            .sign_up(&NewAccount {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        tracing::info!(user = %user.username, "Account created");
        Ok(user)
    }

    /// Sign out locally and forget the stored session. Revoking the remote
    /// token is attempted but its failure is only logged.
    pub async fn log_out(&self) -> Option<User> {
        let principal = self.session.clear_principal()?;
        if let Err(e) = self.backend.log_out(&principal).await {
            tracing::warn!(error = %e, "Could not revoke session");
        }
        self.forget();
        Some(principal.user)
    }

    /// Resume the stored session, if it is still valid.
    ///
    /// A rejected token removes the stored session; a transient failure
    /// keeps it for the next run.
    pub async fn restore(&self) -> StoreResult<Option<User>> {
        let Some(storage) = &self.storage else {
            return Ok(None);
        };
        let stored = match storage.load_session() {
            Ok(Some(principal)) => principal,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session file");
                self.forget();
                return Ok(None);
            }
        };

        match self.backend.current_user(&stored.session_token).await {
            Ok(principal) => {
                let user = principal.user.clone();
                tracing::info!(user = %user.username, "Session restored");
                self.persist(&principal);
                self.session.set_principal(principal);
                Ok(Some(user))
            }
            Err(e) if e.kind() == ErrorKind::Unauthenticated => {
                tracing::info!(user = %stored.user.username, "Stored session expired");
                self.forget();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn persist(&self, principal: &Principal) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save_session(principal) {
                tracing::warn!(error = %e, "Could not save session");
            }
        }
    }

    fn forget(&self) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.clear_session() {
                tracing::warn!(error = %e, "Could not remove saved session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use tempfile::TempDir;

    fn service(storage: Option<Storage>) -> (Arc<MemoryBackend>, AuthService) {
        let backend = Arc::new(MemoryBackend::new());
        let mut auth = AuthService::new(backend.clone(), Arc::new(SessionStore::new()));
        if let Some(storage) = storage {
            auth = auth.with_storage(storage);
        }
        (backend, auth)
    }

    #[test]
    fn test_email_format() {
        assert!(email_regex().is_match("ana@example.com"));
        assert!(!email_regex().is_match("ana@example"));
        assert!(!email_regex().is_match("ana example@x.com"));
        assert!(!email_regex().is_match("@example.com"));
    }

    #[tokio::test]
    async fn test_sign_up_does_not_authenticate() {
        let (_, auth) = service(None);
        let user = auth.sign_up("ana", "ana@example.com", "pw").await.unwrap();
        assert_eq!(user.username, "ana");
        assert!(!auth.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_up_validates_input() {
        let (_, auth) = service(None);
        let err = auth.sign_up("ana", "not-an-email", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = auth.sign_up(" ", "ana@example.com", "pw").await.unwrap_err();
        assert_eq!(err, StoreError::validation("username is required"));
        let err = auth.sign_up("ana", "ana@example.com", "").await.unwrap_err();
        assert_eq!(err, StoreError::validation("password is required"));

        auth.sign_up("ana", "ana@example.com", "pw").await.unwrap();
        let err = auth.sign_up("ana", "other@example.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_log_in_sets_principal_and_persists() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::at(dir.path());
        let (_, auth) = service(Some(storage.clone()));
        auth.sign_up("ana", "ana@example.com", "pw").await.unwrap();

        let err = auth.log_in("ana", "wrong").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        assert!(!auth.session().is_authenticated());

        let user = auth.log_in("ana", "pw").await.unwrap();
        assert_eq!(auth.session().current_user(), Some(user.clone()));
        let saved = storage.load_session().unwrap().unwrap();
        assert_eq!(saved.user, user);
    }

    #[tokio::test]
    async fn test_log_out_revokes_and_forgets() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::at(dir.path());
        let (backend, auth) = service(Some(storage.clone()));
        auth.sign_up("ana", "ana@example.com", "pw").await.unwrap();
        auth.log_in("ana", "pw").await.unwrap();
        let token = auth.session().principal().unwrap().session_token;

        assert_eq!(auth.log_out().await.unwrap().username, "ana");
        assert!(!auth.session().is_authenticated());
        assert!(storage.load_session().unwrap().is_none());
        let err = backend.current_user(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        assert!(auth.log_out().await.is_none());
    }

    #[tokio::test]
    async fn test_log_out_succeeds_when_revoke_fails() {
        let (backend, auth) = service(None);
        auth.sign_up("ana", "ana@example.com", "pw").await.unwrap();
        auth.log_in("ana", "pw").await.unwrap();

        backend.fail_next(StoreError::transient("offline"));
        assert!(auth.log_out().await.is_some());
        assert!(!auth.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_resumes_valid_session() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::at(dir.path());
        let backend = Arc::new(MemoryBackend::new());

        let first = AuthService::new(backend.clone(), Arc::new(SessionStore::new()))
            .with_storage(storage.clone());
        first.sign_up("ana", "ana@example.com", "pw").await.unwrap();
        first.log_in("ana", "pw").await.unwrap();

        let second = AuthService::new(backend, Arc::new(SessionStore::new()))
            .with_storage(storage);
        let user = second.restore().await.unwrap().unwrap();
        assert_eq!(user.username, "ana");
        assert!(second.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_with_invalid_token_clears_storage() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::at(dir.path());
        storage
            .save_session(&Principal::new(
                User {
                    id: "u1".into(),
                    username: "ghost".into(),
                    email: None,
                },
                "r:revoked",
            ))
            .unwrap();

        let (_, auth) = service(Some(storage.clone()));
        assert_eq!(auth.restore().await.unwrap(), None);
        assert!(!auth.session().is_authenticated());
        assert!(storage.load_session().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_keeps_session_on_transient_failure() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::at(dir.path());
        let (backend, auth) = service(Some(storage.clone()));
        auth.sign_up("ana", "ana@example.com", "pw").await.unwrap();
        auth.log_in("ana", "pw").await.unwrap();
        auth.session().clear_principal();

        backend.fail_next(StoreError::transient("offline"));
        assert!(auth.restore().await.unwrap_err().is_retryable());
        assert!(storage.load_session().unwrap().is_some());
    }
}
