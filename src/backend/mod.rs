//! Backend layer - the hosted object API the stores talk to
//!
//! [`Backend`] is the capability set the stores need: class queries, object
//! create/update/delete, user sessions and per-object ACLs. [`ParseBackend`]
//! speaks the Parse REST API; [`MemoryBackend`] keeps everything in process
//! with the same access-control and ordering rules.

pub mod client;
pub mod memory;
pub mod wire;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Acl, CuisineType, Principal, Recipe, RecipeDraft, RecipePatch, User};

pub use client::ParseBackend;
pub use memory::MemoryBackend;

/// Recipe query. Results always include the cuisine type and owner and are
/// ordered newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipeQuery {
    /// Exact match on the cuisine-type reference
    pub cuisine_type_id: Option<String>,
    /// Exact match on the owner reference
    pub owner_id: Option<String>,
}

impl RecipeQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_cuisine_type(cuisine_type_id: Option<&str>) -> Self {
        RecipeQuery {
            cuisine_type_id: cuisine_type_id.map(str::to_string),
            owner_id: None,
        }
    }

    pub fn by_owner(owner_id: &str) -> Self {
        RecipeQuery {
            cuisine_type_id: None,
            owner_id: Some(owner_id.to_string()),
        }
    }
}

/// Sign-up input
#[derive(Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Remote object store with authentication and access control.
///
/// Implementations classify every failure into a [`crate::StoreError`]; an
/// ACL rejection must come back as `PermissionDenied`, never as `NotFound`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn find_cuisine_types(&self) -> StoreResult<Vec<CuisineType>>;

    /// Recipes readable by `viewer` (anonymous when `None`)
    async fn find_recipes(
        &self,
        query: &RecipeQuery,
        viewer: Option<&Principal>,
    ) -> StoreResult<Vec<Recipe>>;

    /// Create a recipe owned by `principal`; returns the new id
    async fn create_recipe(
        &self,
        principal: &Principal,
        draft: &RecipeDraft,
        acl: &Acl,
    ) -> StoreResult<String>;

    /// Write the fields present in `patch` to the recipe `id`
    async fn update_recipe(
        &self,
        principal: &Principal,
        id: &str,
        patch: &RecipePatch,
    ) -> StoreResult<()>;

    async fn delete_recipe(&self, principal: &Principal, id: &str) -> StoreResult<()>;

    async fn log_in(&self, username: &str, password: &str) -> StoreResult<Principal>;

    /// Register an account. Does not sign in.
    async fn sign_up(&self, account: &NewAccount) -> StoreResult<User>;

    /// Resolve a stored session token to its principal
    async fn current_user(&self, session_token: &str) -> StoreResult<Principal>;

    /// Revoke the principal's session token
    async fn log_out(&self, principal: &Principal) -> StoreResult<()>;
}
