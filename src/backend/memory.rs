//! In-process backend with the same access-control and ordering rules as the
//! hosted one. Used by `--offline` and by tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backend::{Backend, NewAccount, RecipeQuery};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Acl, CuisineType, Difficulty, Principal, Recipe, RecipeDraft, RecipePatch, Reference, User,
};

struct Account {
    user: User,
    password: String,
}

struct StoredRecipe {
    id: String,
    seq: u64,
    created_at: DateTime<Utc>,
    name: String,
    prep_time_minutes: u32,
    ingredients: String,
    instructions: String,
    difficulty: Difficulty,
    cuisine_type_id: String,
    owner_id: String,
    acl: Acl,
}

#[derive(Default)]
struct MemoryState {
    next_seq: u64,
    accounts: Vec<Account>,
    sessions: HashMap<String, String>,
    cuisine_types: Vec<CuisineType>,
    recipes: Vec<StoredRecipe>,
    fail_next: Option<StoreError>,
}

impl MemoryState {
    fn next_id(&mut self, prefix: char) -> (u64, String) {
        self.next_seq += 1;
        (self.next_seq, format!("{}{:09}", prefix, self.next_seq))
    }

    fn user(&self, id: &str) -> Option<&User> {
        self.accounts.iter().map(|a| &a.user).find(|u| u.id == id)
    }

    fn session_user(&self, token: &str) -> StoreResult<User> {
        self.sessions
            .get(token)
            .and_then(|id| self.user(id))
            .cloned()
            .ok_or_else(|| StoreError::unauthenticated("session expired, log in again"))
    }

    fn open_session(&mut self, user: User) -> Principal {
        let (seq, _) = self.next_id('s');
        let token = format!("r:{:016x}", seq);
        self.sessions.insert(token.clone(), user.id.clone());
        Principal::new(user, token)
    }

    /// The recipe `id`, writable by `user`
    fn writable_recipe(&mut self, user: &User, id: &str) -> StoreResult<usize> {
        let index = self
            .recipes
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::not_found("recipe", id))?;
        if !self.recipes[index].acl.can_write(Some(&user.id)) {
            return Err(StoreError::permission_denied(format!(
                "recipe '{}' can only be changed by its owner",
                id
            )));
        }
        Ok(index)
    }

    fn materialize(&self, stored: &StoredRecipe, viewer_id: Option<&str>) -> Recipe {
        let cuisine_type = match self
            .cuisine_types
            .iter()
            .find(|c| c.id == stored.cuisine_type_id)
        {
            Some(c) => Reference::resolved(c.id.clone(), c.clone()),
            None => Reference::unresolved(stored.cuisine_type_id.clone()),
        };
        let owner = match self.user(&stored.owner_id) {
            Some(u) => {
                let mut visible = u.clone();
                // email is private to its owner
                if viewer_id != Some(u.id.as_str()) {
                    visible.email = None;
                }
                Reference::resolved(u.id.clone(), visible)
            }
            None => Reference::unresolved(stored.owner_id.clone()),
        };
        Recipe {
            id: stored.id.clone(),
            name: stored.name.clone(),
            prep_time_minutes: stored.prep_time_minutes,
            ingredients: stored.ingredients.clone(),
            instructions: stored.instructions.clone(),
            difficulty: stored.difficulty,
            cuisine_type,
            owner,
            created_at: stored.created_at,
        }
    }
}

/// Backend kept entirely in memory
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend seeded with a few cuisine types
    pub fn seeded() -> Self {
        let backend = Self::new();
        for (name, color) in [
            ("Italian", "#e74c3c"),
            ("Japanese", "#c0392b"),
            ("Brazilian", "#27ae60"),
            ("Mexican", "#f39c12"),
        ] {
            backend.add_cuisine_type(name, Some(color));
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the injected failure, if one is armed
    fn check_failure(&self) -> StoreResult<()> {
        match self.lock().fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn add_cuisine_type(&self, name: &str, color: Option<&str>) -> CuisineType {
        let mut state = self.lock();
        let (_, id) = state.next_id('c');
        let cuisine = CuisineType {
            id,
            name: name.to_string(),
            color_hint: color
                .unwrap_or(crate::constants::DEFAULT_CUISINE_COLOR)
                .to_string(),
        };
        state.cuisine_types.push(cuisine.clone());
        cuisine
    }

    /// Make the next backend call fail with `error`
    pub fn fail_next(&self, error: StoreError) {
        self.lock().fail_next = Some(error);
    }

    /// Recipes stored, regardless of ACLs
    pub fn recipe_count(&self) -> usize {
        self.lock().recipes.len()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn find_cuisine_types(&self) -> StoreResult<Vec<CuisineType>> {
        self.check_failure()?;
        Ok(self.lock().cuisine_types.clone())
    }

    async fn find_recipes(
        &self,
        query: &RecipeQuery,
        viewer: Option<&Principal>,
    ) -> StoreResult<Vec<Recipe>> {
        self.check_failure()?;
        let state = self.lock();
        let viewer_id = match viewer {
            Some(p) => Some(state.session_user(&p.session_token)?.id),
            None => None,
        };
        let viewer_id = viewer_id.as_deref();

        let mut matching: Vec<&StoredRecipe> = state
            .recipes
            .iter()
            .filter(|r| r.acl.can_read(viewer_id))
            .filter(|r| query.cuisine_type_id.as_ref().map_or(true, |id| &r.cuisine_type_id == id))
            .filter(|r| query.owner_id.as_ref().map_or(true, |id| &r.owner_id == id))
            .collect();
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));

        Ok(matching
            .into_iter()
            .map(|r| state.materialize(r, viewer_id))
            .collect())
    }

    async fn create_recipe(
        &self,
        principal: &Principal,
        draft: &RecipeDraft,
        acl: &Acl,
    ) -> StoreResult<String> {
        self.check_failure()?;
        let mut state = self.lock();
        let user = state.session_user(&principal.session_token)?;
        let (seq, id) = state.next_id('r');
        state.recipes.push(StoredRecipe {
            id: id.clone(),
            seq,
            created_at: Utc::now(),
            name: draft.name.clone(),
            prep_time_minutes: draft.prep_time_minutes,
            ingredients: draft.ingredients.clone(),
            instructions: draft.instructions.clone(),
            difficulty: draft.difficulty,
            cuisine_type_id: draft.cuisine_type_id.clone(),
            owner_id: user.id,
            acl: acl.clone(),
        });
        Ok(id)
    }

    async fn update_recipe(
        &self,
        principal: &Principal,
        id: &str,
        patch: &RecipePatch,
    ) -> StoreResult<()> {
        self.check_failure()?;
        let mut state = self.lock();
        let user = state.session_user(&principal.session_token)?;
        let index = state.writable_recipe(&user, id)?;
        let recipe = &mut state.recipes[index];

        if let Some(name) = &patch.name {
            recipe.name = name.clone();
        }
        if let Some(minutes) = patch.prep_time_minutes {
            recipe.prep_time_minutes = minutes;
        }
        if let Some(ingredients) = &patch.ingredients {
            recipe.ingredients = ingredients.clone();
        }
        if let Some(instructions) = &patch.instructions {
            recipe.instructions = instructions.clone();
        }
        if let Some(difficulty) = patch.difficulty {
            recipe.difficulty = difficulty;
        }
        if let Some(cuisine_type_id) = &patch.cuisine_type_id {
            recipe.cuisine_type_id = cuisine_type_id.clone();
        }
        Ok(())
    }

    async fn delete_recipe(&self, principal: &Principal, id: &str) -> StoreResult<()> {
        self.check_failure()?;
        let mut state = self.lock();
        let user = state.session_user(&principal.session_token)?;
        let index = state.writable_recipe(&user, id)?;
        state.recipes.remove(index);
        Ok(())
    }

    async fn log_in(&self, username: &str, password: &str) -> StoreResult<Principal> {
        self.check_failure()?;
        let mut state = self.lock();
        let user = state
            .accounts
            .iter()
            .find(|a| a.user.username == username && a.password == password)
            .map(|a| a.user.clone())
            .ok_or_else(|| StoreError::unauthenticated("invalid username or password"))?;
        Ok(state.open_session(user))
    }

    async fn sign_up(&self, account: &NewAccount) -> StoreResult<User> {
        self.check_failure()?;
        let mut state = self.lock();
        if state.accounts.iter().any(|a| a.user.username == account.username) {
            return Err(StoreError::validation("username already taken"));
        }
        if state
            .accounts
            .iter()
            .any(|a| a.user.email.as_deref() == Some(account.email.as_str()))
        {
            return Err(StoreError::validation("email already registered"));
        }
        let (_, id) = state.next_id('u');
        let user = User {
            id,
            username: account.username.clone(),
            email: Some(account.email.clone()),
        };
        state.accounts.push(Account {
            user: user.clone(),
            password: account.password.clone(),
        });
        Ok(user)
    }

    async fn current_user(&self, session_token: &str) -> StoreResult<Principal> {
        self.check_failure()?;
        let user = self.lock().session_user(session_token)?;
        Ok(Principal::new(user, session_token))
    }

    async fn log_out(&self, principal: &Principal) -> StoreResult<()> {
        self.check_failure()?;
        self.lock().sessions.remove(&principal.session_token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn account(name: &str) -> NewAccount {
        NewAccount {
            username: name.into(),
            email: format!("{}@example.com", name),
            password: "secret".into(),
        }
    }

    fn draft(name: &str, cuisine: &CuisineType) -> RecipeDraft {
        RecipeDraft {
            name: name.into(),
            prep_time_minutes: 10,
            ingredients: "x".into(),
            instructions: "y".into(),
            difficulty: Difficulty::Easy,
            cuisine_type_id: cuisine.id.clone(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_rejects_duplicates() {
        let backend = MemoryBackend::new();
        backend.sign_up(&account("ana")).await.unwrap();

        let same_name = backend.sign_up(&account("ana")).await.unwrap_err();
        assert_eq!(same_name, StoreError::validation("username already taken"));

        let same_email = NewAccount {
            username: "other".into(),
            ..account("ana")
        };
        assert_eq!(
            backend.sign_up(&same_email).await.unwrap_err(),
            StoreError::validation("email already registered")
        );
    }

    #[tokio::test]
    async fn test_log_in_and_out() {
        let backend = MemoryBackend::new();
        backend.sign_up(&account("ana")).await.unwrap();
        assert_eq!(
            backend.log_in("ana", "wrong").await.unwrap_err().kind(),
            ErrorKind::Unauthenticated
        );

        let principal = backend.log_in("ana", "secret").await.unwrap();
        let restored = backend.current_user(&principal.session_token).await.unwrap();
        assert_eq!(restored, principal);

        backend.log_out(&principal).await.unwrap();
        assert_eq!(
            backend.current_user(&principal.session_token).await.unwrap_err().kind(),
            ErrorKind::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_acl_guards_writes() {
        let backend = MemoryBackend::seeded();
        let italian = backend.find_cuisine_types().await.unwrap().remove(0);
        backend.sign_up(&account("ana")).await.unwrap();
        backend.sign_up(&account("bob")).await.unwrap();
        let ana = backend.log_in("ana", "secret").await.unwrap();
        let bob = backend.log_in("bob", "secret").await.unwrap();

        let id = backend
            .create_recipe(&ana, &draft("Pizza", &italian), &Acl::public_read_owner_write(ana.id()))
            .await
            .unwrap();

        let err = backend.delete_recipe(&bob, &id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(backend.recipe_count(), 1);

        backend.delete_recipe(&ana, &id).await.unwrap();
        let err = backend.delete_recipe(&ana, &id).await.unwrap_err();
        assert_eq!(err, StoreError::not_found("recipe", id));
    }

    #[tokio::test]
    async fn test_owner_email_hidden_from_others() {
        let backend = MemoryBackend::seeded();
        let italian = backend.find_cuisine_types().await.unwrap().remove(0);
        backend.sign_up(&account("ana")).await.unwrap();
        let ana = backend.log_in("ana", "secret").await.unwrap();
        backend
            .create_recipe(&ana, &draft("Pizza", &italian), &Acl::public_read_owner_write(ana.id()))
            .await
            .unwrap();

        let anonymous = backend.find_recipes(&RecipeQuery::all(), None).await.unwrap();
        assert_eq!(anonymous[0].owner.get().unwrap().email, None);
        let own = backend.find_recipes(&RecipeQuery::all(), Some(&ana)).await.unwrap();
        assert_eq!(own[0].owner.get().unwrap().email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let backend = MemoryBackend::seeded();
        backend.fail_next(StoreError::transient("offline"));
        assert!(backend.find_cuisine_types().await.is_err());
        assert_eq!(backend.find_cuisine_types().await.unwrap().len(), 4);
    }
}
