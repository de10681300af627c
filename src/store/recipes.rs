//! Recipe data store - in-memory view of recipes and cuisine types
//!
//! Each operation runs against the backend and then updates the in-memory
//! collections. Operations may overlap; every collection carries a request
//! ticket and a response only lands if its ticket is still the newest one
//! issued for that collection.

use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::{Backend, RecipeQuery};
use crate::error::{StoreError, StoreResult};
use crate::models::{Acl, CuisineType, Principal, Recipe, RecipeDraft, RecipePatch};
use crate::store::session::SessionStore;

/// Store operations, as reported in logs and error messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListCuisineTypes,
    ListRecipes,
    ListOwnRecipes,
    CreateRecipe,
    UpdateRecipe,
    DeleteRecipe,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListCuisineTypes => "list_cuisine_types",
            Operation::ListRecipes => "list_recipes",
            Operation::ListOwnRecipes => "list_own_recipes",
            Operation::CreateRecipe => "create_recipe",
            Operation::UpdateRecipe => "update_recipe",
            Operation::DeleteRecipe => "delete_recipe",
        }
    }

    /// Prefix of the user-facing error message
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::ListCuisineTypes => "Failed to load cuisine types",
            Operation::ListRecipes => "Failed to load recipes",
            Operation::ListOwnRecipes => "Failed to load your recipes",
            Operation::CreateRecipe => "Failed to create recipe",
            Operation::UpdateRecipe => "Failed to update recipe",
            Operation::DeleteRecipe => "Failed to delete recipe",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Collection {
    CuisineTypes,
    Recipes,
    OwnRecipes,
}

/// Latest ticket issued per collection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Tickets {
    cuisine_types: u64,
    recipes: u64,
    own_recipes: u64,
}

impl Tickets {
    fn slot(&mut self, collection: Collection) -> &mut u64 {
        match collection {
            Collection::CuisineTypes => &mut self.cuisine_types,
            Collection::Recipes => &mut self.recipes,
            Collection::OwnRecipes => &mut self.own_recipes,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Ticket {
    collection: Collection,
    seq: u64,
}

/// A deleted record that responses issued up to `seq` may still carry
#[derive(Clone, Debug, PartialEq, Eq)]
struct Tombstone {
    collection: Collection,
    id: String,
    seq: u64,
}

/// Everything a view needs to render
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipeState {
    /// Result of the last `list_recipes`
    pub recipes: Vec<Recipe>,
    /// Recipes owned by the current principal
    pub own_recipes: Vec<Recipe>,
    pub cuisine_types: Vec<CuisineType>,
    /// Cuisine filter of the last applied `list_recipes`
    pub active_filter: Option<String>,
    /// Operations currently running
    pub in_flight: usize,
    /// Message of the last failure, cleared when an operation starts
    pub error: Option<String>,
    tickets: Tickets,
    tombstones: Vec<Tombstone>,
}

impl RecipeState {
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn find_recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes
            .iter()
            .chain(self.own_recipes.iter())
            .find(|r| r.id == id)
    }

    pub fn cuisine_type(&self, id: &str) -> Option<&CuisineType> {
        self.cuisine_types.iter().find(|c| c.id == id)
    }

    /// Drop records deleted after `ticket` was issued. Tombstones at or
    /// below `ticket` are spent once it lands: older tickets never apply.
    fn settle(&mut self, ticket: Ticket, recipes: &mut Vec<Recipe>) {
        let deleted: Vec<&str> = self
            .tombstones
            .iter()
            .filter(|t| t.collection == ticket.collection && t.seq >= ticket.seq)
            .map(|t| t.id.as_str())
            .collect();
        if !deleted.is_empty() {
            recipes.retain(|r| !deleted.contains(&r.id.as_str()));
        }
        self.tombstones
            .retain(|t| t.collection != ticket.collection || t.seq > ticket.seq);
    }

    /// Case-insensitive lookup by name
    pub fn cuisine_type_named(&self, name: &str) -> Option<&CuisineType> {
        let name = name.trim();
        self.cuisine_types
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Marks an operation in flight until dropped, whatever path it leaves by
struct InFlight<'a> {
    state: &'a watch::Sender<RecipeState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.in_flight = s.in_flight.saturating_sub(1));
    }
}

/// Single source of truth for recipe and cuisine-type data.
///
/// Share it as `Arc<RecipeStore>`; watch it with [`RecipeStore::subscribe`].
pub struct RecipeStore {
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
    state: watch::Sender<RecipeState>,
}

impl RecipeStore {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<SessionStore>) -> Self {
        let (state, _) = watch::channel(RecipeState::default());
        RecipeStore {
            backend,
            session,
            state,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn snapshot(&self) -> RecipeState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecipeState> {
        self.state.subscribe()
    }

    /// Local lookup in the loaded collections
    pub fn find_recipe(&self, id: &str) -> Option<Recipe> {
        self.state.borrow().find_recipe(id).cloned()
    }

    // ========================
    // Bookkeeping
    // ========================

    fn begin(&self, op: Operation) -> InFlight<'_> {
        tracing::info!(operation = op.as_str(), "Operation started");
        self.state.send_modify(|s| {
            s.in_flight += 1;
            s.error = None;
        });
        InFlight { state: &self.state }
    }

    fn issue(&self, collection: Collection) -> Ticket {
        let mut seq = 0;
        self.state.send_modify(|s| {
            let slot = s.tickets.slot(collection);
            *slot += 1;
            seq = *slot;
        });
        Ticket { collection, seq }
    }

    /// Apply `update` only if `ticket` is still the newest for its collection
    fn apply_if_latest(&self, ticket: Ticket, update: impl FnOnce(&mut RecipeState)) -> bool {
        let applied = self.state.send_if_modified(|s| {
            if *s.tickets.slot(ticket.collection) != ticket.seq {
                return false;
            }
            update(s);
            true
        });
        if !applied {
            tracing::debug!(
                collection = ?ticket.collection,
                ticket = ticket.seq,
                "Discarding stale response"
            );
        }
        applied
    }

    /// Record a failure for the user and hand it back
    fn fail(&self, op: Operation, error: StoreError) -> StoreError {
        tracing::warn!(
            operation = op.as_str(),
            kind = ?error.kind(),
            error = %error,
            "Operation failed"
        );
        let message = format!("{}: {}", op.failure_message(), error);
        self.state.send_modify(|s| s.error = Some(message));
        error
    }

    fn finish<T>(&self, op: Operation, result: StoreResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => {
                tracing::info!(operation = op.as_str(), "Operation completed");
                Ok(value)
            }
            Err(error) => Err(self.fail(op, error)),
        }
    }

    fn require_principal(&self) -> StoreResult<Principal> {
        self.session
            .principal()
            .ok_or_else(|| StoreError::unauthenticated("log in to manage recipes"))
    }

    // ========================
    // Fetches
    // ========================

    async fn fetch_cuisine_types(&self) -> StoreResult<Vec<CuisineType>> {
        let ticket = self.issue(Collection::CuisineTypes);
        let types = self.backend.find_cuisine_types().await?;
        self.apply_if_latest(ticket, |s| s.cuisine_types = types.clone());
        Ok(types)
    }

    async fn fetch_recipes(&self, cuisine_type_id: Option<&str>) -> StoreResult<Vec<Recipe>> {
        let ticket = self.issue(Collection::Recipes);
        let query = RecipeQuery::by_cuisine_type(cuisine_type_id);
        let viewer = self.session.principal();
        let mut recipes = self.backend.find_recipes(&query, viewer.as_ref()).await?;
        tracing::debug!(count = recipes.len(), filter = ?cuisine_type_id, "Recipes fetched");
        self.apply_if_latest(ticket, |s| {
            s.settle(ticket, &mut recipes);
            s.recipes = recipes.clone();
            s.active_filter = query.cuisine_type_id.clone();
        });
        Ok(recipes)
    }

    async fn fetch_own_recipes(&self) -> StoreResult<Vec<Recipe>> {
        let ticket = self.issue(Collection::OwnRecipes);
        let Some(principal) = self.session.principal() else {
            self.apply_if_latest(ticket, |s| s.own_recipes.clear());
            return Ok(Vec::new());
        };
        let query = RecipeQuery::by_owner(principal.id());
        let mut recipes = self.backend.find_recipes(&query, Some(&principal)).await?;
        self.apply_if_latest(ticket, |s| {
            s.settle(ticket, &mut recipes);
            s.own_recipes = recipes.clone();
        });
        Ok(recipes)
    }

    /// Re-query both recipe collections after a write, keeping the active
    /// filter. Failures are reported but do not fail the write.
    async fn refresh_after_write(&self) {
        let filter = self.state.borrow().active_filter.clone();
        if let Err(e) = self.fetch_recipes(filter.as_deref()).await {
            self.fail(Operation::ListRecipes, e);
        }
        if let Err(e) = self.fetch_own_recipes().await {
            self.fail(Operation::ListOwnRecipes, e);
        }
    }

    // ========================
    // Operations
    // ========================

    /// Fetch every cuisine type and replace the collection
    pub async fn list_cuisine_types(&self) -> StoreResult<Vec<CuisineType>> {
        let op = Operation::ListCuisineTypes;
        let _in_flight = self.begin(op);
        let result = self.fetch_cuisine_types().await;
        self.finish(op, result)
    }

    /// Fetch recipes, optionally only those of one cuisine type, newest
    /// first, and replace the "all recipes" collection
    pub async fn list_recipes(&self, cuisine_type_id: Option<&str>) -> StoreResult<Vec<Recipe>> {
        let op = Operation::ListRecipes;
        let _in_flight = self.begin(op);
        let result = self.fetch_recipes(cuisine_type_id).await;
        self.finish(op, result)
    }

    /// Fetch the current principal's recipes. Clears the list when nobody
    /// is signed in.
    pub async fn list_own_recipes(&self) -> StoreResult<Vec<Recipe>> {
        let op = Operation::ListOwnRecipes;
        let _in_flight = self.begin(op);
        let result = self.fetch_own_recipes().await;
        self.finish(op, result)
    }

    /// Create a recipe owned by the current principal, readable by everyone
    /// and writable only by its owner. Returns the new id.
    pub async fn create_recipe(&self, draft: RecipeDraft) -> StoreResult<String> {
        let op = Operation::CreateRecipe;
        let _in_flight = self.begin(op);
        let result = self.create_inner(&draft).await;
        let id = self.finish(op, result)?;
        self.refresh_after_write().await;
        Ok(id)
    }

    async fn create_inner(&self, draft: &RecipeDraft) -> StoreResult<String> {
        let principal = self.require_principal()?;
        draft.validate()?;
        let acl = Acl::public_read_owner_write(principal.id());
        let id = self.backend.create_recipe(&principal, draft, &acl).await?;
        tracing::info!(id = %id, owner = %principal.user.username, "Recipe created");
        Ok(id)
    }

    /// Write only the fields present in `patch`, then refresh both recipe
    /// collections
    pub async fn update_recipe(&self, id: &str, patch: RecipePatch) -> StoreResult<()> {
        let op = Operation::UpdateRecipe;
        let _in_flight = self.begin(op);
        let result = self.update_inner(id, &patch).await;
        self.finish(op, result)?;
        self.refresh_after_write().await;
        Ok(())
    }

    async fn update_inner(&self, id: &str, patch: &RecipePatch) -> StoreResult<()> {
        let principal = self.require_principal()?;
        patch.validate()?;
        self.backend.update_recipe(&principal, id, patch).await
    }

    /// Delete a recipe and drop it from both collections without re-fetching
    pub async fn delete_recipe(&self, id: &str) -> StoreResult<()> {
        let op = Operation::DeleteRecipe;
        let _in_flight = self.begin(op);
        let result = self.delete_inner(id).await;
        self.finish(op, result)?;

        // lists already in flight may still carry the record
        self.state.send_modify(|s| {
            s.recipes.retain(|r| r.id != id);
            s.own_recipes.retain(|r| r.id != id);
            for collection in [Collection::Recipes, Collection::OwnRecipes] {
                let seq = *s.tickets.slot(collection);
                s.tombstones.push(Tombstone {
                    collection,
                    id: id.to_string(),
                    seq,
                });
            }
        });
        Ok(())
    }

    async fn delete_inner(&self, id: &str) -> StoreResult<()> {
        let principal = self.require_principal()?;
        self.backend.delete_recipe(&principal, id).await?;
        tracing::info!(id, "Recipe deleted");
        Ok(())
    }
}
