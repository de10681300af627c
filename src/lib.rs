//! # Daily Meals
//!
//! Client for a recipe catalog kept in a Parse-compatible backend.
//!
//! ## Features
//! - Sign up, log in, log out, session restore
//! - Recipes filtered by cuisine type, newest first
//! - Create, edit and delete your own recipes
//! - Owner-only writes enforced by per-object ACLs
//!
//! ## Architecture
//! - Backend layer: Parse REST client, or an in-memory backend
//! - Store layer: session store and recipe data store, observable via watch
//! - App layer: actor running shell commands concurrently

pub mod app;
pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod messages;
pub mod models;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use backend::{Backend, MemoryBackend, ParseBackend};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use models::{CuisineType, Difficulty, Principal, Recipe, RecipeDraft, RecipePatch, User};
pub use store::{AuthService, RecipeState, RecipeStore, SessionStore};
