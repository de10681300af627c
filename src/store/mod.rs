//! Stores shared by every view: the signed-in principal and the recipe data

pub mod auth;
pub mod recipes;
pub mod session;

pub use auth::AuthService;
pub use recipes::{Operation, RecipeState, RecipeStore};
pub use session::SessionStore;
