//! Events - output from the App actor to the shell

use crate::models::{CuisineType, Recipe, RecipeForm, User};
use crate::store::RecipeState;

/// Something the shell should show
#[derive(Clone, Debug)]
pub enum Event {
    /// Short confirmation of a completed command
    Notice(String),
    /// A command failed
    Failure(String),
    Help,
    CuisineTypes(Vec<CuisineType>),
    Recipes {
        title: String,
        recipes: Vec<Recipe>,
        viewer: Option<User>,
    },
    Detail {
        recipe: Recipe,
        viewer: Option<User>,
    },
    /// Current values of a recipe, ready to be edited
    EditForm { id: String, form: RecipeForm },
    Profile {
        user: Option<User>,
        recipes: Vec<Recipe>,
    },
    Status {
        user: Option<User>,
        state: RecipeState,
    },
}
