//! Plain-text rendering of actor events

use std::fmt::Write;

use crate::messages::commands::HELP;
use crate::messages::Event;
use crate::models::{CuisineType, Recipe, RecipeForm, User};
use crate::store::RecipeState;

const NONE: &str = "  (none)";

pub fn render(event: &Event) -> String {
    match event {
        Event::Notice(text) => text.clone(),
        Event::Failure(text) => format!("Error: {}", text),
        Event::Help => HELP.to_string(),
        Event::CuisineTypes(types) => render_cuisine_types(types),
        Event::Recipes {
            title,
            recipes,
            viewer,
        } => render_recipe_list(title, recipes, viewer.as_ref()),
        Event::Detail { recipe, viewer } => render_detail(recipe, viewer.as_ref()),
        Event::EditForm { id, form } => render_form(id, form),
        Event::Profile { user, recipes } => render_profile(user.as_ref(), recipes),
        Event::Status { user, state } => render_status(user.as_ref(), state),
    }
}

fn render_cuisine_types(types: &[CuisineType]) -> String {
    let mut out = format!("Cuisine types ({})", types.len());
    if types.is_empty() {
        out.push('\n');
        out.push_str(NONE);
    }
    for cuisine in types {
        let _ = write!(out, "\n  {:<12} {:<20} {}", cuisine.id, cuisine.name, cuisine.color_hint);
    }
    out
}

/// One line per recipe; the viewer's own recipes are starred
pub fn render_recipe_list(title: &str, recipes: &[Recipe], viewer: Option<&User>) -> String {
    let mut out = format!("{} ({})", title, recipes.len());
    if recipes.is_empty() {
        out.push('\n');
        out.push_str(NONE);
    }
    for recipe in recipes {
        let own = match viewer {
            Some(user) if recipe.is_owned_by(user) => " *",
            _ => "",
        };
        let _ = write!(
            out,
            "\n  {:<12} {:<28} {:<12} {:>4} min  {:<6}  by {}{}",
            recipe.id,
            recipe.name,
            recipe.cuisine_name(),
            recipe.prep_time_minutes,
            recipe.difficulty,
            recipe.owner_display_name(),
            own
        );
    }
    out
}

pub fn render_detail(recipe: &Recipe, viewer: Option<&User>) -> String {
    let mut out = format!("{}  [{}]", recipe.name, recipe.cuisine_name());
    let _ = write!(
        out,
        "\n  id: {}\n  by: {}\n  prep time: {} min\n  difficulty: {}\n  created: {}",
        recipe.id,
        recipe.owner_display_name(),
        recipe.prep_time_minutes,
        recipe.difficulty,
        recipe.created_at.format("%Y-%m-%d %H:%M")
    );

    out.push_str("\nIngredients:");
    for line in recipe.ingredient_lines() {
        let _ = write!(out, "\n  - {}", line);
    }
    out.push_str("\nInstructions:");
    for line in recipe.instructions.lines() {
        let _ = write!(out, "\n  {}", line);
    }

    if viewer.is_some_and(|user| recipe.is_owned_by(user)) {
        let _ = write!(out, "\n\nYours: 'edit {0}' or 'delete {0}'", recipe.id);
    }
    out
}

fn render_form(id: &str, form: &RecipeForm) -> String {
    format!(
        "Editing {}\n  name={}\n  time={}\n  ingredients={}\n  instructions={}\n  difficulty={}\n  cuisine={}",
        id,
        form.name,
        form.prep_time,
        form.ingredients.lines().collect::<Vec<_>>().join("|"),
        form.instructions,
        form.difficulty,
        form.cuisine_type_id
    )
}

fn render_profile(user: Option<&User>, recipes: &[Recipe]) -> String {
    let Some(user) = user else {
        return "Not logged in".to_string();
    };
    let mut out = format!(
        "{}\n  email: {}\n\n",
        user.username,
        user.email.as_deref().unwrap_or("-")
    );
    out.push_str(&render_recipe_list("Your recipes", recipes, Some(user)));
    out
}

fn render_status(user: Option<&User>, state: &RecipeState) -> String {
    let mut out = format!(
        "user: {}\nloading: {}\nrecipes: {}\nyours: {}\ncuisine types: {}\nfilter: {}",
        user.map(|u| u.username.as_str()).unwrap_or("-"),
        if state.is_loading() { "yes" } else { "no" },
        state.recipes.len(),
        state.own_recipes.len(),
        state.cuisine_types.len(),
        state
            .active_filter
            .as_deref()
            .map(|id| state.cuisine_type(id).map(|c| c.name.as_str()).unwrap_or(id))
            .unwrap_or("-"),
    );
    if let Some(error) = &state.error {
        let _ = write!(out, "\nlast error: {}", error);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, Reference};
    use chrono::{TimeZone, Utc};

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            username: name.into(),
            email: None,
        }
    }

    fn recipe() -> Recipe {
        Recipe {
            id: "r1".into(),
            name: "Moqueca".into(),
            prep_time_minutes: 45,
            ingredients: "fish\n\ncoconut milk\n".into(),
            instructions: "Stew slowly".into(),
            difficulty: Difficulty::Medium,
            cuisine_type: Reference::resolved(
                "c1",
                CuisineType {
                    id: "c1".into(),
                    name: "Brazilian".into(),
                    color_hint: "#27ae60".into(),
                },
            ),
            owner: Reference::resolved("u1", user("u1", "ana")),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_detail_offers_actions_to_owner_only() {
        let owner_view = render_detail(&recipe(), Some(&user("u1", "ana")));
        assert!(owner_view.contains("Moqueca  [Brazilian]"));
        assert!(owner_view.contains("  - fish\n  - coconut milk"));
        assert!(owner_view.contains("created: 2024-05-01 12:30"));
        assert!(owner_view.contains("'delete r1'"));

        let other_view = render_detail(&recipe(), Some(&user("u2", "bob")));
        assert!(!other_view.contains("delete"));
        assert!(!render_detail(&recipe(), None).contains("delete"));
    }

    #[test]
    fn test_unresolved_references_render_unknown() {
        let mut orphan = recipe();
        orphan.owner = Reference::unresolved("u9");
        orphan.cuisine_type = Reference::unresolved("c9");
        let text = render_recipe_list("All recipes", &[orphan], None);
        assert!(text.contains("Unknown"));
        assert!(text.ends_with("by Unknown"));
    }

    #[test]
    fn test_list_marks_own_recipes() {
        let text = render_recipe_list("All recipes", &[recipe()], Some(&user("u1", "ana")));
        assert!(text.starts_with("All recipes (1)"));
        assert!(text.ends_with("by ana *"));
        assert!(render_recipe_list("Your recipes", &[], None).ends_with("(none)"));
    }

    #[test]
    fn test_status_shows_filter_name_and_error() {
        let mut state = RecipeState::default();
        state.cuisine_types = vec![CuisineType {
            id: "c1".into(),
            name: "Brazilian".into(),
            color_hint: "#ccc".into(),
        }];
        state.active_filter = Some("c1".into());
        state.error = Some("Failed to load recipes: backend unavailable: timeout".into());
        let text = render(&Event::Status { user: None, state });
        assert!(text.contains("filter: Brazilian"));
        assert!(text.contains("loading: no"));
        assert!(text.ends_with("last error: Failed to load recipes: backend unavailable: timeout"));
    }

    #[test]
    fn test_form_joins_ingredients() {
        let form = RecipeForm::from_recipe(&recipe());
        let text = render(&Event::EditForm {
            id: "r1".into(),
            form,
        });
        assert!(text.contains("ingredients=fish||coconut milk"));
        assert!(text.contains("cuisine=c1"));
    }
}
