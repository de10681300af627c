//! Domain records: recipes, cuisine types, users and the inputs that create
//! or change them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_LABEL;
use crate::error::{StoreError, StoreResult};

/// A cuisine a recipe belongs to. Seeded in the backend, read-only here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuisineType {
    pub id: String,
    pub name: String,
    pub color_hint: String,
}

/// A backend user as seen by other users. Email is only visible to the user
/// themself, so it is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated user together with the session token the backend issued.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user: User,
    pub session_token: String,
}

impl Principal {
    pub fn new(user: User, session_token: impl Into<String>) -> Self {
        Principal {
            user,
            session_token: session_token.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }
}

// Keeps session tokens out of logs.
impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user", &self.user)
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Recipe difficulty. Serialized with the labels stored in the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    #[serde(rename = "Fácil")]
    Easy,
    #[serde(rename = "Médio")]
    Medium,
    #[serde(rename = "Difícil")]
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// Label stored in the backend
    pub fn wire_label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Fácil",
            Difficulty::Medium => "Médio",
            Difficulty::Hard => "Difícil",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Difficulty::ALL
            .into_iter()
            .find(|d| {
                d.as_str().eq_ignore_ascii_case(needle)
                    || d.wire_label().to_lowercase() == needle.to_lowercase()
            })
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "unknown difficulty '{}', expected easy, medium or hard",
                    needle
                ))
            })
    }
}

/// A many-to-one link to another record. `resolved` is filled when the
/// backend expanded the reference; it stays empty for dangling references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference<T> {
    pub id: String,
    pub resolved: Option<T>,
}

impl<T> Reference<T> {
    pub fn unresolved(id: impl Into<String>) -> Self {
        Reference {
            id: id.into(),
            resolved: None,
        }
    }

    pub fn resolved(id: impl Into<String>, value: T) -> Self {
        Reference {
            id: id.into(),
            resolved: Some(value),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.resolved.as_ref()
    }
}

/// A recipe as read back from the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub prep_time_minutes: u32,
    pub ingredients: String,
    pub instructions: String,
    pub difficulty: Difficulty,
    pub cuisine_type: Reference<CuisineType>,
    pub owner: Reference<User>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// Owner name, always derived from the owner reference.
    pub fn owner_display_name(&self) -> &str {
        self.owner
            .get()
            .map(|u| u.username.as_str())
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn cuisine_name(&self) -> &str {
        self.cuisine_type
            .get()
            .map(|c| c.name.as_str())
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Whether `user` may be offered edit/delete. The backend ACL is the
    /// actual gate.
    pub fn is_owned_by(&self, user: &User) -> bool {
        self.owner.id == user.id
    }

    /// One ingredient per non-blank line
    pub fn ingredient_lines(&self) -> Vec<&str> {
        self.ingredients
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Read/write grant for one ACL entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    #[serde(default, skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Per-object access control list, keyed by user id or `*` for everyone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl(BTreeMap<String, Grant>);

impl Acl {
    pub const PUBLIC: &'static str = "*";

    /// Everyone can read; only `owner_id` can write.
    pub fn public_read_owner_write(owner_id: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            Self::PUBLIC.to_string(),
            Grant {
                read: true,
                write: false,
            },
        );
        entries.insert(
            owner_id.to_string(),
            Grant {
                read: true,
                write: true,
            },
        );
        Acl(entries)
    }

    fn grant_for(&self, user_id: Option<&str>) -> Grant {
        let public = self.0.get(Self::PUBLIC).copied().unwrap_or_default();
        let own = user_id
            .and_then(|id| self.0.get(id))
            .copied()
            .unwrap_or_default();
        Grant {
            read: public.read || own.read,
            write: public.write || own.write,
        }
    }

    pub fn can_read(&self, user_id: Option<&str>) -> bool {
        self.grant_for(user_id).read
    }

    pub fn can_write(&self, user_id: Option<&str>) -> bool {
        self.grant_for(user_id).write
    }
}

fn require_text(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        Err(StoreError::validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

/// Parse a user-entered preparation time in whole minutes.
pub fn parse_prep_time(input: &str) -> StoreResult<u32> {
    input.trim().parse::<u32>().map_err(|_| {
        StoreError::validation(format!(
            "prep time must be a whole number of minutes, got '{}'",
            input.trim()
        ))
    })
}

/// Validated input for a new recipe
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipeDraft {
    pub name: String,
    pub prep_time_minutes: u32,
    pub ingredients: String,
    pub instructions: String,
    pub difficulty: Difficulty,
    pub cuisine_type_id: String,
}

impl RecipeDraft {
    pub fn validate(&self) -> StoreResult<()> {
        require_text("name", &self.name)?;
        require_text("ingredients", &self.ingredients)?;
        require_text("instructions", &self.instructions)?;
        require_text("cuisine type", &self.cuisine_type_id)
    }
}

/// Partial update: only `Some` fields are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub prep_time_minutes: Option<u32>,
    pub ingredients: Option<String>,
    pub instructions: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub cuisine_type_id: Option<String>,
}

impl RecipePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.prep_time_minutes.is_none()
            && self.ingredients.is_none()
            && self.instructions.is_none()
            && self.difficulty.is_none()
            && self.cuisine_type_id.is_none()
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.is_empty() {
            return Err(StoreError::validation("nothing to update"));
        }
        let text_fields = [
            ("name", &self.name),
            ("ingredients", &self.ingredients),
            ("instructions", &self.instructions),
            ("cuisine type", &self.cuisine_type_id),
        ];
        for (field, value) in text_fields {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        Ok(())
    }
}

/// Raw recipe form as typed by a user; everything is text until validated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipeForm {
    pub name: String,
    pub prep_time: String,
    pub ingredients: String,
    pub instructions: String,
    pub difficulty: Difficulty,
    pub cuisine_type_id: String,
}

impl RecipeForm {
    /// Pre-fill the form for editing an existing recipe
    pub fn from_recipe(recipe: &Recipe) -> Self {
        RecipeForm {
            name: recipe.name.clone(),
            prep_time: recipe.prep_time_minutes.to_string(),
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
            difficulty: recipe.difficulty,
            cuisine_type_id: recipe.cuisine_type.id.clone(),
        }
    }

    pub fn into_draft(self) -> StoreResult<RecipeDraft> {
        require_text("prep time", &self.prep_time)?;
        let draft = RecipeDraft {
            prep_time_minutes: parse_prep_time(&self.prep_time)?,
            name: self.name.trim().to_string(),
            ingredients: self.ingredients,
            instructions: self.instructions,
            difficulty: self.difficulty,
            cuisine_type_id: self.cuisine_type_id.trim().to_string(),
        };
        draft.validate()?;
        Ok(draft)
    }
}
