//! Parse REST wire format: object shapes, pointers, request bodies and
//! error codes.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::constants::{CUISINE_TYPE_CLASS, DEFAULT_CUISINE_COLOR, USER_CLASS};
use crate::error::StoreError;
use crate::models::{
    Acl, CuisineType, Difficulty, Recipe, RecipeDraft, RecipePatch, Reference, User,
};

use super::RecipeQuery;

/// Parse error codes this client distinguishes
pub mod codes {
    pub const INTERNAL_SERVER_ERROR: i64 = 1;
    pub const CONNECTION_FAILED: i64 = 100;
    pub const OBJECT_NOT_FOUND: i64 = 101;
    pub const INVALID_QUERY: i64 = 102;
    pub const INCORRECT_TYPE: i64 = 111;
    pub const OPERATION_FORBIDDEN: i64 = 119;
    pub const TIMEOUT: i64 = 124;
    pub const INVALID_EMAIL_ADDRESS: i64 = 125;
    pub const VALIDATION_ERROR: i64 = 142;
    pub const REQUEST_LIMIT_EXCEEDED: i64 = 155;
    pub const USERNAME_MISSING: i64 = 200;
    pub const PASSWORD_MISSING: i64 = 201;
    pub const USERNAME_TAKEN: i64 = 202;
    pub const EMAIL_TAKEN: i64 = 203;
    pub const EMAIL_MISSING: i64 = 204;
    pub const INVALID_SESSION_TOKEN: i64 = 209;
}

/// Recipe field names as stored in the backend
pub mod fields {
    pub const NAME: &str = "nome";
    pub const PREP_TIME: &str = "tempoPreparo";
    pub const INGREDIENTS: &str = "ingredientes";
    pub const INSTRUCTIONS: &str = "modoPreparo";
    pub const DIFFICULTY: &str = "dificuldade";
    pub const CUISINE_TYPE: &str = "tipoCozinha";
    pub const OWNER: &str = "owner";
    pub const ACL: &str = "ACL";
    pub const CREATED_AT: &str = "createdAt";
}

pub fn pointer(class_name: &str, object_id: &str) -> Value {
    json!({
        "__type": "Pointer",
        "className": class_name,
        "objectId": object_id,
    })
}

/// `where` clause for a recipe query, `None` when unfiltered
pub fn recipe_where(query: &RecipeQuery) -> Option<Value> {
    let mut clause = Map::new();
    if let Some(id) = &query.cuisine_type_id {
        clause.insert(fields::CUISINE_TYPE.into(), pointer(CUISINE_TYPE_CLASS, id));
    }
    if let Some(id) = &query.owner_id {
        clause.insert(fields::OWNER.into(), pointer(USER_CLASS, id));
    }
    if clause.is_empty() {
        None
    } else {
        Some(Value::Object(clause))
    }
}

pub fn recipe_create_body(draft: &RecipeDraft, owner_id: &str, acl: &Acl) -> Value {
    let mut body = Map::new();
    body.insert(fields::NAME.into(), json!(draft.name));
    body.insert(fields::PREP_TIME.into(), json!(draft.prep_time_minutes));
    body.insert(fields::INGREDIENTS.into(), json!(draft.ingredients));
    body.insert(fields::INSTRUCTIONS.into(), json!(draft.instructions));
    body.insert(fields::DIFFICULTY.into(), json!(draft.difficulty));
    body.insert(
        fields::CUISINE_TYPE.into(),
        pointer(CUISINE_TYPE_CLASS, &draft.cuisine_type_id),
    );
    body.insert(fields::OWNER.into(), pointer(USER_CLASS, owner_id));
    body.insert(fields::ACL.into(), json!(acl));
    Value::Object(body)
}

/// Body holding only the fields present in `patch`
pub fn recipe_patch_body(patch: &RecipePatch) -> Value {
    let mut body = Map::new();
    if let Some(name) = &patch.name {
        body.insert(fields::NAME.into(), json!(name));
    }
    if let Some(minutes) = patch.prep_time_minutes {
        body.insert(fields::PREP_TIME.into(), json!(minutes));
    }
    if let Some(ingredients) = &patch.ingredients {
        body.insert(fields::INGREDIENTS.into(), json!(ingredients));
    }
    if let Some(instructions) = &patch.instructions {
        body.insert(fields::INSTRUCTIONS.into(), json!(instructions));
    }
    if let Some(difficulty) = patch.difficulty {
        body.insert(fields::DIFFICULTY.into(), json!(difficulty));
    }
    if let Some(id) = &patch.cuisine_type_id {
        body.insert(fields::CUISINE_TYPE.into(), pointer(CUISINE_TYPE_CLASS, id));
    }
    Value::Object(body)
}

#[derive(Debug, Deserialize)]
pub struct QueryResults<T> {
    pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedObject {
    pub object_id: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserObject {
    #[serde(rename = "__type", default)]
    pub kind: Option<String>,
    pub object_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl UserObject {
    pub fn into_user(self) -> Option<User> {
        if self.kind.as_deref() == Some("Pointer") {
            return None;
        }
        Some(User {
            id: self.object_id,
            username: self.username?,
            email: self.email,
        })
    }

    fn into_reference(self) -> Reference<User> {
        let id = self.object_id.clone();
        Reference {
            id,
            resolved: self.into_user(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuisineTypeObject {
    #[serde(rename = "__type", default)]
    pub kind: Option<String>,
    pub object_id: String,
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(rename = "cor", default)]
    pub color: Option<String>,
}

impl CuisineTypeObject {
    pub fn into_cuisine_type(self) -> Option<CuisineType> {
        if self.kind.as_deref() == Some("Pointer") {
            return None;
        }
        Some(CuisineType {
            id: self.object_id,
            name: self.name?,
            color_hint: self
                .color
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CUISINE_COLOR.to_string()),
        })
    }

    fn into_reference(self) -> Reference<CuisineType> {
        let id = self.object_id.clone();
        Reference {
            id,
            resolved: self.into_cuisine_type(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeObject {
    pub object_id: String,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "tempoPreparo")]
    pub prep_time: Option<Value>,
    #[serde(rename = "ingredientes", default)]
    pub ingredients: Option<String>,
    #[serde(rename = "modoPreparo", default)]
    pub instructions: Option<String>,
    #[serde(rename = "dificuldade")]
    pub difficulty: Option<Difficulty>,
    #[serde(rename = "tipoCozinha")]
    pub cuisine_type: Option<CuisineTypeObject>,
    pub owner: Option<UserObject>,
    pub created_at: DateTime<Utc>,
}

/// Whole minutes from a stored number. Negative values read as zero and
/// values past `u32::MAX` saturate.
fn prep_minutes(id: &str, value: Option<&Value>) -> Option<u32> {
    let minutes = value?.as_i64()?;
    if minutes < 0 {
        tracing::warn!(id, minutes, "Negative preparation time, reading as 0");
        return Some(0);
    }
    Some(u32::try_from(minutes).unwrap_or(u32::MAX))
}

impl RecipeObject {
    /// Validate and convert; the error names what is wrong with the record.
    pub fn into_recipe(self) -> Result<Recipe, String> {
        let prep_time_minutes = prep_minutes(&self.object_id, self.prep_time.as_ref())
            .ok_or_else(|| format!("invalid {}: {:?}", fields::PREP_TIME, self.prep_time))?;

        Ok(Recipe {
            name: self.name.ok_or_else(|| format!("missing {}", fields::NAME))?,
            prep_time_minutes,
            ingredients: self.ingredients.unwrap_or_default(),
            instructions: self.instructions.unwrap_or_default(),
            difficulty: self
                .difficulty
                .ok_or_else(|| format!("missing {}", fields::DIFFICULTY))?,
            cuisine_type: self
                .cuisine_type
                .ok_or_else(|| format!("missing {}", fields::CUISINE_TYPE))?
                .into_reference(),
            owner: self
                .owner
                .ok_or_else(|| format!("missing {}", fields::OWNER))?
                .into_reference(),
            created_at: self.created_at,
            id: self.object_id,
        })
    }
}

/// Decode query rows one by one, skipping malformed records.
pub fn decode_rows<T, U>(
    rows: Vec<Value>,
    class_name: &str,
    convert: impl Fn(T) -> Result<U, String>,
) -> Vec<U>
where
    T: serde::de::DeserializeOwned,
{
    rows.into_iter()
        .filter_map(|row| {
            let id = row
                .get("objectId")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string();
            let decoded = serde_json::from_value::<T>(row)
                .map_err(|e| e.to_string())
                .and_then(&convert);
            match decoded {
                Ok(value) => Some(value),
                Err(reason) => {
                    tracing::warn!(
                        class = class_name,
                        id = %id,
                        %reason,
                        "Skipping malformed record"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Error body returned by Parse
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A request the server answered with a non-success status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: u16,
    pub code: Option<i64>,
    pub message: String,
}

impl Rejection {
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Rejection {
                status,
                code: parsed.code,
                message: parsed.error.unwrap_or_else(|| body.trim().to_string()),
            },
            Err(_) => Rejection {
                status,
                code: None,
                message: body.trim().to_string(),
            },
        }
    }

    pub fn is_object_not_found(&self) -> bool {
        self.code == Some(codes::OBJECT_NOT_FOUND) || (self.code.is_none() && self.status == 404)
    }

    /// Classify into the store taxonomy. `entity`/`id` name the record a
    /// not-found refers to.
    pub fn classify(&self, entity: &'static str, id: &str) -> StoreError {
        use codes::*;

        match self.code {
            Some(OBJECT_NOT_FOUND) => StoreError::not_found(entity, id),
            Some(OPERATION_FORBIDDEN) => StoreError::permission_denied(self.message.clone()),
            Some(INVALID_SESSION_TOKEN) => {
                StoreError::unauthenticated("session expired, log in again")
            }
            Some(USERNAME_TAKEN) => StoreError::validation("username already taken"),
            Some(EMAIL_TAKEN) => StoreError::validation("email already registered"),
            Some(
                INVALID_QUERY | INCORRECT_TYPE | INVALID_EMAIL_ADDRESS | VALIDATION_ERROR
                | USERNAME_MISSING | PASSWORD_MISSING | EMAIL_MISSING,
            ) => StoreError::validation(self.message.clone()),
            Some(code) => StoreError::transient(format!("{} (code {})", self.message, code)),
            None => match self.status {
                401 | 403 => StoreError::permission_denied(format!(
                    "{}; check the application id and keys",
                    self.message
                )),
                404 => StoreError::not_found(entity, id),
                _ => StoreError::transient(format!("HTTP {}: {}", self.status, self.message)),
            },
        }
    }
}
