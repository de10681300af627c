//! Parse REST client - executes backend calls and classifies failures

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::backend::wire::{
    self, decode_rows, fields, CreatedObject, CuisineTypeObject, QueryResults, Rejection,
    RecipeObject, UserObject,
};
use crate::backend::{Backend, NewAccount, RecipeQuery};
use crate::config::Config;
use crate::constants::{CUISINE_TYPE_CLASS, RECIPE_CLASS};
use crate::error::{StoreError, StoreResult};
use crate::models::{Acl, CuisineType, Principal, Recipe, RecipeDraft, RecipePatch, User};

const APPLICATION_ID_HEADER: &str = "X-Parse-Application-Id";
const JAVASCRIPT_KEY_HEADER: &str = "X-Parse-JavaScript-Key";
const REST_API_KEY_HEADER: &str = "X-Parse-REST-API-Key";
const SESSION_TOKEN_HEADER: &str = "X-Parse-Session-Token";
const REVOCABLE_SESSION_HEADER: &str = "X-Parse-Revocable-Session";

/// Why a call did not produce a value
#[derive(Debug)]
enum CallError {
    /// Already classified (transport or decoding failure)
    Failed(StoreError),
    /// The server answered with an error status
    Rejected(Rejection),
}

impl CallError {
    fn classify(self, entity: &'static str, id: &str) -> StoreError {
        match self {
            CallError::Failed(e) => e,
            CallError::Rejected(rejection) => rejection.classify(entity, id),
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        CallError::Failed(e.into())
    }
}

/// [`Backend`] over the Parse REST API
#[derive(Clone, Debug)]
pub struct ParseBackend {
    client: reqwest::Client,
    base_url: String,
    application_id: String,
    javascript_key: Option<String>,
    rest_api_key: Option<String>,
    query_limit: u32,
}

impl ParseBackend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(ParseBackend {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            application_id: config.require_application_id()?.to_string(),
            javascript_key: config.javascript_key.clone(),
            rest_api_key: config.rest_api_key.clone(),
            query_limit: config.query_limit,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build a request with the application headers and, if given, a session
    fn request(
        &self,
        method: Method,
        path: &str,
        session: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header(APPLICATION_ID_HEADER, &self.application_id);

        if let Some(key) = &self.javascript_key {
            builder = builder.header(JAVASCRIPT_KEY_HEADER, key);
        }
        if let Some(key) = &self.rest_api_key {
            builder = builder.header(REST_API_KEY_HEADER, key);
        }
        if let Some(token) = session {
            builder = builder.header(SESSION_TOKEN_HEADER, token);
        }
        builder
    }

    /// Send and decode a JSON response
    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, CallError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CallError::Rejected(Rejection::from_response(status.as_u16(), &body)));
        }
        serde_json::from_str(&body).map_err(|e| {
            CallError::Failed(StoreError::transient(format!("unexpected response body: {}", e)))
        })
    }

    async fn find_rows(
        &self,
        class_name: &str,
        params: Vec<(&str, String)>,
        session: Option<&str>,
    ) -> StoreResult<Vec<Value>> {
        let builder = self
            .request(Method::GET, &format!("classes/{}", class_name), session)
            .query(&params);
        let results: QueryResults<Value> = self
            .send(builder)
            .await
            .map_err(|e| e.classify("class", class_name))?;
        Ok(results.results)
    }

    /// Whether the recipe still exists for a public read
    async fn recipe_exists(&self, id: &str, session: Option<&str>) -> StoreResult<bool> {
        let path = format!("classes/{}/{}", RECIPE_CLASS, id);
        let builder = self.request(Method::GET, &path, session);
        match self.send::<Value>(builder).await {
            Ok(_) => Ok(true),
            Err(CallError::Rejected(r)) if r.is_object_not_found() => Ok(false),
            Err(e) => Err(e.classify("recipe", id)),
        }
    }

    /// Parse answers an ACL-denied write with "object not found". Probe the
    /// object to tell a missing record from a forbidden one.
    async fn classify_write_failure(
        &self,
        error: CallError,
        principal: &Principal,
        id: &str,
    ) -> StoreError {
        let rejection = match error {
            CallError::Rejected(r) if r.is_object_not_found() => r,
            other => return other.classify("recipe", id),
        };
        match self.recipe_exists(id, Some(&principal.session_token)).await {
            Ok(true) => StoreError::permission_denied(format!(
                "recipe '{}' can only be changed by its owner",
                id
            )),
            Ok(false) => StoreError::not_found("recipe", id),
            Err(probe_error) => {
                tracing::warn!(
                    id,
                    error = %probe_error,
                    "Could not probe recipe after write failure"
                );
                rejection.classify("recipe", id)
            }
        }
    }
}

#[async_trait]
impl Backend for ParseBackend {
    async fn find_cuisine_types(&self) -> StoreResult<Vec<CuisineType>> {
        let params = vec![("limit", self.query_limit.to_string())];
        let rows = self.find_rows(CUISINE_TYPE_CLASS, params, None).await?;
        Ok(decode_rows(rows, CUISINE_TYPE_CLASS, |o: CuisineTypeObject| {
            o.into_cuisine_type()
                .ok_or_else(|| "missing name".to_string())
        }))
    }

    async fn find_recipes(
        &self,
        query: &RecipeQuery,
        viewer: Option<&Principal>,
    ) -> StoreResult<Vec<Recipe>> {
        let mut params = vec![
            ("include", format!("{},{}", fields::CUISINE_TYPE, fields::OWNER)),
            ("order", format!("-{}", fields::CREATED_AT)),
            ("limit", self.query_limit.to_string()),
        ];
        if let Some(clause) = wire::recipe_where(query) {
            params.push(("where", clause.to_string()));
        }
        let session = viewer.map(|p| p.session_token.as_str());
        let rows = self.find_rows(RECIPE_CLASS, params, session).await?;
        Ok(decode_rows(rows, RECIPE_CLASS, RecipeObject::into_recipe))
    }

    async fn create_recipe(
        &self,
        principal: &Principal,
        draft: &RecipeDraft,
        acl: &Acl,
    ) -> StoreResult<String> {
        let body = wire::recipe_create_body(draft, principal.id(), acl);
        let builder = self
            .request(
                Method::POST,
                &format!("classes/{}", RECIPE_CLASS),
                Some(&principal.session_token),
            )
            .json(&body);
        let created: CreatedObject = self
            .send(builder)
            .await
            .map_err(|e| e.classify("cuisine type", &draft.cuisine_type_id))?;
        Ok(created.object_id)
    }

    async fn update_recipe(
        &self,
        principal: &Principal,
        id: &str,
        patch: &RecipePatch,
    ) -> StoreResult<()> {
        let builder = self
            .request(
                Method::PUT,
                &format!("classes/{}/{}", RECIPE_CLASS, id),
                Some(&principal.session_token),
            )
            .json(&wire::recipe_patch_body(patch));
        match self.send::<Value>(builder).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.classify_write_failure(e, principal, id).await),
        }
    }

    async fn delete_recipe(&self, principal: &Principal, id: &str) -> StoreResult<()> {
        let builder = self.request(
            Method::DELETE,
            &format!("classes/{}/{}", RECIPE_CLASS, id),
            Some(&principal.session_token),
        );
        match self.send::<Value>(builder).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.classify_write_failure(e, principal, id).await),
        }
    }

    async fn log_in(&self, username: &str, password: &str) -> StoreResult<Principal> {
        let builder = self
            .request(Method::POST, "login", None)
            .header(REVOCABLE_SESSION_HEADER, "1")
            .json(&json!({ "username": username, "password": password }));

        let object: UserObject = match self.send(builder).await {
            Ok(object) => object,
            Err(CallError::Rejected(r)) if r.is_object_not_found() => {
                return Err(StoreError::unauthenticated("invalid username or password"));
            }
            Err(e) => return Err(e.classify("user", username)),
        };
        let token = object
            .session_token
            .clone()
            .ok_or_else(|| StoreError::transient("login response carried no session token"))?;
        let user = object
            .into_user()
            .ok_or_else(|| StoreError::transient("login response carried no user"))?;
        Ok(Principal::new(user, token))
    }

    async fn sign_up(&self, account: &NewAccount) -> StoreResult<User> {
        let builder = self
            .request(Method::POST, "users", None)
            .header(REVOCABLE_SESSION_HEADER, "1")
            .json(&json!({
                "username": account.username,
                "email": account.email,
                "password": account.password,
            }));
        let created: CreatedObject = self
            .send(builder)
            .await
            .map_err(|e| e.classify("user", &account.username))?;
        Ok(User {
            id: created.object_id,
            username: account.username.clone(),
            email: Some(account.email.clone()),
        })
    }

    async fn current_user(&self, session_token: &str) -> StoreResult<Principal> {
        let builder = self.request(Method::GET, "users/me", Some(session_token));
        let object: UserObject = match self.send(builder).await {
            Ok(object) => object,
            Err(CallError::Rejected(r)) if r.is_object_not_found() => {
                return Err(StoreError::unauthenticated("session expired, log in again"));
            }
            Err(e) => return Err(e.classify("session", "me")),
        };
        let user = object
            .into_user()
            .ok_or_else(|| StoreError::transient("session lookup carried no user"))?;
        Ok(Principal::new(user, session_token))
    }

    async fn log_out(&self, principal: &Principal) -> StoreResult<()> {
        let builder = self.request(Method::POST, "logout", Some(&principal.session_token));
        self.send::<Value>(builder)
            .await
            .map(|_| ())
            .map_err(|e| e.classify("session", principal.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            server_url: "http://localhost:1337/parse/".into(),
            application_id: Some("app".into()),
            ..Config::default()
        }
    }

    #[test]
    fn test_requires_application_id() {
        assert!(ParseBackend::new(&Config::default()).is_err());
    }

    #[test]
    fn test_urls_join_cleanly() {
        let backend = ParseBackend::new(&config()).unwrap();
        assert_eq!(backend.url("classes/Receita"), "http://localhost:1337/parse/classes/Receita");
        assert_eq!(backend.url("/login"), "http://localhost:1337/parse/login");
    }

    #[test]
    fn test_request_carries_parse_headers() {
        let backend = ParseBackend::new(&Config {
            javascript_key: Some("js".into()),
            ..config()
        })
        .unwrap();
        let request = backend
            .request(Method::GET, "users/me", Some("r:abc"))
            .build()
            .unwrap();
        let headers = request.headers();
        assert_eq!(headers[APPLICATION_ID_HEADER], "app");
        assert_eq!(headers[JAVASCRIPT_KEY_HEADER], "js");
        assert_eq!(headers[SESSION_TOKEN_HEADER], "r:abc");
        assert!(headers.get(REST_API_KEY_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let backend = ParseBackend::new(&Config {
            server_url: "http://127.0.0.1:9/".into(),
            request_timeout_secs: 2,
            ..config()
        })
        .unwrap();
        let err = backend.find_cuisine_types().await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
}
