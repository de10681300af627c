//! App actor - command loop running store operations concurrently

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::{StoreError, StoreResult};
use crate::messages::{Command, Event};
use crate::models::RecipeForm;
use crate::store::{AuthService, RecipeState, RecipeStore};

/// Handles shared by every command task
#[derive(Clone)]
struct Context {
    auth: Arc<AuthService>,
    store: Arc<RecipeStore>,
}

/// App actor that turns shell commands into store operations.
///
/// Each command runs as its own task so a slow fetch never blocks the next
/// command; results come back as [`Event`]s.
pub struct AppActor {
    context: Context,
    event_tx: mpsc::UnboundedSender<Event>,
    tasks: JoinSet<()>,
    next_request_id: u64,
}

impl AppActor {
    pub fn new(
        auth: Arc<AuthService>,
        store: Arc<RecipeStore>,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        AppActor {
            context: Context { auth, store },
            event_tx,
            tasks: JoinSet::new(),
            next_request_id: 1,
        }
    }

    /// Run the actor message loop until `quit` or the command channel closes.
    /// Commands already running are allowed to finish.
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Quit) | None => break,
                        Some(command) => self.dispatch(command),
                    }
                }

                Some(result) = self.tasks.join_next() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Command task failed");
                    }
                }
            }
        }

        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Command task failed");
            }
        }
        tracing::info!("App actor stopped");
    }

    fn dispatch(&mut self, command: Command) {
        let id = self.next_request_id;
        self.next_request_id += 1;

        let context = self.context.clone();
        let event_tx = self.event_tx.clone();
        self.tasks.spawn(async move {
            let name = command.name();
            tracing::info!(id, command = name, "Executing command");
            let event = match context.execute(command).await {
                Ok(event) => event,
                Err(e) => {
                    tracing::info!(id, command = name, error = %e, "Command failed");
                    Event::Failure(e.to_string())
                }
            };
            let _ = event_tx.send(event);
        });
    }
}

impl Context {
    async fn execute(&self, command: Command) -> StoreResult<Event> {
        let session = self.store.session();
        let event = match command {
            Command::Help | Command::Quit => Event::Help,

            Command::Status => Event::Status {
                user: session.current_user(),
                state: self.store.snapshot(),
            },

            Command::LogIn { username, password } => {
                let user = self.auth.log_in(&username, &password).await?;
                // the session is live even if the list is not; the store keeps the error
                if let Err(e) = self.store.list_own_recipes().await {
                    tracing::warn!(error = %e, "Own recipes not loaded after log in");
                }
                Event::Notice(format!("Logged in as {}", user.username))
            }

            Command::SignUp {
                username,
                email,
                password,
            } => {
                let user = self.auth.sign_up(&username, &email, &password).await?;
                Event::Notice(format!(
                    "Account '{}' created, log in to continue",
                    user.username
                ))
            }

            Command::LogOut => match self.auth.log_out().await {
                Some(user) => {
                    self.store.list_own_recipes().await?;
                    Event::Notice(format!("Logged out {}", user.username))
                }
                None => Event::Notice("Not logged in".to_string()),
            },

            Command::Profile => {
                let user = session.current_user();
                let recipes = match user {
                    Some(_) => self.store.list_own_recipes().await?,
                    None => Vec::new(),
                };
                Event::Profile { user, recipes }
            }

            Command::Cuisines => Event::CuisineTypes(self.store.list_cuisine_types().await?),

            Command::Recipes { cuisine } => {
                let (title, filter) = match cuisine {
                    Some(arg) => {
                        let id = self.resolve_cuisine(&arg).await?;
                        (format!("Recipes ({})", arg), Some(id))
                    }
                    None => ("All recipes".to_string(), None),
                };
                let recipes = self.store.list_recipes(filter.as_deref()).await?;
                Event::Recipes {
                    title,
                    recipes,
                    viewer: session.current_user(),
                }
            }

            Command::Mine => {
                if !session.is_authenticated() {
                    return Err(StoreError::unauthenticated("log in to see your recipes"));
                }
                let recipes = self.store.list_own_recipes().await?;
                Event::Recipes {
                    title: "Your recipes".to_string(),
                    recipes,
                    viewer: session.current_user(),
                }
            }

            Command::Show { id } => Event::Detail {
                recipe: self.loaded_recipe(&id)?,
                viewer: session.current_user(),
            },

            Command::Create(mut fields) => {
                let cuisine_type_id = match fields.cuisine.take() {
                    Some(arg) => self.resolve_cuisine(&arg).await?,
                    None => String::new(),
                };
                let draft = fields.into_form(cuisine_type_id)?.into_draft()?;
                let id = self.store.create_recipe(draft).await?;
                Event::Notice(format!("Created recipe {}", id))
            }

            Command::Edit { id, mut fields } => {
                if fields.is_empty() {
                    let recipe = self.loaded_recipe(&id)?;
                    return Ok(Event::EditForm {
                        id,
                        form: RecipeForm::from_recipe(&recipe),
                    });
                }
                let cuisine_type_id = match fields.cuisine.take() {
                    Some(arg) => Some(self.resolve_cuisine(&arg).await?),
                    None => None,
                };
                let patch = fields.into_patch(cuisine_type_id)?;
                self.store.update_recipe(&id, patch).await?;
                Event::Notice(format!("Updated recipe {}", id))
            }

            Command::Delete { id } => {
                self.store.delete_recipe(&id).await?;
                Event::Notice(format!("Deleted recipe {}", id))
            }
        };
        Ok(event)
    }

    fn loaded_recipe(&self, id: &str) -> StoreResult<crate::models::Recipe> {
        self.store
            .find_recipe(id)
            .ok_or_else(|| StoreError::not_found("recipe", id))
    }

    /// Cuisine type id for a name or id, loading cuisine types if needed
    async fn resolve_cuisine(&self, arg: &str) -> StoreResult<String> {
        if let Some(id) = lookup_cuisine(&self.store.snapshot(), arg) {
            return Ok(id);
        }
        self.store.list_cuisine_types().await?;
        lookup_cuisine(&self.store.snapshot(), arg)
            .ok_or_else(|| {
                StoreError::validation(format!("unknown cuisine type '{}'", arg.trim()))
            })
    }
}

fn lookup_cuisine(state: &RecipeState, arg: &str) -> Option<String> {
    state
        .cuisine_type(arg.trim())
        .or_else(|| state.cuisine_type_named(arg))
        .map(|c| c.id.clone())
}
