//! Application constants
//!
//! Centralized location for backend class names, wire field names and
//! configuration defaults.

use std::time::Duration;

/// Default Parse server (Back4App)
pub const DEFAULT_SERVER_URL: &str = "https://parseapi.back4app.com/";

/// Default request timeout for backend calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse caps unbounded queries at 100 rows; ask for more explicitly
pub const DEFAULT_QUERY_LIMIT: u32 = 1000;

/// Name of the per-user configuration directory under `$HOME`
pub const CONFIG_DIR_NAME: &str = ".daily-meals";

/// Configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Persisted session file inside the config directory
pub const SESSION_FILE_NAME: &str = "session.yaml";

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "daily-meals.log";

/// Environment variable holding the tracing filter
pub const LOG_FILTER_ENV: &str = "DAILY_MEALS_LOG";

/// Backend class holding recipes
pub const RECIPE_CLASS: &str = "Receita";

/// Backend class holding cuisine types
pub const CUISINE_TYPE_CLASS: &str = "TipoCozinha";

/// Backend class holding users
pub const USER_CLASS: &str = "_User";

/// Color shown for cuisine types seeded without one
pub const DEFAULT_CUISINE_COLOR: &str = "#ccc";

/// Shown wherever a referenced record could not be resolved
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Application name
pub const APP_NAME: &str = "Daily Meals";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
