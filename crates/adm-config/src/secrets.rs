//! Runtime secret resolution.
//!
//! Config YAML stores env var NAMES only (`database.url_env`). Binaries call
//! [`resolve_secrets`] once at startup and pass the result into constructors.
//! `Debug` redacts values and errors name the variable, never its value.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::sections::DatabaseConfig;

/// Secrets resolved from the environment for one process.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Name of the env var the database URL was read from.
    pub database_url_var: String,
    /// Postgres connection string. `None` if the var is unset or blank.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url_var", &self.database_url_var)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ResolvedSecrets {
    /// The database URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str> {
        match self.database_url.as_deref() {
            Some(url) => Ok(url),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
                self.database_url_var
            ),
        }
    }
}

/// Resolve a named environment variable; blank counts as unset.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every secret referenced by the config. Nothing is required at
/// this stage; callers that need the database use
/// [`ResolvedSecrets::require_database_url`].
pub fn resolve_secrets(config_json: &Value) -> ResolvedSecrets {
    let var = config_json
        .pointer("/database/url_env")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DatabaseConfig::default().url_env);

    ResolvedSecrets {
        database_url: resolve_env(&var),
        database_url_var: var,
    }
}
