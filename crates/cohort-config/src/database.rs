//! libSQL database configuration.

use serde::{Deserialize, Serialize};

fn default_path() -> String {
    ".cohort/cohort.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Local database file, or `:memory:`. Used when `url` is empty.
    #[serde(default = "default_path")]
    pub path: String,

    /// Remote database URL (e.g., `libsql://cohort-prod.turso.io`).
    #[serde(default)]
    pub url: String,

    /// Auth token for the remote database.
    #[serde(default)]
    pub auth_token: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            url: String::new(),
            auth_token: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// Whether a remote database should be used instead of the local file.
    pub fn is_remote(&self) -> bool {
        !self.url.is_empty() && !self.auth_token.is_empty()
    }
}
