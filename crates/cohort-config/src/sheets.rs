//! Google Sheets (tabular log) configuration.

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetsConfig {
    /// Spreadsheet the recorder writes into.
    #[serde(default)]
    pub spreadsheet_id: String,

    /// OAuth access token with the spreadsheets scope.
    #[serde(default)]
    pub access_token: String,

    /// API root, overridable for proxies.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            access_token: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl SheetsConfig {
    pub fn is_configured(&self) -> bool {
        !self.spreadsheet_id.is_empty() && !self.access_token.is_empty()
    }
}
