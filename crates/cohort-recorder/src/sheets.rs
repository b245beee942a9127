//! Google Sheets v4 REST client.
//!
//! Only four endpoints are used: spreadsheet metadata (sheet titles),
//! `batchUpdate` with an `addSheet` request, `values.get` on column A to count
//! filled rows, and `values:append`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use cohort_config::SheetsConfig;

use crate::error::RecorderError;
use crate::tabular::{Row, TabularLog};

pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<Reply>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    add_sheet: Option<AddSheetReply>,
}

#[derive(Deserialize)]
struct AddSheetReply {
    properties: AddedSheet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddedSheet {
    sheet_id: u32,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn quoted_range(title: &str, cells: &str) -> String {
    let range = format!("'{}'!{cells}", title.replace('\'', "''"));
    urlencoding::encode(&range).into_owned()
}

impl SheetsClient {
    /// Build a client for the configured spreadsheet.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when the spreadsheet id or access token is missing, or
    /// `Http` if the HTTP client cannot be built.
    pub fn new(config: &SheetsConfig) -> Result<Self, RecorderError> {
        if !config.is_configured() {
            return Err(RecorderError::NotConfigured(
                "sheets.spreadsheet_id and sheets.access_token are required".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent("cohort/0.1")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_id)
    }

    fn titles_url(&self) -> String {
        format!("{}?fields=sheets.properties.title", self.spreadsheet_url())
    }

    fn batch_update_url(&self) -> String {
        format!("{}:batchUpdate", self.spreadsheet_url())
    }

    fn append_url(&self, title: &str) -> String {
        format!(
            "{}/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.spreadsheet_url(),
            quoted_range(title, "A1")
        )
    }

    fn column_url(&self, title: &str) -> String {
        format!(
            "{}/values/{}?majorDimension=ROWS",
            self.spreadsheet_url(),
            quoted_range(title, "A:A")
        )
    }
}

/// Map any status other than 200 to [`RecorderError::Api`].
///
/// # Errors
///
/// `Api` with the status code and response body.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, RecorderError> {
    if resp.status() != reqwest::StatusCode::OK {
        return Err(RecorderError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

#[async_trait]
impl TabularLog for SheetsClient {
    async fn sheet_titles(&self) -> Result<Vec<String>, RecorderError> {
        let resp = self
            .http
            .get(self.titles_url())
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let meta: SpreadsheetMeta = check_response(resp).await?.json().await?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }

    async fn add_sheet(&self, title: &str) -> Result<u32, RecorderError> {
        // No sheetId in the request: the API picks one that is free.
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        let resp = self
            .http
            .post(self.batch_update_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let reply: BatchUpdateResponse = check_response(resp).await?.json().await?;
        let sheet_id = reply
            .replies
            .into_iter()
            .find_map(|reply| reply.add_sheet)
            .map(|added| added.properties.sheet_id)
            .ok_or_else(|| RecorderError::Sheet(format!("no addSheet reply for '{title}'")))?;
        tracing::info!(sheet_id, title, "sheet added");
        Ok(sheet_id)
    }

    async fn row_count(&self, title: &str) -> Result<usize, RecorderError> {
        let resp = self
            .http
            .get(self.column_url(title))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let range: ValueRange = check_response(resp).await?.json().await?;
        Ok(range.values.len())
    }

    async fn append_rows(&self, title: &str, rows: Vec<Row>) -> Result<(), RecorderError> {
        let count = rows.len();
        let body = json!({ "majorDimension": "ROWS", "values": rows });
        let resp = self
            .http
            .post(self.append_url(title))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        check_response(resp).await?;
        tracing::debug!(title, rows = count, "rows appended");
        Ok(())
    }
}
