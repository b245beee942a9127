//! Tabular log abstraction and an in-process implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::RecorderError;

/// One row of cells. Strings, numbers and booleans map to spreadsheet values.
pub type Row = Vec<serde_json::Value>;

/// A spreadsheet-like sink made of titled sheets of rows.
#[async_trait]
pub trait TabularLog: Send + Sync {
    /// Titles of all sheets, in sheet order.
    async fn sheet_titles(&self) -> Result<Vec<String>, RecorderError>;

    /// Add an empty sheet and return the id the backend assigned to it.
    /// Fails if `title` is already taken.
    async fn add_sheet(&self, title: &str) -> Result<u32, RecorderError>;

    /// Number of filled rows in sheet `title`. Fails if it does not exist.
    async fn row_count(&self, title: &str) -> Result<usize, RecorderError>;

    /// Append `rows` after the last non-empty row of sheet `title`.
    async fn append_rows(&self, title: &str, rows: Vec<Row>) -> Result<(), RecorderError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Sheet {
    id: u32,
    rows: Vec<Row>,
}

/// In-memory tabular log for tests and dry runs.
#[derive(Default)]
pub struct MemoryTabularLog {
    sheets: Mutex<BTreeMap<String, Sheet>>,
    order: Mutex<Vec<String>>,
}

impl MemoryTabularLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of sheet `title`, or `None` if it does not exist.
    pub async fn rows(&self, title: &str) -> Option<Vec<Row>> {
        self.sheets.lock().await.get(title).map(|sheet| sheet.rows.clone())
    }

    pub async fn sheet_id(&self, title: &str) -> Option<u32> {
        self.sheets.lock().await.get(title).map(|sheet| sheet.id)
    }
}

#[async_trait]
impl TabularLog for MemoryTabularLog {
    async fn sheet_titles(&self) -> Result<Vec<String>, RecorderError> {
        Ok(self.order.lock().await.clone())
    }

    async fn add_sheet(&self, title: &str) -> Result<u32, RecorderError> {
        let mut sheets = self.sheets.lock().await;
        if sheets.contains_key(title) {
            return Err(RecorderError::Sheet(format!("sheet '{title}' already exists")));
        }
        let sheet_id = sheets.values().map(|sheet| sheet.id).max().unwrap_or(0) + 1;
        sheets.insert(
            title.to_string(),
            Sheet {
                id: sheet_id,
                rows: Vec::new(),
            },
        );
        self.order.lock().await.push(title.to_string());
        Ok(sheet_id)
    }

    async fn row_count(&self, title: &str) -> Result<usize, RecorderError> {
        self.sheets
            .lock()
            .await
            .get(title)
            .map(|sheet| sheet.rows.len())
            .ok_or_else(|| RecorderError::Sheet(format!("no sheet named '{title}'")))
    }

    async fn append_rows(&self, title: &str, rows: Vec<Row>) -> Result<(), RecorderError> {
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .get_mut(title)
            .ok_or_else(|| RecorderError::Sheet(format!("no sheet named '{title}'")))?;
        sheet.rows.extend(rows);
        Ok(())
    }
}
