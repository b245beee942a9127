use crate::error::RecorderError;
use crate::handlers::PROGRESS_SHEET;
use crate::tabular::TabularLog;

/// Create the progress sheet if it is missing.
///
/// Returns `true` when the sheet was created by this call.
///
/// # Errors
///
/// Propagates any backend error from listing or adding sheets.
pub async fn bootstrap(log: &dyn TabularLog) -> Result<bool, RecorderError> {
    let titles = log.sheet_titles().await?;
    if titles.iter().any(|title| title == PROGRESS_SHEET) {
        tracing::debug!(sheet = PROGRESS_SHEET, "progress sheet present");
        return Ok(false);
    }
    let sheet_id = log.add_sheet(PROGRESS_SHEET).await?;
    tracing::info!(sheet = PROGRESS_SHEET, sheet_id, "progress sheet created");
    Ok(true)
}
