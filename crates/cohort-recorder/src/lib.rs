//! # cohort-recorder
//!
//! Materializes round history into a spreadsheet.
//!
//! - [`TabularLog`]: titled sheets of rows, backed by Google Sheets
//!   ([`SheetsClient`]) or memory ([`MemoryTabularLog`]).
//! - [`Mapper`]: topic to [`Handler`] lookup.
//! - [`Subscriber`]: the loop that feeds bus messages to handlers.

mod bootstrap;
mod error;
pub mod handlers;
mod mapper;
mod sheets;
mod subscriber;
mod tabular;

pub use bootstrap::bootstrap;
pub use error::RecorderError;
pub use handlers::{Handler, PROGRESS_SHEET, ProgressHandler, RoundClosedHandler};
pub use mapper::Mapper;
pub use sheets::{SheetsClient, check_response};
pub use subscriber::{DEFAULT_HANDLER_TIMEOUT, RunStats, Subscriber};
pub use tabular::{MemoryTabularLog, Row, TabularLog};
