pub mod dispatch;
pub mod exec;
pub mod recorder;
pub mod study;

use cohort_coordinator::CoordinatorError;

/// Prefix a coordinator error with its stable kind, so `{:#}` renders as
/// `round_not_found: ...`.
pub fn command_error(error: CoordinatorError) -> anyhow::Error {
    let kind = error.kind();
    anyhow::Error::new(error).context(kind)
}
