//! Errors raised while loading or checking Cohort configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A TOML file or `COHORT_*` variable could not be read into the config.
    #[error("failed to load cohort configuration: {0}")]
    Load(#[from] figment::Error),

    /// The recorder was started without one of its collaborators.
    #[error("the recorder needs [{section}] configured")]
    MissingSection { section: &'static str },

    /// A value the coordinator, bus or recorder cannot run with.
    #[error("{field} {reason}")]
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) const fn out_of_range(field: &'static str, reason: &'static str) -> Self {
        Self::OutOfRange { field, reason }
    }
}
