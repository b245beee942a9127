//! # cohort-coordinator
//!
//! The study-round coordinator: every mutating command runs as
//! lock, transaction, load, validate, mutate, persist and commit, followed by
//! detached cache write-through and event publication.
//!
//! - [`Coordinator`]: pipelines and cache-aside reads
//! - [`validators`] and [`mutators`]: the building blocks commands compose
//! - [`commands`]: the declarative command registry

pub mod commands;
pub mod error;
pub mod mutators;
pub mod params;
mod service;
pub mod validators;

pub use commands::{COMMANDS, CommandOutcome, CommandSpec, find_command};
pub use error::CoordinatorError;
pub use params::UpdateParams;
pub use service::Coordinator;
