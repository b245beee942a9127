//! # cohort-core
//!
//! Core types shared across all Cohort crates:
//! - Entity structs for the study round domain (`Study`, `Round`, `Member`)
//! - The `Stage` enum and its linear state machine
//! - The `RoundError` taxonomy surfaced to chat adapters
//! - Event topics and the JSON envelope carried on the bus

pub mod entities;
pub mod enums;
pub mod errors;
pub mod events;
