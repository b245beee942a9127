//! Entity structs for the Cohort domain.
//!
//! `Study` and `Round` are separate persistence documents joined by
//! `Study::ongoing_round_id`; `Member` is embedded in its `Round`.

mod member;
mod round;
mod study;

pub use member::Member;
pub use round::Round;
pub use study::Study;
