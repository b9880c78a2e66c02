//! Student profile: the four-question collection flow and its store.
//!
//! A new session answers name, institution, grade and subject in order.
//! The answers build a `StudentProfile` whose academic level tailors every
//! answer the tutor gives afterwards.

pub mod model;
pub mod prompts;
pub mod state;
pub mod store;

pub use model::{AcademicLevel, ClassNumber, ProfileDraft, StudentProfile};
pub use state::{CollectionState, CollectionStep};
pub use store::{ProfileStore, SessionEntry, SessionPhase};
