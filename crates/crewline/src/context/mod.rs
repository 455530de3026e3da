//! Context size control.
//!
//! Prompts are the main cost driver, so any free text that can grow without
//! bound (task descriptions, role backstories) goes through
//! [`prune_context`] before it reaches a model.

pub mod prune;

pub use prune::{DEFAULT_PRUNE_BUDGET, PRUNE_SENTINEL, prune_context};
