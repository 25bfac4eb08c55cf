//! State machine module.

pub mod machine;

pub use machine::{BurnStage, BurnState};
