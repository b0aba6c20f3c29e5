//! Small helpers shared across modules.

pub mod exec;
pub mod path;
