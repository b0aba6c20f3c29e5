//! Command-line interface module.

mod args;
pub mod build;
mod common;
pub mod serve;

pub use args::{Cli, Commands, ServeArgs};
