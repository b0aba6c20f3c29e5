//! jemdoc-autoreload - a local development server for jemdoc sites.

mod cli;
mod compiler;
mod config;
mod logger;
mod project;
mod rebuild;
mod serve;
mod supervisor;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::Serve { path, serve_args } => cli::serve::serve_site(path, serve_args),
        Commands::Build { path } => cli::build::build_site(path),
    }
}
