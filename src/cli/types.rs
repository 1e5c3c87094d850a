//! CLI type definitions
//!
//! Clap structures for the `coverloop` command line.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::build::BuildArgs;
use super::commands::compare::CompareArgs;
use super::commands::cover::CoverArgs;

#[derive(Parser, Debug)]
#[command(name = "coverloop")]
#[command(about = "Recreate a reference song as a generated music pattern", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .coverloop/config.yaml)
    #[arg(short, long, global = true, env = "COVERLOOP_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Iteratively refine a pattern until it sounds like the reference
    Cover(CoverArgs),

    /// Build a pattern section by section from the reference's structure
    Build(BuildArgs),

    /// Score one feature set or audio file against another
    Compare(CompareArgs),
}
