//! CLI for the paperpack backend

pub mod serve;

use clap::{Parser, Subcommand};

/// paperpack - e-bookkeeping archive backend
#[derive(Parser)]
#[command(name = "paperpack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,
}
