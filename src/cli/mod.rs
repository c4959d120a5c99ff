//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{CheckCommand, MatrixCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Single pass/fail gate over a matrix of CI jobs
#[derive(Debug, Parser, Clone)]
#[command(name = "ci-gate")]
#[command(version)]
#[command(about = "Fan out a CI job matrix and report one aggregate status", long_about = None)]
pub struct Cli {
    /// Defaults to `check` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Decide the gate from results injected by the orchestrator
    Check(CheckCommand),

    /// Run the job matrix locally, then decide the gate
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// List the jobs a pipeline expands to
    Matrix(MatrixCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// The command to run, `check` with defaults when none was given
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Check(CheckCommand::default()))
    }
}
