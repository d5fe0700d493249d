//! CLI module for bulkrun - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running a batch and
//! validating an input file without processing it.

pub mod commands;

pub use commands::Cli;
