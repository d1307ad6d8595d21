//! Verso CLI - apply versioned change logs from the command line.
//!
//! This crate provides the `verso` binary: argument and `verso.toml`
//! handling, logging setup, and the run summary printed after the change
//! log has been applied.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod run;
