//! Command-line interface for kmon
//!
//! This module contains CLI argument parsing and configuration

pub mod args;

pub use args::Args;
