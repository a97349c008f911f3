//! Structured error types for kmon
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::{PhysAddr, VirtAddr};
use thiserror::Error;

/// A memory access the simulated hardware refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("virtual address {va} is not mapped")]
    NotMapped { va: VirtAddr },

    #[error("virtual address {va} is mapped but not present")]
    NotPresent { va: VirtAddr },

    #[error("physical address {pa} is outside physical memory")]
    OutOfRange { pa: PhysAddr },
}

/// Failure of a single monitor command
///
/// None of these abort the monitor; the dispatcher reports them and the
/// REPL carries on with the next line.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Wrong arguments: {reason}")]
    Usage { usage: &'static str, reason: String },

    #[error("{0} is not mapped")]
    NotMapped(VirtAddr),

    #[error(transparent)]
    Fault(#[from] Fault),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Build a usage error for a command
    pub fn usage(usage: &'static str, reason: impl Into<String>) -> Self {
        CommandError::Usage { usage, reason: reason.into() }
    }

    /// Status code the dispatcher hands back for this failure
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            CommandError::Usage { .. } | CommandError::NotMapped(_) | CommandError::Fault(_) => 1,
            CommandError::Io(_) => -1,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Command '{0}' is registered more than once")]
    DuplicateName(&'static str),

    #[error("Command name must not be empty")]
    EmptyName,
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid snapshot field `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SnapshotError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SnapshotError::Invalid { field: field.into(), reason: reason.into() }
    }
}
