//! Subcommand implementations.

pub(crate) mod classify;
pub(crate) mod config;
pub(crate) mod operate;
pub(crate) mod shell;
pub(crate) mod trust;
