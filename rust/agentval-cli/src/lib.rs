//! agentval CLI library.
//!
//! Shared functionality behind the `agentval` binary: config discovery,
//! trace loading and report rendering.

pub mod colors;
pub mod commands;
pub mod config;
