//! Workers Configuration Engine Library
//!
//! This module exports the core components for testing and integration.

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod format;
pub mod logging;
pub mod patch;
pub mod programmatic;
pub mod vars;
