//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Warming a model against a single document
//! - Inspecting the effective configuration

pub mod commands;
pub mod handlers;

pub use handlers::{handle_config, handle_warm, init_logging};
