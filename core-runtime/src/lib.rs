//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the bridge crates:
//! - Logging and tracing setup
//! - Redaction helpers for sensitive log fields
//!
//! ## Overview
//!
//! The bridge crates only emit `tracing` events and spans. Installing a
//! subscriber is left to the application, which can use
//! [`logging::init_logging`] to get the filter and output formats used
//! across this workspace.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
