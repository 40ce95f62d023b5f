//! # Glucolog Common Library
//!
//! Shared code for the glucolog service including:
//! - Database layer (pool initialization, readings repository)
//! - Event types (GlucoseEvent enum) and EventBus
//! - Error taxonomy
//! - Configuration loading and root folder resolution
//! - Time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
