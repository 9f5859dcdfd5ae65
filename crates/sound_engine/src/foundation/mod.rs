//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Change-tracked values
//! - Collections and stable handles
//! - Time management
//! - Logging utilities

pub mod tracked;
pub mod collections;
pub mod time;
pub mod logging;

pub use tracked::Tracked;
