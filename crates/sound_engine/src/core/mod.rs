//! # Core Engine Module
//!
//! Shared abstractions used throughout the engine.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration system for all engine subsystems
//! - **Foundation**: Low-level utilities (tracked values, collections, time, logging)
//! - **ECS**: Entity-Component-System implementation

pub mod config;

// Re-export foundation modules for convenience
pub use crate::foundation;
pub use crate::ecs;

// Re-export commonly used config types
pub use config::{
    ApplicationConfig,
    EngineConfig,
    SoundConfig,
    RetryPolicy,
    Config,
    ConfigError,
};
