//! # Sound Engine
//!
//! Keeps a stateful audio backend in sync with declarative, per-entity sound
//! descriptions.
//!
//! ## Features
//!
//! - **Declarative sounds**: entities carry a [`SoundSourceComponent`](ecs::components::SoundSourceComponent)
//!   listing named sounds and their desired properties
//! - **Change tracking**: only sounds whose properties changed are pushed
//! - **Lifecycle aware**: backend sounds are created on activation and
//!   destroyed on deactivation, entity removal or sound removal
//! - **Retry policy**: failed creations are retried with backoff and reported
//! - **Pluggable backends**: anything implementing [`SoundBackend`](audio::SoundBackend)
//!
//! ## Quick Start
//!
//! ```rust
//! use sound_engine::prelude::*;
//!
//! let mut state = GameState::new("level")
//!     .with_system(SceneNodeSystem::new())
//!     .with_system(SoundSourceSystem::new(MemoryBackend::new()));
//!
//! let world = state.world_mut();
//! let player = world.create_entity();
//! let mut source = SoundSourceComponent::new();
//! source.add_sound("bgm", "music.ogg").set_looped(true).play();
//! world.add_component(player, SceneNodeComponent::new());
//! world.add_component(player, source);
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.add_state(state).unwrap();
//! engine.switch_to("level").unwrap();
//! engine.tick(16).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::must_use_candidate)]

// Core engine modules
pub mod core;

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod scene;
pub mod audio;

mod engine;

pub use engine::{Engine, EngineError, GameState};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Engine, EngineError, GameState,
        foundation::{
            tracked::Tracked,
            time::Timer,
        },
        ecs::{World, Entity, Component, System, Query, EntityFilter},
        ecs::components::{PlayState, SceneNodeComponent, Sound, SoundProperties, SoundSourceComponent},
        ecs::systems::{SceneNodeSystem, SoundSourceSystem, SyncStats},
        scene::{SceneGraph, SceneId},
        audio::{AudioError, MemoryBackend, SoundBackend, SoundHandle},
        core::config::{ApplicationConfig, EngineConfig, SoundConfig, RetryPolicy},
        core::{Config, ConfigError},
    };
}
