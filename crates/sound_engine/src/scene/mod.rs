//! Scene management
//!
//! Each game state owns one [`SceneGraph`]. ECS systems create nodes in it
//! for their entities and the audio backend attaches sounds to those nodes.
//!
//! ## Architecture
//!
//! ```text
//! ECS World (Gameplay)
//!      ↓
//! Scene Graph (Placement)
//!      ↓
//! Sound Backend (Playback)
//! ```

mod scene_graph;

pub use scene_graph::{SceneGraph, SceneId, SceneNode};
pub use crate::foundation::collections::NodeId;
