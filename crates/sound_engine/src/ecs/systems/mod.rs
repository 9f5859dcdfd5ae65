//! ECS Systems module

pub mod scene_node_system;
pub mod sound_source_system;

pub use scene_node_system::SceneNodeSystem;
pub use sound_source_system::{SoundSourceSystem, SyncStats};
