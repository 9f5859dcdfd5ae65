//! ECS Components
//!
//! Data attached to entities. Components hold no backend resources
//! themselves; systems own those and keep them in sync with the data here.

pub mod scene_node;
pub mod sound_source;
pub mod storage;

pub use scene_node::SceneNodeComponent;
pub use sound_source::{PlayState, RemovedSound, Sound, SoundProperties, SoundSourceComponent};
pub use storage::{SoundRecord, SoundSourceRecord, StorageError};
