//! Audio system
//!
//! Backend abstraction plus the bookkeeping that maps entity sounds to live
//! backend handles. Playback itself is entirely up to the backend.

pub mod backend;
pub mod resources;

pub use backend::{CreateSoundRequest, MemoryBackend, SoundBackend, SoundHandle};
pub use resources::{FailedSound, RestoreOutcome, SoundResourceManager};

/// Audio errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No scene is bound to the backend
    #[error("No scene bound to the audio backend")]
    NoScene,

    /// Handle does not refer to a live sound
    #[error("Invalid sound handle")]
    InvalidHandle,

    /// The backend could not create the sound
    #[error("Failed to create sound '{name}' from '{filename}': {reason}")]
    CreationFailed {
        /// Logical sound name
        name: String,
        /// Requested file
        filename: String,
        /// Backend specific reason
        reason: String,
    },
}
