//! Audio backend abstraction
//!
//! The sound system never plays audio itself. It drives a stateful backend
//! that owns the real playback objects and hands out [`SoundHandle`]s for
//! them. Every backend operation is fallible; callers decide whether an error
//! is fatal.

pub mod memory_backend;

pub use memory_backend::{BackendCall, BackendStats, MemoryBackend, PlaybackState, VirtualSound};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::audio::AudioError;
use crate::scene::{NodeId, SceneId};

/// Sound handle for tracking backend sounds
///
/// A handle is only meaningful to the backend that created it and becomes
/// invalid once destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundHandle {
    /// Unique identifier for the sound
    pub id: u32,
    /// Generation counter for handle validation
    pub generation: u32,
}

impl SoundHandle {
    /// Create a new sound handle
    pub fn new(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }
}

impl fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sound({}v{})", self.id, self.generation)
    }
}

/// Parameters for creating a backend sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateSoundRequest<'a> {
    /// Logical name of the sound
    pub name: &'a str,
    /// Sound file to play
    pub filename: &'a str,
    /// Stream the file instead of decoding it up front
    pub stream: bool,
    /// Loop playback
    pub looped: bool,
    /// Prebuffer a streamed file on creation
    pub prebuffer: bool,
}

/// Audio backend trait for platform abstraction
///
/// # Threading
/// Not `Send + Sync`: the backend is owned by the game loop thread and only
/// mutated by the sound system.
pub trait SoundBackend {
    /// Bind to a scene (or unbind with `None`)
    ///
    /// Sounds can only be created while a scene is bound. Sounds created in
    /// a scene must be destroyed before unbinding it.
    fn set_scene(&mut self, scene: Option<SceneId>);

    /// Currently bound scene
    fn scene(&self) -> Option<SceneId>;

    /// Create a sound in the bound scene
    fn create_sound(&mut self, request: &CreateSoundRequest<'_>) -> Result<SoundHandle, AudioError>;

    /// Release a sound
    fn destroy_sound(&mut self, handle: SoundHandle) -> Result<(), AudioError>;

    /// Attach a sound to a scene node so it follows the node's placement
    fn attach(&mut self, handle: SoundHandle, node: NodeId) -> Result<(), AudioError>;

    /// Detach a sound from its node
    fn detach(&mut self, handle: SoundHandle) -> Result<(), AudioError>;

    /// Set volume (0.0 = silent, 1.0 = full volume)
    fn set_volume(&mut self, handle: SoundHandle, volume: f32) -> Result<(), AudioError>;

    /// Set the distance beyond which the sound is inaudible (-1 = unlimited)
    fn set_max_distance(&mut self, handle: SoundHandle, distance: f32) -> Result<(), AudioError>;

    /// Set the attenuation rolloff factor (-1 = backend default)
    fn set_rolloff_factor(&mut self, handle: SoundHandle, factor: f32) -> Result<(), AudioError>;

    /// Set the distance at which attenuation starts
    fn set_reference_distance(&mut self, handle: SoundHandle, distance: f32) -> Result<(), AudioError>;

    /// Set the voice priority
    fn set_priority(&mut self, handle: SoundHandle, priority: u8) -> Result<(), AudioError>;

    /// Position the sound relative to the listener instead of the world
    fn set_relative_to_listener(&mut self, handle: SoundHandle, relative: bool) -> Result<(), AudioError>;

    /// Start or resume playback
    fn play(&mut self, handle: SoundHandle) -> Result<(), AudioError>;

    /// Pause playback
    fn pause(&mut self, handle: SoundHandle) -> Result<(), AudioError>;

    /// Stop playback and rewind
    fn stop(&mut self, handle: SoundHandle) -> Result<(), AudioError>;
}

/// A backend shared between several game states
impl<B: SoundBackend> SoundBackend for Rc<RefCell<B>> {
    fn set_scene(&mut self, scene: Option<SceneId>) {
        self.borrow_mut().set_scene(scene);
    }

    fn scene(&self) -> Option<SceneId> {
        self.borrow().scene()
    }

    fn create_sound(&mut self, request: &CreateSoundRequest<'_>) -> Result<SoundHandle, AudioError> {
        self.borrow_mut().create_sound(request)
    }

    fn destroy_sound(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.borrow_mut().destroy_sound(handle)
    }

    fn attach(&mut self, handle: SoundHandle, node: NodeId) -> Result<(), AudioError> {
        self.borrow_mut().attach(handle, node)
    }

    fn detach(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.borrow_mut().detach(handle)
    }

    fn set_volume(&mut self, handle: SoundHandle, volume: f32) -> Result<(), AudioError> {
        self.borrow_mut().set_volume(handle, volume)
    }

    fn set_max_distance(&mut self, handle: SoundHandle, distance: f32) -> Result<(), AudioError> {
        self.borrow_mut().set_max_distance(handle, distance)
    }

    fn set_rolloff_factor(&mut self, handle: SoundHandle, factor: f32) -> Result<(), AudioError> {
        self.borrow_mut().set_rolloff_factor(handle, factor)
    }

    fn set_reference_distance(&mut self, handle: SoundHandle, distance: f32) -> Result<(), AudioError> {
        self.borrow_mut().set_reference_distance(handle, distance)
    }

    fn set_priority(&mut self, handle: SoundHandle, priority: u8) -> Result<(), AudioError> {
        self.borrow_mut().set_priority(handle, priority)
    }

    fn set_relative_to_listener(&mut self, handle: SoundHandle, relative: bool) -> Result<(), AudioError> {
        self.borrow_mut().set_relative_to_listener(handle, relative)
    }

    fn play(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.borrow_mut().play(handle)
    }

    fn pause(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.borrow_mut().pause(handle)
    }

    fn stop(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.borrow_mut().stop(handle)
    }
}
