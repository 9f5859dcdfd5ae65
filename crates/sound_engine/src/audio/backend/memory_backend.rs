//! Headless audio backend
//!
//! Keeps every sound as plain data instead of producing audio. Used by the
//! demo and the tests: it records each call so callers can check exactly
//! which operations reached the backend, and it can be told to fail sound
//! creation on demand.
//!
//! # Example
//!
//! ```
//! use sound_engine::audio::backend::{CreateSoundRequest, MemoryBackend, SoundBackend};
//! use sound_engine::scene::SceneGraph;
//!
//! let scene = SceneGraph::new("level");
//! let mut backend = MemoryBackend::new();
//! backend.set_scene(Some(scene.id()));
//!
//! let handle = backend
//!     .create_sound(&CreateSoundRequest {
//!         name: "bgm",
//!         filename: "music.ogg",
//!         stream: true,
//!         looped: true,
//!         prebuffer: true,
//!     })
//!     .unwrap();
//! backend.set_volume(handle, 0.5).unwrap();
//! backend.play(handle).unwrap();
//!
//! assert!(backend.sound(handle).unwrap().is_playing());
//! backend.destroy_sound(handle).unwrap();
//! assert_eq!(backend.live_count(), 0);
//! ```

use std::collections::{BTreeMap, HashSet};

use super::{CreateSoundRequest, SoundBackend, SoundHandle};
use crate::audio::AudioError;
use crate::scene::{NodeId, SceneId};

/// Playback state of a virtual sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not playing, rewound
    #[default]
    Stopped,
    /// Playing
    Playing,
    /// Paused at the current position
    Paused,
}

/// State of one sound held by the [`MemoryBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualSound {
    /// Logical name
    pub name: String,
    /// File the sound was created from
    pub filename: String,
    /// Created as a stream
    pub stream: bool,
    /// Created looping
    pub looped: bool,
    /// Created prebuffered
    pub prebuffer: bool,
    /// Scene the sound was created in
    pub scene: SceneId,
    /// Node the sound is attached to
    pub node: Option<NodeId>,
    /// Volume
    pub volume: f32,
    /// Maximum audible distance
    pub max_distance: f32,
    /// Rolloff factor
    pub rolloff_factor: f32,
    /// Reference distance
    pub reference_distance: f32,
    /// Priority
    pub priority: u8,
    /// Positioned relative to the listener
    pub relative_to_listener: bool,
    /// Playback state
    pub state: PlaybackState,
}

impl VirtualSound {
    /// Whether the sound is playing
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

/// One call that reached the backend
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum BackendCall {
    SetScene(Option<SceneId>),
    Create { handle: SoundHandle, name: String },
    Destroy(SoundHandle),
    Attach(SoundHandle, NodeId),
    Detach(SoundHandle),
    SetVolume(SoundHandle, f32),
    SetMaxDistance(SoundHandle, f32),
    SetRolloffFactor(SoundHandle, f32),
    SetReferenceDistance(SoundHandle, f32),
    SetPriority(SoundHandle, u8),
    SetRelativeToListener(SoundHandle, bool),
    Play(SoundHandle),
    Pause(SoundHandle),
    Stop(SoundHandle),
}

impl BackendCall {
    /// Whether this call pushed a property value
    pub fn is_property_push(&self) -> bool {
        matches!(
            self,
            Self::SetVolume(..)
                | Self::SetMaxDistance(..)
                | Self::SetRolloffFactor(..)
                | Self::SetReferenceDistance(..)
                | Self::SetPriority(..)
        )
    }

    /// Whether this call changed the playback state
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Play(_) | Self::Pause(_) | Self::Stop(_))
    }
}

/// Counters for everything the backend did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendStats {
    /// Sounds created
    pub created: u64,
    /// Sounds destroyed
    pub destroyed: u64,
    /// Creations refused
    pub failed_creations: u64,
    /// Calls made with a handle that was not live (double destroys included)
    pub invalid_handle_calls: u64,
    /// Property values pushed
    pub property_pushes: u64,
    /// play/pause/stop calls
    pub dispatches: u64,
    /// Sounds still alive when their scene was unbound
    pub leaked_on_unbind: u64,
}

/// Headless, recording audio backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    scene: Option<SceneId>,
    sounds: BTreeMap<SoundHandle, VirtualSound>,
    next_id: u32,
    generation: u32,
    failing_files: HashSet<String>,
    fail_next: u32,
    stats: BackendStats,
    calls: Vec<BackendCall>,
}

impl MemoryBackend {
    /// Create a new backend with no scene bound
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every creation for `filename` until cleared
    pub fn fail_file(&mut self, filename: impl Into<String>) {
        self.failing_files.insert(filename.into());
    }

    /// Refuse the next `count` creations, whatever the file
    pub fn fail_next_creations(&mut self, count: u32) {
        self.fail_next = count;
    }

    /// Stop injecting creation failures
    pub fn clear_failures(&mut self) {
        self.failing_files.clear();
        self.fail_next = 0;
    }

    /// Look up a live sound
    pub fn sound(&self, handle: SoundHandle) -> Option<&VirtualSound> {
        self.sounds.get(&handle)
    }

    /// Find a live sound by its logical name
    ///
    /// Returns the oldest match if several entities use the same name.
    pub fn find_sound(&self, name: &str) -> Option<(SoundHandle, &VirtualSound)> {
        self.sounds
            .iter()
            .find(|(_, sound)| sound.name == name)
            .map(|(handle, sound)| (*handle, sound))
    }

    /// Whether the handle refers to a live sound
    pub fn is_live(&self, handle: SoundHandle) -> bool {
        self.sounds.contains_key(&handle)
    }

    /// Iterate over live sounds in creation order
    pub fn live_sounds(&self) -> impl Iterator<Item = (&SoundHandle, &VirtualSound)> {
        self.sounds.iter()
    }

    /// Number of live sounds
    pub fn live_count(&self) -> usize {
        self.sounds.len()
    }

    /// Counters
    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// Every call since the last [`Self::clear_calls`]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Calls that concern one handle
    pub fn calls_for(&self, handle: SoundHandle) -> Vec<&BackendCall> {
        self.calls
            .iter()
            .filter(|call| call.handle() == Some(handle))
            .collect()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn sound_mut(&mut self, handle: SoundHandle) -> Result<&mut VirtualSound, AudioError> {
        match self.sounds.get_mut(&handle) {
            Some(sound) => Ok(sound),
            None => {
                self.stats.invalid_handle_calls += 1;
                Err(AudioError::InvalidHandle)
            }
        }
    }

    fn push_property(
        &mut self,
        call: BackendCall,
        handle: SoundHandle,
        apply: impl FnOnce(&mut VirtualSound),
    ) -> Result<(), AudioError> {
        self.calls.push(call);
        apply(self.sound_mut(handle)?);
        self.stats.property_pushes += 1;
        Ok(())
    }

    fn dispatch(&mut self, call: BackendCall, handle: SoundHandle, state: PlaybackState) -> Result<(), AudioError> {
        self.calls.push(call);
        self.sound_mut(handle)?.state = state;
        self.stats.dispatches += 1;
        Ok(())
    }

    fn refuse(&mut self, request: &CreateSoundRequest<'_>, reason: &str) -> AudioError {
        self.stats.failed_creations += 1;
        AudioError::CreationFailed {
            name: request.name.to_string(),
            filename: request.filename.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl BackendCall {
    fn handle(&self) -> Option<SoundHandle> {
        match self {
            Self::SetScene(_) => None,
            Self::Create { handle, .. } => Some(*handle),
            Self::Destroy(handle)
            | Self::Attach(handle, _)
            | Self::Detach(handle)
            | Self::SetVolume(handle, _)
            | Self::SetMaxDistance(handle, _)
            | Self::SetRolloffFactor(handle, _)
            | Self::SetReferenceDistance(handle, _)
            | Self::SetPriority(handle, _)
            | Self::SetRelativeToListener(handle, _)
            | Self::Play(handle)
            | Self::Pause(handle)
            | Self::Stop(handle) => Some(*handle),
        }
    }
}

impl SoundBackend for MemoryBackend {
    fn set_scene(&mut self, scene: Option<SceneId>) {
        self.calls.push(BackendCall::SetScene(scene));
        if self.scene == scene {
            return;
        }

        if let Some(previous) = self.scene {
            let leaked = self.sounds.values().filter(|sound| sound.scene == previous).count();
            if leaked > 0 {
                log::warn!("{} sounds still alive while unbinding {}", leaked, previous);
                self.stats.leaked_on_unbind += leaked as u64;
            }
        }

        self.scene = scene;
        if scene.is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
    }

    fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    fn create_sound(&mut self, request: &CreateSoundRequest<'_>) -> Result<SoundHandle, AudioError> {
        let Some(scene) = self.scene else {
            self.stats.failed_creations += 1;
            return Err(AudioError::NoScene);
        };
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(self.refuse(request, "injected failure"));
        }
        if self.failing_files.contains(request.filename) {
            return Err(self.refuse(request, "file cannot be opened"));
        }

        let handle = SoundHandle::new(self.next_id, self.generation);
        self.next_id = self.next_id.wrapping_add(1);
        self.sounds.insert(
            handle,
            VirtualSound {
                name: request.name.to_string(),
                filename: request.filename.to_string(),
                stream: request.stream,
                looped: request.looped,
                prebuffer: request.prebuffer,
                scene,
                node: None,
                volume: 1.0,
                max_distance: -1.0,
                rolloff_factor: -1.0,
                reference_distance: 100.0,
                priority: 0,
                relative_to_listener: false,
                state: PlaybackState::Stopped,
            },
        );
        self.stats.created += 1;
        self.calls.push(BackendCall::Create {
            handle,
            name: request.name.to_string(),
        });
        Ok(handle)
    }

    fn destroy_sound(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.calls.push(BackendCall::Destroy(handle));
        if self.sounds.remove(&handle).is_none() {
            self.stats.invalid_handle_calls += 1;
            return Err(AudioError::InvalidHandle);
        }
        self.stats.destroyed += 1;
        Ok(())
    }

    fn attach(&mut self, handle: SoundHandle, node: NodeId) -> Result<(), AudioError> {
        self.calls.push(BackendCall::Attach(handle, node));
        self.sound_mut(handle)?.node = Some(node);
        Ok(())
    }

    fn detach(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.calls.push(BackendCall::Detach(handle));
        self.sound_mut(handle)?.node = None;
        Ok(())
    }

    fn set_volume(&mut self, handle: SoundHandle, volume: f32) -> Result<(), AudioError> {
        self.push_property(BackendCall::SetVolume(handle, volume), handle, |sound| {
            sound.volume = volume;
        })
    }

    fn set_max_distance(&mut self, handle: SoundHandle, distance: f32) -> Result<(), AudioError> {
        self.push_property(BackendCall::SetMaxDistance(handle, distance), handle, |sound| {
            sound.max_distance = distance;
        })
    }

    fn set_rolloff_factor(&mut self, handle: SoundHandle, factor: f32) -> Result<(), AudioError> {
        self.push_property(BackendCall::SetRolloffFactor(handle, factor), handle, |sound| {
            sound.rolloff_factor = factor;
        })
    }

    fn set_reference_distance(&mut self, handle: SoundHandle, distance: f32) -> Result<(), AudioError> {
        self.push_property(BackendCall::SetReferenceDistance(handle, distance), handle, |sound| {
            sound.reference_distance = distance;
        })
    }

    fn set_priority(&mut self, handle: SoundHandle, priority: u8) -> Result<(), AudioError> {
        self.push_property(BackendCall::SetPriority(handle, priority), handle, |sound| {
            sound.priority = priority;
        })
    }

    fn set_relative_to_listener(&mut self, handle: SoundHandle, relative: bool) -> Result<(), AudioError> {
        self.calls.push(BackendCall::SetRelativeToListener(handle, relative));
        self.sound_mut(handle)?.relative_to_listener = relative;
        Ok(())
    }

    fn play(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.dispatch(BackendCall::Play(handle), handle, PlaybackState::Playing)
    }

    fn pause(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.dispatch(BackendCall::Pause(handle), handle, PlaybackState::Paused)
    }

    fn stop(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.dispatch(BackendCall::Stop(handle), handle, PlaybackState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;
    use approx::assert_relative_eq;

    fn request(name: &'static str, filename: &'static str) -> CreateSoundRequest<'static> {
        CreateSoundRequest {
            name,
            filename,
            stream: true,
            looped: false,
            prebuffer: true,
        }
    }

    fn bound_backend() -> (MemoryBackend, SceneGraph) {
        let scene = SceneGraph::new("test");
        let mut backend = MemoryBackend::new();
        backend.set_scene(Some(scene.id()));
        (backend, scene)
    }

    #[test]
    fn test_creation_requires_scene() {
        let mut backend = MemoryBackend::new();
        let result = backend.create_sound(&request("bgm", "music.ogg"));
        assert!(matches!(result, Err(AudioError::NoScene)));
        assert_eq!(backend.stats().failed_creations, 1);
    }

    #[test]
    fn test_property_pushes_update_state() {
        let (mut backend, _scene) = bound_backend();
        let handle = backend.create_sound(&request("bgm", "music.ogg")).unwrap();

        backend.set_volume(handle, 0.25).unwrap();
        backend.set_max_distance(handle, 50.0).unwrap();
        backend.set_priority(handle, 3).unwrap();
        backend.pause(handle).unwrap();

        let sound = backend.sound(handle).unwrap();
        assert_relative_eq!(sound.volume, 0.25);
        assert_relative_eq!(sound.max_distance, 50.0);
        assert_eq!(sound.priority, 3);
        assert_eq!(sound.state, PlaybackState::Paused);
        assert_eq!(backend.stats().property_pushes, 3);
        assert_eq!(backend.stats().dispatches, 1);
    }

    #[test]
    fn test_double_destroy_is_reported() {
        let (mut backend, _scene) = bound_backend();
        let handle = backend.create_sound(&request("bgm", "music.ogg")).unwrap();

        assert!(backend.destroy_sound(handle).is_ok());
        assert!(matches!(backend.destroy_sound(handle), Err(AudioError::InvalidHandle)));
        assert!(backend.play(handle).is_err());

        let stats = backend.stats();
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.invalid_handle_calls, 2);
    }

    #[test]
    fn test_failure_injection() {
        let (mut backend, _scene) = bound_backend();
        backend.fail_file("broken.ogg");
        backend.fail_next_creations(1);

        assert!(backend.create_sound(&request("a", "fine.ogg")).is_err());
        assert!(backend.create_sound(&request("a", "fine.ogg")).is_ok());
        assert!(matches!(
            backend.create_sound(&request("b", "broken.ogg")),
            Err(AudioError::CreationFailed { .. })
        ));

        backend.clear_failures();
        assert!(backend.create_sound(&request("b", "broken.ogg")).is_ok());
        assert_eq!(backend.stats().failed_creations, 2);
    }

    #[test]
    fn test_unbinding_with_live_sounds_counts_leaks() {
        let (mut backend, _scene) = bound_backend();
        backend.create_sound(&request("bgm", "music.ogg")).unwrap();

        backend.set_scene(None);
        assert_eq!(backend.stats().leaked_on_unbind, 1);
    }

    #[test]
    fn test_handles_carry_binding_generation() {
        let (mut backend, _scene) = bound_backend();
        let first = backend.create_sound(&request("a", "a.ogg")).unwrap();
        backend.destroy_sound(first).unwrap();

        let other = SceneGraph::new("other");
        backend.set_scene(Some(other.id()));
        let second = backend.create_sound(&request("a", "a.ogg")).unwrap();

        assert_ne!(first.generation, second.generation);
        assert_eq!(backend.find_sound("a").map(|(handle, _)| handle), Some(second));
        assert_eq!(backend.calls_for(second).len(), 1);
    }
}
