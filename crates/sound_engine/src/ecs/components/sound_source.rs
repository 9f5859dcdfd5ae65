//! Sound source component
//!
//! Declarative description of the sounds an entity should emit. Gameplay
//! code edits these descriptors freely; the
//! [`SoundSourceSystem`](crate::ecs::systems::SoundSourceSystem) reconciles
//! them with the audio backend once per tick.
//!
//! ```
//! use sound_engine::ecs::components::{PlayState, SoundSourceComponent};
//!
//! let mut source = SoundSourceComponent::new();
//! source.add_sound("bgm", "music.ogg").set_looped(true).set_volume(0.8).play();
//!
//! let bgm = source.sound("bgm").unwrap();
//! assert_eq!(bgm.play_state(), PlayState::Play);
//! assert!(bgm.has_changes());
//! ```

use std::collections::btree_map::{BTreeMap, Entry};

use crate::audio::SoundHandle;
use crate::foundation::Tracked;

/// Requested playback state of a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i16)]
pub enum PlayState {
    /// Playing
    Play = 0,
    /// Paused at the current position
    Pause = 1,
    /// Stopped
    #[default]
    Stop = 2,
}

impl From<PlayState> for i16 {
    fn from(state: PlayState) -> Self {
        state as i16
    }
}

impl TryFrom<i16> for PlayState {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Play),
            1 => Ok(Self::Pause),
            2 => Ok(Self::Stop),
            other => Err(other),
        }
    }
}

/// Playback properties of a sound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundProperties {
    /// Requested playback state
    pub play_state: PlayState,
    /// Loop playback (only applied when the backend sound is created)
    pub looped: bool,
    /// Volume (0.0 = silent, 1.0 = full volume)
    pub volume: f32,
    /// Distance beyond which the sound is inaudible (-1 = unlimited)
    pub max_distance: f32,
    /// Attenuation rolloff factor (-1 = backend default)
    pub rolloff_factor: f32,
    /// Distance at which attenuation starts
    pub reference_distance: f32,
    /// Voice priority
    pub priority: u8,
}

impl SoundProperties {
    /// Default properties: stopped, not looping, full volume
    pub const fn new() -> Self {
        Self {
            play_state: PlayState::Stop,
            looped: false,
            volume: 1.0,
            max_distance: -1.0,
            rolloff_factor: -1.0,
            reference_distance: 100.0,
            priority: 0,
        }
    }
}

impl Default for SoundProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// One named sound of a [`SoundSourceComponent`]
///
/// Every setter marks the properties as changed, even when the value is the
/// same. The sound system pushes changed properties to the backend and
/// clears the flag.
#[derive(Debug)]
pub struct Sound {
    name: String,
    filename: String,
    properties: Tracked<SoundProperties>,
    pub(crate) handle: Option<SoundHandle>,
}

impl Sound {
    /// Create a sound with default properties
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::with_properties(name, filename, SoundProperties::new())
    }

    /// Create a sound with the given properties
    pub fn with_properties(
        name: impl Into<String>,
        filename: impl Into<String>,
        properties: SoundProperties,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            properties: Tracked::new(properties),
            handle: None,
        }
    }

    /// Unique name within the owning component
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sound file
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Current properties
    pub fn properties(&self) -> &SoundProperties {
        self.properties.get()
    }

    /// Mutable properties; marks them as changed
    pub fn properties_mut(&mut self) -> &mut SoundProperties {
        self.properties.get_mut()
    }

    /// Requested playback state
    pub fn play_state(&self) -> PlayState {
        self.properties.play_state
    }

    /// Whether properties changed since they were last pushed
    pub fn has_changes(&self) -> bool {
        self.properties.has_changes()
    }

    /// Backend handle, if the sound currently exists in the backend
    pub fn handle(&self) -> Option<SoundHandle> {
        self.handle
    }

    /// Request playback
    pub fn play(&mut self) -> &mut Self {
        self.set_play_state(PlayState::Play)
    }

    /// Request pause
    pub fn pause(&mut self) -> &mut Self {
        self.set_play_state(PlayState::Pause)
    }

    /// Request stop
    pub fn stop(&mut self) -> &mut Self {
        self.set_play_state(PlayState::Stop)
    }

    /// Set the requested playback state
    pub fn set_play_state(&mut self, state: PlayState) -> &mut Self {
        self.properties.get_mut().play_state = state;
        self
    }

    /// Set looping; takes effect the next time the backend sound is created
    pub fn set_looped(&mut self, looped: bool) -> &mut Self {
        self.properties.get_mut().looped = looped;
        self
    }

    /// Set volume
    pub fn set_volume(&mut self, volume: f32) -> &mut Self {
        self.properties.get_mut().volume = volume;
        self
    }

    /// Set maximum audible distance
    pub fn set_max_distance(&mut self, distance: f32) -> &mut Self {
        self.properties.get_mut().max_distance = distance;
        self
    }

    /// Set rolloff factor
    pub fn set_rolloff_factor(&mut self, factor: f32) -> &mut Self {
        self.properties.get_mut().rolloff_factor = factor;
        self
    }

    /// Set reference distance
    pub fn set_reference_distance(&mut self, distance: f32) -> &mut Self {
        self.properties.get_mut().reference_distance = distance;
        self
    }

    /// Set priority
    pub fn set_priority(&mut self, priority: u8) -> &mut Self {
        self.properties.get_mut().priority = priority;
        self
    }

    pub(crate) fn touch(&mut self) {
        self.properties.touch();
    }

    pub(crate) fn untouch(&mut self) {
        self.properties.untouch();
    }
}

/// A sound removed from a component that the sound system has not seen yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedSound {
    /// Name the sound had
    pub name: String,
    /// Backend handle it held when removed
    pub handle: Option<SoundHandle>,
}

/// Sound source component
///
/// Owns a set of [`Sound`]s keyed by name. Adding and removing sounds is
/// recorded in queues that the sound system drains every tick.
#[derive(Debug)]
pub struct SoundSourceComponent {
    sounds: BTreeMap<String, Sound>,
    added: Vec<String>,
    removed: Vec<RemovedSound>,
    relative_to_listener: Tracked<bool>,
}

impl SoundSourceComponent {
    /// Create an empty sound source, positioned relative to the listener
    pub fn new() -> Self {
        Self {
            sounds: BTreeMap::new(),
            added: Vec::new(),
            removed: Vec::new(),
            relative_to_listener: Tracked::new(true),
        }
    }

    /// Add a sound and return it for configuration
    ///
    /// A sound with the same name is replaced.
    pub fn add_sound(&mut self, name: impl Into<String>, filename: impl Into<String>) -> &mut Sound {
        self.place(Sound::new(name, filename))
    }

    /// Add a fully built sound, replacing one with the same name
    pub fn insert_sound(&mut self, sound: Sound) -> &mut Sound {
        self.place(sound)
    }

    fn place(&mut self, mut sound: Sound) -> &mut Sound {
        sound.handle = None;
        if !self.added.contains(&sound.name) {
            self.added.push(sound.name.clone());
        }
        match self.sounds.entry(sound.name.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(sound);
                self.removed.push(RemovedSound {
                    name: previous.name,
                    handle: previous.handle,
                });
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(sound),
        }
    }

    /// Remove a sound; does nothing if there is none with that name
    pub fn remove_sound(&mut self, name: &str) -> Option<Sound> {
        let sound = self.sounds.remove(name)?;
        self.added.retain(|added| added != name);
        self.removed.push(RemovedSound {
            name: name.to_string(),
            handle: sound.handle,
        });
        Some(sound)
    }

    /// Look up a sound
    pub fn sound(&self, name: &str) -> Option<&Sound> {
        self.sounds.get(name)
    }

    /// Look up a sound for editing
    pub fn sound_mut(&mut self, name: &str) -> Option<&mut Sound> {
        self.sounds.get_mut(name)
    }

    /// Iterate over all sounds ordered by name
    pub fn sounds(&self) -> impl Iterator<Item = &Sound> {
        self.sounds.values()
    }

    /// Number of sounds
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    /// Whether there are no sounds
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Whether sounds are positioned relative to the listener
    pub fn relative_to_listener(&self) -> bool {
        *self.relative_to_listener
    }

    /// Position sounds relative to the listener instead of the world
    pub fn set_relative_to_listener(&mut self, relative: bool) {
        self.relative_to_listener.set(relative);
    }

    /// Names added since the sound system last looked
    pub fn added_sounds(&self) -> &[String] {
        &self.added
    }

    /// Sounds removed since the sound system last looked
    pub fn removed_sounds(&self) -> &[RemovedSound] {
        &self.removed
    }

    pub(crate) fn sounds_mut(&mut self) -> impl Iterator<Item = &mut Sound> {
        self.sounds.values_mut()
    }

    pub(crate) fn take_added(&mut self) -> Vec<String> {
        std::mem::take(&mut self.added)
    }

    pub(crate) fn take_removed(&mut self) -> Vec<RemovedSound> {
        std::mem::take(&mut self.removed)
    }

    pub(crate) fn relative_to_listener_tracked(&mut self) -> &mut Tracked<bool> {
        &mut self.relative_to_listener
    }

    /// Forget every backend handle reference
    pub(crate) fn clear_handles(&mut self) {
        for sound in self.sounds.values_mut() {
            sound.handle = None;
        }
    }
}

impl Default for SoundSourceComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_properties() {
        let sound = Sound::new("bgm", "music.ogg");
        let properties = sound.properties();

        assert_eq!(properties.play_state, PlayState::Stop);
        assert!(!properties.looped);
        assert_relative_eq!(properties.volume, 1.0);
        assert_relative_eq!(properties.max_distance, -1.0);
        assert_relative_eq!(properties.rolloff_factor, -1.0);
        assert_relative_eq!(properties.reference_distance, 100.0);
        assert_eq!(properties.priority, 0);
        assert!(sound.has_changes());
        assert!(sound.handle().is_none());
    }

    #[test]
    fn test_setters_mark_changes() {
        let mut sound = Sound::new("bgm", "music.ogg");
        sound.untouch();
        assert!(!sound.has_changes());

        sound.set_priority(4);
        assert!(sound.has_changes());
        sound.untouch();

        sound.pause();
        assert!(sound.has_changes());
        assert_eq!(sound.play_state(), PlayState::Pause);
    }

    #[test]
    fn test_play_state_codes() {
        assert_eq!(i16::from(PlayState::Play), 0);
        assert_eq!(i16::from(PlayState::Stop), 2);
        assert_eq!(PlayState::try_from(1), Ok(PlayState::Pause));
        assert_eq!(PlayState::try_from(7), Err(7));
    }

    #[test]
    fn test_add_sound_queues_name() {
        let mut source = SoundSourceComponent::new();
        source.add_sound("bgm", "music.ogg").set_volume(0.5);

        assert_eq!(source.added_sounds(), ["bgm".to_string()]);
        assert!(source.removed_sounds().is_empty());
        assert_eq!(source.sound("bgm").map(Sound::filename), Some("music.ogg"));
        assert_relative_eq!(source.sound("bgm").unwrap().properties().volume, 0.5);
    }

    #[test]
    fn test_overwrite_replaces_descriptor() {
        let mut source = SoundSourceComponent::new();
        source.add_sound("sfx", "a.ogg").set_volume(0.2);
        source.take_added();
        source.sound_mut("sfx").unwrap().handle = Some(SoundHandle::new(7, 1));

        source.add_sound("sfx", "b.ogg");

        assert_eq!(source.len(), 1);
        let sound = source.sound("sfx").unwrap();
        assert_eq!(sound.filename(), "b.ogg");
        assert_relative_eq!(sound.properties().volume, 1.0);
        assert!(sound.handle().is_none());
        assert_eq!(source.added_sounds(), ["sfx".to_string()]);
        assert_eq!(
            source.removed_sounds(),
            [RemovedSound {
                name: "sfx".to_string(),
                handle: Some(SoundHandle::new(7, 1)),
            }]
        );
    }

    #[test]
    fn test_remove_sound() {
        let mut source = SoundSourceComponent::new();
        source.add_sound("bgm", "music.ogg");

        assert!(source.remove_sound("bgm").is_some());
        assert!(source.remove_sound("bgm").is_none());
        assert!(source.remove_sound("missing").is_none());

        assert!(source.is_empty());
        assert!(source.added_sounds().is_empty());
        assert_eq!(source.removed_sounds().len(), 1);
    }

    #[test]
    fn test_relative_to_listener_defaults_on() {
        let mut source = SoundSourceComponent::new();
        assert!(source.relative_to_listener());

        source.relative_to_listener_tracked().untouch();
        source.set_relative_to_listener(false);
        assert!(!source.relative_to_listener());
        assert!(source.relative_to_listener_tracked().has_changes());
    }
}
