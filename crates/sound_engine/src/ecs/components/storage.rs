//! Persistence of sound source components
//!
//! Components are saved as plain serde records. Field names are camelCase
//! and `playState` is stored as its numeric code, so saved files stay
//! readable by tools that only know the record layout. Every optional field
//! has a default; `filename` and `name` are required.
//!
//! ```
//! use sound_engine::ecs::components::{SoundSourceComponent, SoundSourceRecord};
//!
//! let record = SoundSourceRecord::from_ron(r#"(sounds: [(filename: "music.ogg", name: "bgm")])"#).unwrap();
//! let source = SoundSourceComponent::load(record).unwrap();
//! assert!(source.relative_to_listener());
//! assert_eq!(source.sound("bgm").unwrap().properties().volume, 1.0);
//! ```

use serde::{Deserialize, Serialize};

use super::sound_source::{PlayState, Sound, SoundProperties, SoundSourceComponent};

/// Persistence errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Text could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Record could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unknown play state code
    #[error("Sound '{name}' has invalid play state {value}")]
    InvalidPlayState {
        /// Sound name
        name: String,
        /// Stored code
        value: i16,
    },
}

const DEFAULTS: SoundProperties = SoundProperties::new();

fn default_play_state() -> i16 {
    DEFAULTS.play_state.into()
}

fn default_volume() -> f32 {
    DEFAULTS.volume
}

fn default_max_distance() -> f32 {
    DEFAULTS.max_distance
}

fn default_rolloff_factor() -> f32 {
    DEFAULTS.rolloff_factor
}

fn default_reference_distance() -> f32 {
    DEFAULTS.reference_distance
}

fn default_relative_to_listener() -> bool {
    true
}

/// Saved form of a [`Sound`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundRecord {
    /// Sound file
    pub filename: String,
    /// Sound name
    pub name: String,
    /// [`PlayState`] code
    #[serde(default = "default_play_state")]
    pub play_state: i16,
    /// Loop playback
    #[serde(default, rename = "loop")]
    pub looped: bool,
    /// Volume
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Maximum audible distance
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    /// Rolloff factor
    #[serde(default = "default_rolloff_factor")]
    pub rolloff_factor: f32,
    /// Reference distance
    #[serde(default = "default_reference_distance")]
    pub reference_distance: f32,
    /// Priority
    #[serde(default)]
    pub priority: u8,
}

impl SoundRecord {
    /// Capture a sound
    pub fn from_sound(sound: &Sound) -> Self {
        let properties = sound.properties();
        Self {
            filename: sound.filename().to_string(),
            name: sound.name().to_string(),
            play_state: properties.play_state.into(),
            looped: properties.looped,
            volume: properties.volume,
            max_distance: properties.max_distance,
            rolloff_factor: properties.rolloff_factor,
            reference_distance: properties.reference_distance,
            priority: properties.priority,
        }
    }

    /// Rebuild the sound; it starts with changed properties and no handle
    pub fn into_sound(self) -> Result<Sound, StorageError> {
        let play_state = PlayState::try_from(self.play_state).map_err(|value| StorageError::InvalidPlayState {
            name: self.name.clone(),
            value,
        })?;
        let properties = SoundProperties {
            play_state,
            looped: self.looped,
            volume: self.volume,
            max_distance: self.max_distance,
            rolloff_factor: self.rolloff_factor,
            reference_distance: self.reference_distance,
            priority: self.priority,
        };
        Ok(Sound::with_properties(self.name, self.filename, properties))
    }
}

/// Saved form of a [`SoundSourceComponent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundSourceRecord {
    /// Position sounds relative to the listener
    #[serde(default = "default_relative_to_listener")]
    pub relative_to_listener: bool,
    /// Sounds ordered by name
    #[serde(default)]
    pub sounds: Vec<SoundRecord>,
}

impl SoundSourceRecord {
    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, StorageError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| StorageError::Serialize(e.to_string()))
    }

    /// Parse from RON
    pub fn from_ron(contents: &str) -> Result<Self, StorageError> {
        ron::from_str(contents).map_err(|e| StorageError::Parse(e.to_string()))
    }
}

impl SoundSourceComponent {
    /// Capture every sound and the listener flag
    pub fn storage(&self) -> SoundSourceRecord {
        SoundSourceRecord {
            relative_to_listener: self.relative_to_listener(),
            sounds: self.sounds().map(SoundRecord::from_sound).collect(),
        }
    }

    /// Rebuild a component from its record
    ///
    /// Later records replace earlier ones with the same name.
    pub fn load(record: SoundSourceRecord) -> Result<Self, StorageError> {
        let mut component = Self::new();
        component.set_relative_to_listener(record.relative_to_listener);
        for sound in record.sounds {
            component.insert_sound(sound.into_sound()?);
        }
        Ok(component)
    }
}
