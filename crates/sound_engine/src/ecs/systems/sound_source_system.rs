//! Sound source system
//!
//! Reconciles [`SoundSourceComponent`]s with the audio backend. The system
//! follows every entity that has both a [`SceneNodeComponent`] and a
//! [`SoundSourceComponent`] and, once per tick:
//!
//! 1. destroys the backend sounds of entities that stopped matching
//! 2. creates backend sounds for entities that started matching
//! 3. clears the filter's change queues
//! 4. for every matching entity, releases sounds removed from its component,
//!    moves live sounds whose scene node was replaced, creates sounds that
//!    still lack a handle, and pushes the properties of every changed sound
//!    followed by exactly one play, pause or stop call
//!
//! Deactivation destroys every backend sound and unbinds the backend from
//! the scene; activation binds it again and recreates them. Backend errors
//! never escape the system: they are logged and, for creation, retried
//! according to the configured [`RetryPolicy`](crate::core::config::RetryPolicy).

use crate::audio::resources::{FailedSound, RestoreOutcome, SoundResourceManager};
use crate::audio::{SoundBackend, SoundHandle};
use crate::core::config::SoundConfig;
use crate::ecs::components::{PlayState, SceneNodeComponent, Sound, SoundSourceComponent};
use crate::ecs::{Entity, EntityFilter, System, World};
use crate::scene::SceneGraph;

/// What one tick (or one activation) did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Backend sounds created
    pub created: usize,
    /// Backend sounds destroyed
    pub destroyed: usize,
    /// Sounds whose properties were pushed
    pub flushes: usize,
    /// Sounds waiting for an attach target or a retry delay
    pub deferred: usize,
    /// Failed creation attempts
    pub failed: usize,
}

impl SyncStats {
    fn record(&mut self, outcome: &RestoreOutcome) {
        match outcome {
            RestoreOutcome::Created(_) => self.created += 1,
            RestoreOutcome::TargetNotReady | RestoreOutcome::BackingOff => self.deferred += 1,
            RestoreOutcome::Failed(_) => self.failed += 1,
            RestoreOutcome::AlreadyLive(_) | RestoreOutcome::Exhausted => {}
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.created += other.created;
        self.destroyed += other.destroyed;
        self.flushes += other.flushes;
        self.deferred += other.deferred;
        self.failed += other.failed;
    }

    /// Whether nothing happened
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

type SoundEntities = (SceneNodeComponent, SoundSourceComponent);

/// Keeps backend sounds in sync with sound source components
pub struct SoundSourceSystem<B: SoundBackend> {
    backend: B,
    resources: SoundResourceManager,
    entities: EntityFilter<SoundEntities>,
    active: bool,
    last_tick: SyncStats,
    totals: SyncStats,
}

impl<B: SoundBackend> SoundSourceSystem<B> {
    /// Create a sound system driving `backend` with the default sound config
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SoundConfig::default())
    }

    /// Create a sound system with explicit creation and retry settings
    pub fn with_config(backend: B, config: SoundConfig) -> Self {
        Self {
            backend,
            resources: SoundResourceManager::new(config),
            entities: EntityFilter::new(),
            active: false,
            last_tick: SyncStats::default(),
            totals: SyncStats::default(),
        }
    }

    /// The backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Whether the system is between `activate` and `deactivate`
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Handle of one sound, if it exists in the backend
    pub fn handle(&self, entity: Entity, name: &str) -> Option<SoundHandle> {
        self.resources.handle(entity, name)
    }

    /// Number of live backend sounds of an entity
    pub fn handle_count(&self, entity: Entity) -> usize {
        self.resources.handle_count(entity)
    }

    /// Number of live backend sounds overall
    pub fn total_handles(&self) -> usize {
        self.resources.total_handles()
    }

    /// Sounds that exhausted their retry budget
    pub fn failures(&self) -> Vec<FailedSound> {
        self.resources.failures()
    }

    /// Retry every failed sound on the next tick
    pub fn retry_failed(&mut self) {
        self.resources.retry_failed();
    }

    /// Statistics of the last tick
    pub fn last_tick(&self) -> SyncStats {
        self.last_tick
    }

    /// Statistics accumulated since creation
    pub fn totals(&self) -> SyncStats {
        self.totals
    }

    /// Create backend sounds for every sound of every matching entity
    fn restore_all(&mut self, world: &mut World, scene: &SceneGraph) -> SyncStats {
        let mut stats = SyncStats::default();
        for entity in self.entities.entities(world) {
            stats.accumulate(&self.restore_entity(world, scene, entity));
        }
        stats
    }

    fn restore_entity(&mut self, world: &mut World, scene: &SceneGraph, entity: Entity) -> SyncStats {
        let mut stats = SyncStats::default();
        let target = attach_target(world, scene, entity);
        let Some(source) = world.get_component_mut::<SoundSourceComponent>(entity) else {
            return stats;
        };
        stats.destroyed += self.drain_queues(entity, source);
        let relative = source.relative_to_listener();
        let mut all_fresh = true;
        for sound in source.sounds_mut() {
            let outcome = self.resources.restore(&mut self.backend, entity, target, sound, relative);
            all_fresh &= !matches!(outcome, RestoreOutcome::AlreadyLive(_));
            stats.record(&outcome);
        }
        // Fresh handles were created with the current flag.
        if all_fresh {
            source.relative_to_listener_tracked().untouch();
        }
        stats
    }

    /// Release sounds removed from the component and give re-added names a
    /// fresh retry budget
    fn drain_queues(&mut self, entity: Entity, source: &mut SoundSourceComponent) -> usize {
        let mut destroyed = 0;
        for removed in source.take_removed() {
            self.resources.reset(entity, &removed.name);
            if let Some(handle) = removed.handle {
                if self.resources.destroy_handle(&mut self.backend, entity, &removed.name, handle) {
                    destroyed += 1;
                }
            }
        }
        for name in source.take_added() {
            self.resources.reset(entity, &name);
        }
        destroyed
    }

    fn release_entity(&mut self, world: &mut World, entity: Entity) -> usize {
        let destroyed = self.resources.destroy_all(&mut self.backend, entity);
        if let Some(source) = world.get_component_mut::<SoundSourceComponent>(entity) {
            source.clear_handles();
        }
        if destroyed > 0 {
            log::debug!("{}: released {} sounds", entity, destroyed);
        }
        destroyed
    }

    fn sync_entity(&mut self, world: &mut World, scene: &SceneGraph, entity: Entity, stats: &mut SyncStats) {
        let target = attach_target(world, scene, entity);
        let Some(source) = world.get_component_mut::<SoundSourceComponent>(entity) else {
            return;
        };

        stats.destroyed += self.drain_queues(entity, source);

        let relative = source.relative_to_listener();
        if source.relative_to_listener_tracked().take_changes() {
            for handle in source.sounds().filter_map(Sound::handle) {
                if let Err(error) = self.backend.set_relative_to_listener(handle, relative) {
                    log::warn!("{}: could not reposition {}: {}", entity, handle, error);
                }
            }
        }

        for sound in source.sounds_mut() {
            if self.resources.retarget(&mut self.backend, entity, target, sound) {
                stats.destroyed += 1;
            }
            if sound.handle().is_none() {
                let outcome = self.resources.restore(&mut self.backend, entity, target, sound, relative);
                stats.record(&outcome);
            }
            if !sound.has_changes() {
                continue;
            }
            // Changes stay pending until the sound exists in the backend.
            let Some(handle) = sound.handle() else {
                continue;
            };
            flush(&mut self.backend, entity, sound, handle);
            sound.untouch();
            stats.flushes += 1;
        }
    }
}

impl<B: SoundBackend> System for SoundSourceSystem<B> {
    fn name(&self) -> &str {
        "SoundSourceSystem"
    }

    fn init(&mut self, world: &mut World) {
        self.entities.attach(world);
    }

    fn activate(&mut self, world: &mut World, scene: &mut SceneGraph) {
        if !self.entities.is_attached() {
            self.entities.attach(world);
        }
        self.backend.set_scene(Some(scene.id()));
        self.active = true;
        self.resources.retry_failed();

        let stats = self.restore_all(world, scene);
        self.totals.accumulate(&stats);
        log::info!(
            "Sound system activated in {}: {} sounds created, {} deferred",
            scene.id(),
            stats.created,
            stats.deferred
        );
    }

    fn deactivate(&mut self, world: &mut World, _scene: &mut SceneGraph) {
        let destroyed = self.resources.destroy_everything(&mut self.backend);

        let holders: Vec<Entity> = world
            .query::<SoundSourceComponent>()
            .iter()
            .map(|(entity, _)| *entity)
            .collect();
        for entity in holders {
            if let Some(source) = world.get_component_mut::<SoundSourceComponent>(entity) {
                source.clear_handles();
            }
        }

        self.backend.set_scene(None);
        self.active = false;
        self.totals.destroyed += destroyed;
        log::info!("Sound system deactivated: {} sounds destroyed", destroyed);
    }

    fn update(&mut self, world: &mut World, scene: &mut SceneGraph, _delta_ms: u32) {
        if !self.active {
            return;
        }
        self.resources.begin_tick();
        let mut stats = SyncStats::default();

        for entity in self.entities.removed_entities(world) {
            stats.destroyed += self.release_entity(world, entity);
        }

        for entity in self.entities.added_entities(world) {
            let restored = self.restore_entity(world, scene, entity);
            stats.accumulate(&restored);
        }

        self.entities.clear_changes(world);

        for entity in self.entities.entities(world) {
            self.sync_entity(world, scene, entity, &mut stats);
        }

        if !stats.is_idle() {
            log::trace!("Sound sync: {:?}", stats);
        }
        self.last_tick = stats;
        self.totals.accumulate(&stats);
    }

    fn shutdown(&mut self, world: &mut World) {
        if self.active {
            log::warn!("Sound system shut down while active; releasing all sounds");
            self.resources.destroy_everything(&mut self.backend);
            self.backend.set_scene(None);
            self.active = false;
        }
        self.entities.detach(world);
    }
}

fn attach_target(world: &World, scene: &SceneGraph, entity: Entity) -> Option<crate::scene::NodeId> {
    world
        .get_component::<SceneNodeComponent>(entity)
        .and_then(|component| component.attach_target(scene))
}

/// Push every property, then the playback state
fn flush<B: SoundBackend>(backend: &mut B, entity: Entity, sound: &Sound, handle: SoundHandle) {
    let properties = *sound.properties();
    let pushes = [
        ("volume", backend.set_volume(handle, properties.volume)),
        ("max distance", backend.set_max_distance(handle, properties.max_distance)),
        ("rolloff factor", backend.set_rolloff_factor(handle, properties.rolloff_factor)),
        ("reference distance", backend.set_reference_distance(handle, properties.reference_distance)),
        ("priority", backend.set_priority(handle, properties.priority)),
    ];
    for (property, result) in pushes {
        if let Err(error) = result {
            log::warn!("{}: could not set {} of '{}': {}", entity, property, sound.name(), error);
        }
    }

    let dispatched = match properties.play_state {
        PlayState::Play => backend.play(handle),
        PlayState::Pause => backend.pause(handle),
        PlayState::Stop => backend.stop(handle),
    };
    if let Err(error) = dispatched {
        log::warn!("{}: could not {:?} '{}': {}", entity, properties.play_state, sound.name(), error);
    }
}
