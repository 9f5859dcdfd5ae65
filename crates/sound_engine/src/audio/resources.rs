//! Backend sound resources of entities
//!
//! [`SoundResourceManager`] owns the table of live backend handles, keyed by
//! entity and sound name, and is the only place that creates or destroys
//! backend sounds. It also remembers failed creations so they are retried
//! with backoff instead of hammering the backend every tick.
//!
//! Invariants:
//! - a table entry exists exactly while the backend sound is alive
//! - every handle is destroyed at most once: the entry is removed before the
//!   backend is told to release it
//! - restoring a sound that already has a handle does nothing

use std::collections::{BTreeMap, HashMap};

use super::backend::{CreateSoundRequest, SoundBackend, SoundHandle};
use super::AudioError;
use crate::core::config::{RetryPolicy, SoundConfig};
use crate::ecs::components::Sound;
use crate::ecs::Entity;
use crate::scene::NodeId;

/// Result of [`SoundResourceManager::restore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// A new backend sound was created and attached
    Created(SoundHandle),
    /// The sound already has a live handle
    AlreadyLive(SoundHandle),
    /// The attach target is not ready yet
    TargetNotReady,
    /// A previous creation failed and the retry delay has not passed
    BackingOff,
    /// Creation failed; will be retried after a delay
    Failed(AudioError),
    /// Creation failed too often; no longer retried
    Exhausted,
}

/// A sound that could not be created within the retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSound {
    /// Owning entity
    pub entity: Entity,
    /// Sound name
    pub name: String,
    /// Consecutive failed attempts
    pub attempts: u32,
    /// Last backend error
    pub error: AudioError,
}

#[derive(Debug, Clone)]
struct RetryState {
    failures: u32,
    next_attempt: u64,
    exhausted: bool,
    error: AudioError,
}

/// Owner of all backend sound handles
#[derive(Debug)]
pub struct SoundResourceManager {
    handles: HashMap<Entity, BTreeMap<String, SoundHandle>>,
    anchors: HashMap<SoundHandle, NodeId>,
    retries: BTreeMap<(Entity, String), RetryState>,
    config: SoundConfig,
    tick: u64,
}

impl SoundResourceManager {
    /// Create an empty manager
    pub fn new(config: SoundConfig) -> Self {
        Self {
            handles: HashMap::new(),
            anchors: HashMap::new(),
            retries: BTreeMap::new(),
            config,
            tick: 0,
        }
    }

    /// Creation settings in use
    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    /// Advance the retry clock by one tick
    pub fn begin_tick(&mut self) {
        self.tick += 1;
    }

    /// Handle of a sound, if it is alive
    pub fn handle(&self, entity: Entity, name: &str) -> Option<SoundHandle> {
        self.handles.get(&entity)?.get(name).copied()
    }

    /// Number of live handles of an entity
    pub fn handle_count(&self, entity: Entity) -> usize {
        self.handles.get(&entity).map_or(0, BTreeMap::len)
    }

    /// Number of live handles overall
    pub fn total_handles(&self) -> usize {
        self.handles.values().map(BTreeMap::len).sum()
    }

    /// Scene node a live handle is attached to
    pub fn attach_point(&self, handle: SoundHandle) -> Option<NodeId> {
        self.anchors.get(&handle).copied()
    }

    /// Entities that currently own at least one handle
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.handles.keys().copied().collect();
        entities.sort();
        entities
    }

    /// Destroy one sound
    ///
    /// Returns the released handle, or `None` if the sound had none.
    pub fn destroy<B: SoundBackend>(&mut self, backend: &mut B, entity: Entity, name: &str) -> Option<SoundHandle> {
        let sounds = self.handles.get_mut(&entity)?;
        let handle = sounds.remove(name)?;
        if sounds.is_empty() {
            self.handles.remove(&entity);
        }
        self.anchors.remove(&handle);
        release(backend, entity, name, handle);
        Some(handle)
    }

    /// Destroy one sound, but only if it still holds `handle`
    ///
    /// Guards against releasing a newer handle created under the same name.
    pub fn destroy_handle<B: SoundBackend>(
        &mut self,
        backend: &mut B,
        entity: Entity,
        name: &str,
        handle: SoundHandle,
    ) -> bool {
        if self.handle(entity, name) != Some(handle) {
            return false;
        }
        self.destroy(backend, entity, name).is_some()
    }

    /// Destroy every sound of an entity, returning how many were released
    pub fn destroy_all<B: SoundBackend>(&mut self, backend: &mut B, entity: Entity) -> usize {
        self.reset_entity(entity);
        let Some(sounds) = self.handles.remove(&entity) else {
            return 0;
        };
        for (name, handle) in &sounds {
            self.anchors.remove(handle);
            release(backend, entity, name, *handle);
        }
        sounds.len()
    }

    /// Destroy every handle of every entity
    pub fn destroy_everything<B: SoundBackend>(&mut self, backend: &mut B) -> usize {
        self.entities()
            .into_iter()
            .map(|entity| self.destroy_all(backend, entity))
            .sum()
    }

    /// Make sure the sound exists in the backend, attached to `target`
    ///
    /// Does nothing while `target` is `None`. A failed creation leaves the
    /// sound without handle and schedules a retry according to the
    /// [`RetryPolicy`]. On success the sound's properties are marked as
    /// changed so the next flush pushes them to the new handle.
    pub fn restore<B: SoundBackend>(
        &mut self,
        backend: &mut B,
        entity: Entity,
        target: Option<NodeId>,
        sound: &mut Sound,
        relative_to_listener: bool,
    ) -> RestoreOutcome {
        if let Some(handle) = self.handle(entity, sound.name()) {
            sound.handle = Some(handle);
            return RestoreOutcome::AlreadyLive(handle);
        }
        sound.handle = None;

        let Some(node) = target else {
            return RestoreOutcome::TargetNotReady;
        };

        let key = (entity, sound.name().to_string());
        if let Some(retry) = self.retries.get(&key) {
            if retry.exhausted {
                return RestoreOutcome::Exhausted;
            }
            if self.tick < retry.next_attempt {
                return RestoreOutcome::BackingOff;
            }
        }

        let request = CreateSoundRequest {
            name: sound.name(),
            filename: sound.filename(),
            stream: self.config.stream,
            looped: sound.properties().looped,
            prebuffer: self.config.prebuffer,
        };
        let created = backend.create_sound(&request).and_then(|handle| {
            if let Err(error) = backend.attach(handle, node) {
                release(backend, entity, sound.name(), handle);
                return Err(error);
            }
            Ok(handle)
        });

        match created {
            Ok(handle) => {
                if let Err(error) = backend.set_relative_to_listener(handle, relative_to_listener) {
                    log::warn!("{}: could not position '{}': {}", entity, sound.name(), error);
                }
                self.retries.remove(&key);
                self.anchors.insert(handle, node);
                self.handles
                    .entry(entity)
                    .or_default()
                    .insert(sound.name().to_string(), handle);
                sound.handle = Some(handle);
                sound.touch();
                log::debug!("{}: created {} for '{}'", entity, handle, sound.name());
                RestoreOutcome::Created(handle)
            }
            Err(error) => self.record_failure(key, error),
        }
    }

    /// Keep a live sound attached to the entity's current scene node
    ///
    /// A sound whose node was replaced moves to the new node; a sound whose
    /// entity has no ready node any more is destroyed, as is one that cannot
    /// be moved. Returns whether the handle was released.
    pub fn retarget<B: SoundBackend>(
        &mut self,
        backend: &mut B,
        entity: Entity,
        target: Option<NodeId>,
        sound: &mut Sound,
    ) -> bool {
        let Some(handle) = sound.handle else {
            return false;
        };
        if target.is_some() && self.attach_point(handle) == target {
            return false;
        }

        if let Some(node) = target {
            if let Err(error) = backend.detach(handle) {
                log::warn!("{}: could not detach '{}' ({}): {}", entity, sound.name(), handle, error);
            }
            match backend.attach(handle, node) {
                Ok(()) => {
                    self.anchors.insert(handle, node);
                    log::debug!("{}: moved {} for '{}' to a new node", entity, handle, sound.name());
                    return false;
                }
                Err(error) => {
                    log::warn!("{}: could not move '{}' ({}): {}", entity, sound.name(), handle, error);
                }
            }
        }

        sound.handle = None;
        self.destroy_handle(backend, entity, sound.name(), handle)
    }

    /// Sounds that exhausted their retry budget
    pub fn failures(&self) -> Vec<FailedSound> {
        self.retries
            .iter()
            .filter(|(_, retry)| retry.exhausted)
            .map(|((entity, name), retry)| FailedSound {
                entity: *entity,
                name: name.clone(),
                attempts: retry.failures,
                error: retry.error.clone(),
            })
            .collect()
    }

    /// Give every failed or backing-off sound a fresh retry budget
    pub fn retry_failed(&mut self) {
        self.retries.clear();
    }

    /// Forget the retry state of one sound
    pub fn reset(&mut self, entity: Entity, name: &str) {
        self.retries.remove(&(entity, name.to_string()));
    }

    /// Forget the retry state of every sound of an entity
    pub fn reset_entity(&mut self, entity: Entity) {
        self.retries.retain(|(owner, _), _| *owner != entity);
    }

    fn record_failure(&mut self, key: (Entity, String), error: AudioError) -> RestoreOutcome {
        let policy = self.config.retry;
        let tick = self.tick;
        let entity = key.0;
        let retry = self.retries.entry(key.clone()).or_insert_with(|| RetryState {
            failures: 0,
            next_attempt: 0,
            exhausted: false,
            error: error.clone(),
        });
        retry.failures += 1;
        retry.error = error.clone();
        let delay = policy.backoff_after(retry.failures);
        retry.next_attempt = tick + u64::from(delay);
        retry.exhausted = policy.is_exhausted(retry.failures);

        if retry.exhausted {
            log::error!(
                "{}: giving up on '{}' after {} attempts: {}",
                entity, key.1, retry.failures, error
            );
        } else {
            log::warn!(
                "{}: could not create '{}' (attempt {}), retrying in {} ticks: {}",
                entity, key.1, retry.failures, delay, error
            );
        }
        RestoreOutcome::Failed(error)
    }
}

impl Default for SoundResourceManager {
    fn default() -> Self {
        Self::new(SoundConfig::default())
    }
}

fn release<B: SoundBackend>(backend: &mut B, entity: Entity, name: &str, handle: SoundHandle) {
    if let Err(error) = backend.detach(handle) {
        log::warn!("{}: could not detach '{}' ({}): {}", entity, name, handle, error);
    }
    match backend.destroy_sound(handle) {
        Ok(()) => log::debug!("{}: destroyed {} for '{}'", entity, handle, name),
        Err(error) => log::warn!("{}: could not destroy '{}' ({}): {}", entity, name, handle, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemoryBackend;
    use crate::ecs::World;
    use crate::scene::SceneGraph;

    struct Fixture {
        backend: MemoryBackend,
        scene: SceneGraph,
        entity: Entity,
        node: NodeId,
    }

    fn fixture() -> Fixture {
        let mut world = World::new();
        let entity = world.create_entity();
        let mut scene = SceneGraph::new("resources");
        let node = scene.create_node(entity);
        let mut backend = MemoryBackend::new();
        backend.set_scene(Some(scene.id()));
        Fixture {
            backend,
            scene,
            entity,
            node,
        }
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("bgm", "music.ogg");

        let first = manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);
        let RestoreOutcome::Created(handle) = first else {
            panic!("expected creation, got {first:?}");
        };
        let second = manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);

        assert_eq!(second, RestoreOutcome::AlreadyLive(handle));
        assert_eq!(f.backend.stats().created, 1);
        assert_eq!(manager.total_handles(), 1);
        assert_eq!(sound.handle(), Some(handle));

        let created = f.backend.sound(handle).unwrap();
        assert_eq!(created.node, Some(f.node));
        assert!(created.relative_to_listener);
        assert!(created.stream && created.prebuffer);
        assert!(f.scene.contains(f.node));
    }

    #[test]
    fn test_restore_without_target_does_nothing() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("bgm", "music.ogg");

        let outcome = manager.restore(&mut f.backend, f.entity, None, &mut sound, true);
        assert_eq!(outcome, RestoreOutcome::TargetNotReady);
        assert_eq!(f.backend.live_count(), 0);
        assert!(manager.failures().is_empty());
    }

    #[test]
    fn test_loop_is_a_creation_parameter() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("engine", "engine.ogg");
        sound.set_looped(true);

        let RestoreOutcome::Created(handle) =
            manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, false)
        else {
            panic!("sound was not created");
        };
        assert!(f.backend.sound(handle).unwrap().looped);
    }

    #[test]
    fn test_destroy_releases_once() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("bgm", "music.ogg");
        manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);

        assert!(manager.destroy(&mut f.backend, f.entity, "bgm").is_some());
        assert!(manager.destroy(&mut f.backend, f.entity, "bgm").is_none());
        assert_eq!(manager.destroy_all(&mut f.backend, f.entity), 0);

        let stats = f.backend.stats();
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.invalid_handle_calls, 0);
        assert_eq!(manager.handle_count(f.entity), 0);
    }

    #[test]
    fn test_destroy_handle_ignores_newer_handle() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("sfx", "a.ogg");
        manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);
        let old = manager.destroy(&mut f.backend, f.entity, "sfx").unwrap();

        manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);
        assert!(!manager.destroy_handle(&mut f.backend, f.entity, "sfx", old));
        assert_eq!(manager.handle_count(f.entity), 1);
    }

    #[test]
    fn test_failed_creation_backs_off_then_exhausts() {
        let mut f = fixture();
        let policy = RetryPolicy::default().with_max_attempts(Some(3)).with_backoff(2, 4);
        let mut manager = SoundResourceManager::new(SoundConfig::new().with_retry(policy));
        let mut sound = Sound::new("bgm", "missing.ogg");
        f.backend.fail_file("missing.ogg");

        let mut attempts = Vec::new();
        for tick in 0..12 {
            let outcome = manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);
            if matches!(outcome, RestoreOutcome::Failed(_)) {
                attempts.push(tick);
            }
            manager.begin_tick();
        }

        // Delays of 2 then 4 ticks between attempts.
        assert_eq!(attempts, vec![0, 2, 6]);
        let failures = manager.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].attempts, 3);
        assert_eq!(failures[0].name, "bgm");
        assert!(sound.handle().is_none());

        f.backend.clear_failures();
        assert_eq!(
            manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true),
            RestoreOutcome::Exhausted
        );

        manager.retry_failed();
        assert!(matches!(
            manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true),
            RestoreOutcome::Created(_)
        ));
        assert!(manager.failures().is_empty());
    }

    #[test]
    fn test_retarget_follows_replaced_node() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("bgm", "music.ogg");
        manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);
        let handle = sound.handle().unwrap();

        assert!(!manager.retarget(&mut f.backend, f.entity, Some(f.node), &mut sound));
        assert_eq!(manager.attach_point(handle), Some(f.node));

        f.scene.remove_node(f.node);
        let replacement = f.scene.create_node(f.entity);
        assert!(!manager.retarget(&mut f.backend, f.entity, Some(replacement), &mut sound));
        assert_eq!(sound.handle(), Some(handle));
        assert_eq!(manager.attach_point(handle), Some(replacement));
        assert_eq!(f.backend.sound(handle).unwrap().node, Some(replacement));
    }

    #[test]
    fn test_retarget_without_node_releases_handle() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("bgm", "music.ogg");
        manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);
        let handle = sound.handle().unwrap();

        assert!(manager.retarget(&mut f.backend, f.entity, None, &mut sound));
        assert!(sound.handle().is_none());
        assert!(!f.backend.is_live(handle));
        assert_eq!(manager.handle_count(f.entity), 0);
        assert!(manager.attach_point(handle).is_none());
    }

    #[test]
    fn test_success_marks_properties_changed() {
        let mut f = fixture();
        let mut manager = SoundResourceManager::default();
        let mut sound = Sound::new("bgm", "music.ogg");
        sound.untouch();

        manager.restore(&mut f.backend, f.entity, Some(f.node), &mut sound, true);
        assert!(sound.has_changes());
    }
}
