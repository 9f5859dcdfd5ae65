//! Core engine implementation
//!
//! The engine owns a set of named [`GameState`]s. Exactly one of them is
//! current at a time; only the current state is ticked. Switching states
//! deactivates the old state's systems in reverse order and activates the
//! new state's systems in order, so systems that depend on others (sounds
//! on scene nodes) tear down first and come up last.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::config::EngineConfig;
use crate::ecs::{System, World};
use crate::foundation::time::Timer;
use crate::scene::SceneGraph;

/// A world, its scene and the systems that run on them
pub struct GameState {
    name: String,
    world: World,
    scene: SceneGraph,
    systems: Vec<Box<dyn System>>,
    active: bool,
}

impl GameState {
    /// Create an empty state with its own world and scene graph
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            scene: SceneGraph::new(name.clone()),
            name,
            world: World::new(),
            systems: Vec::new(),
            active: false,
        }
    }

    /// Add a system (builder style)
    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.add_system(Box::new(system));
        self
    }

    /// Add a system; it runs after the systems added before it
    pub fn add_system(&mut self, mut system: Box<dyn System>) {
        system.init(&mut self.world);
        if self.active {
            system.activate(&mut self.world, &mut self.scene);
        }
        log::debug!("State '{}': added {}", self.name, system.name());
        self.systems.push(system);
    }

    /// State name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this state is the current one
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Get the ECS world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Get the scene graph
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Names of the systems in run order
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|system| system.name()).collect()
    }

    fn activate(&mut self) {
        if self.active {
            return;
        }
        for system in &mut self.systems {
            system.activate(&mut self.world, &mut self.scene);
        }
        self.active = true;
    }

    fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        for system in self.systems.iter_mut().rev() {
            system.deactivate(&mut self.world, &mut self.scene);
        }
        self.active = false;
    }

    fn update(&mut self, delta_ms: u32) {
        for system in &mut self.systems {
            system.update(&mut self.world, &mut self.scene, delta_ms);
        }
    }

    fn shutdown(&mut self) {
        self.deactivate();
        for system in self.systems.iter_mut().rev() {
            system.shutdown(&mut self.world);
        }
    }
}

/// Main engine struct
///
/// Coordinates game states and drives the current one.
pub struct Engine {
    states: BTreeMap<String, GameState>,
    current: Option<String>,
    timer: Timer,
    config: EngineConfig,
    running: bool,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config: EngineConfig) -> Self {
        log::info!("Initializing engine...");
        Self {
            states: BTreeMap::new(),
            current: None,
            timer: Timer::new(),
            config,
            running: true,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a state; it stays inactive until switched to
    pub fn add_state(&mut self, state: GameState) -> Result<(), EngineError> {
        if self.states.contains_key(state.name()) {
            return Err(EngineError::DuplicateState(state.name().to_string()));
        }
        log::debug!("Registered state '{}'", state.name());
        self.states.insert(state.name().to_string(), state);
        Ok(())
    }

    /// Drop a state that is not current
    pub fn remove_state(&mut self, name: &str) -> Result<GameState, EngineError> {
        if self.current.as_deref() == Some(name) {
            return Err(EngineError::StateInUse(name.to_string()));
        }
        let mut state = self
            .states
            .remove(name)
            .ok_or_else(|| EngineError::UnknownState(name.to_string()))?;
        state.shutdown();
        Ok(state)
    }

    /// Make `name` the current state
    ///
    /// Switching to the current state does nothing.
    pub fn switch_to(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.states.contains_key(name) {
            return Err(EngineError::UnknownState(name.to_string()));
        }
        if self.current.as_deref() == Some(name) {
            return Ok(());
        }

        if let Some(previous) = self.current.take() {
            if let Some(state) = self.states.get_mut(&previous) {
                state.deactivate();
            }
            log::info!("Left state '{}'", previous);
        }
        if let Some(state) = self.states.get_mut(name) {
            state.activate();
        }
        self.current = Some(name.to_string());
        log::info!("Entered state '{}'", name);
        Ok(())
    }

    /// Name of the current state
    pub fn current_state_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The current state
    pub fn current_state(&self) -> Option<&GameState> {
        self.states.get(self.current.as_deref()?)
    }

    /// Mutable access to the current state
    pub fn current_state_mut(&mut self) -> Option<&mut GameState> {
        let name = self.current.as_deref()?;
        self.states.get_mut(name)
    }

    /// Look up a state by name
    pub fn state(&self, name: &str) -> Option<&GameState> {
        self.states.get(name)
    }

    /// Look up a state by name for editing
    pub fn state_mut(&mut self, name: &str) -> Option<&mut GameState> {
        self.states.get_mut(name)
    }

    /// Advance the frame timer and tick the current state
    pub fn update(&mut self) -> Result<(), EngineError> {
        self.timer.update();
        let delta_ms = self.timer.delta_millis();
        self.tick(delta_ms)
    }

    /// Tick the current state with an explicit delta
    pub fn tick(&mut self, delta_ms: u32) -> Result<(), EngineError> {
        let state = self.current_state_mut().ok_or(EngineError::NoCurrentState)?;
        state.update(delta_ms);
        Ok(())
    }

    /// Number of frames run through [`Engine::update`]
    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count()
    }

    /// Whether the engine should keep running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Deactivate the current state and shut down every system
    pub fn shutdown(&mut self) {
        if let Some(current) = self.current.take() {
            log::info!("Left state '{}'", current);
        }
        for state in self.states.values_mut() {
            state.shutdown();
        }
        self.running = false;
        log::info!("Engine shutdown complete");
    }
}

/// Engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No state with that name
    #[error("Unknown game state '{0}'")]
    UnknownState(String),

    /// A state with that name already exists
    #[error("Game state '{0}' already exists")]
    DuplicateState(String),

    /// The state is current and cannot be removed
    #[error("Game state '{0}' is current")]
    StateInUse(String),

    /// Ticked without a current state
    #[error("No current game state")]
    NoCurrentState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::audio::{MemoryBackend, SoundBackend};
    use crate::ecs::components::{SceneNodeComponent, SoundSourceComponent};
    use crate::ecs::systems::{SceneNodeSystem, SoundSourceSystem};

    /// Records lifecycle calls into a shared log
    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl System for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn activate(&mut self, _world: &mut World, _scene: &mut SceneGraph) {
            self.log.borrow_mut().push(format!("activate {}", self.name));
        }

        fn deactivate(&mut self, _world: &mut World, _scene: &mut SceneGraph) {
            self.log.borrow_mut().push(format!("deactivate {}", self.name));
        }

        fn update(&mut self, _world: &mut World, _scene: &mut SceneGraph, _delta_ms: u32) {
            self.log.borrow_mut().push(format!("update {}", self.name));
        }
    }

    fn probe(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Probe {
        Probe {
            name,
            log: Rc::clone(log),
        }
    }

    #[test]
    fn test_switch_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::new(EngineConfig::default());
        engine
            .add_state(GameState::new("menu").with_system(probe("a", &log)).with_system(probe("b", &log)))
            .unwrap();
        engine.add_state(GameState::new("level").with_system(probe("c", &log))).unwrap();

        engine.switch_to("menu").unwrap();
        engine.tick(16).unwrap();
        engine.switch_to("level").unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "activate a",
                "activate b",
                "update a",
                "update b",
                "deactivate b",
                "deactivate a",
                "activate c",
            ]
        );
        assert_eq!(engine.current_state_name(), Some("level"));
        assert!(!engine.state("menu").unwrap().is_active());
    }

    #[test]
    fn test_state_errors() {
        let mut engine = Engine::new(EngineConfig::default());
        assert_eq!(engine.tick(16), Err(EngineError::NoCurrentState));
        assert!(matches!(engine.switch_to("nowhere"), Err(EngineError::UnknownState(_))));

        engine.add_state(GameState::new("menu")).unwrap();
        assert!(matches!(
            engine.add_state(GameState::new("menu")),
            Err(EngineError::DuplicateState(_))
        ));

        engine.switch_to("menu").unwrap();
        assert!(matches!(engine.remove_state("menu"), Err(EngineError::StateInUse(_))));
    }

    #[test]
    fn test_shared_backend_follows_current_state() {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let mut engine = Engine::new(EngineConfig::default());

        for name in ["menu", "level"] {
            let mut state = GameState::new(name)
                .with_system(SceneNodeSystem::new())
                .with_system(SoundSourceSystem::new(Rc::clone(&backend)));
            let world = state.world_mut();
            let entity = world.create_entity();
            let mut source = SoundSourceComponent::new();
            source.add_sound(format!("{name}_music"), format!("{name}.ogg")).play();
            world.add_component(entity, SceneNodeComponent::new());
            world.add_component(entity, source);
            engine.add_state(state).unwrap();
        }

        engine.switch_to("menu").unwrap();
        engine.tick(16).unwrap();
        let menu_scene = engine.state("menu").unwrap().scene().id();
        assert_eq!(backend.borrow().scene(), Some(menu_scene));
        assert!(backend.borrow().find_sound("menu_music").is_some_and(|(_, s)| s.is_playing()));

        engine.switch_to("level").unwrap();
        engine.tick(16).unwrap();
        {
            let backend = backend.borrow();
            assert_eq!(backend.live_count(), 1);
            assert!(backend.find_sound("menu_music").is_none());
            assert!(backend.find_sound("level_music").is_some_and(|(_, s)| s.is_playing()));
            assert_eq!(backend.stats().leaked_on_unbind, 0);
        }

        engine.switch_to("menu").unwrap();
        engine.tick(16).unwrap();
        assert!(backend.borrow().find_sound("menu_music").is_some_and(|(_, s)| s.is_playing()));

        engine.shutdown();
        assert_eq!(backend.borrow().live_count(), 0);
        assert!(backend.borrow().scene().is_none());
    }
}
