//! System trait

use crate::ecs::World;
use crate::scene::SceneGraph;

/// System trait for processing entities and components
///
/// Systems belong to a game state and see its world and scene. The engine
/// calls [`System::init`] once when the state is built, then brackets every
/// stretch of ticks with [`System::activate`] and [`System::deactivate`].
/// Deactivation must release every external resource the system holds,
/// while keeping enough state to rebuild them on the next activation.
pub trait System {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Register filters and other per-world state
    fn init(&mut self, _world: &mut World) {}

    /// The owning state became current
    fn activate(&mut self, _world: &mut World, _scene: &mut SceneGraph) {}

    /// The owning state stops being current
    fn deactivate(&mut self, _world: &mut World, _scene: &mut SceneGraph) {}

    /// Run one tick
    fn update(&mut self, world: &mut World, scene: &mut SceneGraph, delta_ms: u32);

    /// The owning state is being dropped
    fn shutdown(&mut self, _world: &mut World) {}
}
