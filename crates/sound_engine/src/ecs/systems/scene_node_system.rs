//! Scene node system
//!
//! Creates a node in the scene graph for every entity with a
//! [`SceneNodeComponent`] while the owning state is active, and removes
//! those nodes again on deactivation or when the entity loses its
//! component.

use std::collections::BTreeMap;

use crate::ecs::components::SceneNodeComponent;
use crate::ecs::{Entity, EntityFilter, System, World};
use crate::scene::{NodeId, SceneGraph};

/// Resolves scene node components against the scene graph
pub struct SceneNodeSystem {
    entities: EntityFilter<(SceneNodeComponent,)>,
    nodes: BTreeMap<Entity, NodeId>,
    active: bool,
}

impl SceneNodeSystem {
    /// Create a new scene node system
    pub fn new() -> Self {
        Self {
            entities: EntityFilter::new(),
            nodes: BTreeMap::new(),
            active: false,
        }
    }

    /// Number of nodes this system created that are still in the scene
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn resolve_all(&mut self, world: &mut World, scene: &mut SceneGraph) {
        for entity in self.entities.entities(world) {
            let Some(component) = world.get_component_mut::<SceneNodeComponent>(entity) else {
                continue;
            };
            if component.attach_target(scene).is_some() {
                continue;
            }

            if let Some(stale) = self.nodes.remove(&entity) {
                scene.remove_node(stale);
            }
            let node = scene.create_node(entity);
            component.node = Some(node);
            self.nodes.insert(entity, node);
            log::trace!("{}: scene node resolved", entity);
        }
    }
}

impl Default for SceneNodeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for SceneNodeSystem {
    fn name(&self) -> &str {
        "SceneNodeSystem"
    }

    fn init(&mut self, world: &mut World) {
        self.entities.attach(world);
    }

    fn activate(&mut self, world: &mut World, scene: &mut SceneGraph) {
        if !self.entities.is_attached() {
            self.entities.attach(world);
        }
        self.active = true;
        self.resolve_all(world, scene);
    }

    fn deactivate(&mut self, world: &mut World, scene: &mut SceneGraph) {
        for (entity, node) in std::mem::take(&mut self.nodes) {
            scene.remove_node(node);
            if let Some(component) = world.get_component_mut::<SceneNodeComponent>(entity) {
                component.node = None;
            }
        }
        self.active = false;
    }

    fn update(&mut self, world: &mut World, scene: &mut SceneGraph, _delta_ms: u32) {
        if !self.active {
            return;
        }

        for entity in self.entities.removed_entities(world) {
            if let Some(node) = self.nodes.remove(&entity) {
                scene.remove_node(node);
            }
        }
        self.entities.clear_changes(world);
        self.resolve_all(world, scene);
    }

    fn shutdown(&mut self, world: &mut World) {
        self.entities.detach(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (World, SceneGraph, SceneNodeSystem) {
        let mut world = World::new();
        let mut system = SceneNodeSystem::new();
        system.init(&mut world);
        (world, SceneGraph::new("nodes"), system)
    }

    #[test]
    fn test_nodes_follow_activation() {
        let (mut world, mut scene, mut system) = setup();
        let entity = world.create_entity();
        world.add_component(entity, SceneNodeComponent::new());

        system.update(&mut world, &mut scene, 16);
        assert!(scene.is_empty());

        system.activate(&mut world, &mut scene);
        let node = world.get_component::<SceneNodeComponent>(entity).and_then(|c| c.node());
        assert!(node.is_some_and(|node| scene.contains(node)));

        system.deactivate(&mut world, &mut scene);
        assert!(scene.is_empty());
        assert!(world.get_component::<SceneNodeComponent>(entity).unwrap().node().is_none());
    }

    #[test]
    fn test_component_removal_drops_node() {
        let (mut world, mut scene, mut system) = setup();
        system.activate(&mut world, &mut scene);

        let entity = world.create_entity();
        world.add_component(entity, SceneNodeComponent::new());
        system.update(&mut world, &mut scene, 16);
        assert_eq!(scene.len(), 1);

        world.remove_component::<SceneNodeComponent>(entity);
        system.update(&mut world, &mut scene, 16);
        assert!(scene.is_empty());
        assert_eq!(system.node_count(), 0);
    }

    #[test]
    fn test_externally_removed_node_is_recreated() {
        let (mut world, mut scene, mut system) = setup();
        let entity = world.create_entity();
        world.add_component(entity, SceneNodeComponent::new());
        system.activate(&mut world, &mut scene);

        let first = world.get_component::<SceneNodeComponent>(entity).and_then(|c| c.node()).unwrap();
        scene.remove_node(first);
        system.update(&mut world, &mut scene, 16);

        let second = world.get_component::<SceneNodeComponent>(entity).and_then(|c| c.node()).unwrap();
        assert_ne!(first, second);
        assert_eq!(scene.len(), 1);
    }
}
