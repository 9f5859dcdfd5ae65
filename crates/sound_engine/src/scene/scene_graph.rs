//! Scene graph holding the nodes sounds attach to

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ecs::Entity;
use crate::foundation::collections::{NodeId, NodeMap};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// Identifier of a scene graph
///
/// The audio backend binds to one scene at a time; sounds can only be
/// attached to nodes of the bound scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(u32);

impl SceneId {
    fn next() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scene({})", self.0)
    }
}

/// A node in the scene graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneNode {
    /// Entity the node was created for
    pub owner: Entity,
}

/// Scene graph of one game state
///
/// Node ids are generational, so an id kept after its node was removed
/// never resolves to a newer node.
#[derive(Debug)]
pub struct SceneGraph {
    id: SceneId,
    name: String,
    nodes: NodeMap<SceneNode>,
}

impl SceneGraph {
    /// Create an empty scene graph with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SceneId::next(),
            name: name.into(),
            nodes: NodeMap::with_key(),
        }
    }

    /// Scene id
    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a node for an entity
    pub fn create_node(&mut self, owner: Entity) -> NodeId {
        self.nodes.insert(SceneNode { owner })
    }

    /// Remove a node, returning whether it existed
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        self.nodes.remove(node).is_some()
    }

    /// Whether the node is part of this scene
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Look up a node
    pub fn node(&self, node: NodeId) -> Option<&SceneNode> {
        self.nodes.get(node)
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every node
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;

    #[test]
    fn test_scene_ids_are_unique() {
        let first = SceneGraph::new("menu");
        let second = SceneGraph::new("level");
        assert_ne!(first.id(), second.id());
        assert_eq!(first.name(), "menu");
    }

    #[test]
    fn test_removed_node_id_is_stale() {
        let mut world = World::new();
        let entity = world.create_entity();
        let mut scene = SceneGraph::new("level");

        let node = scene.create_node(entity);
        assert!(scene.contains(node));
        assert_eq!(scene.node(node).map(|n| n.owner), Some(entity));

        assert!(scene.remove_node(node));
        assert!(!scene.remove_node(node));

        let replacement = scene.create_node(entity);
        assert!(!scene.contains(node));
        assert!(scene.contains(replacement));
        assert_eq!(scene.len(), 1);
    }
}
