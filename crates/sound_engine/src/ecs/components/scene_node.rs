//! Scene node component

use crate::scene::{NodeId, SceneGraph};

/// Places an entity in the scene graph
///
/// The node is created by the
/// [`SceneNodeSystem`](crate::ecs::systems::SceneNodeSystem) while the
/// owning state is active and dropped again when it is deactivated, so the
/// node may be unresolved for a while after the component is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneNodeComponent {
    pub(crate) node: Option<NodeId>,
}

impl SceneNodeComponent {
    /// Create an unresolved component
    pub fn new() -> Self {
        Self { node: None }
    }

    /// Node in the scene graph, if resolved
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Node usable as an attach target in `scene`
    ///
    /// `None` while unresolved or when the node no longer exists.
    pub fn attach_target(&self, scene: &SceneGraph) -> Option<NodeId> {
        self.node.filter(|node| scene.contains(*node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;

    #[test]
    fn test_attach_target_requires_live_node() {
        let mut world = World::new();
        let entity = world.create_entity();
        let mut scene = SceneGraph::new("test");
        let mut component = SceneNodeComponent::new();
        assert!(component.attach_target(&scene).is_none());

        let node = scene.create_node(entity);
        component.node = Some(node);
        assert_eq!(component.attach_target(&scene), Some(node));

        scene.remove_node(node);
        assert!(component.attach_target(&scene).is_none());
        assert_eq!(component.node(), Some(node));
    }
}
