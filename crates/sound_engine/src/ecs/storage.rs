//! Component Storage
//!
//! One [`ComponentStorage`] per component type, type-erased behind
//! [`AnyStorage`] so the world can drop every component of an entity
//! without knowing the concrete types.

use std::any::Any;
use std::collections::BTreeMap;

use crate::ecs::{Component, Entity};

/// Type-erased view of a component storage
pub(crate) trait AnyStorage: Any {
    /// Drop the component of `entity`, returning whether one existed
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Whether `entity` has a component in this storage
    fn contains(&self, entity: Entity) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage for all components of one type
///
/// Ordered by entity so that iteration (and therefore every system that
/// walks a query) is deterministic.
pub struct ComponentStorage<T: Component> {
    components: BTreeMap<Entity, T>,
}

impl<T: Component> ComponentStorage<T> {
    /// Create an empty storage
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    /// Insert a component, returning the one it replaced
    pub fn insert(&mut self, entity: Entity, component: T) -> Option<T> {
        self.components.insert(entity, component)
    }

    /// Remove a component
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        self.components.remove(&entity)
    }

    /// Get a component
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.components.get(&entity)
    }

    /// Get a mutable component
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut(&entity)
    }

    /// Iterate over all components in entity order
    pub fn iter(&self) -> impl Iterator<Item = (&Entity, &T)> {
        self.components.iter()
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<T: Component> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> AnyStorage for ComponentStorage<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.components.remove(&entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        self.components.contains_key(&entity)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
