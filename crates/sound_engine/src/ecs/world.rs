//! ECS World implementation

use super::storage::{AnyStorage, ComponentStorage};
use super::{Component, Entity, Query};
use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};

/// Identifier of a filter registered with a [`World`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FilterId(usize);

/// Bookkeeping for one registered entity filter
///
/// Kept up to date eagerly on every structural change of the world, so the
/// change queues see every transition, including an entity that leaves and
/// rejoins within a single tick.
#[derive(Debug, Default)]
pub(crate) struct FilterState {
    required: Vec<TypeId>,
    pub(crate) members: BTreeSet<Entity>,
    pub(crate) added: Vec<Entity>,
    pub(crate) removed: Vec<Entity>,
}

impl FilterState {
    fn watches(&self, type_id: TypeId) -> bool {
        self.required.contains(&type_id)
    }

    fn join(&mut self, entity: Entity) {
        if self.members.insert(entity) {
            self.added.push(entity);
        }
    }

    fn leave(&mut self, entity: Entity) {
        if self.members.remove(&entity) {
            // Joined and left within one tick: only the removal is reported.
            self.added.retain(|added| *added != entity);
            if !self.removed.contains(&entity) {
                self.removed.push(entity);
            }
        }
    }
}

/// ECS World containing all entities and components
pub struct World {
    next_entity_id: u32,
    entities: BTreeSet<Entity>,
    component_storages: HashMap<TypeId, Box<dyn AnyStorage>>,
    filters: Vec<Option<FilterState>>,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            next_entity_id: 0,
            entities: BTreeSet::new(),
            component_storages: HashMap::new(),
            filters: Vec::new(),
        }
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        let entity = Entity::new(self.next_entity_id);
        self.next_entity_id += 1;
        self.entities.insert(entity);
        entity
    }

    /// Destroy an entity together with all of its components
    ///
    /// Returns `false` if the entity did not exist.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.entities.remove(&entity) {
            return false;
        }

        let removed_types: Vec<TypeId> = self
            .component_storages
            .iter_mut()
            .filter_map(|(type_id, storage)| storage.remove_entity(entity).then_some(*type_id))
            .collect();

        for type_id in removed_types {
            self.on_component_removed(entity, type_id);
        }
        log::trace!("{} destroyed", entity);
        true
    }

    /// Whether the entity is alive
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    /// Add a component to an entity
    ///
    /// Replacing an existing component of the same type is reported to
    /// filters as a removal followed by an addition, since the new component
    /// shares no state with the old one. Returns the replaced component.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        if !self.contains(entity) {
            log::warn!("Ignoring {} added to dead {}", std::any::type_name::<T>(), entity);
            return None;
        }

        let previous = self.storage_mut::<T>().insert(entity, component);
        let type_id = TypeId::of::<T>();
        if previous.is_some() {
            self.on_component_removed(entity, type_id);
        }
        self.on_component_added(entity, type_id);
        previous
    }

    /// Remove a component from an entity
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let removed = self.storage_mut_if_exists::<T>()?.remove(entity)?;
        self.on_component_removed(entity, TypeId::of::<T>());
        Some(removed)
    }

    /// Get a component from an entity
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Get a mutable component from an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut_if_exists::<T>()?.get_mut(entity)
    }

    /// Whether the entity has a component of type `T`
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    /// Query all components of one type
    pub fn query<T: Component>(&self) -> Query<'_, T> {
        Query::new(self.storage::<T>())
    }

    /// Get an iterator over all entities
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn register_filter(&mut self, required: Vec<TypeId>) -> FilterId {
        let mut state = FilterState {
            required,
            ..FilterState::default()
        };
        for entity in &self.entities {
            if self.matches(*entity, &state.required) {
                state.join(*entity);
            }
        }

        let slot = self.filters.iter().position(Option::is_none);
        match slot {
            Some(index) => {
                self.filters[index] = Some(state);
                FilterId(index)
            }
            None => {
                self.filters.push(Some(state));
                FilterId(self.filters.len() - 1)
            }
        }
    }

    pub(crate) fn unregister_filter(&mut self, id: FilterId) {
        if let Some(slot) = self.filters.get_mut(id.0) {
            *slot = None;
        }
    }

    pub(crate) fn filter_state(&self, id: FilterId) -> Option<&FilterState> {
        self.filters.get(id.0)?.as_ref()
    }

    pub(crate) fn filter_state_mut(&mut self, id: FilterId) -> Option<&mut FilterState> {
        self.filters.get_mut(id.0)?.as_mut()
    }

    fn matches(&self, entity: Entity, required: &[TypeId]) -> bool {
        required.iter().all(|type_id| {
            self.component_storages
                .get(type_id)
                .is_some_and(|storage| storage.contains(entity))
        })
    }

    fn on_component_added(&mut self, entity: Entity, type_id: TypeId) {
        for index in 0..self.filters.len() {
            let Some(required) = self.filters[index]
                .as_ref()
                .filter(|state| state.watches(type_id))
                .map(|state| state.required.clone())
            else {
                continue;
            };
            if self.matches(entity, &required) {
                if let Some(state) = self.filters[index].as_mut() {
                    state.join(entity);
                }
            }
        }
    }

    fn on_component_removed(&mut self, entity: Entity, type_id: TypeId) {
        for state in self.filters.iter_mut().flatten() {
            if state.watches(type_id) {
                state.leave(entity);
            }
        }
    }

    fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.component_storages
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<ComponentStorage<T>>()
    }

    fn storage_mut_if_exists<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.component_storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
    }

    fn storage_mut<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        let storage = self
            .component_storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStorage::<T>::new()));
        match storage.as_any_mut().downcast_mut::<ComponentStorage<T>>() {
            Some(storage) => storage,
            None => unreachable!("component storage registered under a foreign TypeId"),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position(f32);
    struct Velocity(f32);

    impl Component for Position {}
    impl Component for Velocity {}

    #[test]
    fn test_add_get_remove() {
        let mut world = World::new();
        let entity = world.create_entity();

        assert!(world.add_component(entity, Position(1.0)).is_none());
        assert_eq!(world.get_component::<Position>(entity).map(|p| p.0), Some(1.0));

        world.get_component_mut::<Position>(entity).unwrap().0 = 2.0;
        let replaced = world.add_component(entity, Position(3.0));
        assert_eq!(replaced.map(|p| p.0), Some(2.0));

        assert_eq!(world.remove_component::<Position>(entity).map(|p| p.0), Some(3.0));
        assert!(!world.has_component::<Position>(entity));
        assert!(world.remove_component::<Velocity>(entity).is_none());
    }

    #[test]
    fn test_destroy_entity_drops_components() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.add_component(entity, Position(0.0));
        world.add_component(entity, Velocity(1.0));

        assert!(world.destroy_entity(entity));
        assert!(!world.destroy_entity(entity));
        assert!(!world.contains(entity));
        assert!(world.query::<Position>().is_empty());
        assert!(world.query::<Velocity>().is_empty());
    }

    #[test]
    fn test_components_on_dead_entity_are_ignored() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.destroy_entity(entity);

        world.add_component(entity, Position(0.0));
        assert!(world.query::<Position>().is_empty());
    }

    #[test]
    fn test_query_is_ordered_by_entity() {
        let mut world = World::new();
        let entities: Vec<Entity> = (0..4).map(|_| world.create_entity()).collect();
        for entity in entities.iter().rev() {
            world.add_component(*entity, Position(entity.id() as f32));
        }

        let seen: Vec<Entity> = world.query::<Position>().iter().map(|(entity, _)| *entity).collect();
        assert_eq!(seen, entities);
        assert_eq!(world.entity_count(), 4);
    }
}
