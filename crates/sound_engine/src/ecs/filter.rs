//! Entity filters with change tracking
//!
//! An [`EntityFilter`] follows every entity that has all components of a
//! [`ComponentSet`]. Besides the current members it reports which entities
//! started matching and which stopped matching since the last call to
//! [`EntityFilter::clear_changes`].
//!
//! ```
//! use sound_engine::ecs::{EntityFilter, World};
//! use sound_engine::ecs::components::{SceneNodeComponent, SoundSourceComponent};
//!
//! let mut world = World::new();
//! let mut filter = EntityFilter::<(SceneNodeComponent, SoundSourceComponent)>::new();
//! filter.attach(&mut world);
//!
//! let entity = world.create_entity();
//! world.add_component(entity, SceneNodeComponent::new());
//! world.add_component(entity, SoundSourceComponent::new());
//!
//! assert_eq!(filter.added_entities(&world), vec![entity]);
//! filter.clear_changes(&mut world);
//! assert!(filter.added_entities(&world).is_empty());
//! ```

use std::any::TypeId;
use std::marker::PhantomData;

use super::world::FilterId;
use super::{Component, Entity, World};

/// A tuple of component types an entity must all have to match a filter
pub trait ComponentSet: 'static {
    /// Type ids of every required component
    fn type_ids() -> Vec<TypeId>;
}

macro_rules! impl_component_set {
    ($($component:ident),+) => {
        impl<$($component: Component),+> ComponentSet for ($($component,)+) {
            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$component>()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);

/// Change-tracked view of the entities matching a [`ComponentSet`]
///
/// The filter must be attached to a world before it reports anything. All
/// accessors return owned vectors so callers can mutate the world while
/// walking them.
pub struct EntityFilter<S: ComponentSet> {
    id: Option<FilterId>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: ComponentSet> EntityFilter<S> {
    /// Create a detached filter
    pub fn new() -> Self {
        Self {
            id: None,
            _marker: PhantomData,
        }
    }

    /// Register with a world
    ///
    /// Entities already matching are reported as added.
    pub fn attach(&mut self, world: &mut World) {
        if let Some(id) = self.id.take() {
            world.unregister_filter(id);
        }
        self.id = Some(world.register_filter(S::type_ids()));
    }

    /// Unregister from the world
    pub fn detach(&mut self, world: &mut World) {
        if let Some(id) = self.id.take() {
            world.unregister_filter(id);
        }
    }

    /// Whether the filter is registered
    pub fn is_attached(&self) -> bool {
        self.id.is_some()
    }

    /// Entities that started matching since the last [`Self::clear_changes`]
    pub fn added_entities(&self, world: &World) -> Vec<Entity> {
        self.state(world)
            .map(|state| state.added.clone())
            .unwrap_or_default()
    }

    /// Entities that stopped matching since the last [`Self::clear_changes`]
    ///
    /// These are no longer members; some may not exist at all anymore.
    pub fn removed_entities(&self, world: &World) -> Vec<Entity> {
        self.state(world)
            .map(|state| state.removed.clone())
            .unwrap_or_default()
    }

    /// Current members in entity order
    pub fn entities(&self, world: &World) -> Vec<Entity> {
        self.state(world)
            .map(|state| state.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `entity` currently matches
    pub fn contains(&self, world: &World, entity: Entity) -> bool {
        self.state(world)
            .is_some_and(|state| state.members.contains(&entity))
    }

    /// Number of current members
    pub fn len(&self, world: &World) -> usize {
        self.state(world).map_or(0, |state| state.members.len())
    }

    /// Whether the filter has no members
    pub fn is_empty(&self, world: &World) -> bool {
        self.len(world) == 0
    }

    /// Forget the added and removed queues
    pub fn clear_changes(&self, world: &mut World) {
        if let Some(state) = self.id.and_then(|id| world.filter_state_mut(id)) {
            state.added.clear();
            state.removed.clear();
        }
    }

    fn state<'w>(&self, world: &'w World) -> Option<&'w super::world::FilterState> {
        world.filter_state(self.id?)
    }
}

impl<S: ComponentSet> Default for EntityFilter<S> {
    fn default() -> Self {
        Self::new()
    }
}
