//! Query system for component access

use crate::ecs::storage::ComponentStorage;
use crate::ecs::{Component, Entity};

/// Read-only view over every component of one type
pub struct Query<'w, T: Component> {
    storage: Option<&'w ComponentStorage<T>>,
}

impl<'w, T: Component> Query<'w, T> {
    /// Create a query over a storage (or over nothing, if the type was never added)
    pub(crate) fn new(storage: Option<&'w ComponentStorage<T>>) -> Self {
        Self { storage }
    }

    /// Iterate over `(entity, component)` pairs in entity order
    pub fn iter(&self) -> impl Iterator<Item = (&'w Entity, &'w T)> + 'w {
        self.storage.into_iter().flat_map(|storage| storage.iter())
    }

    /// Number of matching components
    pub fn len(&self) -> usize {
        self.storage.map_or(0, |storage| storage.len())
    }

    /// Whether no entity has this component
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
