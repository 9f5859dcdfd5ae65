//! Entity implementation

use std::fmt;

/// Entity identifier
///
/// Ids are handed out sequentially by [`crate::ecs::World`] and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    id: u32,
}

impl Entity {
    /// Create a new entity with the given ID
    pub(super) fn new(id: u32) -> Self {
        Self { id }
    }

    /// Get the entity ID
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.id)
    }
}
