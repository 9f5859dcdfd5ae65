//! Specialized collection types

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable identifier of a node inside a [`crate::scene::SceneGraph`]
    ///
    /// Keys are versioned, so an id kept after its node was removed never
    /// resolves to a node created later in the same slot.
    pub struct NodeId;
}

/// Slot map keyed by scene node ids
pub type NodeMap<T> = SlotMap<NodeId, T>;
