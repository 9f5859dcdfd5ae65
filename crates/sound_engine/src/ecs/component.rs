//! Component trait and implementations

/// Marker trait for components
pub trait Component: 'static + Send + Sync {}

// Implement Component for engine components
impl Component for crate::ecs::components::SceneNodeComponent {}
impl Component for crate::ecs::components::SoundSourceComponent {}
