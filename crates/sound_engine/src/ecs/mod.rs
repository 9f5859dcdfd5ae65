//! Entity-Component-System implementation
//!
//! A small ECS tailored to synchronizing entity data with external
//! services: typed component storage, change-tracked entity filters and
//! systems with an explicit activation lifecycle.

pub mod world;
pub mod entity;
pub mod component;
pub mod components;
pub mod filter;
pub mod query;
pub mod storage;
pub mod system;
pub mod systems;

#[cfg(test)]
mod tests;

pub use world::World;
pub use entity::Entity;
pub use component::Component;
pub use filter::{ComponentSet, EntityFilter};
pub use system::System;
pub use query::Query;
