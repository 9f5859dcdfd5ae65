//! Change-tracked values
//!
//! A [`Tracked`] wraps a value together with a "changed since last consumed"
//! flag. Writers mark the value dirty through the mutating accessors; the
//! consumer (usually a synchronizing system) polls [`Tracked::has_changes`]
//! and clears the flag once it has pushed the value elsewhere. The wrapper
//! itself never triggers any side effect.

use std::ops::Deref;

/// Value wrapper that records whether it changed since it was last consumed
///
/// New values start out dirty so that the first consumer always sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    value: T,
    changed: bool,
}

impl<T> Tracked<T> {
    /// Wrap a value, marked as changed
    pub fn new(value: T) -> Self {
        Self { value, changed: true }
    }

    /// Wrap a value, marked as already consumed
    pub fn clean(value: T) -> Self {
        Self { value, changed: false }
    }

    /// Read the value without affecting the change flag
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Mutable access; marks the value as changed
    pub fn get_mut(&mut self) -> &mut T {
        self.changed = true;
        &mut self.value
    }

    /// Replace the value; marks it as changed
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.changed = true;
    }

    /// Mark as changed without modifying the value
    pub fn touch(&mut self) {
        self.changed = true;
    }

    /// Mark as consumed
    pub fn untouch(&mut self) {
        self.changed = false;
    }

    /// Whether the value changed since it was last consumed
    pub fn has_changes(&self) -> bool {
        self.changed
    }

    /// Read-and-clear: returns whether the value was dirty and marks it clean
    pub fn take_changes(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }

    /// Unwrap the inner value
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> From<T> for Tracked<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
