use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use crate::RefCount;

// === Boxed === //

/// Adapts a plain value of type `T` into an object which can be held by a
/// [`Pointer`](crate::Pointer) or [`Reference`](crate::Reference).
///
/// `T` does not need to know anything about reference counting; the count lives next to it.
///
/// ```
/// use intrusive_rc::{Boxed, Pointer};
///
/// let names = Pointer::boxed(vec!["a", "b"]);
/// let alias = names.clone();
///
/// assert_eq!(alias.value().len(), 2);
/// assert_eq!(names.ref_count(), 2);
/// ```
#[derive(Default)]
pub struct Boxed<T> {
    count: RefCount,
    value: T,
}

crate::ref_counted!(impl[T] Boxed<T> => count);

impl<T: fmt::Debug> fmt::Debug for Boxed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T> From<T> for Boxed<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Deref for Boxed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for Boxed<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl<T> Boxed<T> {
    pub const fn new(value: T) -> Self {
        Self {
            count: RefCount::new(),
            value,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Mutable access is only available while the box is exclusively borrowed, i.e. before it has
    /// been shared through a handle. Shared boxes need interior mutability in `T`.
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// The number of owners currently holding this box.
    pub fn ref_count(&self) -> usize {
        self.count.get()
    }
}
