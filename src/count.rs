use std::{
    fmt,
    process::abort,
    sync::atomic::{AtomicUsize, Ordering::*, fence},
};

// === RefCount === //

const MAX_REFCOUNT: usize = isize::MAX as usize;

/// The default owner count for types implementing [`Retain`](crate::Retain) through
/// [`ref_counted!`](crate::ref_counted).
///
/// A `RefCount` starts at one: whoever constructs the object is its first owner until a handle
/// takes that credit over (see [`Pointer::make`](crate::Pointer::make)).
pub struct RefCount {
    count: AtomicUsize,
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.get()).finish()
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCount {
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
        }
    }

    /// Fetches the current number of owners. Other threads may change it at any moment so this is
    /// only useful for diagnostics.
    pub fn get(&self) -> usize {
        self.count.load(Relaxed)
    }

    pub fn increment(&self) {
        // New owners can only be created from existing ones so no synchronization is needed here.
        let old = self.count.fetch_add(1, Relaxed);

        if old > MAX_REFCOUNT {
            abort();
        }
    }

    /// Increments the count unless it has already dropped to zero. Returns whether an owner was
    /// added.
    pub(crate) fn try_increment(&self) -> bool {
        self.count
            .fetch_update(Acquire, Relaxed, |old| {
                if old == 0 {
                    return None;
                }

                if old > MAX_REFCOUNT {
                    abort();
                }

                Some(old + 1)
            })
            .is_ok()
    }

    /// Decrements the count, returning `true` if this removed the last owner.
    ///
    /// When this returns `true`, every write made by any former owner happens-before the return.
    ///
    /// ## Safety
    ///
    /// The caller must own one of the object's owner credits and give it up by making this call.
    /// When this returns `true`, the caller is responsible for destroying the object.
    ///
    /// Safe code holding a handle cannot give away the handle's credit:
    ///
    /// ```compile_fail,E0133
    /// use intrusive_rc::{Pointer, RefCount, ref_counted};
    ///
    /// pub struct Node {
    ///     count: RefCount,
    /// }
    ///
    /// ref_counted!(Node => count);
    ///
    /// let node = Pointer::make(Node { count: RefCount::new() });
    /// let _ = node.count.decrement();
    /// ```
    #[must_use]
    pub unsafe fn decrement(&self) -> bool {
        if self.count.fetch_sub(1, Release) != 1 {
            return false;
        }

        fence(Acquire);
        true
    }
}

// === Destruction === //

/// Reclaims a heap object whose last owner has just been released.
///
/// # Safety
///
/// `object` must have been allocated through a `Box` and must have no remaining owners.
#[doc(hidden)]
pub unsafe fn destroy_boxed<T: ?Sized>(object: *const T) {
    log::trace!(
        "destroying {} at {:p}",
        std::any::type_name::<T>(),
        object.cast::<()>()
    );

    drop(unsafe { Box::from_raw(object.cast_mut()) });
}

/// Implements [`Retain`](crate::Retain) for a type that embeds a [`RefCount`] (or, with the `weak`
/// flag, a [`WeakRefCount`](crate::WeakRefCount)).
///
/// The object is reclaimed through [`Box`] once its last owner releases it, so objects of that type
/// must only ever be shared through [`Pointer::make`](crate::Pointer::make) or another `Box`
/// allocation. Since the `Box` is of the concrete type, the concrete destructor runs even when the
/// last owner was a `Pointer<dyn Trait>`.
///
/// ```
/// use intrusive_rc::{Pointer, RefCount, ref_counted};
///
/// pub struct Node {
///     count: RefCount,
///     next: Pointer<Node>,
/// }
///
/// ref_counted!(Node => count);
///
/// let tail = Pointer::make(Node { count: RefCount::new(), next: Pointer::null() });
/// let head = Pointer::make(Node { count: RefCount::new(), next: tail.clone() });
///
/// assert_eq!(tail.count.get(), 2);
/// drop(head);
/// assert_eq!(tail.count.get(), 1);
/// ```
///
/// Generic types list their parameters up front:
///
/// ```
/// use intrusive_rc::{RefCount, ref_counted};
///
/// pub struct Labeled<T> {
///     count: RefCount,
///     label: &'static str,
///     value: T,
/// }
///
/// ref_counted!(impl[T] Labeled<T> => count);
/// ```
#[macro_export]
macro_rules! ref_counted {
    (@emit [$($generics:tt)*] $ty:ty => $field:ident) => {
        unsafe impl<$($generics)*> $crate::Retain for $ty {
            fn retain(&self) {
                self.$field.increment();
            }

            unsafe fn release(&self) {
                // SAFETY: the caller hands us its owner credit and we reclaim the object at zero.
                unsafe {
                    if self.$field.decrement() {
                        $crate::destroy_boxed(self as *const Self);
                    }
                }
            }
        }
    };
    (@emit [$($generics:tt)*] $ty:ty => $field:ident, weak) => {
        $crate::ref_counted!(@emit [$($generics)*] $ty => $field);

        unsafe impl<$($generics)*> $crate::Weakable for $ty {
            fn weak_block(&self) -> &::std::sync::Arc<$crate::WeakBlock> {
                self.$field.block()
            }
        }
    };
    (impl[$($generics:tt)*] $ty:ty => $field:ident $(, $flag:ident)?) => {
        $crate::ref_counted!(@emit [$($generics)*] $ty => $field $(, $flag)?);
    };
    ($ty:ty => $field:ident $(, $flag:ident)?) => {
        $crate::ref_counted!(@emit [] $ty => $field $(, $flag)?);
    };
}
