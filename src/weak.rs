use std::{fmt, ptr::NonNull, sync::Arc};

use derive_where::derive_where;

use crate::{Error, Pointer, RefCount, Reference, Retain, Upcast};

// === WeakBlock === //

/// The indirection shared between a weakable object and every [`Weak`] reference to it.
///
/// The object's owner count lives here rather than in the object itself so that it can still be
/// inspected after the object is gone. The block's own lifetime is governed by its `Arc`, which
/// counts the object (while it is alive) plus every weak reference.
#[derive(Debug)]
pub struct WeakBlock {
    owners: RefCount,
}

impl WeakBlock {
    /// Returns `true` while the object still has at least one owner.
    pub fn is_alive(&self) -> bool {
        self.owners.get() > 0
    }

    pub fn owners(&self) -> usize {
        self.owners.get()
    }
}

// === WeakRefCount === //

/// A variant of [`RefCount`] for objects which can be observed through [`Weak`] references.
///
/// Use it with `ref_counted!(Type => field, weak)`:
///
/// ```
/// use intrusive_rc::{Pointer, WeakRefCount, ref_counted};
///
/// pub struct Session {
///     count: WeakRefCount,
///     user: String,
/// }
///
/// ref_counted!(Session => count, weak);
///
/// let session = Pointer::make(Session { count: WeakRefCount::new(), user: "ada".into() });
/// let observer = session.downgrade();
///
/// assert_eq!(observer.upgrade().unwrap().user, "ada");
///
/// drop(session);
/// assert!(!observer.is_alive());
/// assert!(observer.upgrade().is_err());
/// ```
#[derive(Debug)]
pub struct WeakRefCount {
    block: Arc<WeakBlock>,
}

impl Default for WeakRefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl WeakRefCount {
    pub fn new() -> Self {
        Self {
            block: Arc::new(WeakBlock {
                owners: RefCount::new(),
            }),
        }
    }

    pub fn get(&self) -> usize {
        self.block.owners.get()
    }

    pub fn increment(&self) {
        self.block.owners.increment();
    }

    /// See [`RefCount::decrement`].
    ///
    /// ## Safety
    ///
    /// The caller must own one of the object's owner credits and give it up by making this call.
    #[must_use]
    pub unsafe fn decrement(&self) -> bool {
        unsafe { self.block.owners.decrement() }
    }

    /// The number of [`Weak`] references currently observing the object.
    pub fn weak_count(&self) -> usize {
        Arc::strong_count(&self.block) - 1
    }

    pub fn block(&self) -> &Arc<WeakBlock> {
        &self.block
    }
}

// === Weakable === //

/// An object which can be observed through [`Weak`] references. Implement it through
/// `ref_counted!(Type => field, weak)`.
///
/// # Safety
///
/// The object's [`Retain`] implementation must count owners through the
/// [`WeakBlock`] returned by [`weak_block`](Weakable::weak_block), and `weak_block` must always
/// return the same block.
pub unsafe trait Weakable: Retain {
    fn weak_block(&self) -> &Arc<WeakBlock>;
}

// === Weak === //

/// A non-owning observer of a [`Weakable`] object.
///
/// A `Weak` never keeps its object alive. It can report whether the object still exists and can be
/// upgraded back into an owning handle for as long as it does. Upgrading only ever increments a
/// nonzero owner count, so an upgrade racing with the object's destruction either wins (and the
/// object stays alive) or fails cleanly.
#[derive_where(Clone, Default)]
pub struct Weak<T: ?Sized + Weakable> {
    target: Option<(Arc<WeakBlock>, NonNull<T>)>,
}

unsafe impl<T: ?Sized + Weakable + Send + Sync> Send for Weak<T> {}

unsafe impl<T: ?Sized + Weakable + Send + Sync> Sync for Weak<T> {}

impl<T: ?Sized + Weakable> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}

impl<T: ?Sized + Weakable> Weak<T> {
    /// Constructs a weak reference which observes nothing and is never alive.
    pub const fn new() -> Self {
        Self { target: None }
    }

    pub fn is_alive(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|(block, _)| block.is_alive())
    }

    /// Attempts to obtain an owning handle to the object, failing with [`Error::Expired`] if it has
    /// already been destroyed.
    pub fn upgrade(&self) -> Result<Reference<T>, Error> {
        let Some((block, ptr)) = &self.target else {
            return Err(Error::Expired);
        };

        if !block.owners.try_increment() {
            log::trace!(
                "failed to upgrade weak reference to destroyed {}",
                std::any::type_name::<T>()
            );
            return Err(Error::Expired);
        }

        // SAFETY: we just acquired an owner credit from a nonzero count, so the object is alive and
        // stays alive until the returned reference releases it.
        unsafe { Reference::adopt(ptr.as_ptr()) }
    }

    /// Like [`Weak::upgrade`] but returns a null [`Pointer`] once the object is gone.
    pub fn to_pointer(&self) -> Pointer<T> {
        self.upgrade()
            .map(Reference::into_pointer)
            .unwrap_or_default()
    }

    /// Converts this weak reference into one observing the same object through a related type.
    pub fn upcast<U>(self) -> Weak<U>
    where
        U: ?Sized + Weakable,
        T: Upcast<U>,
    {
        Weak {
            target: self
                .target
                .map(|(block, ptr)| (block, <T as Upcast<U>>::upcast(ptr))),
        }
    }

    /// Returns `true` if both weak references observe the same object or both observe nothing.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (Some((lhs, _)), Some((rhs, _))) => Arc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized + Weakable> Pointer<T> {
    /// Creates a [`Weak`] reference to this pointer's referent. A null pointer yields a `Weak`
    /// which is never alive.
    pub fn downgrade(&self) -> Weak<T> {
        let Some(referent) = self.get() else {
            return Weak::new();
        };

        Weak {
            target: Some((referent.weak_block().clone(), NonNull::from(referent))),
        }
    }
}

impl<T: ?Sized + Weakable> Reference<T> {
    /// See [`Pointer::downgrade`].
    ///
    /// Note that this is an associated function, not a method.
    pub fn downgrade(me: &Self) -> Weak<T> {
        Reference::as_pointer(me).downgrade()
    }
}
