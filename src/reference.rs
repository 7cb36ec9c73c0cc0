use std::{cmp::Ordering, fmt, hash, ops::Deref, ptr::NonNull};

use crate::{Boxed, Error, Pointer, Retain, Upcast};

// === Reference === //

/// A non-null owning handle to an object implementing [`Retain`].
///
/// A `Reference` follows the same retain/release discipline as a [`Pointer`] but can never be null:
/// every constructor and assignment which could produce a null handle instead fails with
/// [`Error::NullReference`] before anything is retained or released. In exchange, dereferencing is
/// unconditional and dropping always releases.
///
/// ```
/// use intrusive_rc::{Error, Pointer, Reference};
///
/// let empty = Pointer::<intrusive_rc::Boxed<u32>>::null();
/// assert_eq!(Reference::try_from(empty), Err(Error::NullReference));
///
/// let answer = Reference::boxed(42u32);
/// assert_eq!(**answer, 42);
/// ```
#[repr(transparent)]
pub struct Reference<T: ?Sized + Retain> {
    // Invariant: never null.
    inner: Pointer<T>,
}

impl<T: Retain> Reference<T> {
    /// Moves `value` onto the heap and wraps it. See [`Pointer::make`].
    pub fn make(value: T) -> Self {
        Self {
            inner: Pointer::make(value),
        }
    }
}

impl<T> Reference<Boxed<T>> {
    pub fn boxed(value: T) -> Self {
        Self::make(Boxed::new(value))
    }
}

impl<T: ?Sized + Retain> Reference<T> {
    /// Constructs a reference from a raw object pointer and retains it. Fails without retaining
    /// anything if `ptr` is null.
    ///
    /// ## Safety
    ///
    /// See [`Pointer::from_raw`].
    ///
    pub unsafe fn from_raw(ptr: *const T) -> Result<Self, Error> {
        if ptr.is_null() {
            return Err(Error::NullReference);
        }

        Ok(Self {
            inner: unsafe { Pointer::from_raw(ptr) },
        })
    }

    /// Takes over an owner credit the caller already holds. Fails if `ptr` is null, in which case
    /// the caller keeps nothing since it owned nothing.
    ///
    /// ## Safety
    ///
    /// See [`Pointer::adopt`].
    ///
    pub unsafe fn adopt(ptr: *const T) -> Result<Self, Error> {
        if ptr.is_null() {
            return Err(Error::NullReference);
        }

        Ok(Self {
            inner: unsafe { Pointer::adopt(ptr) },
        })
    }

    /// Gives up the reference without releasing its referent.
    ///
    /// Note that this is an associated function, not a method.
    pub fn into_raw(me: Self) -> NonNull<T> {
        let ptr = Self::as_ptr(&me);
        _ = Pointer::into_raw(me.inner);
        ptr
    }

    /// Note that this is an associated function, not a method.
    pub fn as_ptr(me: &Self) -> NonNull<T> {
        // SAFETY: `inner` is never null.
        unsafe { me.inner.as_ptr().unwrap_unchecked() }
    }

    /// Converts back into a nullable [`Pointer`] to the same referent.
    ///
    /// Note that this is an associated function, not a method.
    pub fn into_pointer(me: Self) -> Pointer<T> {
        me.inner
    }

    /// Views the reference as a [`Pointer`] without touching the count.
    ///
    /// Note that this is an associated function, not a method.
    pub fn as_pointer(me: &Self) -> &Pointer<T> {
        &me.inner
    }

    /// See [`Pointer::upcast`].
    ///
    /// Note that this is an associated function, not a method.
    pub fn upcast<U>(me: Self) -> Reference<U>
    where
        U: ?Sized + Retain,
        T: Upcast<U>,
    {
        Reference {
            inner: me.inner.upcast(),
        }
    }

    /// See [`Pointer::upcast_ref`].
    ///
    /// Note that this is an associated function, not a method.
    pub fn upcast_ref<U>(me: &Self) -> Reference<U>
    where
        U: ?Sized + Retain,
        T: Upcast<U>,
    {
        Reference {
            inner: me.inner.upcast_ref(),
        }
    }

    /// Moves `source` into `me`, releasing the previous referent.
    ///
    /// If `source` is null, this fails and `me` is left untouched.
    ///
    /// Note that this is an associated function, not a method.
    pub fn set<U>(me: &mut Self, source: Pointer<U>) -> Result<(), Error>
    where
        U: ?Sized + Upcast<T>,
    {
        *me = Reference::try_from(source.upcast::<T>())?;
        Ok(())
    }

    /// Makes `me` point to `source`'s referent, retaining it before releasing the previous one.
    ///
    /// If `source` is null, this fails and `me` is left untouched.
    ///
    /// Note that this is an associated function, not a method.
    pub fn set_from<U>(me: &mut Self, source: &Pointer<U>) -> Result<(), Error>
    where
        U: ?Sized + Upcast<T>,
    {
        if source.is_null() {
            return Err(Error::NullReference);
        }

        me.inner.set_from(source);
        Ok(())
    }

    /// Note that this is an associated function, not a method.
    pub fn ptr_eq(me: &Self, other: &Self) -> bool {
        me.inner.ptr_eq(&other.inner)
    }
}

impl<T: ?Sized + Retain> Pointer<T> {
    /// Views this pointer as a [`Reference`] if it is non-null, without touching the count.
    pub fn as_reference(&self) -> Option<&Reference<T>> {
        if self.is_null() {
            return None;
        }

        // SAFETY: `Reference` is a `repr(transparent)` wrapper around `Pointer` whose only
        // invariant, non-nullness, we just checked.
        Some(unsafe { &*(self as *const Pointer<T> as *const Reference<T>) })
    }
}

impl<T: ?Sized + Retain> TryFrom<Pointer<T>> for Reference<T> {
    type Error = Error;

    fn try_from(inner: Pointer<T>) -> Result<Self, Self::Error> {
        if inner.is_null() {
            return Err(Error::NullReference);
        }

        Ok(Self { inner })
    }
}

impl<T: ?Sized + Retain> From<Reference<T>> for Pointer<T> {
    fn from(me: Reference<T>) -> Self {
        Reference::into_pointer(me)
    }
}

impl<T: ?Sized + Retain> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.inner.clone_from(&source.inner);
    }
}

impl<T: ?Sized + Retain> Deref for Reference<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: `inner` is never null and its owner credit keeps the referent alive.
        unsafe { Self::as_ptr(self).as_ref() }
    }
}

impl<T: ?Sized + Retain + fmt::Debug> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + Retain> fmt::Pointer for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.inner, f)
    }
}

impl<T: ?Sized + Retain> Eq for Reference<T> {}

impl<T: ?Sized + Retain> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: ?Sized + Retain> Ord for Reference<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}

impl<T: ?Sized + Retain> PartialOrd for Reference<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized + Retain> hash::Hash for Reference<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}
