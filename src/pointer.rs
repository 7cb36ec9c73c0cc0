use std::{
    any::type_name,
    cmp::Ordering,
    fmt, hash,
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops::Deref,
    ptr::{self, NonNull},
};

use derive_where::derive_where;

use crate::{Boxed, Retain, Upcast};

// === Pointer === //

/// A nullable owning handle to an object implementing [`Retain`].
///
/// While a `Pointer` is non-null, exactly one of its referent's owner credits belongs to it. Cloning
/// the pointer retains the referent, dropping it releases the referent and moving it transfers the
/// credit without touching the count at all. The pointer itself never destroys anything; that is
/// left to the object's [`Retain::release`] implementation.
///
/// `T` may be unsized so that `Pointer<dyn Trait>` can be obtained from a pointer to any type
/// implementing [`Upcast<dyn Trait>`](Upcast), sharing the same count.
///
/// Dereferencing a null `Pointer` panics. Use [`Pointer::get`] or [`Pointer::is_some`] to check
/// first.
#[derive_where(Default)]
#[repr(transparent)]
pub struct Pointer<T: ?Sized + Retain> {
    ptr: Option<NonNull<T>>,
    _ty: PhantomData<T>,
}

// The count is atomic but the payload is shared, hence the same bounds as `Arc`.
unsafe impl<T: ?Sized + Retain + Send + Sync> Send for Pointer<T> {}

unsafe impl<T: ?Sized + Retain + Send + Sync> Sync for Pointer<T> {}

impl<T: Retain> Pointer<T> {
    /// Moves `value` onto the heap and wraps it.
    ///
    /// The object's initial owner credit is handed to the returned pointer so its count stays at
    /// one. The object will be reclaimed through [`Box`] by its `Retain` implementation.
    pub fn make(value: T) -> Self {
        Self {
            ptr: Some(NonNull::from(Box::leak(Box::new(value)))),
            _ty: PhantomData,
        }
    }
}

impl<T> Pointer<Boxed<T>> {
    /// Wraps a plain `value` into a fresh [`Boxed`] and points to it.
    pub fn boxed(value: T) -> Self {
        Self::make(Boxed::new(value))
    }
}

impl<T: ?Sized + Retain> Pointer<T> {
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _ty: PhantomData,
        }
    }

    /// Constructs a pointer from a raw object pointer, retaining it if it is non-null.
    ///
    /// ## Safety
    ///
    /// `ptr` must either be null or point to a live object which is kept alive by some other owner
    /// for the duration of this call.
    ///
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        let ptr = NonNull::new(ptr.cast_mut());

        if let Some(ptr) = ptr {
            unsafe { ptr.as_ref() }.retain();
        }

        Self {
            ptr,
            _ty: PhantomData,
        }
    }

    /// Constructs a pointer which takes over an owner credit the caller already holds, without
    /// retaining the object. This is the inverse of [`Pointer::into_raw`].
    ///
    /// ## Safety
    ///
    /// `ptr` must either be null or point to a live object and the caller must own one of its
    /// owner credits, which is transferred to the returned pointer.
    ///
    pub unsafe fn adopt(ptr: *const T) -> Self {
        Self {
            ptr: NonNull::new(ptr.cast_mut()),
            _ty: PhantomData,
        }
    }

    /// Gives up the pointer without releasing its referent. The caller becomes responsible for the
    /// owner credit, usually by passing it back to [`Pointer::adopt`].
    ///
    /// Note that this is an associated function, not a method.
    pub fn into_raw(me: Self) -> Option<NonNull<T>> {
        ManuallyDrop::new(me).ptr
    }

    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: our owner credit keeps the referent alive for as long as we are borrowed.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn is_some(&self) -> bool {
        self.ptr.is_some()
    }

    /// Moves the referent out, leaving a null pointer behind. The count is not touched.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Replaces the referent with `other`'s, returning the previous one.
    pub fn replace(&mut self, other: Self) -> Self {
        mem::replace(self, other)
    }

    /// Converts this pointer into a pointer to a related type sharing the same count. Like any
    /// other move, this neither retains nor releases.
    pub fn upcast<U>(self) -> Pointer<U>
    where
        U: ?Sized + Retain,
        T: Upcast<U>,
    {
        Pointer {
            ptr: Self::into_raw(self).map(<T as Upcast<U>>::upcast),
            _ty: PhantomData,
        }
    }

    /// Like [`Pointer::upcast`] but leaves `self` in place, retaining the referent for the new
    /// pointer.
    pub fn upcast_ref<U>(&self) -> Pointer<U>
    where
        U: ?Sized + Retain,
        T: Upcast<U>,
    {
        self.clone().upcast()
    }

    /// Moves `source` into `self`, converting it if necessary. The previous referent is released.
    pub fn set<U>(&mut self, source: Pointer<U>)
    where
        U: ?Sized + Upcast<T>,
    {
        *self = source.upcast();
    }

    /// Makes `self` point to `source`'s referent, converting it if necessary.
    ///
    /// The new referent is retained before the previous one is released so pointing a handle at the
    /// object it already owns never destroys that object.
    pub fn set_from<U>(&mut self, source: &Pointer<U>)
    where
        U: ?Sized + Upcast<T>,
    {
        *self = source.upcast_ref();
    }

    /// Returns `true` if both pointers refer to the same object or are both null.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.thin_addr() == other.thin_addr()
    }

    fn thin_addr(&self) -> *const () {
        self.ptr
            .map_or(ptr::null(), |ptr| ptr.as_ptr().cast_const().cast::<()>())
    }
}

impl<T: ?Sized + Retain> Clone for Pointer<T> {
    fn clone(&self) -> Self {
        if let Some(referent) = self.get() {
            referent.retain();
        }

        Self {
            ptr: self.ptr,
            _ty: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        // Retain before release: `source` may share our referent.
        *self = source.clone();
    }
}

impl<T: ?Sized + Retain> Drop for Pointer<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr {
            // SAFETY: we own one owner credit and give it up here, never touching `ptr` again.
            unsafe { ptr.as_ref().release() };
        }
    }
}

impl<T: ?Sized + Retain> Deref for Pointer<T> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(referent) => referent,
            None => panic!("attempted to dereference a null Pointer<{}>", type_name::<T>()),
        }
    }
}

impl<T: ?Sized + Retain + fmt::Debug> fmt::Debug for Pointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(referent) => referent.fmt(f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized + Retain> fmt::Pointer for Pointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.thin_addr(), f)
    }
}

impl<T: ?Sized + Retain> Eq for Pointer<T> {}

impl<T: ?Sized + Retain> PartialEq for Pointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized + Retain> Ord for Pointer<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.thin_addr().cmp(&other.thin_addr())
    }
}

impl<T: ?Sized + Retain> PartialOrd for Pointer<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized + Retain> hash::Hash for Pointer<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.thin_addr().hash(state);
    }
}
