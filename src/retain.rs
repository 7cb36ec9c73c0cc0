use std::ptr::NonNull;

// === Retain === //

/// The lifecycle capability every object held by a [`Pointer`](crate::Pointer) or
/// [`Reference`](crate::Reference) must provide.
///
/// Handles never destroy the objects they point to. They only call [`retain`](Retain::retain) when
/// they acquire an owner credit and [`release`](Retain::release) when they give one up. Whether and
/// how the object is reclaimed is entirely up to its implementation of this trait.
///
/// Most types should not implement this trait by hand. Embed a [`RefCount`](crate::RefCount) and
/// use [`ref_counted!`](crate::ref_counted), or wrap a plain value in a [`Boxed`](crate::Boxed).
///
/// This trait is [`dyn` compatible] so handles may point to trait objects whose trait has `Retain`
/// as a supertrait.
///
/// # Safety
///
/// Implementors must uphold all of the following:
///
/// - A freshly constructed object carries exactly one implicit owner. [`Pointer::make`] consumes
///   that credit without calling `retain`.
/// - `retain` adds exactly one owner and may be called concurrently from any number of threads.
/// - `release` removes exactly one owner and destroys the object if, and only if, that was the last
///   owner. Among concurrent calls, exactly one may observe the zero crossing.
/// - The object stays valid for as long as it has at least one owner.
///
/// [`Pointer::make`]: crate::Pointer::make
/// [`dyn` compatible]: https://doc.rust-lang.org/reference/items/traits.html#r-items.traits.dyn-compatible
pub unsafe trait Retain {
    /// Adds an owner to the object.
    fn retain(&self);

    /// Removes an owner from the object, destroying it if it was the last one.
    ///
    /// # Safety
    ///
    /// The caller must own one of the object's owner credits and hand it over by making this call.
    /// The object may be gone by the time this returns so the caller must not use it afterwards.
    unsafe fn release(&self);
}

// === Upcast === //

/// Converts a pointer to `Self` into a pointer to the related type `U` while keeping its address.
///
/// This is what lets a `Pointer<Circle>` become a `Pointer<dyn Shape>` that shares the same
/// counter. Implement it with [`upcast!`](crate::upcast), which only ever emits an unsizing
/// coercion.
///
/// # Safety
///
/// [`upcast`](Upcast::upcast) must return a pointer to the very same object, so that calling
/// [`Retain`] methods through the result operates on the same counter as calling them through
/// `Self`.
pub unsafe trait Upcast<U: ?Sized + Retain>: Retain {
    fn upcast(ptr: NonNull<Self>) -> NonNull<U>;
}

unsafe impl<T: ?Sized + Retain> Upcast<T> for T {
    fn upcast(ptr: NonNull<Self>) -> NonNull<T> {
        ptr
    }
}

/// Implements [`Upcast`] from a type into a related type, usually a trait object.
///
/// ```
/// use intrusive_rc::{Pointer, RefCount, Retain, ref_counted, upcast};
///
/// pub trait Shape: Retain {
///     fn area(&self) -> f64;
/// }
///
/// pub struct Square {
///     count: RefCount,
///     side: f64,
/// }
///
/// ref_counted!(Square => count);
/// upcast!(Square => dyn Shape);
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.side * self.side
///     }
/// }
///
/// let square = Pointer::make(Square { count: RefCount::new(), side: 2.0 });
/// let shape: Pointer<dyn Shape> = square.upcast_ref();
///
/// assert_eq!(shape.area(), 4.0);
/// assert!(shape.ptr_eq(&square.upcast_ref()));
/// ```
#[macro_export]
macro_rules! upcast {
    (@emit [$($generics:tt)*] $from:ty => $to:ty) => {
        unsafe impl<$($generics)*> $crate::Upcast<$to> for $from {
            fn upcast(ptr: ::std::ptr::NonNull<Self>) -> ::std::ptr::NonNull<$to> {
                ptr
            }
        }
    };
    (impl[$($generics:tt)*] $from:ty => $to:ty) => {
        $crate::upcast!(@emit [$($generics)*] $from => $to);
    };
    ($from:ty => $to:ty) => {
        $crate::upcast!(@emit [] $from => $to);
    };
}
