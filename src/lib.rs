//! Intrusive reference counting for Rust.
//!
//! Objects opt into shared ownership by carrying their own owner count and exposing two lifecycle
//! operations through the [`Retain`] trait. Two handle types drive those operations: [`Pointer`],
//! which may be null, and [`Reference`], which may not.
//!
//! ```
//! use intrusive_rc::{Pointer, RefCount, ref_counted};
//!
//! pub struct Texture {
//!     count: RefCount,
//!     width: u32,
//!     height: u32,
//! }
//!
//! ref_counted!(Texture => count);
//!
//! let texture = Pointer::make(Texture { count: RefCount::new(), width: 64, height: 32 });
//! let shared = texture.clone();
//!
//! assert_eq!(shared.width * shared.height, 2048);
//! assert_eq!(texture.count.get(), 2);
//! ```
//!
//! # Motivation
//!
//! [`Arc`](std::sync::Arc) stores its count in a header it allocates next to the value. An intrusive
//! count instead lives inside the object itself, which means...
//!
//! - A raw pointer to the object is enough to mint a new owning handle (see
//!   [`Pointer::from_raw`]), which is what you need when objects round-trip through C APIs,
//!   intrusive collections, or callbacks which only carry a `*const T`.
//! - The object decides how it is reclaimed. Handles never free anything themselves; they just
//!   call [`Retain::retain`] and [`Retain::release`].
//! - A `Pointer<dyn Trait>` is a plain (fat) pointer to the object and shares the object's only
//!   counter with every other handle to it, whatever their type.
//!
//! # The Lifecycle
//!
//! Every object starts its life with exactly one owner: whoever constructed it. Wrapping it with
//! [`Pointer::make`] hands that credit over to the new pointer, so a freshly made object has a
//! count of one.
//!
//! From then on...
//!
//! - Cloning a handle retains the object.
//! - Moving a handle transfers its credit and leaves the count alone. [`Pointer::take`] performs a
//!   move which visibly leaves a null pointer behind.
//! - Dropping or overwriting a handle releases its previous referent.
//! - The release which takes the count to zero destroys the object.
//!
//! ```
//! # use intrusive_rc::{Pointer, RefCount, ref_counted};
//! # pub struct Texture {
//! #     count: RefCount,
//! # }
//! # ref_counted!(Texture => count);
//! let mut first = Pointer::make(Texture { count: RefCount::new() });
//! let second = first.clone();
//! assert_eq!(second.count.get(), 2);
//!
//! let third = first.take();
//! assert!(first.is_null());
//! assert_eq!(third.count.get(), 2);
//!
//! drop(second);
//! assert_eq!(third.count.get(), 1);
//! ```
//!
//! Overwriting a handle with a clone of itself (or of any handle to the same object) is always safe:
//! the new referent is retained before the old one is released.
//!
//! Counts are updated atomically, so handles to the same object may be cloned and dropped from any
//! number of threads and exactly one of them will observe the final release. The payload itself is
//! *not* synchronized: a `Pointer<T>` is only [`Send`] and [`Sync`] if `T` is both.
//!
//! Like any plain reference counting scheme, cyclic ownership leaks. Break cycles by having one
//! side of the cycle hold [`Weak`] references, which requires its type to be declared with
//! `ref_counted!(Type => field, weak)` (see [Weak References](#weak-references)).
//!
//! # Providing the Capability
//!
//! There are three ways to make a type usable in a handle:
//!
//! 1. Embed a [`RefCount`] and invoke [`ref_counted!`]. This is the usual route.
//! 2. Wrap an existing value in a [`Boxed`], which carries the count for you. [`Pointer::boxed`]
//!    does this in one go.
//! 3. Implement the `unsafe` [`Retain`] trait by hand, e.g. to forward the count to a foreign
//!    library's own reference counting.
//!
//! ```
//! use intrusive_rc::Pointer;
//!
//! let message = Pointer::boxed(String::from("hello"));
//! assert_eq!(message.value(), "hello");
//! ```
//!
//! # Non-Null Handles
//!
//! A [`Reference`] behaves like a `Pointer` that can never be null. Everything which could produce
//! a null reference fails with [`Error::NullReference`] instead, before any count is touched.
//!
//! ```
//! use intrusive_rc::{Boxed, Error, Pointer, Reference};
//!
//! let mut answer = Reference::boxed(42);
//! let nothing = Pointer::<Boxed<i32>>::null();
//!
//! assert_eq!(Reference::set_from(&mut answer, &nothing), Err(Error::NullReference));
//! assert_eq!(**answer, 42);
//! ```
//!
//! Since a `Reference` dereferences to its referent, its own operations are associated functions
//! (`Reference::upcast(me)`, `Reference::downgrade(&me)`, ...) so they never shadow the
//! referent's methods.
//!
//! # Polymorphism
//!
//! Handles are generic over `T: ?Sized`, so they can point to trait objects whose trait has
//! [`Retain`] as a supertrait. Conversion from a concrete handle is enabled per type pair with
//! [`upcast!`], which only ever emits an unsizing coercion and therefore always yields a handle to
//! the same object and the same counter.
//!
//! ```
//! use intrusive_rc::{Pointer, RefCount, Retain, ref_counted, upcast};
//!
//! pub trait Animal: Retain {
//!     fn name(&self) -> &str;
//! }
//!
//! pub struct Cat {
//!     count: RefCount,
//! }
//!
//! ref_counted!(Cat => count);
//! upcast!(Cat => dyn Animal);
//!
//! impl Animal for Cat {
//!     fn name(&self) -> &str {
//!         "cat"
//!     }
//! }
//!
//! let cat = Pointer::make(Cat { count: RefCount::new() });
//! let animal: Pointer<dyn Animal> = cat.upcast_ref();
//!
//! assert_eq!(animal.name(), "cat");
//! assert_eq!(cat.count.get(), 2);
//! ```
//!
//! # Weak References
//!
//! Types declared with `ref_counted!(Type => field, weak)` around a [`WeakRefCount`] can be observed
//! through [`Weak`] references. A `Weak` never keeps its object alive, can tell whether the object
//! still exists, and refuses to upgrade into an owning handle once it doesn't.
//!
//! # Logging
//!
//! Object destruction and failed weak upgrades are reported through the [`log`] facade at the
//! `trace` level. This crate never installs a logger.

mod boxed;
pub use self::boxed::*;

mod count;
pub use self::count::*;

mod error;
pub use self::error::*;

mod pointer;
pub use self::pointer::*;

mod reference;
pub use self::reference::*;

mod retain;
pub use self::retain::*;

mod weak;
pub use self::weak::*;

#[cfg(test)]
mod tests;
