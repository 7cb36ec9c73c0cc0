use std::{
    ptr::{self, NonNull},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering::*},
    },
    thread,
};

use rustc_hash::FxHashSet;

use crate::{
    Boxed, Error, Pointer, RefCount, Reference, Retain, Weak, WeakRefCount, ref_counted, upcast,
};

// === Fixtures === //

trait Base: Retain {
    fn id(&self) -> u32;
}

#[derive(Debug)]
struct Tracked {
    count: RefCount,
    id: u32,
    alive: Arc<AtomicUsize>,
}

ref_counted!(Tracked => count);
upcast!(Tracked => dyn Base);

impl Base for Tracked {
    fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Relaxed);
    }
}

impl Tracked {
    fn new(id: u32, alive: &Arc<AtomicUsize>) -> Self {
        alive.fetch_add(1, Relaxed);

        Self {
            count: RefCount::new(),
            id,
            alive: alive.clone(),
        }
    }
}

#[derive(Debug)]
struct Observed {
    count: WeakRefCount,
    alive: Arc<AtomicUsize>,
}

ref_counted!(Observed => count, weak);
upcast!(Observed => dyn Watched);

trait Watched: crate::Weakable {}

impl Watched for Observed {}

impl Drop for Observed {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Relaxed);
    }
}

impl Observed {
    fn new(alive: &Arc<AtomicUsize>) -> Self {
        alive.fetch_add(1, Relaxed);

        Self {
            count: WeakRefCount::new(),
            alive: alive.clone(),
        }
    }
}

/// A hand-written implementation, reclaimed through `Box` just like the macro-generated ones.
struct Manual {
    refs: AtomicUsize,
    alive: Arc<AtomicUsize>,
}

unsafe impl Retain for Manual {
    fn retain(&self) {
        self.refs.fetch_add(1, Relaxed);
    }

    unsafe fn release(&self) {
        if self.refs.fetch_sub(1, AcqRel) == 1 {
            self.alive.fetch_sub(1, Relaxed);
            drop(unsafe { Box::from_raw(self as *const Self as *mut Self) });
        }
    }
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// === Pointer === //

#[test]
fn fresh_pointer_has_one_owner() {
    let alive = counter();
    let ptr = Pointer::make(Tracked::new(1, &alive));

    assert!(ptr.is_some());
    assert_eq!(ptr.count.get(), 1);
    assert_eq!(alive.load(Relaxed), 1);
}

#[test]
fn clone_then_drop_in_order() {
    let alive = counter();

    let first = Pointer::make(Tracked::new(1, &alive));
    let second = first.clone();

    assert!(first.ptr_eq(&second));
    assert_eq!(first.count.get(), 2);

    drop(second);

    assert_eq!(first.count.get(), 1);
    assert_eq!(alive.load(Relaxed), 1);

    drop(first);

    assert_eq!(alive.load(Relaxed), 0);
}

#[test]
fn move_keeps_count() {
    let alive = counter();

    let mut first = Pointer::make(Tracked::new(1, &alive));
    let second = first.take();

    assert!(first.is_null());
    assert!(second.is_some());
    assert_eq!(second.count.get(), 1);

    let third = second;
    assert_eq!(third.count.get(), 1);
    assert_eq!(alive.load(Relaxed), 1);
}

#[test]
fn reassignment_releases_previous() {
    let alive = counter();

    let a = Pointer::make(Tracked::new(1, &alive));
    let b = Pointer::make(Tracked::new(2, &alive));

    let mut slot = a.clone();
    assert_eq!(a.count.get(), 2);

    slot.clone_from(&b);
    assert_eq!(a.count.get(), 1);
    assert_eq!(b.count.get(), 2);
    assert_eq!(slot.id, 2);

    drop(a);
    assert_eq!(alive.load(Relaxed), 1);

    let replaced = slot.replace(Pointer::null());
    assert!(slot.is_null());
    assert_eq!(replaced.count.get(), 2);
}

#[test]
fn self_assignment_keeps_object_alive() {
    let alive = counter();

    let mut ptr = Pointer::make(Tracked::new(1, &alive));

    ptr = ptr.clone();

    assert_eq!(ptr.count.get(), 1);

    let same = ptr.clone();
    ptr.clone_from(&same);
    ptr.set_from(&same);
    drop(same);

    assert_eq!(ptr.count.get(), 1);
    assert_eq!(alive.load(Relaxed), 1);
    assert_eq!(ptr.id, 1);
}

#[test]
fn upcast_shares_count() {
    let alive = counter();

    let derived = Pointer::make(Tracked::new(7, &alive));
    let base: Pointer<dyn Base> = derived.upcast_ref();

    assert_eq!(derived.count.get(), 2);
    assert_eq!(base.id(), 7);

    drop(base);
    assert_eq!(derived.count.get(), 1);

    let base: Pointer<dyn Base> = derived.upcast();
    assert_eq!(base.id(), 7);
    assert_eq!(alive.load(Relaxed), 1);

    drop(base);
    assert_eq!(alive.load(Relaxed), 0);
}

#[test]
fn cross_type_assignment() {
    let alive = counter();

    let derived = Pointer::make(Tracked::new(3, &alive));
    let mut base = Pointer::<dyn Base>::null();

    base.set_from(&derived);
    assert_eq!(derived.count.get(), 2);

    base.set(Pointer::<Tracked>::null());
    assert!(base.is_null());
    assert_eq!(derived.count.get(), 1);

    base.set(derived);
    assert_eq!(base.id(), 3);
    assert_eq!(alive.load(Relaxed), 1);
}

#[test]
fn boolean_test() {
    let alive = counter();

    let mut ptr = Pointer::<Tracked>::default();
    assert!(ptr.is_null());
    assert!(ptr.get().is_none());

    ptr = Pointer::make(Tracked::new(1, &alive));
    assert!(ptr.is_some());
    assert!(ptr.get().is_some());
}

#[test]
#[should_panic(expected = "attempted to dereference a null Pointer")]
fn null_deref_panics() {
    let ptr = Pointer::<Tracked>::null();
    let _id = ptr.id;
}

#[test]
fn raw_round_trip() {
    let alive = counter();

    let ptr = Pointer::make(Tracked::new(1, &alive));
    let raw = ptr.as_ptr().unwrap().as_ptr().cast_const();

    let copy = unsafe { Pointer::from_raw(raw) };
    assert_eq!(ptr.count.get(), 2);

    let raw = Pointer::into_raw(copy).unwrap();
    assert_eq!(ptr.count.get(), 2);

    let copy = unsafe { Pointer::adopt(raw.as_ptr()) };
    assert_eq!(ptr.count.get(), 2);

    drop(copy);
    assert_eq!(ptr.count.get(), 1);

    let null = unsafe { Pointer::<Tracked>::from_raw(ptr::null()) };
    assert!(null.is_null());
}

#[test]
fn identity_semantics() {
    let alive = counter();

    let a = Pointer::make(Tracked::new(1, &alive));
    let b = Pointer::make(Tracked::new(1, &alive));

    assert_ne!(a, b);
    assert_eq!(a, a.clone());
    assert_eq!(Pointer::<Tracked>::null(), Pointer::null());

    let set = [a.clone(), a.clone(), b.clone()]
        .into_iter()
        .collect::<FxHashSet<_>>();

    assert_eq!(set.len(), 2);
    assert_eq!(a.count.get(), 2);
}

#[test]
fn debug_formatting() {
    let ptr = Pointer::boxed(5u8);
    assert_eq!(format!("{ptr:?}"), "5");
    assert_eq!(format!("{:?}", Pointer::<Boxed<u8>>::null()), "null");
}

// === Reference === //

#[test]
fn null_reference_fails() {
    let raw = unsafe { Reference::<Tracked>::from_raw(ptr::null()) };
    assert_eq!(raw.unwrap_err(), Error::NullReference);

    let adopted = unsafe { Reference::<Tracked>::adopt(ptr::null()) };
    assert_eq!(adopted.unwrap_err(), Error::NullReference);

    let converted = Reference::try_from(Pointer::<Tracked>::null());
    assert_eq!(converted.unwrap_err(), Error::NullReference);
}

#[test]
fn null_assignment_leaves_reference_untouched() {
    let alive = counter();

    let mut target = Reference::make(Tracked::new(1, &alive));
    let null = Pointer::<Tracked>::null();

    assert_eq!(
        Reference::set_from(&mut target, &null),
        Err(Error::NullReference)
    );
    assert_eq!(Reference::set(&mut target, null), Err(Error::NullReference));

    assert_eq!(target.id, 1);
    assert_eq!(target.count.get(), 1);
    assert_eq!(alive.load(Relaxed), 1);
}

#[test]
fn reference_lifecycle() {
    let alive = counter();

    let first = Reference::make(Tracked::new(1, &alive));
    let second = first.clone();
    assert_eq!(first.count.get(), 2);

    let mut other = Reference::make(Tracked::new(2, &alive));
    other.clone_from(&second);
    assert_eq!(alive.load(Relaxed), 1);
    assert_eq!(first.count.get(), 3);

    let pointer = Pointer::make(Tracked::new(3, &alive));
    Reference::set_from(&mut other, &pointer).unwrap();
    assert_eq!(pointer.count.get(), 2);
    assert_eq!(first.count.get(), 2);

    drop((first, second));
    assert_eq!(alive.load(Relaxed), 1);

    let base: Reference<dyn Base> = Reference::upcast(other);
    assert_eq!(base.id(), 3);
    assert_eq!(pointer.count.get(), 2);
}

#[test]
fn reference_move_assignment() {
    let alive = counter();

    let mut base: Reference<dyn Base> =
        Reference::upcast(Reference::make(Tracked::new(1, &alive)));
    let replacement = Pointer::make(Tracked::new(2, &alive));
    let observer = replacement.clone();
    assert_eq!(observer.count.get(), 2);

    Reference::set(&mut base, replacement).unwrap();

    assert_eq!(alive.load(Relaxed), 1);
    assert_eq!(base.id(), 2);
    assert_eq!(observer.count.get(), 2);
    assert!(Reference::as_pointer(&base).ptr_eq(&observer.upcast_ref()));

    drop(base);
    assert_eq!(observer.count.get(), 1);
}

#[test]
fn reference_upcast_ref_retains() {
    let alive = counter();

    let concrete = Reference::make(Tracked::new(7, &alive));
    let base: Reference<dyn Base> = Reference::upcast_ref(&concrete);

    assert_eq!(concrete.count.get(), 2);
    assert_eq!(base.id(), 7);

    drop(concrete);
    assert_eq!(alive.load(Relaxed), 1);
    assert_eq!(base.id(), 7);

    drop(base);
    assert_eq!(alive.load(Relaxed), 0);
}

#[test]
fn reference_pointer_views() {
    let alive = counter();

    let ptr = Pointer::make(Tracked::new(1, &alive));
    let view = ptr.as_reference().unwrap();

    assert_eq!(view.id, 1);
    assert!(Reference::as_pointer(view).ptr_eq(&ptr));
    assert_eq!(ptr.count.get(), 1);
    assert!(Pointer::<Tracked>::null().as_reference().is_none());

    let owned = Reference::try_from(ptr).unwrap();
    let back: Pointer<Tracked> = owned.into();
    assert_eq!(back.count.get(), 1);
}

// === Counts === //

#[test]
fn manual_credit_round_trip() {
    let alive = counter();
    let ptr = Pointer::make(Tracked::new(1, &alive));

    ptr.count.increment();
    assert_eq!(ptr.count.get(), 2);

    // Gives back the credit taken above.
    assert!(!unsafe { ptr.count.decrement() });
    assert_eq!(ptr.count.get(), 1);

    drop(ptr.clone());
    assert_eq!(alive.load(Relaxed), 1);
    assert_eq!(ptr.id, 1);

    drop(ptr);
    assert_eq!(alive.load(Relaxed), 0);
}

#[test]
fn weak_count_credit_round_trip() {
    let count = WeakRefCount::new();

    count.increment();
    assert!(!unsafe { count.decrement() });
    assert!(unsafe { count.decrement() });
    assert_eq!(count.get(), 0);
}

// === Boxed === //

#[test]
fn boxed_values() {
    let mut boxed = Boxed::new(vec![1, 2]);
    boxed.value_mut().push(3);

    let ptr = Pointer::make(boxed);
    let alias = ptr.clone();

    assert_eq!(alias.value(), &[1, 2, 3]);
    assert_eq!(ptr.ref_count(), 2);
    assert_eq!(ptr.len(), 3);

    drop(ptr);
    assert_eq!(alias.ref_count(), 1);
}

#[test]
fn boxed_drops_value() {
    let alive = counter();
    let ptr = Pointer::boxed(Tracked::new(1, &alive));

    // The inner `Tracked` is never shared, so only the box's count moves.
    let alias = ptr.clone();
    assert_eq!(ptr.ref_count(), 2);
    assert_eq!(ptr.value().count.get(), 1);

    drop((ptr, alias));
    assert_eq!(alive.load(Relaxed), 0);
}

// === Manual === //

#[test]
fn manual_implementation() {
    let alive = counter();
    alive.fetch_add(1, Relaxed);

    let ptr = Pointer::make(Manual {
        refs: AtomicUsize::new(1),
        alive: alive.clone(),
    });

    let copies = (0..4).map(|_| ptr.clone()).collect::<Vec<_>>();
    assert_eq!(ptr.refs.load(Relaxed), 5);

    drop(copies);
    drop(ptr);
    assert_eq!(alive.load(Relaxed), 0);
}

// === Weak === //

#[test]
fn weak_does_not_own() {
    let alive = counter();

    let ptr = Pointer::make(Observed::new(&alive));
    let weak = ptr.downgrade();

    assert_eq!(ptr.count.get(), 1);
    assert_eq!(ptr.count.weak_count(), 1);
    assert!(weak.is_alive());

    let upgraded = weak.upgrade().unwrap();
    assert_eq!(ptr.count.get(), 2);

    drop((ptr, upgraded));

    assert_eq!(alive.load(Relaxed), 0);
    assert!(!weak.is_alive());
    assert_eq!(weak.upgrade().unwrap_err(), Error::Expired);
    assert!(weak.to_pointer().is_null());
}

#[test]
fn weak_count_is_independent() {
    let alive = counter();

    let ptr = Pointer::make(Observed::new(&alive));
    assert_eq!(ptr.count.weak_count(), 0);

    let first = ptr.downgrade();
    let second = first.clone();
    assert_eq!(ptr.count.weak_count(), 2);
    assert_eq!(ptr.count.get(), 1);

    drop(first);
    assert_eq!(ptr.count.weak_count(), 1);
    assert_eq!(ptr.count.get(), 1);

    drop(second);
    assert_eq!(ptr.count.weak_count(), 0);
    assert_eq!(alive.load(Relaxed), 1);
}

#[test]
fn empty_weak() {
    let weak = Weak::<Observed>::new();

    assert!(!weak.is_alive());
    assert_eq!(weak.upgrade().unwrap_err(), Error::Expired);
    assert!(weak.ptr_eq(&Pointer::<Observed>::null().downgrade()));
}

#[test]
fn weak_clones_and_upcasts() {
    let alive = counter();

    let ptr = Reference::make(Observed::new(&alive));
    let weak = Reference::downgrade(&ptr);
    let other = weak.clone();

    assert!(weak.ptr_eq(&other));
    assert_eq!(ptr.count.weak_count(), 2);

    let erased: Weak<dyn Watched> = other.upcast();
    let strong = erased.to_pointer();
    assert!(strong.is_some());
    assert_eq!(ptr.count.get(), 2);

    drop(strong);
    drop(ptr);

    assert!(!erased.is_alive());
    assert!(erased.to_pointer().is_null());
    assert_eq!(alive.load(Relaxed), 0);
}

// === Threads === //

#[test]
fn concurrent_clone_and_drop() {
    let alive = counter();
    let ptr = Pointer::make(Tracked::new(1, &alive));

    thread::scope(|s| {
        for _ in 0..8 {
            let ptr = ptr.clone();

            s.spawn(move || {
                for _ in 0..1000 {
                    let copies = [ptr.clone(), ptr.clone()];
                    assert!(copies.iter().all(|copy| copy.id == 1));
                }
            });
        }
    });

    assert_eq!(ptr.count.get(), 1);
    drop(ptr);
    assert_eq!(alive.load(Relaxed), 0);
}

#[test]
fn concurrent_last_release_destroys_once() {
    for _ in 0..100 {
        let alive = counter();
        let ptr = Pointer::make(Tracked::new(1, &alive));
        let copies = (0..8).map(|_| ptr.clone()).collect::<Vec<_>>();
        drop(ptr);

        thread::scope(|s| {
            for copy in copies {
                s.spawn(move || drop(copy));
            }
        });

        assert_eq!(alive.load(Relaxed), 0);
    }
}

#[test]
fn concurrent_upgrade_and_destroy() {
    for _ in 0..100 {
        let alive = counter();
        let ptr = Pointer::make(Observed::new(&alive));
        let weak = ptr.downgrade();

        thread::scope(|s| {
            for _ in 0..4 {
                let weak = weak.clone();

                s.spawn(move || {
                    for _ in 0..100 {
                        if let Ok(strong) = weak.upgrade() {
                            assert!(strong.count.get() >= 1);
                        }
                    }
                });
            }

            s.spawn(move || drop(ptr));
        });

        assert_eq!(alive.load(Relaxed), 0);
        assert!(!weak.is_alive());
    }
}

#[test]
fn raw_pointer_survives_as_non_null() {
    let alive = counter();
    let ptr = Reference::make(Tracked::new(1, &alive));

    let raw: NonNull<Tracked> = Reference::into_raw(ptr);
    let ptr = unsafe { Reference::adopt(raw.as_ptr()) }.unwrap();

    assert_eq!(ptr.count.get(), 1);
    assert!(Reference::ptr_eq(&ptr, &ptr.clone()));
}
