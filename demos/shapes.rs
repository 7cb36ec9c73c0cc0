use std::{fmt, sync::Mutex};

use intrusive_rc::{Pointer, RefCount, Reference, Retain, Weak, WeakRefCount, ref_counted, upcast};

fn main() {
    let layer = Reference::make(Layer {
        count: WeakRefCount::new(),
        name: "background",
        shapes: Mutex::default(),
    });

    let circle = Pointer::make(Circle {
        count: RefCount::new(),
        radius: 1.5,
        layer: Reference::downgrade(&layer),
    });

    let square = Pointer::make(Square {
        count: RefCount::new(),
        side: 2.0,
    });

    layer.add(circle.upcast_ref());
    layer.add(square.upcast());

    dbg!(&layer);
    dbg!(layer.total_area());
    dbg!(circle.count.get());
    dbg!(circle.layer_name());

    drop(layer);

    // The layer was the only owner of the square and the circle only observes its layer.
    dbg!(circle.count.get());
    dbg!(circle.layer_name());
}

pub trait Shape: Retain + fmt::Debug {
    fn area(&self) -> f64;
}

#[derive(Debug)]
pub struct Layer {
    count: WeakRefCount,
    name: &'static str,
    shapes: Mutex<Vec<Pointer<dyn Shape>>>,
}

ref_counted!(Layer => count, weak);

impl Layer {
    pub fn add(&self, shape: Pointer<dyn Shape>) {
        if let Ok(mut shapes) = self.shapes.lock() {
            shapes.push(shape);
        }
    }

    pub fn total_area(&self) -> f64 {
        self.shapes
            .lock()
            .map(|shapes| shapes.iter().map(|shape| shape.area()).sum())
            .unwrap_or_default()
    }
}

pub struct Circle {
    count: RefCount,
    radius: f64,
    layer: Weak<Layer>,
}

ref_counted!(Circle => count);
upcast!(Circle => dyn Shape);

impl fmt::Debug for Circle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circle")
            .field("radius", &self.radius)
            .finish_non_exhaustive()
    }
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

impl Circle {
    pub fn layer_name(&self) -> Option<&'static str> {
        self.layer.upgrade().ok().map(|layer| layer.name)
    }
}

#[derive(Debug)]
pub struct Square {
    count: RefCount,
    side: f64,
}

ref_counted!(Square => count);
upcast!(Square => dyn Shape);

impl Shape for Square {
    fn area(&self) -> f64 {
        self.side * self.side
    }
}
