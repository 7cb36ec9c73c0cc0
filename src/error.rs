use thiserror::Error;

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Error)]
pub enum Error {
    /// A null referent was supplied where a [`Reference`](crate::Reference) was expected.
    #[error("reference cannot be null")]
    NullReference,

    /// A [`Weak`](crate::Weak) reference was upgraded after its object was destroyed.
    #[error("weak reference expired")]
    Expired,
}
