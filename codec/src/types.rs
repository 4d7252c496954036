//! Implementations of Codec for common types.

pub mod boxed;
mod bytes;
mod collections;
mod primitives;
mod string;
mod tuple;
