//! Runtime types the compiler produces ahead of time.

pub mod value;

pub use value::{IntRange, PrebuiltPattern, Quantity, Value};
