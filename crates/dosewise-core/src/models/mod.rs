//! Domain models for dosage resolution.

mod ingredient;
mod resolution;
mod source;

pub use ingredient::*;
pub use resolution::*;
pub use source::*;
