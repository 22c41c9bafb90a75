//! Cats domain - read side of the cat directory used by matching.

pub mod models;

pub use models::{Cat, NewCat, Sex};
