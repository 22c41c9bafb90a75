pub mod cat;

pub use cat::{Cat, NewCat, Sex};
