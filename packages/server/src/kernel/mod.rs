//! Kernel module - dependency seams and their implementations.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::{PgCatDirectory, PgMatchRequestStore, PgUserDirectory, ServerDeps};
pub use traits::{BaseCatDirectory, BaseMatchRequestStore, BaseUserDirectory};
