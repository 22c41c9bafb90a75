// HTTP routes
pub mod health;
pub mod matches;

pub use health::*;
pub use matches::*;
