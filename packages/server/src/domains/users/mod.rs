//! Users domain - display identity lookups for match listings.

pub mod models;

pub use models::User;
