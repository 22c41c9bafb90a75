//! Auth domain - bearer token verification.
//!
//! Registration, login and password hashing are handled by a separate
//! service; this crate only needs to know who is calling.

pub mod jwt;

pub use jwt::{Claims, JwtService};
