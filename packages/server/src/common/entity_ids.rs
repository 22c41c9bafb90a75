//! Typed ID definitions for the entities the matching core touches.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for registered users (cat owners).
pub struct User;

/// Marker type for cats.
pub struct Cat;

/// Marker type for match requests.
pub struct MatchRequest;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type UserId = Id<User>;

pub type CatId = Id<Cat>;

pub type MatchRequestId = Id<MatchRequest>;
