//! Matching domain - match request lifecycle and eligibility rules.

pub mod data;
pub mod engine;
pub mod errors;
pub mod models;
pub mod validator;

pub use data::{CatDetail, IssuerDetail, MatchRequestData, MatchView};
pub use engine::{Decision, MatchEngine};
pub use errors::MatchError;
pub use models::{Approval, InsertOutcome, MatchRequest, MatchStatus, PairFacts};
pub use validator::{validate_message, EligibilityValidator, Proposal};
