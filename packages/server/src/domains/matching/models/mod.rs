pub mod match_request;

pub use match_request::{pair_key, Approval, InsertOutcome, MatchRequest, MatchStatus, PairFacts};
