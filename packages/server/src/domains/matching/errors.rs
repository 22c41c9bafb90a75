use thiserror::Error;

/// Outcomes of the match lifecycle that the caller is expected to handle.
///
/// Every variant except `Internal` is a business outcome and is returned
/// untouched from the validator and engine. `Internal` wraps storage or
/// directory failures; its message is never shown to end users.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("message must be between 5 and 120 characters")]
    InvalidMessage,

    #[error("match cat id not found")]
    MatchCatNotFound,

    #[error("user cat id not found")]
    UserCatNotFound,

    #[error("user cat id does not belong to the user")]
    UserCatNotOwnedByIssuer,

    #[error("both cats have the same gender")]
    SameGender,

    #[error("one of the cats has already matched")]
    AlreadyMatched,

    #[error("both cats have the same owner")]
    SameOwner,

    #[error("a match request already exists for these two cats")]
    DuplicateRequest,

    #[error("match id not found")]
    MatchRequestNotFound,

    #[error("match id is no longer valid")]
    MatchRequestNoLongerValid,

    #[error("match issuer can't make the decision")]
    IssuerCannotDecide,

    #[error("only the owner of the match cat can make the decision")]
    UnauthorizedDecision,

    #[error("you are not the issuer")]
    NotIssuer,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MatchError {
    pub fn is_internal(&self) -> bool {
        matches!(self, MatchError::Internal(_))
    }
}
