//! Eligibility rules gating creation of a match request.
//!
//! Checks run in a fixed order and stop at the first failure, so the same
//! proposal always reports the same error:
//!
//! 1. match cat exists
//! 2. user cat exists
//! 3. user cat is owned by the issuer
//! 4. the cats have different sex
//! 5. neither cat has matched already
//! 6. the cats have different owners
//! 7. no active request exists for the unordered pair

use tracing::debug;

pub const MESSAGE_MIN_CHARS: usize = 5;
pub const MESSAGE_MAX_CHARS: usize = 120;

use crate::common::{CatId, UserId};
use crate::domains::matching::errors::MatchError;
use crate::domains::matching::models::PairFacts;
use crate::kernel::{BaseCatDirectory, BaseMatchRequestStore};

/// A proposed pairing, before anything is persisted.
#[derive(Debug, Clone, Copy)]
pub struct Proposal {
    pub issuer_id: UserId,
    pub match_cat_id: CatId,
    pub user_cat_id: CatId,
}

/// Stateless validator over the cat directory and match request store.
pub struct EligibilityValidator<'a> {
    cats: &'a dyn BaseCatDirectory,
    matches: &'a dyn BaseMatchRequestStore,
}

impl<'a> EligibilityValidator<'a> {
    pub fn new(cats: &'a dyn BaseCatDirectory, matches: &'a dyn BaseMatchRequestStore) -> Self {
        Self { cats, matches }
    }

    pub async fn check(&self, proposal: &Proposal) -> Result<(), MatchError> {
        let result = self.evaluate(proposal).await;
        if let Err(err) = &result {
            if !err.is_internal() {
                debug!(
                    issuer_id = %proposal.issuer_id,
                    match_cat_id = %proposal.match_cat_id,
                    user_cat_id = %proposal.user_cat_id,
                    reason = %err,
                    "Match proposal not eligible"
                );
            }
        }
        result
    }

    async fn evaluate(&self, proposal: &Proposal) -> Result<(), MatchError> {
        if !self.cats.exists(proposal.match_cat_id).await? {
            return Err(MatchError::MatchCatNotFound);
        }
        if !self.cats.exists(proposal.user_cat_id).await? {
            return Err(MatchError::UserCatNotFound);
        }
        if !self
            .cats
            .is_owned_by(proposal.user_cat_id, proposal.issuer_id)
            .await?
        {
            return Err(MatchError::UserCatNotOwnedByIssuer);
        }

        // A cat deleted between the checks above and this query reads as missing.
        let facts = self
            .matches
            .compare_cats(proposal.match_cat_id, proposal.user_cat_id)
            .await?
            .ok_or(MatchError::MatchCatNotFound)?;
        check_pair(facts)?;

        if self
            .matches
            .has_active_request(proposal.match_cat_id, proposal.user_cat_id)
            .await?
        {
            return Err(MatchError::DuplicateRequest);
        }

        Ok(())
    }
}

/// Trim a proposal message and check its length in characters.
pub fn validate_message(raw: &str) -> Result<String, MatchError> {
    let message = raw.trim();
    let len = message.chars().count();
    if !(MESSAGE_MIN_CHARS..=MESSAGE_MAX_CHARS).contains(&len) {
        return Err(MatchError::InvalidMessage);
    }
    Ok(message.to_string())
}

/// Pair rules (checks 4 to 6) over precomputed facts.
pub fn check_pair(facts: PairFacts) -> Result<(), MatchError> {
    if facts.same_sex {
        return Err(MatchError::SameGender);
    }
    if facts.any_matched {
        return Err(MatchError::AlreadyMatched);
    }
    if facts.same_owner {
        return Err(MatchError::SameOwner);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::cats::Sex;
    use crate::domains::matching::models::MatchRequest;
    use crate::kernel::test_dependencies::InMemoryBackend;
    use crate::kernel::BaseMatchRequestStore;

    fn facts(same_sex: bool, any_matched: bool, same_owner: bool) -> PairFacts {
        PairFacts {
            same_sex,
            any_matched,
            same_owner,
        }
    }

    #[test]
    fn message_bounds_count_characters_after_trim() {
        assert!(matches!(validate_message(""), Err(MatchError::InvalidMessage)));
        assert!(matches!(validate_message("  abcd  "), Err(MatchError::InvalidMessage)));
        assert_eq!(validate_message(" abcde ").unwrap(), "abcde");
        assert!(validate_message(&"é".repeat(120)).is_ok());
        assert!(matches!(
            validate_message(&"x".repeat(121)),
            Err(MatchError::InvalidMessage)
        ));
    }

    #[test]
    fn same_sex_wins_over_every_other_rule() {
        assert!(matches!(
            check_pair(facts(true, true, true)),
            Err(MatchError::SameGender)
        ));
    }

    #[test]
    fn already_matched_is_checked_before_owner() {
        assert!(matches!(
            check_pair(facts(false, true, true)),
            Err(MatchError::AlreadyMatched)
        ));
        assert!(matches!(
            check_pair(facts(false, false, true)),
            Err(MatchError::SameOwner)
        ));
        assert!(check_pair(facts(false, false, false)).is_ok());
    }

    struct World {
        backend: InMemoryBackend,
        alice: UserId,
        bob: UserId,
        tom: CatId,
        luna: CatId,
    }

    fn world() -> World {
        let backend = InMemoryBackend::new();
        let alice = backend.add_user("Alice", "alice@example.com");
        let bob = backend.add_user("Bob", "bob@example.com");
        let tom = backend.add_cat(alice, "Tom", Sex::Male);
        let luna = backend.add_cat(bob, "Luna", Sex::Female);
        World {
            backend,
            alice,
            bob,
            tom,
            luna,
        }
    }

    async fn check(world: &World, issuer: UserId, match_cat: CatId, user_cat: CatId) -> Result<(), MatchError> {
        EligibilityValidator::new(&world.backend, &world.backend)
            .check(&Proposal {
                issuer_id: issuer,
                match_cat_id: match_cat,
                user_cat_id: user_cat,
            })
            .await
    }

    #[tokio::test]
    async fn eligible_pair_passes() {
        let w = world();
        assert!(check(&w, w.bob, w.tom, w.luna).await.is_ok());
    }

    #[tokio::test]
    async fn missing_cats_are_reported_in_order() {
        let w = world();
        let ghost = CatId::new();
        assert!(matches!(
            check(&w, w.bob, ghost, CatId::new()).await,
            Err(MatchError::MatchCatNotFound)
        ));
        assert!(matches!(
            check(&w, w.bob, w.tom, ghost).await,
            Err(MatchError::UserCatNotFound)
        ));
    }

    #[tokio::test]
    async fn issuer_must_own_user_cat() {
        let w = world();
        assert!(matches!(
            check(&w, w.alice, w.tom, w.luna).await,
            Err(MatchError::UserCatNotOwnedByIssuer)
        ));
    }

    #[tokio::test]
    async fn same_sex_pair_is_rejected_even_across_owners() {
        let w = world();
        let milo = w.backend.add_cat(w.bob, "Milo", Sex::Male);
        assert!(matches!(
            check(&w, w.bob, w.tom, milo).await,
            Err(MatchError::SameGender)
        ));
    }

    #[tokio::test]
    async fn a_cat_paired_with_itself_is_same_gender() {
        let w = world();
        assert!(matches!(
            check(&w, w.bob, w.luna, w.luna).await,
            Err(MatchError::SameGender)
        ));
    }

    #[tokio::test]
    async fn either_cat_matched_blocks() {
        let w = world();
        w.backend.mark_matched(w.tom);
        assert!(matches!(
            check(&w, w.bob, w.tom, w.luna).await,
            Err(MatchError::AlreadyMatched)
        ));
    }

    #[tokio::test]
    async fn same_owner_is_rejected() {
        let w = world();
        let kitty = w.backend.add_cat(w.bob, "Kitty", Sex::Male);
        assert!(matches!(
            check(&w, w.bob, kitty, w.luna).await,
            Err(MatchError::SameOwner)
        ));
    }

    #[tokio::test]
    async fn active_request_in_either_direction_is_a_duplicate() {
        let w = world();
        let existing = MatchRequest::new(w.alice, w.luna, w.tom, "hello luna".into());
        w.backend.insert(&existing).await.unwrap();

        assert!(matches!(
            check(&w, w.bob, w.tom, w.luna).await,
            Err(MatchError::DuplicateRequest)
        ));
    }

    #[tokio::test]
    async fn withdrawn_request_is_not_a_duplicate() {
        let w = world();
        let existing = MatchRequest::new(w.alice, w.luna, w.tom, "hello luna".into());
        w.backend.insert(&existing).await.unwrap();
        w.backend.withdraw(existing.id).await.unwrap();

        assert!(check(&w, w.bob, w.tom, w.luna).await.is_ok());
    }
}
