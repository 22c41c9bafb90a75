//! Match lifecycle engine.
//!
//! The only writer of match requests and of cat `has_matched` flags. All
//! state lives behind `ServerDeps`; the engine itself holds nothing mutable
//! and can be shared freely across request handlers.
//!
//! ```text
//!            propose
//!               |
//!               v
//!           [pending] --withdraw--> (withdrawn, status unchanged)
//!            /     \
//!      approve     reject
//!          /         \
//!   [approved]     [rejected]
//! ```
//!
//! Approving a request also rejects every other active request on either cat.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::common::{CatId, MatchRequestId, UserId};
use crate::domains::cats::Cat;
use crate::domains::matching::data::{CatDetail, IssuerDetail, MatchView};
use crate::domains::matching::errors::MatchError;
use crate::domains::matching::models::{InsertOutcome, MatchRequest};
use crate::domains::matching::validator::{validate_message, EligibilityValidator, Proposal};
use crate::kernel::ServerDeps;

/// Outcome of a decision by the other party
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

pub struct MatchEngine {
    deps: ServerDeps,
}

impl MatchEngine {
    pub fn new(deps: ServerDeps) -> Self {
        Self { deps }
    }

    /// Create a pending request after the message and eligibility checks pass.
    pub async fn propose(
        &self,
        issuer_id: UserId,
        match_cat_id: CatId,
        user_cat_id: CatId,
        message: String,
    ) -> Result<MatchRequest, MatchError> {
        let message = validate_message(&message)?;

        let proposal = Proposal {
            issuer_id,
            match_cat_id,
            user_cat_id,
        };
        EligibilityValidator::new(self.deps.cats.as_ref(), self.deps.matches.as_ref())
            .check(&proposal)
            .await?;

        let request = MatchRequest::new(issuer_id, match_cat_id, user_cat_id, message);

        // The store re-checks pair uniqueness and matched flags for proposals
        // racing past the validator.
        let created = match self.deps.matches.insert(&request).await? {
            InsertOutcome::Created(created) => created,
            InsertOutcome::Duplicate => return Err(MatchError::DuplicateRequest),
            InsertOutcome::CatAlreadyMatched => {
                warn!(
                    match_cat_id = %match_cat_id,
                    user_cat_id = %user_cat_id,
                    "Cat matched while proposal was being checked"
                );
                return Err(MatchError::AlreadyMatched);
            }
        };

        info!(
            match_id = %created.id,
            issuer_id = %issuer_id,
            match_cat_id = %match_cat_id,
            user_cat_id = %user_cat_id,
            "Match request created"
        );

        Ok(created)
    }

    /// Every non-withdrawn request involving one of the user's cats, oldest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<MatchView>, MatchError> {
        let own_cats = self.deps.cats.find_by_owner(user_id).await?;
        if own_cats.is_empty() {
            return Ok(Vec::new());
        }

        let cat_ids: Vec<CatId> = own_cats.iter().map(|cat| cat.id).collect();
        let requests = self.deps.matches.find_for_cats(&cat_ids).await?;

        let mut cats: HashMap<CatId, Cat> =
            own_cats.into_iter().map(|cat| (cat.id, cat)).collect();
        let mut views = Vec::with_capacity(requests.len());

        for request in requests {
            let Some(issuer) = self.deps.users.get(request.issued_by).await? else {
                warn!(match_id = %request.id, issuer_id = %request.issued_by, "Issuer missing, skipping match");
                continue;
            };
            let Some(match_cat) = self.cached_cat(&mut cats, request.match_cat_id).await? else {
                warn!(match_id = %request.id, cat_id = %request.match_cat_id, "Cat missing, skipping match");
                continue;
            };
            let Some(user_cat) = self.cached_cat(&mut cats, request.user_cat_id).await? else {
                warn!(match_id = %request.id, cat_id = %request.user_cat_id, "Cat missing, skipping match");
                continue;
            };

            views.push(MatchView {
                id: request.id,
                issued_by: IssuerDetail::from(issuer),
                match_cat_detail: CatDetail::from(match_cat),
                user_cat_detail: CatDetail::from(user_cat),
                message: request.message,
                status: request.status,
                created_at: request.created_at,
            });
        }

        Ok(views)
    }

    async fn cached_cat(
        &self,
        cache: &mut HashMap<CatId, Cat>,
        cat_id: CatId,
    ) -> Result<Option<Cat>, MatchError> {
        if let Some(cat) = cache.get(&cat_id) {
            return Ok(Some(cat.clone()));
        }
        let cat = self.deps.cats.get(cat_id).await?;
        if let Some(cat) = &cat {
            cache.insert(cat_id, cat.clone());
        }
        Ok(cat)
    }

    /// Approve or reject a pending request on behalf of the other party.
    pub async fn decide(
        &self,
        match_id: MatchRequestId,
        decider_id: UserId,
        decision: Decision,
    ) -> Result<(), MatchError> {
        let request = self
            .deps
            .matches
            .find_by_id(match_id)
            .await?
            .ok_or(MatchError::MatchRequestNotFound)?;

        if !request.is_active() {
            return Err(MatchError::MatchRequestNoLongerValid);
        }
        if request.issued_by == decider_id {
            return Err(MatchError::IssuerCannotDecide);
        }
        if !self
            .deps
            .cats
            .is_owned_by(request.match_cat_id, decider_id)
            .await?
        {
            return Err(MatchError::UnauthorizedDecision);
        }

        match decision {
            Decision::Rejected => {
                if self.deps.matches.reject(match_id).await?.is_none() {
                    warn!(match_id = %match_id, "Lost race rejecting match request");
                    return Err(MatchError::MatchRequestNoLongerValid);
                }
                info!(match_id = %match_id, decider_id = %decider_id, "Match request rejected");
            }
            Decision::Approved => {
                let Some(approval) = self.deps.matches.approve(match_id).await? else {
                    warn!(match_id = %match_id, "Lost race approving match request");
                    return Err(MatchError::MatchRequestNoLongerValid);
                };
                info!(
                    match_id = %match_id,
                    decider_id = %decider_id,
                    match_cat_id = %approval.request.match_cat_id,
                    user_cat_id = %approval.request.user_cat_id,
                    invalidated = approval.invalidated.len(),
                    "Match request approved"
                );
            }
        }

        Ok(())
    }

    /// Soft-withdraw a pending request. Only its issuer may do this.
    pub async fn withdraw(
        &self,
        match_id: MatchRequestId,
        requester_id: UserId,
    ) -> Result<(), MatchError> {
        let request = self
            .deps
            .matches
            .find_by_id(match_id)
            .await?
            .ok_or(MatchError::MatchRequestNotFound)?;

        if request.issued_by != requester_id {
            return Err(MatchError::NotIssuer);
        }
        if !request.is_active() {
            return Err(MatchError::MatchRequestNoLongerValid);
        }

        if self.deps.matches.withdraw(match_id).await?.is_none() {
            warn!(match_id = %match_id, "Lost race withdrawing match request");
            return Err(MatchError::MatchRequestNoLongerValid);
        }

        info!(match_id = %match_id, issuer_id = %requester_id, "Match request withdrawn");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::cats::Sex;
    use crate::domains::matching::models::MatchStatus;
    use crate::kernel::test_dependencies::InMemoryBackend;
    use std::sync::Arc;

    /// U1 owns Tom (male), U2 owns Luna (female), U3 owns Cleo (female).
    struct Fixture {
        backend: InMemoryBackend,
        engine: Arc<MatchEngine>,
        u1: UserId,
        u2: UserId,
        u3: UserId,
        tom: CatId,
        luna: CatId,
        cleo: CatId,
    }

    fn fixture() -> Fixture {
        let backend = InMemoryBackend::new();
        let u1 = backend.add_user("Uno", "u1@example.com");
        let u2 = backend.add_user("Dos", "u2@example.com");
        let u3 = backend.add_user("Tres", "u3@example.com");
        let tom = backend.add_cat(u1, "Tom", Sex::Male);
        let luna = backend.add_cat(u2, "Luna", Sex::Female);
        let cleo = backend.add_cat(u3, "Cleo", Sex::Female);
        let engine = Arc::new(MatchEngine::new(backend.server_deps()));
        Fixture {
            backend,
            engine,
            u1,
            u2,
            u3,
            tom,
            luna,
            cleo,
        }
    }

    #[tokio::test]
    async fn propose_creates_pending_request() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();

        assert_eq!(request.status, MatchStatus::Pending);
        assert_eq!(request.issued_by, f.u2);
        assert_eq!(request.match_cat_id, f.tom);
        assert_eq!(request.user_cat_id, f.luna);
        assert!(f.backend.request(request.id).is_some());
    }

    #[tokio::test]
    async fn second_proposal_for_same_pair_is_duplicate_in_both_directions() {
        let f = fixture();
        f.engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();

        let again = f.engine.propose(f.u2, f.tom, f.luna, "again".into()).await;
        assert!(matches!(again, Err(MatchError::DuplicateRequest)));

        let reversed = f.engine.propose(f.u1, f.luna, f.tom, "hello".into()).await;
        assert!(matches!(reversed, Err(MatchError::DuplicateRequest)));
    }

    #[tokio::test]
    async fn rejected_pair_can_be_proposed_again() {
        let f = fixture();
        let first = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        f.engine
            .decide(first.id, f.u1, Decision::Rejected)
            .await
            .unwrap();

        assert!(f
            .engine
            .propose(f.u2, f.tom, f.luna, "second try".into())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn approval_matches_both_cats_and_rejects_competitors() {
        let f = fixture();
        let winner = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        let competitor = f
            .engine
            .propose(f.u3, f.tom, f.cleo, "pick me".into())
            .await
            .unwrap();

        f.engine
            .decide(winner.id, f.u1, Decision::Approved)
            .await
            .unwrap();

        assert_eq!(
            f.backend.request(winner.id).unwrap().status,
            MatchStatus::Approved
        );
        assert!(f.backend.cat(f.tom).unwrap().has_matched);
        assert!(f.backend.cat(f.luna).unwrap().has_matched);
        assert!(!f.backend.cat(f.cleo).unwrap().has_matched);

        let competitor = f.backend.request(competitor.id).unwrap();
        assert_eq!(competitor.status, MatchStatus::Rejected);
        assert!(!competitor.is_active());
    }

    #[tokio::test]
    async fn issuer_cannot_decide_own_request() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();

        let result = f.engine.decide(request.id, f.u2, Decision::Approved).await;
        assert!(matches!(result, Err(MatchError::IssuerCannotDecide)));
        assert!(f.backend.request(request.id).unwrap().is_active());
    }

    #[tokio::test]
    async fn bystander_cannot_decide() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();

        let result = f.engine.decide(request.id, f.u3, Decision::Rejected).await;
        assert!(matches!(result, Err(MatchError::UnauthorizedDecision)));
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let f = fixture();
        let result = f
            .engine
            .decide(MatchRequestId::new(), f.u1, Decision::Approved)
            .await;
        assert!(matches!(result, Err(MatchError::MatchRequestNotFound)));

        let result = f.engine.withdraw(MatchRequestId::new(), f.u1).await;
        assert!(matches!(result, Err(MatchError::MatchRequestNotFound)));
    }

    #[tokio::test]
    async fn terminal_requests_accept_no_further_transitions() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        f.engine
            .decide(request.id, f.u1, Decision::Approved)
            .await
            .unwrap();

        for decision in [Decision::Approved, Decision::Rejected] {
            let result = f.engine.decide(request.id, f.u1, decision).await;
            assert!(matches!(result, Err(MatchError::MatchRequestNoLongerValid)));
        }
        let result = f.engine.withdraw(request.id, f.u2).await;
        assert!(matches!(result, Err(MatchError::MatchRequestNoLongerValid)));
        assert_eq!(
            f.backend.request(request.id).unwrap().status,
            MatchStatus::Approved
        );
    }

    #[tokio::test]
    async fn withdraw_by_non_issuer_changes_nothing() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        let before = f.backend.request(request.id).unwrap();

        for stranger in [f.u1, f.u3] {
            let result = f.engine.withdraw(request.id, stranger).await;
            assert!(matches!(result, Err(MatchError::NotIssuer)));
        }

        let after = f.backend.request(request.id).unwrap();
        assert!(!after.is_withdrawn);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn withdrawn_request_leaves_status_pending_but_is_inactive() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();

        f.engine.withdraw(request.id, f.u2).await.unwrap();

        let stored = f.backend.request(request.id).unwrap();
        assert!(stored.is_withdrawn);
        assert_eq!(stored.status, MatchStatus::Pending);

        let result = f.engine.decide(request.id, f.u1, Decision::Approved).await;
        assert!(matches!(result, Err(MatchError::MatchRequestNoLongerValid)));
        let result = f.engine.withdraw(request.id, f.u2).await;
        assert!(matches!(result, Err(MatchError::MatchRequestNoLongerValid)));
    }

    #[tokio::test]
    async fn listing_is_oldest_first_and_hides_withdrawn() {
        let f = fixture();
        let first = f
            .engine
            .propose(f.u2, f.tom, f.luna, "first".into())
            .await
            .unwrap();
        let second = f
            .engine
            .propose(f.u3, f.tom, f.cleo, "second".into())
            .await
            .unwrap();

        let views = f.engine.list_for_user(f.u1).await.unwrap();
        let ids: Vec<_> = views.iter().map(|view| view.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(views[0].issued_by.name, "Dos");
        assert_eq!(views[0].match_cat_detail.name, "Tom");
        assert_eq!(views[0].user_cat_detail.name, "Luna");

        f.engine.withdraw(second.id, f.u3).await.unwrap();

        let views = f.engine.list_for_user(f.u1).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(f.engine.list_for_user(f.u3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_for_user_without_cats_is_empty() {
        let f = fixture();
        f.engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        let nobody = f.backend.add_user("Nobody", "nobody@example.com");
        assert!(f.engine.list_for_user(nobody).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_approvals_sharing_a_cat_commit_at_most_once() {
        let f = fixture();
        let with_luna = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        let with_cleo = f
            .engine
            .propose(f.u3, f.tom, f.cleo, "hey there".into())
            .await
            .unwrap();

        let a = {
            let engine = f.engine.clone();
            let u1 = f.u1;
            tokio::spawn(async move { engine.decide(with_luna.id, u1, Decision::Approved).await })
        };
        let b = {
            let engine = f.engine.clone();
            let u1 = f.u1;
            tokio::spawn(async move { engine.decide(with_cleo.id, u1, Decision::Approved).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let approved = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(approved, 1);
        assert!(results
            .iter()
            .any(|result| matches!(result, Err(MatchError::MatchRequestNoLongerValid))));

        let statuses = [
            f.backend.request(with_luna.id).unwrap().status,
            f.backend.request(with_cleo.id).unwrap().status,
        ];
        assert_eq!(
            statuses
                .iter()
                .filter(|status| **status == MatchStatus::Approved)
                .count(),
            1
        );
        assert!(f.backend.cat(f.tom).unwrap().has_matched);
    }

    #[tokio::test]
    async fn storage_failures_surface_as_internal() {
        let f = fixture();
        f.backend.fail_next_call();
        let result = f.engine.propose(f.u2, f.tom, f.luna, "hi there".into()).await;
        assert!(matches!(result, Err(MatchError::Internal(_))));
    }

    #[tokio::test]
    async fn blank_or_oversized_message_is_refused_before_any_lookup() {
        let f = fixture();
        for message in [String::new(), "   hi   ".to_string(), "x".repeat(121)] {
            let result = f.engine.propose(f.u2, f.tom, f.luna, message).await;
            assert!(matches!(result, Err(MatchError::InvalidMessage)));
        }
        assert!(f.engine.list_for_user(f.u1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn message_is_stored_trimmed() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "  hello tom  ".into())
            .await
            .unwrap();
        assert_eq!(f.backend.request(request.id).unwrap().message, "hello tom");
    }

    #[tokio::test]
    async fn stale_request_on_matched_cat_cannot_be_approved() {
        let f = fixture();
        // Passed eligibility before Tom was matched, landed after.
        let stale = MatchRequest::new(f.u3, f.tom, f.cleo, "pick me please".into());

        let first = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        f.engine
            .decide(first.id, f.u1, Decision::Approved)
            .await
            .unwrap();
        f.backend.force_insert(stale.clone());

        let result = f.engine.decide(stale.id, f.u1, Decision::Approved).await;
        assert!(matches!(result, Err(MatchError::MatchRequestNoLongerValid)));

        assert_eq!(
            f.backend.request(first.id).unwrap().status,
            MatchStatus::Approved
        );
        assert_eq!(
            f.backend.request(stale.id).unwrap().status,
            MatchStatus::Rejected
        );
        assert!(!f.backend.cat(f.cleo).unwrap().has_matched);
    }

    #[tokio::test]
    async fn failed_approval_rolls_back_every_step() {
        let f = fixture();
        let request = f
            .engine
            .propose(f.u2, f.tom, f.luna, "hi there".into())
            .await
            .unwrap();
        let competitor = f
            .engine
            .propose(f.u3, f.tom, f.cleo, "hey there".into())
            .await
            .unwrap();

        f.backend.fail_next_approval_midway();
        let result = f.engine.decide(request.id, f.u1, Decision::Approved).await;
        assert!(matches!(result, Err(MatchError::Internal(_))));

        assert!(f.backend.request(request.id).unwrap().is_active());
        assert!(f.backend.request(competitor.id).unwrap().is_active());
        assert!(!f.backend.cat(f.tom).unwrap().has_matched);
        assert!(!f.backend.cat(f.luna).unwrap().has_matched);

        f.engine
            .decide(request.id, f.u1, Decision::Approved)
            .await
            .expect("request is still pending after the failed attempt");
    }
}
