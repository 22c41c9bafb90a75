// In-memory backend for testing
//
// One struct implements the cat directory, user directory and match request
// store over a single mutex-guarded state. An approval stages its writes on a
// copy of the state and swaps it in only once every step succeeded, the
// in-process equivalent of the Postgres transaction.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{BaseCatDirectory, BaseMatchRequestStore, BaseUserDirectory, ServerDeps};
use crate::common::{CatId, MatchRequestId, UserId};
use crate::domains::cats::{Cat, Sex};
use crate::domains::matching::models::{
    pair_key, Approval, InsertOutcome, MatchRequest, MatchStatus, PairFacts,
};
use crate::domains::users::User;

#[derive(Clone, Default)]
struct State {
    users: HashMap<UserId, User>,
    cats: HashMap<CatId, Cat>,
    deleted_cats: HashSet<CatId>,
    requests: HashMap<MatchRequestId, MatchRequest>,
}

impl State {
    fn live_cat(&self, id: CatId) -> Option<&Cat> {
        if self.deleted_cats.contains(&id) {
            return None;
        }
        self.cats.get(&id)
    }

    fn any_matched(&self, cat_ids: &[CatId]) -> bool {
        cat_ids
            .iter()
            .any(|id| self.cats.get(id).is_some_and(|cat| cat.has_matched))
    }

    fn active_request_mut(&mut self, id: MatchRequestId) -> Option<&mut MatchRequest> {
        self.requests
            .get_mut(&id)
            .filter(|request| request.is_active())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
    fail_next: Arc<AtomicBool>,
    fail_approval: Arc<AtomicBool>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ServerDeps` with every dependency pointing at this backend
    pub fn server_deps(&self) -> ServerDeps {
        let shared = Arc::new(self.clone());
        ServerDeps::new(shared.clone(), shared.clone(), shared)
    }

    /// Make the next trait call fail with an I/O-style error
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Make the next approval fail after it has approved the request and
    /// flagged the cats, before the competitor sweep
    pub fn fail_next_approval_midway(&self) {
        self.fail_approval.store(true, Ordering::SeqCst);
    }

    /// Store a request as-is, skipping every check (stale or racing rows)
    pub fn force_insert(&self, request: MatchRequest) {
        self.state().requests.insert(request.id, request);
    }

    pub fn add_user(&self, name: &str, email: &str) -> UserId {
        let user = User {
            id: UserId::new(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        let id = user.id;
        self.state().users.insert(id, user);
        id
    }

    pub fn add_cat(&self, owner_id: UserId, name: &str, sex: Sex) -> CatId {
        let cat = Cat {
            id: CatId::new(),
            owner_id,
            name: name.to_string(),
            race: "Persian".to_string(),
            sex,
            age_in_month: 12,
            description: format!("{} likes naps", name),
            image_urls: vec![format!("https://images.example.com/{}.png", name.to_lowercase())],
            has_matched: false,
            created_at: Utc::now(),
        };
        let id = cat.id;
        self.state().cats.insert(id, cat);
        id
    }

    pub fn mark_matched(&self, cat_id: CatId) {
        if let Some(cat) = self.state().cats.get_mut(&cat_id) {
            cat.has_matched = true;
        }
    }

    pub fn delete_cat(&self, cat_id: CatId) {
        self.state().deleted_cats.insert(cat_id);
    }

    pub fn cat(&self, cat_id: CatId) -> Option<Cat> {
        self.state().cats.get(&cat_id).cloned()
    }

    pub fn request(&self, id: MatchRequestId) -> Option<MatchRequest> {
        self.state().requests.get(&id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn io(&self) -> Result<MutexGuard<'_, State>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("simulated storage failure"));
        }
        Ok(self.state())
    }
}

#[async_trait]
impl BaseCatDirectory for InMemoryBackend {
    async fn exists(&self, cat_id: CatId) -> Result<bool> {
        Ok(self.io()?.live_cat(cat_id).is_some())
    }

    async fn is_owned_by(&self, cat_id: CatId, owner_id: UserId) -> Result<bool> {
        Ok(self
            .io()?
            .live_cat(cat_id)
            .is_some_and(|cat| cat.owner_id == owner_id))
    }

    async fn get(&self, cat_id: CatId) -> Result<Option<Cat>> {
        Ok(self.io()?.live_cat(cat_id).cloned())
    }

    async fn find_by_owner(&self, owner_id: UserId) -> Result<Vec<Cat>> {
        let state = self.io()?;
        let mut cats: Vec<Cat> = state
            .cats
            .values()
            .filter(|cat| cat.owner_id == owner_id && !state.deleted_cats.contains(&cat.id))
            .cloned()
            .collect();
        cats.sort_by_key(|cat| (cat.created_at, cat.id));
        Ok(cats)
    }
}

#[async_trait]
impl BaseUserDirectory for InMemoryBackend {
    async fn get(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.io()?.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl BaseMatchRequestStore for InMemoryBackend {
    async fn find_by_id(&self, id: MatchRequestId) -> Result<Option<MatchRequest>> {
        Ok(self.io()?.requests.get(&id).cloned())
    }

    async fn find_for_cats(&self, cat_ids: &[CatId]) -> Result<Vec<MatchRequest>> {
        let state = self.io()?;
        let mut requests: Vec<MatchRequest> = state
            .requests
            .values()
            .filter(|request| {
                !request.is_withdrawn && cat_ids.iter().any(|cat_id| request.involves(*cat_id))
            })
            .cloned()
            .collect();
        requests.sort_by_key(|request| (request.created_at, request.id));
        Ok(requests)
    }

    async fn compare_cats(&self, a: CatId, b: CatId) -> Result<Option<PairFacts>> {
        let state = self.io()?;
        let (Some(first), Some(second)) = (state.live_cat(a), state.live_cat(b)) else {
            return Ok(None);
        };
        Ok(Some(PairFacts {
            same_sex: first.sex == second.sex,
            any_matched: first.has_matched || second.has_matched,
            same_owner: first.owner_id == second.owner_id,
        }))
    }

    async fn has_active_request(&self, a: CatId, b: CatId) -> Result<bool> {
        let key = pair_key(a, b);
        Ok(self
            .io()?
            .requests
            .values()
            .any(|request| request.is_active() && request.pair_key() == key))
    }

    async fn insert(&self, request: &MatchRequest) -> Result<InsertOutcome> {
        let mut state = self.io()?;
        if state.any_matched(&[request.match_cat_id, request.user_cat_id]) {
            return Ok(InsertOutcome::CatAlreadyMatched);
        }
        let key = request.pair_key();
        let conflict = request.is_active()
            && state
                .requests
                .values()
                .any(|existing| existing.is_active() && existing.pair_key() == key);
        if conflict {
            return Ok(InsertOutcome::Duplicate);
        }
        state.requests.insert(request.id, request.clone());
        Ok(InsertOutcome::Created(request.clone()))
    }

    async fn reject(&self, id: MatchRequestId) -> Result<Option<MatchRequest>> {
        let mut state = self.io()?;
        Ok(state.active_request_mut(id).map(|request| {
            request.status = MatchStatus::Rejected;
            request.updated_at = Utc::now();
            request.clone()
        }))
    }

    async fn withdraw(&self, id: MatchRequestId) -> Result<Option<MatchRequest>> {
        let mut state = self.io()?;
        Ok(state.active_request_mut(id).map(|request| {
            request.is_withdrawn = true;
            request.updated_at = Utc::now();
            request.clone()
        }))
    }

    async fn approve(&self, id: MatchRequestId) -> Result<Option<Approval>> {
        let mut state = self.io()?;
        let now = Utc::now();

        let Some(request) = state.active_request_mut(id).map(|request| request.clone()) else {
            return Ok(None);
        };
        let cat_ids = [request.match_cat_id, request.user_cat_id];

        if state.any_matched(&cat_ids) {
            if let Some(stale) = state.active_request_mut(id) {
                stale.status = MatchStatus::Rejected;
                stale.updated_at = now;
            }
            return Ok(None);
        }

        let mut staged = State::clone(&state);

        let Some(approved) = staged.active_request_mut(id) else {
            return Ok(None);
        };
        approved.status = MatchStatus::Approved;
        approved.updated_at = now;
        let request = approved.clone();

        for cat_id in cat_ids {
            if let Some(cat) = staged.cats.get_mut(&cat_id) {
                cat.has_matched = true;
            }
        }

        if self.fail_approval.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("simulated failure during approval"));
        }

        let mut invalidated = Vec::new();
        for other in staged.requests.values_mut() {
            let competing = other.id != id
                && other.is_active()
                && (other.involves(request.match_cat_id) || other.involves(request.user_cat_id));
            if competing {
                other.status = MatchStatus::Rejected;
                other.updated_at = now;
                invalidated.push(other.id);
            }
        }

        *state = staged;

        Ok(Some(Approval {
            request,
            invalidated,
        }))
    }
}
