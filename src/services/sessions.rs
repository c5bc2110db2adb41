use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{ItemRef, NewRating, Partition},
    services::ranking::{
        ComparisonPrompt, FinalPosition, ImmediateScore, InsertionState, PartitionSelection,
        RatingEngine, SearchStep,
    },
};

/// Outcome of a finished rating flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingResult {
    pub item: ItemRef,
    pub partition: Partition,
    pub score: f64,
    pub category_id: u8,
    /// Final rank among the compared items, when comparisons happened
    pub position: Option<usize>,
    pub total_candidates: Option<usize>,
    pub comparisons_made: usize,
    /// The store could not be read and the partition midpoint was used
    pub fallback: bool,
    /// Whether the rating store accepted the saved rating
    pub persisted: bool,
}

impl From<ImmediateScore> for RatingResult {
    fn from(immediate: ImmediateScore) -> Self {
        Self {
            item: immediate.item,
            partition: immediate.partition,
            score: immediate.score,
            category_id: immediate.category_id,
            position: None,
            total_candidates: None,
            comparisons_made: 0,
            fallback: false,
            persisted: false,
        }
    }
}

impl From<FinalPosition> for RatingResult {
    fn from(done: FinalPosition) -> Self {
        Self {
            item: done.item,
            partition: done.partition,
            score: done.score,
            category_id: done.category_id,
            position: Some(done.position),
            total_candidates: Some(done.total_candidates),
            comparisons_made: done.comparisons_made,
            fallback: false,
            persisted: false,
        }
    }
}

/// Where a rating session stands after a call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionProgress {
    Comparing {
        session_id: Uuid,
        prompt: ComparisonPrompt,
    },
    Completed {
        session_id: Option<Uuid>,
        result: RatingResult,
    },
}

/// Search state of one session and when the client last acted on it
struct Session {
    state: InsertionState,
    last_touched: Instant,
}

impl Session {
    fn new(state: InsertionState) -> Self {
        Self {
            state,
            last_touched: Instant::now(),
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_touched) >= ttl
    }
}

/// Interactive rating sessions, one search state per session
///
/// Sessions never share state. Completing or cancelling a session drops its
/// state; comparisons already dispatched stay dispatched. Sessions left idle
/// for longer than the TTL are treated as abandoned and evicted.
pub struct SessionManager {
    engine: RatingEngine,
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(engine: RatingEngine, ttl: Duration) -> Self {
        Self {
            engine,
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session idle for at least the TTL, returning how many went
    pub async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.ttl));

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted abandoned rating sessions");
        }
        evicted
    }

    /// Runs `evict_expired` every `period` until the manager is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match manager.upgrade() {
                    Some(manager) => {
                        manager.evict_expired().await;
                    }
                    None => break,
                }
            }
        })
    }

    /// Starts rating `item` in `partition`
    ///
    /// Completes immediately when the partition is empty or the user's
    /// ratings cannot be loaded.
    pub async fn start(&self, item: ItemRef, partition: Partition) -> AppResult<SessionProgress> {
        if item.id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Item id cannot be empty".to_string(),
            ));
        }

        self.evict_expired().await;

        match self.engine.select_partition(&item, partition).await {
            Ok(PartitionSelection::Compare(state)) => {
                let session_id = Uuid::new_v4();
                let prompt = state.prompt();

                tracing::info!(
                    session_id = %session_id,
                    item = %item,
                    partition = %partition,
                    candidates = state.sorted_candidates().len(),
                    "Rating session started"
                );

                self.sessions
                    .write()
                    .await
                    .insert(session_id, Session::new(state));
                Ok(SessionProgress::Comparing { session_id, prompt })
            }
            Ok(PartitionSelection::Immediate(immediate)) => {
                let result = self.persist(RatingResult::from(immediate)).await;
                Ok(SessionProgress::Completed {
                    session_id: None,
                    result,
                })
            }
            Err(e) if e.is_store_failure() => {
                let score = partition.fallback_score();
                tracing::warn!(
                    error = %e,
                    item = %item,
                    partition = %partition,
                    score,
                    "Could not load ratings, using partition default"
                );

                let mut result = RatingResult::from(ImmediateScore::new(item, partition, score));
                result.fallback = true;
                let result = self.persist(result).await;
                Ok(SessionProgress::Completed {
                    session_id: None,
                    result,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// The pair currently awaiting a judgment
    pub async fn prompt(&self, session_id: Uuid) -> AppResult<ComparisonPrompt> {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .get(&session_id)
            .filter(|session| !session.is_expired(now, self.ttl))
            .map(|session| RatingEngine::present_comparison(&session.state))
            .ok_or_else(|| session_not_found(session_id))
    }

    /// Records which item of the current pair the user preferred
    pub async fn choose(&self, session_id: Uuid, winner_id: &str) -> AppResult<SessionProgress> {
        let step = {
            let now = Instant::now();
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get(&session_id)
                .ok_or_else(|| session_not_found(session_id))?;

            if session.is_expired(now, self.ttl) {
                sessions.remove(&session_id);
                return Err(session_not_found(session_id));
            }

            let state = &session.state;
            let new_item_preferred = if winner_id == state.item().id {
                true
            } else if winner_id == state.current_candidate().id {
                false
            } else {
                return Err(AppError::InvalidInput(format!(
                    "Winner '{}' is not part of the current comparison",
                    winner_id
                )));
            };

            let session = sessions
                .remove(&session_id)
                .ok_or_else(|| session_not_found(session_id))?;

            match self.engine.record_choice(session.state, new_item_preferred) {
                SearchStep::Continue(next) => {
                    let prompt = next.prompt();
                    sessions.insert(session_id, Session::new(next));
                    return Ok(SessionProgress::Comparing { session_id, prompt });
                }
                SearchStep::Converged(done) => done,
            }
        };

        tracing::info!(
            session_id = %session_id,
            item = %step.item,
            position = step.position,
            score = step.score,
            comparisons = step.comparisons_made,
            "Rating session completed"
        );

        let result = self.persist(RatingResult::from(step)).await;
        Ok(SessionProgress::Completed {
            session_id: Some(session_id),
            result,
        })
    }

    /// Discards a session without saving anything
    pub async fn cancel(&self, session_id: Uuid) -> AppResult<()> {
        match self.sessions.write().await.remove(&session_id) {
            Some(_) => {
                tracing::info!(session_id = %session_id, "Rating session cancelled");
                Ok(())
            }
            None => Err(session_not_found(session_id)),
        }
    }

    async fn persist(&self, mut result: RatingResult) -> RatingResult {
        let rating = NewRating::from_score(result.item.id.clone(), result.item.kind, result.score);

        match self.engine.store().save_rating(&rating).await {
            Ok(_) => result.persisted = true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    item = %result.item,
                    score = result.score,
                    "Failed to save rating"
                );
            }
        }

        result
    }
}

fn session_not_found(session_id: Uuid) -> AppError {
    AppError::NotFound(format!("Rating session {} not found", session_id))
}
