use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{ComparisonOutcome, ItemKind, NewRating, RatedItem},
    services::store::RatingStore,
};

/// Comparisons kept by default; older ones are dropped first
pub const DEFAULT_COMPARISON_LIMIT: usize = 10_000;

/// Process-local rating store
///
/// Holds one user's ratings. Cloning shares the underlying maps. Only the
/// most recent comparisons are kept, so a long-running memory backend stays
/// bounded.
#[derive(Clone)]
pub struct InMemoryRatingStore {
    inner: Arc<RwLock<InMemoryInner>>,
    comparison_limit: usize,
}

#[derive(Default)]
struct InMemoryInner {
    ratings: HashMap<(ItemKind, String), RatedItem>,
    comparisons: VecDeque<ComparisonOutcome>,
}

impl Default for InMemoryRatingStore {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            comparison_limit: DEFAULT_COMPARISON_LIMIT,
        }
    }
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comparison_limit(mut self, limit: usize) -> Self {
        self.comparison_limit = limit;
        self
    }

    /// Creates a store pre-populated with `ratings`
    pub async fn with_ratings(ratings: impl IntoIterator<Item = RatedItem>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write().await;
            for rating in ratings {
                inner
                    .ratings
                    .insert((rating.kind, rating.id.clone()), rating);
            }
        }
        store
    }

    /// Retained comparisons, oldest first
    pub async fn comparisons(&self) -> Vec<ComparisonOutcome> {
        self.inner.read().await.comparisons.iter().cloned().collect()
    }

    pub async fn rating(&self, kind: ItemKind, item_id: &str) -> Option<RatedItem> {
        self.inner
            .read()
            .await
            .ratings
            .get(&(kind, item_id.to_string()))
            .cloned()
    }
}

#[async_trait::async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn get_ratings(&self, kind: ItemKind) -> AppResult<Vec<RatedItem>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ratings
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    async fn submit_comparison(&self, outcome: &ComparisonOutcome) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        while inner.comparisons.len() >= self.comparison_limit.max(1) {
            inner.comparisons.pop_front();
        }
        inner.comparisons.push_back(outcome.clone());
        Ok(())
    }

    async fn save_rating(&self, rating: &NewRating) -> AppResult<RatedItem> {
        let mut inner = self.inner.write().await;
        let key = (rating.kind, rating.item_id.clone());
        let is_new_rating = !inner.ratings.contains_key(&key);

        let saved = RatedItem {
            id: rating.item_id.clone(),
            kind: rating.kind,
            personal_score: Some(rating.personal_score),
            category_id: Some(rating.category_id),
            position: None,
            is_new_rating,
        };
        inner.ratings.insert(key, saved.clone());

        Ok(saved)
    }

    async fn delete_rating(&self, kind: ItemKind, item_id: &str) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .ratings
            .remove(&(kind, item_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("No {} rating for {}", kind, item_id)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
