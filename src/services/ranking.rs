use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        round_to_tenth, ComparisonOutcome, ItemKind, ItemRef, Partition, RankedCandidate,
        RatedItem, MAX_SCORE, MIN_SCORE,
    },
    services::{dispatch::ComparisonDispatcher, store::RatingStore},
};

/// Maps a 0-based rank to a score on the 0-10 scale
///
/// `total_candidates` counts the new item as well, so a new item compared
/// against three existing ratings uses a total of four. Rank 0 always maps to
/// 10.0 and the result is rounded to one decimal.
pub fn position_to_score(position: usize, total_candidates: usize) -> f64 {
    if total_candidates <= 1 {
        return MAX_SCORE;
    }

    let normalized = position as f64 / total_candidates as f64;
    round_to_tenth((MAX_SCORE * (1.0 - normalized)).clamp(MIN_SCORE, MAX_SCORE))
}

/// Upper bound on comparisons for `candidate_count` items: ceil(log2(n + 1))
pub fn max_comparisons(candidate_count: usize) -> usize {
    (usize::BITS - candidate_count.leading_zeros()) as usize
}

/// Ratings of `kind` whose score falls in `partition`, best first
///
/// Rows without a usable score, rows of another kind and the item named by
/// `exclude_id` are dropped. Equal scores are ordered by id.
pub fn partition_view(
    ratings: &[RatedItem],
    kind: ItemKind,
    partition: Option<Partition>,
    exclude_id: Option<&str>,
) -> Vec<RankedCandidate> {
    let mut candidates: Vec<RankedCandidate> = ratings
        .iter()
        .filter(|r| r.kind == kind)
        .filter(|r| exclude_id != Some(r.id.as_str()))
        .filter_map(RatedItem::to_candidate)
        .filter(|c| partition.map_or(true, |p| p.band().contains(c.personal_score)))
        .collect();

    sort_candidates(&mut candidates);
    candidates
}

fn sort_candidates(candidates: &mut [RankedCandidate]) {
    candidates.sort_by(|a, b| {
        b.personal_score
            .partial_cmp(&a.personal_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Binary search over one user's ratings in a single partition
///
/// Invariants: `sorted_candidates` is non-empty, sorted by score descending
/// and never contains the item being rated. While the search runs,
/// `search_low <= search_high` and `current_index` lies between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertionState {
    item: ItemRef,
    partition: Partition,
    sorted_candidates: Vec<RankedCandidate>,
    search_low: isize,
    search_high: isize,
    current_index: usize,
    comparisons_made: usize,
}

/// The pair shown to the user for one judgment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPrompt {
    pub new_item: ItemRef,
    pub existing: RankedCandidate,
    /// 1-based number of this comparison
    pub comparison_number: usize,
    pub max_comparisons: usize,
}

/// Score assigned without any comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImmediateScore {
    pub item: ItemRef,
    pub partition: Partition,
    pub score: f64,
    pub category_id: u8,
}

impl ImmediateScore {
    pub fn new(item: ItemRef, partition: Partition, score: f64) -> Self {
        Self {
            item,
            partition,
            score,
            category_id: Partition::for_score(score).category_id(),
        }
    }
}

/// Where the search converged and the score that rank maps to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalPosition {
    pub item: ItemRef,
    pub partition: Partition,
    /// 0-based rank among the candidates, 0 = best
    pub position: usize,
    /// Candidates plus the new item
    pub total_candidates: usize,
    pub score: f64,
    pub category_id: u8,
    pub comparisons_made: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionSelection {
    Immediate(ImmediateScore),
    Compare(InsertionState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchStep {
    Continue(InsertionState),
    Converged(FinalPosition),
}

impl InsertionState {
    /// Starts a search over `candidates`, or returns `None` when there is
    /// nothing to compare against
    pub fn new(
        item: ItemRef,
        partition: Partition,
        mut candidates: Vec<RankedCandidate>,
    ) -> Option<Self> {
        candidates.retain(|c| c.id != item.id);
        if candidates.is_empty() {
            return None;
        }
        sort_candidates(&mut candidates);

        let search_high = candidates.len() as isize - 1;
        Some(Self {
            item,
            partition,
            sorted_candidates: candidates,
            search_low: 0,
            search_high,
            current_index: midpoint(0, search_high),
            comparisons_made: 0,
        })
    }

    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn sorted_candidates(&self) -> &[RankedCandidate] {
        &self.sorted_candidates
    }

    pub fn search_low(&self) -> isize {
        self.search_low
    }

    pub fn search_high(&self) -> isize {
        self.search_high
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn comparisons_made(&self) -> usize {
        self.comparisons_made
    }

    pub fn current_candidate(&self) -> &RankedCandidate {
        &self.sorted_candidates[self.current_index]
    }

    pub fn prompt(&self) -> ComparisonPrompt {
        ComparisonPrompt {
            new_item: self.item.clone(),
            existing: self.current_candidate().clone(),
            comparison_number: self.comparisons_made + 1,
            max_comparisons: max_comparisons(self.sorted_candidates.len()),
        }
    }

    /// Outcome record for a judgment on the current pair
    pub fn outcome(&self, new_item_preferred: bool) -> ComparisonOutcome {
        ComparisonOutcome::new(
            self.item.kind,
            self.item.id.clone(),
            self.current_candidate().id.clone(),
            new_item_preferred,
        )
    }

    /// One binary-search step
    ///
    /// Preferring the new item keeps the search in the better (upper) half,
    /// otherwise it moves to the lower half. Once `search_low` passes
    /// `search_high` the insertion position is `search_low`.
    pub fn apply_choice(mut self, new_item_preferred: bool) -> SearchStep {
        let current = self.current_index as isize;
        if new_item_preferred {
            self.search_high = current - 1;
        } else {
            self.search_low = current + 1;
        }
        self.comparisons_made += 1;

        if self.search_low > self.search_high {
            let position = self.search_low as usize;
            let total_candidates = self.sorted_candidates.len() + 1;
            let score = position_to_score(position, total_candidates);

            return SearchStep::Converged(FinalPosition {
                item: self.item,
                partition: self.partition,
                position,
                total_candidates,
                score,
                category_id: Partition::for_score(score).category_id(),
                comparisons_made: self.comparisons_made,
            });
        }

        self.current_index = midpoint(self.search_low, self.search_high);
        SearchStep::Continue(self)
    }
}

fn midpoint(low: isize, high: isize) -> usize {
    ((low + high) / 2) as usize
}

/// Places newly rated items among a user's existing ratings
///
/// Reads go through the injected store. Comparison outcomes are handed to
/// the dispatcher and never awaited, so a slow or failing store cannot change
/// where an item lands.
#[derive(Clone)]
pub struct RatingEngine {
    store: Arc<dyn RatingStore>,
    dispatcher: ComparisonDispatcher,
}

impl RatingEngine {
    pub fn new(store: Arc<dyn RatingStore>, dispatcher: ComparisonDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub fn store(&self) -> &Arc<dyn RatingStore> {
        &self.store
    }

    /// Loads the user's ratings and starts a search in `partition`
    ///
    /// Store failures are returned as-is; deciding on a fallback score is up
    /// to the caller.
    #[tracing::instrument(skip_all, fields(item = %item, partition = %partition))]
    pub async fn select_partition(
        &self,
        item: &ItemRef,
        partition: Partition,
    ) -> AppResult<PartitionSelection> {
        let ratings = self.store.get_ratings(item.kind).await?;
        Ok(Self::select_from_ratings(item, partition, &ratings))
    }

    /// Pure half of `select_partition`
    pub fn select_from_ratings(
        item: &ItemRef,
        partition: Partition,
        ratings: &[RatedItem],
    ) -> PartitionSelection {
        let candidates = partition_view(ratings, item.kind, Some(partition), Some(&item.id));

        match InsertionState::new(item.clone(), partition, candidates) {
            Some(state) => {
                tracing::debug!(
                    candidates = state.sorted_candidates.len(),
                    max_comparisons = max_comparisons(state.sorted_candidates.len()),
                    "Starting comparison search"
                );
                PartitionSelection::Compare(state)
            }
            None => {
                let score = partition.immediate_score();
                tracing::debug!(score, "No candidates in partition, scoring immediately");
                PartitionSelection::Immediate(ImmediateScore::new(item.clone(), partition, score))
            }
        }
    }

    pub fn present_comparison(state: &InsertionState) -> ComparisonPrompt {
        state.prompt()
    }

    /// Applies the user's choice and queues the outcome for the store
    pub fn record_choice(&self, state: InsertionState, new_item_preferred: bool) -> SearchStep {
        self.dispatcher.submit(state.outcome(new_item_preferred));
        state.apply_choice(new_item_preferred)
    }
}
