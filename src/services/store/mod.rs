/// Rating store abstraction
///
/// The ranking engine never talks to the backend directly. It receives a
/// `RatingStore` at construction time, so the same engine runs against the
/// Prestige API in production and an in-process map in tests.
use crate::{
    error::AppResult,
    models::{ComparisonOutcome, ItemKind, NewRating, RatedItem},
};

pub mod http;
pub mod memory;
pub mod retry;

pub use http::HttpRatingStore;
pub use memory::InMemoryRatingStore;
pub use retry::RetryPolicy;

/// Trait for rating persistence backends
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    /// All ratings of the given kind for the current user, in no particular order
    async fn get_ratings(&self, kind: ItemKind) -> AppResult<Vec<RatedItem>>;

    /// Record one pairwise judgment
    ///
    /// Callers treat this as best-effort; a failure must never change how the
    /// new item is placed.
    async fn submit_comparison(&self, outcome: &ComparisonOutcome) -> AppResult<()>;

    /// Persist a finished rating, returning the stored row
    async fn save_rating(&self, rating: &NewRating) -> AppResult<RatedItem>;

    async fn delete_rating(&self, kind: ItemKind, item_id: &str) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
