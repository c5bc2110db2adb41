use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{ItemKind, Partition, RankedCandidate},
    services::{ranking::partition_view, store::RatingStore},
};

/// The user's ratings of one kind, best first, optionally limited to a partition
pub async fn list_ratings(
    store: Arc<dyn RatingStore>,
    kind: ItemKind,
    partition: Option<Partition>,
) -> AppResult<Vec<RankedCandidate>> {
    let ratings = store.get_ratings(kind).await?;
    Ok(partition_view(&ratings, kind, partition, None))
}

/// Removes a rating. Existing scores of other items are left as they are.
pub async fn delete_rating(
    store: Arc<dyn RatingStore>,
    kind: ItemKind,
    item_id: &str,
) -> AppResult<()> {
    if item_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Item id cannot be empty".to_string(),
        ));
    }

    store.delete_rating(kind, item_id).await?;
    tracing::info!(kind = %kind, item_id = %item_id, "Rating deleted");
    Ok(())
}
