/// Prestige backend rating store
///
/// Talks to the rating endpoints of the backend API:
/// 1. Ratings: GET /api/rating/user/{kind}
/// 2. Comparisons: POST /api/rating/compare
/// 3. Save: POST /api/rating/save
/// 4. Delete: DELETE /api/rating/user/{kind}/{item_id}
///
/// Responses with status 500 are retried with exponential backoff; every other
/// failure is returned to the caller on the first attempt.
use crate::{
    error::{AppError, AppResult},
    models::{ComparisonOutcome, ItemKind, NewRating, RatedItem},
    services::store::{RatingStore, RetryPolicy},
};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;

#[derive(Clone)]
pub struct HttpRatingStore {
    http_client: HttpClient,
    api_url: String,
    api_token: Option<String>,
    retry: RetryPolicy,
}

/// Body of the compare endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonRequest<'a> {
    item_id1: &'a str,
    item_id2: &'a str,
    item_type: ItemKind,
    winner_id: &'a str,
}

impl<'a> From<&'a ComparisonOutcome> for ComparisonRequest<'a> {
    fn from(outcome: &'a ComparisonOutcome) -> Self {
        Self {
            item_id1: &outcome.new_item_id,
            item_id2: &outcome.existing_item_id,
            item_type: outcome.kind,
            winner_id: &outcome.winner_id,
        }
    }
}

impl HttpRatingStore {
    /// Creates a store client for the backend at `api_url`
    pub fn new(
        api_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        let api_url = api_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http_client,
            api_url,
            api_token,
            retry,
        })
    }

    fn endpoint(&self, relative: &str) -> String {
        format!("{}/api/rating/{}", self.api_url, relative)
    }

    /// Sends a request, retrying HTTP 500 responses per the retry policy
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is consumed
    /// by `send`.
    async fn send<F>(&self, build: F) -> AppResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            let mut request = build();
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if self.retry.should_retry(status, attempt) {
                let delay = self.retry.backoff(attempt);
                tracing::warn!(
                    status = %status,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Rating API returned server error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Rating API returned status {}: {}",
                status, body
            )));
        }
    }
}

/// Decodes backend rows one at a time, skipping any that do not parse
fn decode_rating_rows(kind: ItemKind, rows: Vec<serde_json::Value>) -> Vec<RatedItem> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value::<RatedItem>(row) {
            Ok(rating) => Some(rating),
            Err(e) => {
                tracing::warn!(kind = %kind, index, error = %e, "Skipping malformed rating row");
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl RatingStore for HttpRatingStore {
    async fn get_ratings(&self, kind: ItemKind) -> AppResult<Vec<RatedItem>> {
        let url = self.endpoint(&format!("user/{}", kind));
        let response = self.send(|| self.http_client.get(&url)).await?;
        let rows: Vec<serde_json::Value> = response.json().await?;
        let ratings = decode_rating_rows(kind, rows);

        tracing::debug!(kind = %kind, count = ratings.len(), "Fetched ratings");

        Ok(ratings)
    }

    async fn submit_comparison(&self, outcome: &ComparisonOutcome) -> AppResult<()> {
        let url = self.endpoint("compare");
        let body = ComparisonRequest::from(outcome);
        self.send(|| self.http_client.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn save_rating(&self, rating: &NewRating) -> AppResult<RatedItem> {
        let url = self.endpoint("save");
        let response = self
            .send(|| self.http_client.post(&url).json(rating))
            .await?;
        let saved: RatedItem = response.json().await?;

        tracing::info!(
            kind = %rating.kind,
            item_id = %rating.item_id,
            score = rating.personal_score,
            "Saved rating"
        );

        Ok(saved)
    }

    async fn delete_rating(&self, kind: ItemKind, item_id: &str) -> AppResult<()> {
        if item_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Item id cannot be empty".to_string(),
            ));
        }

        let url = self.endpoint(&format!("user/{}/{}", kind, item_id));
        self.send(|| self.http_client.delete(&url)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
