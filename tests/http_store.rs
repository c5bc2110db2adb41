use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use prestige_ranking::error::AppError;
use prestige_ranking::models::{ComparisonOutcome, ItemKind, ItemRef, NewRating, Partition};
use prestige_ranking::services::sessions::SessionProgress;
use prestige_ranking::services::store::{HttpRatingStore, RatingStore, RetryPolicy};
use prestige_ranking::services::{ComparisonDispatcher, RatingEngine, SessionManager};

fn store_for(server: &MockServer, retry: RetryPolicy) -> HttpRatingStore {
    HttpRatingStore::new(
        server.uri(),
        Some("test-token".to_string()),
        Duration::from_secs(2),
        retry,
    )
    .unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(5))
}

/// Fails with 500 a fixed number of times, then serves `body`
struct FlakyResponder {
    calls: Arc<AtomicUsize>,
    failures: usize,
    body: serde_json::Value,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200).set_body_json(self.body.clone())
        }
    }
}

#[tokio::test]
async fn get_ratings_parses_backend_rows_and_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rating/user/track"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "itemId": "t1",
                "itemType": "track",
                "personalScore": 9.1,
                "categoryId": 1,
                "position": 0
            },
            {
                "itemId": "t2",
                "itemType": "track",
                "personalScore": null
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let ratings = store_for(&server, fast_retry())
        .get_ratings(ItemKind::Track)
        .await
        .unwrap();

    assert_eq!(ratings.len(), 2);
    assert_eq!(ratings[0].id, "t1");
    assert_eq!(ratings[0].personal_score, Some(9.1));
    assert_eq!(ratings[0].category_id, Some(1));
    assert_eq!(ratings[1].personal_score, None);
    assert!(!ratings[1].is_new_rating);
}

#[tokio::test]
async fn malformed_rows_do_not_block_comparisons() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rating/user/album"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "itemId": "X", "itemType": "album", "personalScore": 9.0, "categoryId": 1 },
            { "itemId": "Y", "itemType": "Album", "personalScore": 8.0, "categoryId": 1 },
            { "itemId": "Z", "itemType": "album", "personalScore": 7.0, "categoryId": 1 },
            { "itemId": "P", "itemType": "playlist", "personalScore": 9.5 },
            { "itemId": "Q", "itemType": "album", "personalScore": "high" },
            { "itemType": "album", "personalScore": 8.5 }
        ])))
        .mount(&server)
        .await;

    let store: Arc<dyn RatingStore> = Arc::new(store_for(&server, fast_retry()));
    let ratings = store.get_ratings(ItemKind::Album).await.unwrap();
    let ids: Vec<&str> = ratings.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["X", "Y", "Z"]);

    let (dispatcher, handle) = ComparisonDispatcher::spawn(store.clone(), Duration::from_secs(1));
    let sessions = SessionManager::new(RatingEngine::new(store, dispatcher), Duration::from_secs(60));

    match sessions
        .start(ItemRef::new("new", ItemKind::Album), Partition::Loved)
        .await
        .unwrap()
    {
        SessionProgress::Comparing { prompt, .. } => {
            assert_eq!(prompt.existing.id, "Y");
            assert_eq!(prompt.max_comparisons, 2);
        }
        other => panic!("expected a comparison, got {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/api/rating/user/album"))
        .respond_with(FlakyResponder {
            calls: calls.clone(),
            failures: 2,
            body: json!([]),
        })
        .mount(&server)
        .await;

    let ratings = store_for(&server, fast_retry())
        .get_ratings(ItemKind::Album)
        .await
        .unwrap();

    assert!(ratings.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_stop_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rating/user/album"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let err = store_for(&server, fast_retry())
        .get_ratings(ItemKind::Album)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExternalApi(_)));
}

#[tokio::test]
async fn other_failures_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rating/user/artist"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = store_for(&server, fast_retry())
        .get_ratings(ItemKind::Artist)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExternalApi(msg) if msg.contains("503")));
}

#[tokio::test]
async fn submit_comparison_posts_pair_and_winner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rating/compare"))
        .and(body_json(json!({
            "itemId1": "new",
            "itemId2": "old",
            "itemType": "album",
            "winnerId": "old"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = ComparisonOutcome::new(ItemKind::Album, "new", "old", false);
    store_for(&server, fast_retry())
        .submit_comparison(&outcome)
        .await
        .unwrap();
}

#[tokio::test]
async fn save_rating_returns_stored_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rating/save"))
        .and(body_json(json!({
            "itemId": "t9",
            "itemType": "track",
            "personalScore": 5.0,
            "categoryId": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "itemId": "t9",
            "itemType": "track",
            "personalScore": 5.0,
            "categoryId": 2,
            "position": 3,
            "isNewRating": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let saved = store_for(&server, fast_retry())
        .save_rating(&NewRating::from_score("t9", ItemKind::Track, 5.0))
        .await
        .unwrap();

    assert_eq!(saved.position, Some(3));
    assert!(saved.is_new_rating);
}

#[tokio::test]
async fn delete_rating_targets_item_path() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/rating/user/artist/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server, fast_retry())
        .delete_rating(ItemKind::Artist, "abc")
        .await
        .unwrap();
}

#[tokio::test]
async fn comparison_failures_do_not_change_placement() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rating/user/album"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "itemId": "X", "itemType": "album", "personalScore": 9.0, "categoryId": 1 },
            { "itemId": "Y", "itemType": "album", "personalScore": 8.0, "categoryId": 1 },
            { "itemId": "Z", "itemType": "album", "personalScore": 7.0, "categoryId": 1 }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/rating/compare"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/rating/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "itemId": "new",
            "itemType": "album",
            "personalScore": 2.5,
            "categoryId": 3,
            "isNewRating": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store: Arc<dyn RatingStore> = Arc::new(store_for(&server, fast_retry()));
    let (dispatcher, handle) = ComparisonDispatcher::spawn(store.clone(), Duration::from_secs(1));
    let sessions = SessionManager::new(RatingEngine::new(store, dispatcher), Duration::from_secs(60));

    let item = ItemRef::new("new", ItemKind::Album);
    let session_id = match sessions.start(item, Partition::Loved).await.unwrap() {
        SessionProgress::Comparing { session_id, .. } => session_id,
        other => panic!("expected a comparison, got {:?}", other),
    };

    // Loses to Y, then to Z: last of four
    assert!(matches!(
        sessions.choose(session_id, "Y").await.unwrap(),
        SessionProgress::Comparing { .. }
    ));
    let result = match sessions.choose(session_id, "Z").await.unwrap() {
        SessionProgress::Completed { result, .. } => result,
        other => panic!("expected completion, got {:?}", other),
    };

    assert_eq!(result.position, Some(3));
    assert_eq!(result.score, 2.5);
    assert_eq!(result.category_id, 3);
    assert!(result.persisted);

    handle.shutdown().await;
}
