use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemKind, Partition, MAX_SCORE, MIN_SCORE};

/// Round to one decimal place, the precision scores are stored at
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A rating as returned by `GET api/rating/user/{kind}`
///
/// Score and category are optional on the wire; rows without a usable score
/// never take part in ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedItem {
    #[serde(rename = "itemId")]
    pub id: String,
    #[serde(rename = "itemType")]
    pub kind: ItemKind,
    #[serde(default)]
    pub personal_score: Option<f64>,
    #[serde(default)]
    pub category_id: Option<u8>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub is_new_rating: bool,
}

impl RatedItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, personal_score: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            personal_score: Some(personal_score),
            category_id: Some(Partition::for_score(personal_score).category_id()),
            position: None,
            is_new_rating: false,
        }
    }

    /// The score, if it is present and on the 0-10 scale
    pub fn valid_score(&self) -> Option<f64> {
        self.personal_score
            .filter(|s| s.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(s))
    }

    /// Uniform projection used by the ranking engine
    pub fn to_candidate(&self) -> Option<RankedCandidate> {
        self.valid_score().map(|score| RankedCandidate {
            id: self.id.clone(),
            personal_score: score,
            category_id: self.category_id,
        })
    }
}

/// An existing rating the new item can be compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: String,
    pub personal_score: f64,
    pub category_id: Option<u8>,
}

/// Result of one pairwise judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    pub kind: ItemKind,
    pub new_item_id: String,
    pub existing_item_id: String,
    pub winner_id: String,
    pub decided_at: DateTime<Utc>,
}

impl ComparisonOutcome {
    pub fn new(
        kind: ItemKind,
        new_item_id: impl Into<String>,
        existing_item_id: impl Into<String>,
        new_item_preferred: bool,
    ) -> Self {
        let new_item_id = new_item_id.into();
        let existing_item_id = existing_item_id.into();
        let winner_id = if new_item_preferred {
            new_item_id.clone()
        } else {
            existing_item_id.clone()
        };

        Self {
            kind,
            new_item_id,
            existing_item_id,
            winner_id,
            decided_at: Utc::now(),
        }
    }

    pub fn new_item_won(&self) -> bool {
        self.winner_id == self.new_item_id
    }
}

/// Body for `POST api/rating/save`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub item_id: String,
    #[serde(rename = "itemType")]
    pub kind: ItemKind,
    pub personal_score: f64,
    pub category_id: u8,
}

impl NewRating {
    /// Builds a save request, deriving the category from the score
    pub fn from_score(item_id: impl Into<String>, kind: ItemKind, personal_score: f64) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
            personal_score,
            category_id: Partition::for_score(personal_score).category_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rated_item_deserializes_backend_shape() {
        let json = r#"{
            "itemId": "6rqhFgbbKwnb9MLmUQDhG6",
            "itemType": "track",
            "categoryId": 1,
            "personalScore": 8.7,
            "position": 3,
            "isNewRating": false
        }"#;

        let item: RatedItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, "6rqhFgbbKwnb9MLmUQDhG6");
        assert_eq!(item.kind, ItemKind::Track);
        assert_eq!(item.personal_score, Some(8.7));
        assert_eq!(item.category_id, Some(1));
        assert_eq!(item.position, Some(3));
    }

    #[test]
    fn test_rated_item_tolerates_missing_score() {
        let json = r#"{"itemId": "abc", "itemType": "album"}"#;
        let item: RatedItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.personal_score, None);
        assert!(item.to_candidate().is_none());
    }

    #[test]
    fn test_valid_score_rejects_out_of_range() {
        let mut item = RatedItem::new("a", ItemKind::Track, 5.0);
        assert_eq!(item.valid_score(), Some(5.0));

        item.personal_score = Some(10.5);
        assert_eq!(item.valid_score(), None);

        item.personal_score = Some(-0.1);
        assert_eq!(item.valid_score(), None);

        item.personal_score = Some(f64::NAN);
        assert_eq!(item.valid_score(), None);
    }

    #[test]
    fn test_comparison_outcome_winner() {
        let won = ComparisonOutcome::new(ItemKind::Album, "new", "old", true);
        assert_eq!(won.winner_id, "new");
        assert!(won.new_item_won());

        let lost = ComparisonOutcome::new(ItemKind::Album, "new", "old", false);
        assert_eq!(lost.winner_id, "old");
        assert!(!lost.new_item_won());
    }

    #[test]
    fn test_comparison_outcome_is_timestamped() {
        let before = Utc::now();
        let outcome = ComparisonOutcome::new(ItemKind::Track, "new", "old", true);
        let after = Utc::now();

        assert!(before <= outcome.decided_at && outcome.decided_at <= after);
    }

    #[test]
    fn test_new_rating_derives_category() {
        let rating = NewRating::from_score("x", ItemKind::Artist, 7.5);
        assert_eq!(rating.category_id, 1);

        let json = serde_json::to_value(&rating).unwrap();
        assert_eq!(json["itemId"], "x");
        assert_eq!(json["itemType"], "artist");
        assert_eq!(json["personalScore"], 7.5);
        assert_eq!(json["categoryId"], 1);
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(3.333_333), 3.3);
        assert_eq!(round_to_tenth(6.666_666), 6.7);
        assert_eq!(round_to_tenth(10.0), 10.0);
    }
}
