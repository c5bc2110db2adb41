use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

mod partition;
mod rating;

pub use partition::{Partition, ScoreBand, MAX_SCORE, MIN_SCORE};
pub use rating::{round_to_tenth, ComparisonOutcome, NewRating, RankedCandidate, RatedItem};

/// Kind of catalog item a rating is attached to
///
/// Serialized lowercase; accepted in any case since the backend stores the
/// type as a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ItemKind {
    Track,
    Album,
    Artist,
}

impl ItemKind {
    /// Path segment used by the rating backend
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Track => "track",
            ItemKind::Album => "album",
            ItemKind::Artist => "artist",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "track" => Ok(ItemKind::Track),
            "album" => Ok(ItemKind::Album),
            "artist" => Ok(ItemKind::Artist),
            other => Err(format!("unknown item kind '{}'", other)),
        }
    }
}

impl TryFrom<String> for ItemKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The item currently being rated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub kind: ItemKind,
}

impl ItemRef {
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

impl Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_serde_lowercase() {
        let json = serde_json::to_string(&ItemKind::Album).unwrap();
        assert_eq!(json, "\"album\"");

        let kind: ItemKind = serde_json::from_str("\"artist\"").unwrap();
        assert_eq!(kind, ItemKind::Artist);
    }

    #[test]
    fn test_item_kind_deserializes_any_case() {
        let kind: ItemKind = serde_json::from_str("\"Album\"").unwrap();
        assert_eq!(kind, ItemKind::Album);
        assert!(serde_json::from_str::<ItemKind>("\"playlist\"").is_err());
    }

    #[test]
    fn test_item_kind_from_str_is_case_insensitive() {
        assert_eq!("Track".parse::<ItemKind>().unwrap(), ItemKind::Track);
        assert!("playlist".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_item_ref_display() {
        let item = ItemRef::new("4uLU6hMCjMI75M1A2tKUQC", ItemKind::Track);
        assert_eq!(item.to_string(), "track:4uLU6hMCjMI75M1A2tKUQC");
    }
}
