use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

/// Inclusive score range, in points on the 0-10 scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBand {
    pub min: f64,
    pub max: f64,
}

impl ScoreBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }

    /// Midpoint rounded half-up to one decimal.
    ///
    /// Computed in tenths so the result does not depend on how the bounds
    /// happen to be represented in binary.
    pub fn midpoint(&self) -> f64 {
        let min_tenths = (self.min * 10.0).round() as i64;
        let max_tenths = (self.max * 10.0).round() as i64;
        ((min_tenths + max_tenths + 1) / 2) as f64 / 10.0
    }
}

const LOVED_BAND: ScoreBand = ScoreBand {
    min: 6.8,
    max: 10.0,
};
const LIKED_BAND: ScoreBand = ScoreBand { min: 3.4, max: 6.7 };
const DISLIKED_BAND: ScoreBand = ScoreBand { min: 0.0, max: 3.3 };

/// Score band a user places an item in before comparing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Loved,
    Liked,
    Disliked,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Loved, Partition::Liked, Partition::Disliked];

    pub fn band(&self) -> ScoreBand {
        match self {
            Partition::Loved => LOVED_BAND,
            Partition::Liked => LIKED_BAND,
            Partition::Disliked => DISLIKED_BAND,
        }
    }

    /// Rating category id used by the backend
    pub fn category_id(&self) -> u8 {
        match self {
            Partition::Loved => 1,
            Partition::Liked => 2,
            Partition::Disliked => 3,
        }
    }

    /// Category a final score belongs to, using band lower bounds as thresholds
    pub fn for_score(score: f64) -> Self {
        Self::ALL
            .into_iter()
            .find(|p| score >= p.band().min)
            .unwrap_or(Partition::Disliked)
    }

    /// Score assigned when there is nothing in the band to compare against.
    ///
    /// The first loved item is assumed to be the best one; other bands start
    /// in the middle.
    pub fn immediate_score(&self) -> f64 {
        match self {
            Partition::Loved => self.band().max,
            _ => self.band().midpoint(),
        }
    }

    /// Score assigned when the store could not be read
    pub fn fallback_score(&self) -> f64 {
        self.band().midpoint()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Loved => "loved",
            Partition::Liked => "liked",
            Partition::Disliked => "disliked",
        }
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loved" => Ok(Partition::Loved),
            "liked" => Ok(Partition::Liked),
            "disliked" => Ok(Partition::Disliked),
            other => Err(format!("unknown partition '{}'", other)),
        }
    }
}
