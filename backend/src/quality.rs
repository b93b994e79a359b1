//! Mapping from a continuous quality score to the labels shown to users.
//!
//! These rules are a business heuristic, not a statistical estimate. They are
//! reproduced as-is, including the confidence quirk described on
//! [`Confidence::from_score`].

use serde::Serialize;

/// Training labels of the wine quality dataset.
const TRAINING_LABELS: [f64; 6] = [3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

/// Magnitude from which an f64 has no fractional digits left to round.
const NO_FRACTION: f64 = 1e15;

/// Round a raw model output to one decimal place.
///
/// Rounds the exact binary value with ties to even, so 4.05 (stored just
/// below 4.05) becomes 4.0. Scaling by ten first would round twice and land
/// on the other side of a category boundary.
pub fn round_score(raw: f64) -> f64 {
    if !raw.is_finite() || raw.abs() >= NO_FRACTION {
        return raw;
    }
    format!("{:.1}", raw).parse().unwrap_or(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Poor,
    Fair,
    Good,
    #[serde(rename = "Very Good")]
    VeryGood,
    Excellent,
}

impl Category {
    /// Bands are closed above: 4.0 is Poor, 4.1 is Fair. Anything that is not
    /// at most 7 (NaN included) falls through to Excellent.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s <= 4.0 => Category::Poor,
            s if s <= 5.0 => Category::Fair,
            s if s <= 6.0 => Category::Good,
            s if s <= 7.0 => Category::VeryGood,
            _ => Category::Excellent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Poor => "Poor",
            Category::Fair => "Fair",
            Category::Good => "Good",
            Category::VeryGood => "Very Good",
            Category::Excellent => "Excellent",
        }
    }

    pub fn interpretation(&self) -> &'static str {
        match self {
            Category::Poor => "Poor Quality Wine - Not recommended",
            Category::Fair => "Fair Quality Wine - Below average",
            Category::Good => "Good Quality Wine - Average quality",
            Category::VeryGood => "Very Good Quality Wine - Above average",
            Category::Excellent => "Excellent Quality Wine - Premium quality",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
}

impl Confidence {
    /// High only when the rounded score lands exactly on a training label.
    /// Distance to the nearest label is not considered, so 6.5 is Medium and
    /// so is 9.0.
    pub fn from_score(score: f64) -> Self {
        if TRAINING_LABELS.contains(&score) {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an already rounded score.
pub fn classify(score: f64) -> (Category, Confidence) {
    (Category::from_score(score), Confidence::from_score(score))
}
