//! Maps a `MetricSnapshot` through a rubric into category scores, a weighted
//! composite on a 0-100 scale, and a letter grade.
//!
//! Scoring is a pure function of `(snapshot, rubric)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::error::{EngineError, Result};
use super::metrics::MetricSnapshot;

/// The snapshot scalar a category is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    CumulativeLayoutShift,
    InteractionP98,
    LargestPaint,
    TotalBlockingTime,
    MutationRate,
    ContrastFailures,
    ConsoleErrors,
    UnderExposedElements,
}

impl MetricKey {
    pub fn extract(&self, snapshot: &MetricSnapshot) -> Option<f64> {
        match self {
            MetricKey::CumulativeLayoutShift => snapshot.cls(),
            MetricKey::InteractionP98 => snapshot.inp(),
            MetricKey::LargestPaint => snapshot.paint.value().map(|p| p.render_time_ms),
            MetricKey::TotalBlockingTime => snapshot.frames.value().map(|f| f.total_blocking_time_ms),
            MetricKey::MutationRate => snapshot.churn.value().map(|c| c.rate_per_second),
            MetricKey::ContrastFailures => snapshot.contrast.value().map(|c| c.aa_failures as f64),
            MetricKey::ConsoleErrors => snapshot.console.value().map(|c| c.errors as f64),
            MetricKey::UnderExposedElements => snapshot
                .visibility
                .value()
                .map(|v| (v.never_seen.len() + v.under_threshold.len()) as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// A band matches when `value < threshold`.
    LowerIsBetter,
    /// A band matches when `value >= threshold`.
    HigherIsBetter,
}

/// `threshold: None` matches any value and belongs last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub threshold: Option<f64>,
    pub score: f64,
    pub label: String,
}

impl Band {
    pub fn below(threshold: f64, score: f64, label: &str) -> Self {
        Self {
            threshold: Some(threshold),
            score,
            label: label.to_string(),
        }
    }

    pub fn otherwise(score: f64, label: &str) -> Self {
        Self {
            threshold: None,
            score,
            label: label.to_string(),
        }
    }

    fn matches(&self, value: f64, direction: Direction) -> bool {
        match (self.threshold, direction) {
            (None, _) => true,
            (Some(t), Direction::LowerIsBetter) => value < t,
            (Some(t), Direction::HigherIsBetter) => value >= t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub metric: MetricKey,
    pub direction: Direction,
    pub weight: f64,
    /// Evaluated in order; the first match wins.
    pub bands: Vec<Band>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rubric {
    pub categories: Vec<Category>,
    /// Highest score a band can award; the composite is rescaled against it.
    #[serde(default = "default_max_score")]
    pub max_score: f64,
}

fn default_max_score() -> f64 {
    10.0
}

impl Rubric {
    /// Core web-vitals style rubric with 0/5/10 bands.
    pub fn web_vitals() -> Self {
        let three_band = |name: &str, metric: MetricKey, weight: f64, good: f64, poor: f64| Category {
            name: name.to_string(),
            metric,
            direction: Direction::LowerIsBetter,
            weight,
            bands: vec![
                Band::below(good, 10.0, "GOOD"),
                Band::below(poor, 5.0, "NEEDS IMPROVEMENT"),
                Band::otherwise(0.0, "POOR"),
            ],
        };

        Self {
            categories: vec![
                three_band("layout-stability", MetricKey::CumulativeLayoutShift, 3.0, 0.1, 0.25),
                three_band("responsiveness", MetricKey::InteractionP98, 3.0, 200.0, 500.0),
                three_band("loading", MetricKey::LargestPaint, 2.0, 2500.0, 4000.0),
                three_band("main-thread", MetricKey::TotalBlockingTime, 2.0, 200.0, 600.0),
                three_band("dom-churn", MetricKey::MutationRate, 1.0, 5.0, 20.0),
                three_band("contrast", MetricKey::ContrastFailures, 1.0, 1.0, 4.0),
                three_band("console-errors", MetricKey::ConsoleErrors, 1.0, 1.0, 5.0),
            ],
            max_score: default_max_score(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let rubric: Rubric = serde_json::from_str(json)?;
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(EngineError::InvalidRubric("no categories".into()));
        }
        if !(self.max_score.is_finite() && self.max_score > 0.0) {
            return Err(EngineError::InvalidRubric(format!("max score {} must be positive", self.max_score)));
        }
        for category in &self.categories {
            if !(category.weight.is_finite() && category.weight >= 0.0) {
                return Err(EngineError::InvalidRubric(format!(
                    "category {} has weight {}",
                    category.name, category.weight
                )));
            }
            if category.bands.is_empty() {
                return Err(EngineError::InvalidRubric(format!("category {} has no bands", category.name)));
            }
        }
        if self.categories.iter().map(|c| c.weight).sum::<f64>() <= 0.0 {
            return Err(EngineError::InvalidRubric("total weight is zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_composite(composite: f64) -> Self {
        if composite >= 90.0 {
            Grade::A
        } else if composite >= 75.0 {
            Grade::B
        } else if composite >= 50.0 {
            Grade::C
        } else if composite >= 25.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{}", letter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub name: String,
    pub metric: MetricKey,
    pub weight: f64,
    /// `None` when the underlying metric was not measured.
    pub value: Option<f64>,
    pub score: Option<f64>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    pub categories: Vec<CategoryScore>,
    /// 0-100 over the measured categories; `None` if nothing was measured.
    pub composite: Option<f64>,
    pub grade: Option<Grade>,
}

impl ScoreCard {
    pub fn category(&self, name: &str) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.name == name)
    }
}

pub fn score_category(category: &Category, snapshot: &MetricSnapshot) -> CategoryScore {
    let value = category.metric.extract(snapshot).filter(|v| !v.is_nan());
    let band = value.and_then(|v| category.bands.iter().find(|b| b.matches(v, category.direction)));

    CategoryScore {
        name: category.name.clone(),
        metric: category.metric,
        weight: category.weight,
        value,
        // A measured value no band covers scores zero.
        score: value.map(|_| band.map_or(0.0, |b| b.score)),
        label: band.map(|b| b.label.clone()),
    }
}

/// Unmeasured categories drop out of both sums.
pub fn score(snapshot: &MetricSnapshot, rubric: &Rubric) -> ScoreCard {
    let categories: Vec<CategoryScore> = rubric
        .categories
        .iter()
        .map(|c| score_category(c, snapshot))
        .collect();

    let (weighted, total_weight) = categories
        .iter()
        .filter_map(|c| c.score.map(|s| (s * c.weight, c.weight)))
        .fold((0.0, 0.0), |(ws, tw), (s, w)| (ws + s, tw + w));

    let composite = (total_weight > 0.0 && rubric.max_score > 0.0)
        .then(|| (weighted / total_weight / rubric.max_score * 100.0).clamp(0.0, 100.0));

    ScoreCard {
        categories,
        composite,
        grade: composite.map(Grade::from_composite),
    }
}
