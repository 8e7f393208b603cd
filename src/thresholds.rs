//! Five-level performance classification for QA and production scores.
//!
//! Each metric has its own band table. Bands are checked from the top
//! (`Great`) down and the first band whose lower bound admits the score
//! wins, so the bands are contiguous and anything below the `Low` band is
//! `Critical`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    #[serde(rename = "QA")]
    Qa,
    Production,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Qa => "QA",
            MetricType::Production => "Production",
        }
    }

    pub fn bands(&self) -> &'static [LevelBand] {
        match self {
            MetricType::Qa => &QA_BANDS,
            MetricType::Production => &PRODUCTION_BANDS,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qa" => Ok(MetricType::Qa),
            "production" | "prod" => Ok(MetricType::Production),
            _ => Err(ParseError::MetricType(s.to_string())),
        }
    }
}

/// Ordered worst to best, so `Ord` follows performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PerformanceLevel {
    Critical,
    Low,
    Normal,
    Good,
    Great,
}

impl PerformanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceLevel::Critical => "Critical",
            PerformanceLevel::Low => "Low",
            PerformanceLevel::Normal => "Normal",
            PerformanceLevel::Good => "Good",
            PerformanceLevel::Great => "Great",
        }
    }

    pub fn is_underperforming(&self) -> bool {
        matches!(self, PerformanceLevel::Low | PerformanceLevel::Critical)
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(PerformanceLevel::Critical),
            "low" => Ok(PerformanceLevel::Low),
            "normal" => Ok(PerformanceLevel::Normal),
            "good" => Ok(PerformanceLevel::Good),
            "great" => Ok(PerformanceLevel::Great),
            _ => Err(ParseError::PerformanceLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for PerformanceLevel {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PerformanceLevel> for String {
    fn from(value: PerformanceLevel) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySeverity {
    Success,
    Info,
    Warning,
    Danger,
}

/// Lower edge of a level band. `Critical` has no lower edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LowerBound {
    Inclusive(f64),
    Exclusive(f64),
    Unbounded,
}

impl LowerBound {
    fn admits(&self, score: f64) -> bool {
        match *self {
            LowerBound::Inclusive(edge) => score >= edge,
            LowerBound::Exclusive(edge) => score > edge,
            LowerBound::Unbounded => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelBand {
    pub level: PerformanceLevel,
    #[serde(skip)]
    pub lower: LowerBound,
    pub severity: DisplaySeverity,
    pub description: &'static str,
}

/// Checked top-down.
pub static QA_BANDS: [LevelBand; 5] = [
    LevelBand {
        level: PerformanceLevel::Great,
        lower: LowerBound::Inclusive(100.0),
        severity: DisplaySeverity::Success,
        description: "QA >= 100%",
    },
    LevelBand {
        level: PerformanceLevel::Good,
        lower: LowerBound::Inclusive(99.0),
        severity: DisplaySeverity::Success,
        description: "QA >= 99% and < 100%",
    },
    LevelBand {
        level: PerformanceLevel::Normal,
        lower: LowerBound::Inclusive(98.0),
        severity: DisplaySeverity::Warning,
        description: "QA >= 98% and < 99%",
    },
    LevelBand {
        level: PerformanceLevel::Low,
        lower: LowerBound::Exclusive(97.0),
        severity: DisplaySeverity::Warning,
        description: "QA > 97% and < 98%",
    },
    LevelBand {
        level: PerformanceLevel::Critical,
        lower: LowerBound::Unbounded,
        severity: DisplaySeverity::Danger,
        description: "QA <= 97%",
    },
];

/// Checked top-down.
pub static PRODUCTION_BANDS: [LevelBand; 5] = [
    LevelBand {
        level: PerformanceLevel::Great,
        lower: LowerBound::Exclusive(101.0),
        severity: DisplaySeverity::Success,
        description: "Production > 101%",
    },
    LevelBand {
        level: PerformanceLevel::Good,
        lower: LowerBound::Inclusive(100.0),
        severity: DisplaySeverity::Success,
        description: "Production >= 100% and <= 101%",
    },
    LevelBand {
        level: PerformanceLevel::Normal,
        lower: LowerBound::Inclusive(99.0),
        severity: DisplaySeverity::Warning,
        description: "Production >= 99% and < 100%",
    },
    LevelBand {
        level: PerformanceLevel::Low,
        lower: LowerBound::Exclusive(98.0),
        severity: DisplaySeverity::Warning,
        description: "Production > 98% and < 99%",
    },
    LevelBand {
        level: PerformanceLevel::Critical,
        lower: LowerBound::Unbounded,
        severity: DisplaySeverity::Danger,
        description: "Production <= 98%",
    },
];

/// Band containing `score`. NaN fails every bounded edge and lands in
/// `Critical`.
pub fn level_config(score: f64, metric: MetricType) -> &'static LevelBand {
    let bands = metric.bands();
    bands
        .iter()
        .find(|band| band.lower.admits(score))
        .unwrap_or(&bands[bands.len() - 1])
}

pub fn classify(score: f64, metric: MetricType) -> PerformanceLevel {
    level_config(score, metric).level
}

pub fn is_underperforming(score: f64, metric: MetricType) -> bool {
    classify(score, metric).is_underperforming()
}

pub fn format_score_with_level(score: f64, metric: MetricType) -> String {
    format!("{:.1}% ({})", score, classify(score, metric))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qa_reference_scores() {
        assert_eq!(classify(100.0, MetricType::Qa), PerformanceLevel::Great);
        assert_eq!(classify(99.5, MetricType::Qa), PerformanceLevel::Good);
        assert_eq!(classify(97.5, MetricType::Qa), PerformanceLevel::Low);
        assert_eq!(classify(96.0, MetricType::Qa), PerformanceLevel::Critical);
    }

    #[test]
    fn qa_edges() {
        assert_eq!(classify(97.0, MetricType::Qa), PerformanceLevel::Critical);
        assert_eq!(classify(97.01, MetricType::Qa), PerformanceLevel::Low);
        assert_eq!(classify(98.0, MetricType::Qa), PerformanceLevel::Normal);
        assert_eq!(classify(99.0, MetricType::Qa), PerformanceLevel::Good);
        assert_eq!(classify(99.99, MetricType::Qa), PerformanceLevel::Good);
        assert_eq!(classify(100.0, MetricType::Qa), PerformanceLevel::Great);
    }

    #[test]
    fn production_edges() {
        assert_eq!(classify(98.0, MetricType::Production), PerformanceLevel::Critical);
        assert_eq!(classify(98.5, MetricType::Production), PerformanceLevel::Low);
        assert_eq!(classify(99.0, MetricType::Production), PerformanceLevel::Normal);
        assert_eq!(classify(100.0, MetricType::Production), PerformanceLevel::Good);
        assert_eq!(classify(101.0, MetricType::Production), PerformanceLevel::Good);
        assert_eq!(classify(101.5, MetricType::Production), PerformanceLevel::Great);
    }

    #[test]
    fn zero_and_nan_are_critical() {
        assert_eq!(classify(0.0, MetricType::Qa), PerformanceLevel::Critical);
        assert_eq!(classify(f64::NAN, MetricType::Production), PerformanceLevel::Critical);
    }

    #[test]
    fn underperforming_is_low_or_critical() {
        assert!(is_underperforming(97.5, MetricType::Qa));
        assert!(is_underperforming(50.0, MetricType::Qa));
        assert!(!is_underperforming(98.0, MetricType::Qa));
        assert!(is_underperforming(98.9, MetricType::Production));
        assert!(!is_underperforming(99.0, MetricType::Production));
    }

    #[test]
    fn levels_are_ordered_worst_first() {
        assert!(PerformanceLevel::Critical < PerformanceLevel::Low);
        assert!(PerformanceLevel::Low < PerformanceLevel::Normal);
        assert!(PerformanceLevel::Good < PerformanceLevel::Great);
    }

    #[test]
    fn legacy_flags_parse_case_insensitively() {
        assert_eq!("CRITICAL".parse(), Ok(PerformanceLevel::Critical));
        assert_eq!(" low ".parse(), Ok(PerformanceLevel::Low));
        assert!("N/A".parse::<PerformanceLevel>().is_err());
    }

    #[test]
    fn config_and_formatting() {
        let band = level_config(97.5, MetricType::Qa);
        assert_eq!(band.severity, DisplaySeverity::Warning);
        assert_eq!(format_score_with_level(97.5, MetricType::Qa), "97.5% (Low)");
        assert_eq!(
            format_score_with_level(101.26, MetricType::Production),
            "101.3% (Great)"
        );
    }
}
