use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::thresholds::{self, MetricType, PerformanceLevel};

/// One agent's metrics for one calendar week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub agent_email: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    pub client: String,
    pub category: String,
    pub task: String,
    pub kpi_qa: f64,
    #[serde(default)]
    pub flag_qa: Option<PerformanceLevel>,
    pub kpi_avg_prod: f64,
    #[serde(default)]
    pub flag_prod: Option<PerformanceLevel>,
    pub week_range: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub month_num: u32,
    pub year_num: i32,
}

impl PerformanceRecord {
    /// Level for the given metric. The stored flag wins; when it is missing
    /// the raw score is classified.
    pub fn level(&self, metric: MetricType) -> PerformanceLevel {
        let (flag, score) = match metric {
            MetricType::Qa => (self.flag_qa, self.kpi_qa),
            MetricType::Production => (self.flag_prod, self.kpi_avg_prod),
        };
        flag.unwrap_or_else(|| thresholds::classify(score, metric))
    }

    pub fn is_underperforming(&self, metric: MetricType) -> bool {
        self.level(metric).is_underperforming()
    }

    /// Name shown in reports, falling back to the local part of the email.
    pub fn display_name(&self) -> String {
        match self.agent_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => email_local_part(&self.agent_email).to_string(),
        }
    }
}

pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Warning levels in the disciplinary ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningType {
    #[serde(rename = "Verbal Warning")]
    Verbal,
    #[serde(rename = "Written Warning")]
    Written,
    #[serde(rename = "Final Warning")]
    Final,
    #[serde(rename = "PIP")]
    Pip,
    #[serde(rename = "Termination")]
    Termination,
}

impl WarningType {
    pub const ALL: [WarningType; 5] = [
        WarningType::Verbal,
        WarningType::Written,
        WarningType::Final,
        WarningType::Pip,
        WarningType::Termination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WarningType::Verbal => "Verbal Warning",
            WarningType::Written => "Written Warning",
            WarningType::Final => "Final Warning",
            WarningType::Pip => "PIP",
            WarningType::Termination => "Termination",
        }
    }
}

impl fmt::Display for WarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarningType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbal" | "verbal warning" => Ok(WarningType::Verbal),
            "written" | "written warning" => Ok(WarningType::Written),
            "final" | "final warning" => Ok(WarningType::Final),
            "pip" => Ok(WarningType::Pip),
            "termination" => Ok(WarningType::Termination),
            _ => Err(ParseError::WarningType(s.to_string())),
        }
    }
}

/// What kind of event an action-log entry records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Warning(WarningType),
    Coaching,
    Other(String),
}

impl ActionType {
    /// Maps a stored action label onto the closed enumeration. Legacy rows
    /// prefix leader warnings with "Leadership"; the prefix is dropped here
    /// and the scope is carried by [`SubjectRole`] instead.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let unscoped = lowered
            .strip_prefix("leadership")
            .map(str::trim_start)
            .unwrap_or(&lowered);

        if let Ok(warning) = unscoped.parse::<WarningType>() {
            return ActionType::Warning(warning);
        }
        if unscoped.contains("coaching") {
            return ActionType::Coaching;
        }
        ActionType::Other(trimmed.to_string())
    }

    pub fn warning(&self) -> Option<WarningType> {
        match self {
            ActionType::Warning(warning) => Some(*warning),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ActionType::Warning(warning) => warning.as_str(),
            ActionType::Coaching => "Coaching",
            ActionType::Other(label) => label,
        }
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        ActionType::from_label(&value)
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category a warning was issued under. Counts are always scoped to one
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WarningCategory {
    SubstandardQa,
    SubstandardProduction,
    LeadershipBehavior,
    Other,
}

impl WarningCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCategory::SubstandardQa => "Substandard Work - QA",
            WarningCategory::SubstandardProduction => "Substandard Work - Production",
            WarningCategory::LeadershipBehavior => "Leadership Behavior",
            WarningCategory::Other => "Other",
        }
    }

    /// Metric whose weekly results feed risk for this category. Anything
    /// other than QA is measured on production.
    pub fn metric(&self) -> MetricType {
        match self {
            WarningCategory::SubstandardQa => MetricType::Qa,
            _ => MetricType::Production,
        }
    }

    /// Lenient mapping used when reading stored rows: unknown labels land in
    /// `Other` so they never count toward QA or production warnings.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_else(|_| {
            if label.to_ascii_lowercase().contains("leadership") {
                WarningCategory::LeadershipBehavior
            } else {
                tracing::debug!(label, "unrecognized warning category, treating as Other");
                WarningCategory::Other
            }
        })
    }
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarningCategory {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substandard work - qa" | "qa" => Ok(WarningCategory::SubstandardQa),
            "substandard work - production" | "production" => {
                Ok(WarningCategory::SubstandardProduction)
            }
            "leadership behavior" | "leadership" => Ok(WarningCategory::LeadershipBehavior),
            "other" => Ok(WarningCategory::Other),
            _ => Err(ParseError::WarningCategory(s.to_string())),
        }
    }
}

impl From<String> for WarningCategory {
    fn from(value: String) -> Self {
        WarningCategory::from_label(&value)
    }
}

impl From<WarningCategory> for String {
    fn from(value: WarningCategory) -> Self {
        value.as_str().to_string()
    }
}

/// Whose record an action-log entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectRole {
    #[default]
    Agent,
    Leader,
}

impl SubjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectRole::Agent => "agent",
            SubjectRole::Leader => "leader",
        }
    }
}

impl FromStr for SubjectRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(SubjectRole::Agent),
            "leader" | "leadership" => Ok(SubjectRole::Leader),
            _ => Err(ParseError::SubjectRole(s.to_string())),
        }
    }
}

/// One recorded disciplinary or coaching event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: i64,
    pub agent_email: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub warning_category: Option<WarningCategory>,
    #[serde(default)]
    pub subject_role: SubjectRole,
    pub action_date: NaiveDate,
    #[serde(default)]
    pub week_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub week_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_active: Option<bool>,
    pub client: String,
    pub category: String,
    #[serde(default)]
    pub taken_by: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ActionLogEntry {
    pub fn warning_type(&self) -> Option<WarningType> {
        self.action_type.warning()
    }

    pub fn is_coaching(&self) -> bool {
        self.action_type == ActionType::Coaching
    }
}
