//! Warning lifecycle: expiration, active counts and progression checks.
//!
//! Every query recomputes from the action-log snapshot the ledger borrows.
//! Expiration dates are fixed when a warning is issued; the evaluation day
//! only decides whether a stored expiration has passed.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::context::EngineContext;
use crate::models::{ActionLogEntry, SubjectRole, WarningCategory, WarningType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WarningRule {
    pub warning_type: WarningType,
    /// `None` for warnings that never expire.
    pub expiration_days: Option<i64>,
    pub progression_order: u8,
}

pub static WARNING_RULES: [WarningRule; 5] = [
    WarningRule {
        warning_type: WarningType::Verbal,
        expiration_days: Some(90),
        progression_order: 1,
    },
    WarningRule {
        warning_type: WarningType::Written,
        expiration_days: Some(180),
        progression_order: 2,
    },
    WarningRule {
        warning_type: WarningType::Final,
        expiration_days: Some(365),
        progression_order: 3,
    },
    WarningRule {
        warning_type: WarningType::Pip,
        expiration_days: Some(90),
        progression_order: 3,
    },
    WarningRule {
        warning_type: WarningType::Termination,
        expiration_days: None,
        progression_order: 4,
    },
];

impl WarningType {
    pub fn rule(&self) -> &'static WarningRule {
        match self {
            WarningType::Verbal => &WARNING_RULES[0],
            WarningType::Written => &WARNING_RULES[1],
            WarningType::Final => &WARNING_RULES[2],
            WarningType::Pip => &WARNING_RULES[3],
            WarningType::Termination => &WARNING_RULES[4],
        }
    }

    pub fn progression_order(&self) -> u8 {
        self.rule().progression_order
    }
}

/// Expiration for a warning issued on `issue_date`; `None` when permanent.
pub fn compute_expiration(warning_type: WarningType, issue_date: NaiveDate) -> Option<NaiveDate> {
    warning_type
        .rule()
        .expiration_days
        .map(|days| issue_date + Duration::days(days))
}

pub fn is_active(entry: &ActionLogEntry, as_of: NaiveDate) -> bool {
    if entry.is_active == Some(false) {
        return false;
    }
    match entry.expiration_date {
        None => true,
        Some(expiration) => expiration > as_of,
    }
}

/// Negative once the expiration has passed.
pub fn days_until_expiration(expiration: NaiveDate, as_of: NaiveDate) -> i64 {
    (expiration - as_of).num_days()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressionCheck {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressionCheck {
    fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum NextAction {
    PrepareForTermination,
    ConsiderFinalOrPip,
    IssueWrittenWarning,
    IssueSecondVerbal,
    IssueVerbalWarning,
    /// Only final warnings or PIPs are active.
    MonitorPerformance,
}

impl NextAction {
    pub fn label(&self) -> &'static str {
        match self {
            NextAction::PrepareForTermination => "Prepare for Termination",
            NextAction::ConsiderFinalOrPip => "Consider Final Warning or PIP",
            NextAction::IssueWrittenWarning => "Issue Written Warning",
            NextAction::IssueSecondVerbal => "Issue 2nd Verbal Warning + Coaching",
            NextAction::IssueVerbalWarning => "Issue Verbal Warning",
            NextAction::MonitorPerformance => "Monitor Performance",
        }
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<NextAction> for String {
    fn from(value: NextAction) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningStatus {
    pub verbal_warnings: usize,
    pub written_warnings: usize,
    pub final_warnings: usize,
    pub pip_warnings: usize,
    pub total_active_warnings: usize,
    pub highest_warning_level: u8,
    pub next_recommended_action: NextAction,
    pub is_at_risk: bool,
}

/// Read-only view over one action-log snapshot at one evaluation day.
#[derive(Debug, Clone, Copy)]
pub struct WarningLedger<'a> {
    actions: &'a [ActionLogEntry],
    ctx: EngineContext,
}

impl<'a> WarningLedger<'a> {
    pub fn new(actions: &'a [ActionLogEntry], ctx: EngineContext) -> Self {
        Self { actions, ctx }
    }

    pub fn context(&self) -> EngineContext {
        self.ctx
    }

    pub fn actions(&self) -> &'a [ActionLogEntry] {
        self.actions
    }

    /// Active warnings for one agent in one category, optionally narrowed
    /// to a single type. Entries whose action is not a warning never match.
    pub fn active_warnings(
        &self,
        agent_email: &str,
        category: WarningCategory,
        warning_type: Option<WarningType>,
    ) -> Vec<&'a ActionLogEntry> {
        self.actions
            .iter()
            .filter(|entry| entry.agent_email == agent_email)
            .filter(|entry| entry.warning_category == Some(category))
            .filter(|entry| match (entry.warning_type(), warning_type) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(wanted)) => actual == wanted,
            })
            .filter(|entry| is_active(entry, self.ctx.as_of))
            .collect()
    }

    pub fn count_active(
        &self,
        agent_email: &str,
        category: WarningCategory,
        warning_type: Option<WarningType>,
    ) -> usize {
        self.active_warnings(agent_email, category, warning_type).len()
    }

    /// A new warning may repeat the current highest level or climb one step.
    /// The first warning in a category must be verbal.
    pub fn validate_progression(
        &self,
        agent_email: &str,
        new_type: WarningType,
        category: WarningCategory,
    ) -> ProgressionCheck {
        let new_order = new_type.progression_order();
        let highest = self
            .active_warnings(agent_email, category, None)
            .iter()
            .filter_map(|entry| entry.warning_type())
            .map(|warning| warning.progression_order())
            .max();

        match highest {
            None if new_order > 1 => {
                ProgressionCheck::invalid("First warning must be a Verbal Warning")
            }
            None => ProgressionCheck::valid(),
            Some(highest) if new_order > highest + 1 => ProgressionCheck::invalid(format!(
                "Cannot skip warning levels. Current highest: Level {highest}"
            )),
            Some(_) => ProgressionCheck::valid(),
        }
    }

    pub fn warning_status(&self, agent_email: &str, category: WarningCategory) -> WarningStatus {
        let count = |warning| self.count_active(agent_email, category, Some(warning));
        let verbal = count(WarningType::Verbal);
        let written = count(WarningType::Written);
        let final_warnings = count(WarningType::Final);
        let pip = count(WarningType::Pip);
        let total = verbal + written + final_warnings + pip;

        let highest_warning_level = if final_warnings > 0 || pip > 0 {
            3
        } else if written > 0 {
            2
        } else if verbal > 0 {
            1
        } else {
            0
        };

        let next_recommended_action = if written >= 2 {
            NextAction::PrepareForTermination
        } else if written >= 1 {
            NextAction::ConsiderFinalOrPip
        } else if verbal >= 2 {
            NextAction::IssueWrittenWarning
        } else if verbal >= 1 {
            NextAction::IssueSecondVerbal
        } else if total == 0 {
            NextAction::IssueVerbalWarning
        } else {
            NextAction::MonitorPerformance
        };

        WarningStatus {
            verbal_warnings: verbal,
            written_warnings: written,
            final_warnings,
            pip_warnings: pip,
            total_active_warnings: total,
            highest_warning_level,
            next_recommended_action,
            is_at_risk: written >= 1,
        }
    }

    /// Whether any coaching was logged for the agent inside the context's
    /// lookback window. Coaching is not scoped to a category.
    pub fn has_recent_coaching(&self, agent_email: &str) -> bool {
        let cutoff = self.ctx.coaching_cutoff();
        self.actions.iter().any(|entry| {
            entry.agent_email == agent_email && entry.is_coaching() && entry.action_date >= cutoff
        })
    }

    /// Active verbal warnings recorded against a leader in their leader role.
    pub fn leader_verbal_warnings(&self, leader_email: &str) -> usize {
        self.actions
            .iter()
            .filter(|entry| entry.agent_email == leader_email)
            .filter(|entry| entry.subject_role == SubjectRole::Leader)
            .filter(|entry| entry.warning_type() == Some(WarningType::Verbal))
            .filter(|entry| is_active(entry, self.ctx.as_of))
            .count()
    }

    /// Every logged action for the subject, whatever its type or category.
    pub fn action_count(&self, agent_email: &str) -> usize {
        self.actions
            .iter()
            .filter(|entry| entry.agent_email == agent_email)
            .count()
    }

    /// Actions `leader_email` personally logged against `agent_email`.
    /// Entries taken by someone else, or with no recorded author, do not
    /// count toward the leader's follow-up.
    pub fn actions_taken_by(&self, leader_email: &str, agent_email: &str) -> usize {
        self.actions
            .iter()
            .filter(|entry| entry.agent_email == agent_email)
            .filter(|entry| entry.taken_by.as_deref() == Some(leader_email))
            .count()
    }
}
