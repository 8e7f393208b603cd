//! Corrective-action recommendations.
//!
//! Agent and leadership evaluations each walk an ordered list of case
//! rules. The first rule whose predicate holds builds the result, so the
//! list order is the priority order.

use std::fmt;

use serde::Serialize;

use crate::models::{PerformanceRecord, WarningCategory};
use crate::risk::{group_by_agent, total_underperforming_weeks};
use crate::warnings::{WarningLedger, WarningStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseType {
    A,
    B,
    C,
    D,
    E,
    Monitor,
    CoachingOnly,
}

impl CaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseType::A => "A",
            CaseType::B => "B",
            CaseType::C => "C",
            CaseType::D => "D",
            CaseType::E => "E",
            CaseType::Monitor => "MONITOR",
            CaseType::CoachingOnly => "COACHING_ONLY",
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetType {
    Agent,
    Leadership,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationResult {
    pub case_type: CaseType,
    pub action: String,
    pub is_critical: bool,
    pub notes: String,
    pub requires_leadership_action: bool,
    pub target_type: TargetType,
    /// 1 is the most urgent, 5 the least.
    pub priority: u8,
}

struct CaseRule<I> {
    case: CaseType,
    applies: fn(&I) -> bool,
    build: fn(&I) -> RecommendationResult,
}

fn first_match<I>(rules: &[CaseRule<I>], inputs: &I) -> Option<RecommendationResult> {
    let rule = rules.iter().find(|rule| (rule.applies)(inputs))?;
    tracing::trace!(case = %rule.case, "recommendation case matched");
    Some((rule.build)(inputs))
}

/// Facts the agent-level cases look at.
#[derive(Debug, Clone)]
pub struct AgentCaseInputs {
    pub warnings: WarningStatus,
    pub is_underperforming: bool,
    pub has_recent_coaching: bool,
}

fn agent_result(
    case_type: CaseType,
    action: &str,
    is_critical: bool,
    priority: u8,
    notes: &str,
) -> RecommendationResult {
    RecommendationResult {
        case_type,
        action: action.to_string(),
        is_critical,
        notes: notes.to_string(),
        requires_leadership_action: false,
        target_type: TargetType::Agent,
        priority,
    }
}

fn agent_cases() -> [CaseRule<AgentCaseInputs>; 5] {
    [
        CaseRule {
            case: CaseType::C,
            applies: |i| i.warnings.written_warnings >= 2 && i.is_underperforming,
            build: |_| RecommendationResult {
                requires_leadership_action: true,
                ..agent_result(
                    CaseType::C,
                    "Prepare for Employee Termination",
                    true,
                    1,
                    "Agent has 2 active Written Warnings and continues to underperform. \
                     CRITICAL: Begin offboarding preparation. Consult HR immediately.",
                )
            },
        },
        CaseRule {
            case: CaseType::B,
            applies: |i| {
                i.warnings.written_warnings == 0
                    && i.warnings.verbal_warnings >= 2
                    && i.is_underperforming
            },
            build: |_| {
                agent_result(
                    CaseType::B,
                    "Issue Written Warning",
                    true,
                    2,
                    "Agent has 2 active Verbal Warnings and continues to underperform. \
                     CRITICAL: Escalate to Written Warning immediately.",
                )
            },
        },
        CaseRule {
            case: CaseType::A,
            applies: |i| {
                i.warnings.written_warnings == 0
                    && i.warnings.verbal_warnings == 1
                    && i.is_underperforming
            },
            build: |_| {
                agent_result(
                    CaseType::A,
                    "Issue 2nd Verbal Warning + Coaching Session",
                    false,
                    3,
                    "Agent has 1 active Verbal Warning and continues to underperform. \
                     Escalation: 2nd Verbal Warning with mandatory coaching.",
                )
            },
        },
        CaseRule {
            case: CaseType::CoachingOnly,
            applies: |i| {
                i.is_underperforming
                    && i.warnings.total_active_warnings == 0
                    && !i.has_recent_coaching
            },
            build: |_| {
                agent_result(
                    CaseType::CoachingOnly,
                    "Provide Coaching Session",
                    false,
                    4,
                    "Agent is underperforming but has no active warnings. \
                     Start with coaching before issuing warnings.",
                )
            },
        },
        CaseRule {
            case: CaseType::A,
            applies: |i| {
                i.is_underperforming
                    && i.warnings.total_active_warnings == 0
                    && i.has_recent_coaching
            },
            build: |_| {
                agent_result(
                    CaseType::A,
                    "Issue Verbal Warning",
                    false,
                    3,
                    "Agent has received coaching but continues to underperform. \
                     Issue first Verbal Warning.",
                )
            },
        },
    ]
}

fn continue_monitoring() -> RecommendationResult {
    agent_result(
        CaseType::Monitor,
        "Continue Monitoring",
        false,
        5,
        "Agent is performing within acceptable standards. Continue regular monitoring.",
    )
}

pub fn evaluate_agent_cases(inputs: &AgentCaseInputs) -> RecommendationResult {
    first_match(&agent_cases(), inputs).unwrap_or_else(continue_monitoring)
}

/// Recommendation for one agent in one warning category. Any
/// underperforming week in the window counts as currently underperforming.
pub fn generate_agent_recommendation(
    agent_email: &str,
    category: WarningCategory,
    ledger: &WarningLedger<'_>,
    underperforming_weeks: usize,
) -> RecommendationResult {
    let inputs = AgentCaseInputs {
        warnings: ledger.warning_status(agent_email, category),
        is_underperforming: underperforming_weeks > 0,
        has_recent_coaching: ledger.has_recent_coaching(agent_email),
    };
    evaluate_agent_cases(&inputs)
}

/// Facts the leadership cases look at.
#[derive(Debug, Clone)]
pub struct LeadershipInputs<'a> {
    pub leader_email: &'a str,
    pub agent_email: &'a str,
    pub underperforming_weeks: usize,
    pub actions_taken: usize,
    pub leader_verbal_warnings: usize,
}

fn leadership_cases<'a>() -> [CaseRule<LeadershipInputs<'a>>; 2] {
    [
        CaseRule {
            case: CaseType::E,
            applies: |i| i.leader_verbal_warnings >= 1,
            build: |i| RecommendationResult {
                case_type: CaseType::E,
                action: "Issue 2nd Leadership Behavior Report + Written Warning to Leader"
                    .to_string(),
                is_critical: true,
                notes: format!(
                    "Leader {} has failed to follow procedures again within the Verbal Warning \
                     timeframe. Director must provide 2nd Leadership Behavior Report to AVP and \
                     issue Written Warning to leader.",
                    i.leader_email
                ),
                requires_leadership_action: true,
                target_type: TargetType::Leadership,
                priority: 1,
            },
        },
        CaseRule {
            case: CaseType::D,
            applies: |i| i.underperforming_weeks >= 2 && i.actions_taken == 0,
            build: |i| RecommendationResult {
                case_type: CaseType::D,
                action: "Issue Leadership Behavior Report to AVP + Verbal Warning to Leader"
                    .to_string(),
                is_critical: true,
                notes: format!(
                    "Leader {} failed to take action on agent {} who has been underperforming \
                     for {} weeks. Director must provide Leadership Behavior Report to AVP and \
                     issue Verbal Warning to leader.",
                    i.leader_email, i.agent_email, i.underperforming_weeks
                ),
                requires_leadership_action: true,
                target_type: TargetType::Leadership,
                priority: 2,
            },
        },
    ]
}

pub fn evaluate_leadership_cases(inputs: &LeadershipInputs<'_>) -> Option<RecommendationResult> {
    first_match(&leadership_cases(), inputs)
}

/// Leadership accountability for one leader/subordinate pair. A leader
/// already holding an active leader-scoped Verbal Warning escalates to a
/// Written Warning before the first-failure case is considered.
pub fn generate_leadership_recommendation(
    leader_email: &str,
    agent_email: &str,
    underperforming_weeks: usize,
    actions_taken: usize,
    ledger: &WarningLedger<'_>,
) -> Option<RecommendationResult> {
    let inputs = LeadershipInputs {
        leader_email,
        agent_email,
        underperforming_weeks,
        actions_taken,
        leader_verbal_warnings: ledger.leader_verbal_warnings(leader_email),
    };
    evaluate_leadership_cases(&inputs)
}

/// Leadership check for one subordinate, from the subordinate's records in
/// the evaluation window. Only actions the leader logged themselves count
/// as follow-up.
pub fn leadership_recommendation_for_agent(
    leader_email: &str,
    agent_email: &str,
    records: &[PerformanceRecord],
    category: WarningCategory,
    ledger: &WarningLedger<'_>,
) -> Option<RecommendationResult> {
    let agent_records: Vec<&PerformanceRecord> = records
        .iter()
        .filter(|record| record.agent_email == agent_email)
        .collect();
    let underperforming_weeks =
        total_underperforming_weeks(agent_records.as_slice(), category.metric());
    generate_leadership_recommendation(
        leader_email,
        agent_email,
        underperforming_weeks,
        ledger.actions_taken_by(leader_email, agent_email),
        ledger,
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRecommendationWithContext {
    pub agent_email: String,
    pub agent_name: String,
    pub recommendation: RecommendationResult,
    pub underperforming_weeks: usize,
    pub total_weeks: usize,
    pub actions_taken: usize,
}

/// One recommendation per agent in `records`, most urgent first. Agents
/// with equal priority keep their first-seen order.
pub fn generate_all_recommendations(
    records: &[PerformanceRecord],
    ledger: &WarningLedger<'_>,
    category: WarningCategory,
) -> Vec<AgentRecommendationWithContext> {
    let metric = category.metric();

    let mut recommendations: Vec<AgentRecommendationWithContext> = group_by_agent(records)
        .into_iter()
        .map(|group| {
            let underperforming_weeks = total_underperforming_weeks(group.records.as_slice(), metric);
            let recommendation = generate_agent_recommendation(
                group.agent_email,
                category,
                ledger,
                underperforming_weeks,
            );
            AgentRecommendationWithContext {
                agent_email: group.agent_email.to_string(),
                agent_name: group.first().display_name(),
                recommendation,
                underperforming_weeks,
                total_weeks: group.records.len(),
                actions_taken: ledger.action_count(group.agent_email),
            }
        })
        .collect();

    recommendations.sort_by_key(|entry| entry.recommendation.priority);
    recommendations
}
