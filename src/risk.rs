use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::{PerformanceRecord, WarningCategory};
use crate::thresholds::MetricType;
use crate::warnings::{WarningLedger, WarningStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AtRiskStatus {
    pub is_at_risk: bool,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub consecutive_underperforming_weeks: usize,
    pub total_underperforming_weeks: usize,
    pub has_multiple_written_warnings: bool,
    pub requires_immediate_action: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AtRiskAgent {
    pub agent_email: String,
    pub agent_name: String,
    pub client: String,
    pub category: String,
    pub status: AtRiskStatus,
}

/// One agent's records, in input order.
#[derive(Debug, Clone)]
pub struct AgentRecords<'a> {
    pub agent_email: &'a str,
    pub records: Vec<&'a PerformanceRecord>,
}

impl AgentRecords<'_> {
    pub fn first(&self) -> &PerformanceRecord {
        self.records[0]
    }
}

/// Groups records by agent, keeping agents in first-seen order so ties in
/// later stable sorts follow the input. Records without an email are
/// skipped.
pub fn group_by_agent(records: &[PerformanceRecord]) -> Vec<AgentRecords<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<AgentRecords<'_>> = Vec::new();

    for record in records {
        let email = record.agent_email.trim();
        if email.is_empty() {
            tracing::debug!(week = %record.week_range, "skipping performance record without agent email");
            continue;
        }

        match index.get(email) {
            Some(&position) => groups[position].records.push(record),
            None => {
                index.insert(email, groups.len());
                groups.push(AgentRecords {
                    agent_email: email,
                    records: vec![record],
                });
            }
        }
    }

    groups
}

fn as_record<R: Borrow<PerformanceRecord>>(record: &R) -> &PerformanceRecord {
    record.borrow()
}

/// Streak of underperforming weeks counted back from the most recent week.
/// A compliant week ends the streak even if older weeks underperformed.
pub fn consecutive_underperforming_weeks<R>(records: &[R], metric: MetricType) -> usize
where
    R: Borrow<PerformanceRecord>,
{
    let mut sorted: Vec<&PerformanceRecord> = records.iter().map(as_record).collect();
    sorted.sort_by(|a, b| b.start_date.cmp(&a.start_date));

    sorted
        .iter()
        .take_while(|record| record.is_underperforming(metric))
        .count()
}

pub fn total_underperforming_weeks<R>(records: &[R], metric: MetricType) -> usize
where
    R: Borrow<PerformanceRecord>,
{
    records
        .iter()
        .filter(|record| as_record(*record).is_underperforming(metric))
        .count()
}

/// Everything a risk rule may look at for one agent.
#[derive(Debug, Clone)]
pub struct RiskInputs {
    pub consecutive_weeks: usize,
    pub total_weeks: usize,
    pub warnings: WarningStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskFinding {
    pub severity: RiskLevel,
    pub reason: String,
    pub requires_immediate_action: bool,
}

impl RiskFinding {
    fn new(severity: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            severity,
            reason: reason.into(),
            requires_immediate_action: false,
        }
    }
}

type RiskRule = fn(&RiskInputs) -> Option<RiskFinding>;

/// Independent rules; every one that fires contributes its reason, in this
/// order.
const RISK_RULES: [RiskRule; 5] = [
    rule_consecutive_weeks,
    rule_total_weeks,
    rule_multiple_written_warnings,
    rule_single_written_warning,
    rule_verbal_warnings_with_underperformance,
];

fn rule_consecutive_weeks(inputs: &RiskInputs) -> Option<RiskFinding> {
    (inputs.consecutive_weeks >= 3).then(|| {
        RiskFinding::new(
            RiskLevel::High,
            format!("{} consecutive underperforming weeks", inputs.consecutive_weeks),
        )
    })
}

fn rule_total_weeks(inputs: &RiskInputs) -> Option<RiskFinding> {
    (inputs.total_weeks >= 3).then(|| {
        RiskFinding::new(
            RiskLevel::Medium,
            format!("{} total underperforming weeks this month", inputs.total_weeks),
        )
    })
}

fn rule_multiple_written_warnings(inputs: &RiskInputs) -> Option<RiskFinding> {
    let written = inputs.warnings.written_warnings;
    (written >= 2).then(|| RiskFinding {
        severity: RiskLevel::Critical,
        reason: format!("{written} active Written Warnings (one more strike = termination)"),
        requires_immediate_action: true,
    })
}

fn rule_single_written_warning(inputs: &RiskInputs) -> Option<RiskFinding> {
    (inputs.warnings.written_warnings == 1)
        .then(|| RiskFinding::new(RiskLevel::Medium, "1 active Written Warning"))
}

fn rule_verbal_warnings_with_underperformance(inputs: &RiskInputs) -> Option<RiskFinding> {
    let ongoing = inputs.consecutive_weeks >= 2 || inputs.total_weeks >= 2;
    (inputs.warnings.verbal_warnings >= 2 && ongoing).then(|| {
        RiskFinding::new(
            RiskLevel::Medium,
            "Multiple Verbal Warnings with ongoing underperformance",
        )
    })
}

/// Runs every rule and folds the findings. The level is the highest
/// severity that fired and never drops once raised.
pub fn assess(inputs: &RiskInputs) -> AtRiskStatus {
    let findings: Vec<RiskFinding> = RISK_RULES.iter().filter_map(|rule| rule(inputs)).collect();

    let risk_level = findings
        .iter()
        .map(|finding| finding.severity)
        .max()
        .unwrap_or(RiskLevel::Low);

    AtRiskStatus {
        is_at_risk: !findings.is_empty(),
        risk_level,
        requires_immediate_action: findings.iter().any(|f| f.requires_immediate_action),
        reasons: findings.into_iter().map(|finding| finding.reason).collect(),
        consecutive_underperforming_weeks: inputs.consecutive_weeks,
        total_underperforming_weeks: inputs.total_weeks,
        has_multiple_written_warnings: inputs.warnings.written_warnings >= 2,
    }
}

/// At-risk verdict for one agent from their records in the evaluation
/// window and their warning history in `category`.
pub fn determine_at_risk_status<R>(
    agent_email: &str,
    records: &[R],
    category: WarningCategory,
    ledger: &WarningLedger<'_>,
) -> AtRiskStatus
where
    R: Borrow<PerformanceRecord>,
{
    let metric = category.metric();
    let inputs = RiskInputs {
        consecutive_weeks: consecutive_underperforming_weeks(records, metric),
        total_weeks: total_underperforming_weeks(records, metric),
        warnings: ledger.warning_status(agent_email, category),
    };
    assess(&inputs)
}

/// At-risk agents, most severe first. Agents with equal severity keep the
/// order in which they first appear in `records`.
pub fn rank_at_risk_agents(
    records: &[PerformanceRecord],
    category: WarningCategory,
    ledger: &WarningLedger<'_>,
) -> Vec<AtRiskAgent> {
    let mut agents: Vec<AtRiskAgent> = group_by_agent(records)
        .into_iter()
        .filter_map(|group| {
            let status = determine_at_risk_status(
                group.agent_email,
                group.records.as_slice(),
                category,
                ledger,
            );
            if !status.is_at_risk {
                return None;
            }
            let first = group.first();
            Some(AtRiskAgent {
                agent_email: group.agent_email.to_string(),
                agent_name: first.display_name(),
                client: first.client.clone(),
                category: first.category.clone(),
                status,
            })
        })
        .collect();

    agents.sort_by_key(|agent| Reverse(agent.status.risk_level));
    tracing::debug!(count = agents.len(), %category, "ranked at-risk agents");
    agents
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentMonthlyResults {
    pub compliant_weeks: usize,
    pub total_weeks: usize,
    pub action_count: usize,
}

/// Week-level summary across both metrics. A week is compliant only when no
/// record in it underperforms on QA or production.
pub fn agent_monthly_results<R>(
    agent_email: &str,
    records: &[R],
    ledger: &WarningLedger<'_>,
) -> AgentMonthlyResults
where
    R: Borrow<PerformanceRecord>,
{
    let mut weeks: BTreeMap<&str, bool> = BTreeMap::new();
    for record in records.iter().map(as_record) {
        let underperforming = record.is_underperforming(MetricType::Qa)
            || record.is_underperforming(MetricType::Production);
        let compliant = weeks.entry(record.week_range.as_str()).or_insert(true);
        *compliant &= !underperforming;
    }

    AgentMonthlyResults {
        compliant_weeks: weeks.values().filter(|compliant| **compliant).count(),
        total_weeks: weeks.len(),
        action_count: ledger.action_count(agent_email),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::calendar::format_week_range;
    use crate::models::WarningType;
    use crate::thresholds::PerformanceLevel;
    use crate::warnings::tests::{as_of, date, warning};
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    const QA: WarningCategory = WarningCategory::SubstandardQa;

    /// A QA-flagged week starting `weeks_ago` Sundays before 2025-10-26.
    pub(crate) fn sample_week(agent: &str, weeks_ago: i64, qa: PerformanceLevel) -> PerformanceRecord {
        let start: NaiveDate = date(2025, 10, 26) - Duration::weeks(weeks_ago);
        let end = start + Duration::days(6);
        PerformanceRecord {
            agent_email: agent.to_string(),
            agent_name: Some(format!("Agent {agent}")),
            client: "Acme".to_string(),
            category: "Billing".to_string(),
            task: "Claims".to_string(),
            kpi_qa: 0.0,
            flag_qa: Some(qa),
            kpi_avg_prod: 100.0,
            flag_prod: Some(PerformanceLevel::Good),
            week_range: format_week_range(start, end),
            start_date: start,
            end_date: end,
            month_num: 10,
            year_num: 2025,
        }
    }

    #[test]
    fn intervening_compliant_week_breaks_streak() {
        use PerformanceLevel::*;
        let records = vec![
            sample_week("a@x.com", 2, Critical),
            sample_week("a@x.com", 0, Critical),
            sample_week("a@x.com", 1, Normal),
        ];
        assert_eq!(consecutive_underperforming_weeks(&records, MetricType::Qa), 1);
        assert_eq!(total_underperforming_weeks(&records, MetricType::Qa), 2);
    }

    #[test]
    fn contiguous_underperformance_counts_every_week() {
        use PerformanceLevel::*;
        let records = vec![
            sample_week("a@x.com", 1, Low),
            sample_week("a@x.com", 0, Critical),
            sample_week("a@x.com", 2, Low),
        ];
        let consecutive = consecutive_underperforming_weeks(&records, MetricType::Qa);
        let total = total_underperforming_weeks(&records, MetricType::Qa);
        assert_eq!(consecutive, 3);
        assert_eq!(consecutive, total);
    }

    #[test]
    fn streak_is_zero_when_latest_week_is_compliant() {
        use PerformanceLevel::*;
        let records = vec![
            sample_week("a@x.com", 0, Great),
            sample_week("a@x.com", 1, Critical),
        ];
        assert_eq!(consecutive_underperforming_weeks(&records, MetricType::Qa), 0);
        assert_eq!(total_underperforming_weeks(&records, MetricType::Qa), 1);
    }

    #[test]
    fn missing_flag_falls_back_to_score() {
        let mut record = sample_week("a@x.com", 0, PerformanceLevel::Great);
        record.flag_qa = None;
        record.kpi_qa = 96.0;
        assert_eq!(consecutive_underperforming_weeks(&[record], MetricType::Qa), 1);
    }

    #[test]
    fn three_consecutive_critical_weeks_is_high_risk() {
        use PerformanceLevel::*;
        let records: Vec<PerformanceRecord> = (0..3)
            .map(|weeks_ago| sample_week("a@x.com", weeks_ago, Critical))
            .collect();
        let ledger = WarningLedger::new(&[], as_of());

        let status = determine_at_risk_status("a@x.com", &records, QA, &ledger);
        assert!(status.is_at_risk);
        assert_eq!(status.risk_level, RiskLevel::High);
        assert_eq!(
            status.reasons,
            vec![
                "3 consecutive underperforming weeks".to_string(),
                "3 total underperforming weeks this month".to_string(),
            ]
        );
        assert!(!status.requires_immediate_action);
    }

    #[test]
    fn two_written_warnings_are_critical_even_when_compliant() {
        let records = vec![sample_week("a@x.com", 0, PerformanceLevel::Great)];
        let actions = vec![
            warning(1, "a@x.com", WarningType::Written, QA, 60),
            warning(2, "a@x.com", WarningType::Written, QA, 10),
        ];
        let ledger = WarningLedger::new(&actions, as_of());

        let status = determine_at_risk_status("a@x.com", &records, QA, &ledger);
        assert_eq!(status.risk_level, RiskLevel::Critical);
        assert!(status.requires_immediate_action);
        assert!(status.has_multiple_written_warnings);
        assert_eq!(
            status.reasons,
            vec!["2 active Written Warnings (one more strike = termination)".to_string()]
        );
    }

    #[test]
    fn lower_severity_rule_never_downgrades() {
        use PerformanceLevel::*;
        let records: Vec<PerformanceRecord> = (0..3)
            .map(|weeks_ago| sample_week("a@x.com", weeks_ago, Low))
            .collect();
        let actions = vec![warning(1, "a@x.com", WarningType::Written, QA, 10)];
        let ledger = WarningLedger::new(&actions, as_of());

        let status = determine_at_risk_status("a@x.com", &records, QA, &ledger);
        assert_eq!(status.risk_level, RiskLevel::High);
        assert_eq!(status.reasons.last().map(String::as_str), Some("1 active Written Warning"));
    }

    #[test]
    fn single_written_warning_is_medium() {
        let actions = vec![warning(1, "a@x.com", WarningType::Written, QA, 10)];
        let ledger = WarningLedger::new(&actions, as_of());
        let records: [PerformanceRecord; 0] = [];

        let status = determine_at_risk_status("a@x.com", &records, QA, &ledger);
        assert!(status.is_at_risk);
        assert_eq!(status.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn verbal_warnings_need_ongoing_underperformance() {
        use PerformanceLevel::*;
        let actions = vec![
            warning(1, "a@x.com", WarningType::Verbal, QA, 40),
            warning(2, "a@x.com", WarningType::Verbal, QA, 10),
        ];
        let ledger = WarningLedger::new(&actions, as_of());

        let one_bad = vec![sample_week("a@x.com", 0, Low), sample_week("a@x.com", 1, Good)];
        let status = determine_at_risk_status("a@x.com", &one_bad, QA, &ledger);
        assert!(!status.is_at_risk);
        assert_eq!(status.risk_level, RiskLevel::Low);

        let two_bad = vec![sample_week("a@x.com", 0, Low), sample_week("a@x.com", 2, Low)];
        let status = determine_at_risk_status("a@x.com", &two_bad, QA, &ledger);
        assert!(status.is_at_risk);
        assert_eq!(status.risk_level, RiskLevel::Medium);
        assert_eq!(
            status.reasons,
            vec!["Multiple Verbal Warnings with ongoing underperformance".to_string()]
        );
    }

    #[test]
    fn ranking_puts_critical_first_and_keeps_input_order_on_ties() {
        use PerformanceLevel::*;
        let mut records = Vec::new();
        for agent in ["high1@x.com", "ok@x.com", "crit@x.com", "high2@x.com"] {
            for weeks_ago in 0..3 {
                let level = if agent == "ok@x.com" { Great } else { Critical };
                records.push(sample_week(agent, weeks_ago, level));
            }
        }
        let actions = vec![
            warning(1, "crit@x.com", WarningType::Written, QA, 60),
            warning(2, "crit@x.com", WarningType::Written, QA, 10),
        ];
        let ledger = WarningLedger::new(&actions, as_of());

        let ranked = rank_at_risk_agents(&records, QA, &ledger);
        let emails: Vec<&str> = ranked.iter().map(|a| a.agent_email.as_str()).collect();
        assert_eq!(emails, vec!["crit@x.com", "high1@x.com", "high2@x.com"]);
        assert_eq!(ranked[0].agent_name, "Agent crit@x.com");
    }

    #[test]
    fn records_without_email_are_skipped() {
        let mut blank = sample_week("", 0, PerformanceLevel::Critical);
        blank.agent_email = "  ".to_string();
        let records = vec![blank, sample_week("a@x.com", 0, PerformanceLevel::Good)];
        let groups = group_by_agent(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].agent_email, "a@x.com");
    }

    #[test]
    fn monthly_results_count_weeks_across_metrics() {
        use PerformanceLevel::*;
        let mut prod_miss = sample_week("a@x.com", 1, Great);
        prod_miss.flag_prod = Some(Critical);
        let mut second_task = sample_week("a@x.com", 0, Good);
        second_task.task = "Appeals".to_string();
        let records = vec![
            sample_week("a@x.com", 0, Good),
            second_task,
            prod_miss,
            sample_week("a@x.com", 2, Normal),
        ];
        let actions = vec![warning(1, "a@x.com", WarningType::Verbal, QA, 10)];
        let ledger = WarningLedger::new(&actions, as_of());

        let results = agent_monthly_results("a@x.com", &records, &ledger);
        assert_eq!(
            results,
            AgentMonthlyResults {
                compliant_weeks: 2,
                total_weeks: 3,
                action_count: 1,
            }
        );
    }
}
