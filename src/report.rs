use std::fmt::Write;

use qperform_compliance::calendar::{month_name, weeks_for_month};
use qperform_compliance::risk::{agent_monthly_results, group_by_agent};
use qperform_compliance::{
    generate_all_recommendations, rank_at_risk_agents, PerformanceRecord, WarningCategory,
    WarningLedger,
};

pub fn build_report(
    month: u32,
    year: i32,
    category: WarningCategory,
    records: &[PerformanceRecord],
    ledger: &WarningLedger<'_>,
) -> String {
    let at_risk = rank_at_risk_agents(records, category, ledger);
    let recommendations = generate_all_recommendations(records, ledger, category);

    let mut output = String::new();
    let month_label = month_name(month).unwrap_or("Unknown month");

    let _ = writeln!(output, "# Performance Compliance Report");
    let _ = writeln!(
        output,
        "{} {} ({}), evaluated as of {}",
        month_label,
        year,
        category,
        ledger.context().as_of
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Weeks");

    for (index, week) in weeks_for_month(month, year).iter().enumerate() {
        let _ = writeln!(output, "- Week {}: {}", index + 1, week.label());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Compliance");

    let groups = group_by_agent(records);
    if groups.is_empty() {
        let _ = writeln!(output, "No performance records for this month.");
    } else {
        for group in groups.iter() {
            let results = agent_monthly_results(group.agent_email, group.records.as_slice(), ledger);
            let _ = writeln!(
                output,
                "- {} ({}): {}/{} weeks compliant, {} actions logged",
                group.first().display_name(),
                group.agent_email,
                results.compliant_weeks,
                results.total_weeks,
                results.action_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## At-Risk Agents");

    if at_risk.is_empty() {
        let _ = writeln!(output, "No agents at risk of termination.");
    } else {
        for agent in at_risk.iter() {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {}: {}",
                agent.agent_name,
                agent.agent_email,
                agent.client,
                agent.status.risk_level.as_str(),
                agent.status.reasons.join("; ")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommended Actions");

    if recommendations.is_empty() {
        let _ = writeln!(output, "No agents to evaluate.");
    } else {
        for entry in recommendations.iter() {
            let recommendation = &entry.recommendation;
            let _ = writeln!(
                output,
                "- [P{}] {} ({}): {} (case {}, {}/{} weeks underperforming)",
                recommendation.priority,
                entry.agent_name,
                entry.agent_email,
                recommendation.action,
                recommendation.case_type,
                entry.underperforming_weeks,
                entry.total_weeks
            );
        }
    }

    output
}
