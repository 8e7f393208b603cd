//! CSV snapshots and the mapping from stored rows onto engine types.
//!
//! Stored rows still carry the dashboard's free-form labels. They are
//! mapped onto the closed enumerations once, here, so the engine never
//! inspects raw strings.

use std::io;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::calendar::{attribute_week, format_week_range, parse_week_range};
use crate::models::{
    ActionLogEntry, ActionType, PerformanceRecord, SubjectRole, WarningCategory,
};
use crate::thresholds::PerformanceLevel;
use crate::warnings::compute_expiration;

/// A consistent pair of performance records and action log, taken at the
/// same instant.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<PerformanceRecord>,
    pub actions: Vec<ActionLogEntry>,
}

impl Snapshot {
    pub fn from_csv(performance: &Path, actions: &Path) -> anyhow::Result<Self> {
        let records = read_csv::<PerformanceRow>(performance)?
            .into_iter()
            .filter_map(PerformanceRow::into_record)
            .collect();
        let actions = read_csv::<ActionRow>(actions)?
            .into_iter()
            .enumerate()
            .map(|(index, row)| row.into_entry(index as i64 + 1))
            .collect();
        Ok(Self { records, actions })
    }

    /// Keeps only records attributed to the given month.
    pub fn for_month(mut self, month: u32, year: i32) -> Self {
        self.records
            .retain(|record| record.month_num == month && record.year_num == year);
        self
    }
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_csv_from(file).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn read_csv_from<T: DeserializeOwned, R: io::Read>(reader: R) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<T>().enumerate() {
        let row = result.with_context(|| format!("invalid row {}", line + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Performance row as exported by the dashboard. Dates may be given
/// explicitly or only through the week label; month and year are derived
/// from the week when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceRow {
    pub agent_email: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    pub client: String,
    pub category: String,
    pub task: String,
    pub kpi_qa: f64,
    #[serde(default)]
    pub flag_qa: Option<String>,
    pub kpi_avg_prod: f64,
    #[serde(default)]
    pub flag_prod: Option<String>,
    #[serde(default)]
    pub week_range: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub month_num: Option<u32>,
    #[serde(default)]
    pub year_num: Option<i32>,
    #[serde(default)]
    pub source_key: Option<String>,
}

impl PerformanceRow {
    /// `None` when the row has no usable week.
    pub fn into_record(self) -> Option<PerformanceRecord> {
        let (start_date, end_date) = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => match self.week_range.as_deref().and_then(parse_week_range) {
                Some(dates) => dates,
                None => {
                    tracing::warn!(
                        agent = %self.agent_email,
                        week = ?self.week_range,
                        "skipping performance row without a parseable week"
                    );
                    return None;
                }
            },
        };

        let attributed = attribute_week(start_date, end_date);
        let week_range = self
            .week_range
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| format_week_range(start_date, end_date));

        Some(PerformanceRecord {
            agent_email: normalize_email(self.agent_email),
            agent_name: self.agent_name.filter(|name| !name.is_empty()),
            client: self.client,
            category: self.category,
            task: self.task,
            kpi_qa: self.kpi_qa,
            flag_qa: parse_flag(self.flag_qa.as_deref()),
            kpi_avg_prod: self.kpi_avg_prod,
            flag_prod: parse_flag(self.flag_prod.as_deref()),
            week_range,
            start_date,
            end_date,
            month_num: self.month_num.unwrap_or(attributed.month),
            year_num: self.year_num.unwrap_or(attributed.year),
        })
    }
}

/// Emails are compared verbatim by the engine, so stray whitespace from
/// exports or hand-edited rows is stripped once here for every source.
pub fn normalize_email(email: String) -> String {
    email.trim().to_string()
}

/// Unknown or blank flags are dropped so the score gets classified instead.
fn parse_flag(flag: Option<&str>) -> Option<PerformanceLevel> {
    let flag = flag?.trim();
    if flag.is_empty() {
        return None;
    }
    match flag.parse() {
        Ok(level) => Some(level),
        Err(err) => {
            tracing::debug!(%err, "ignoring performance flag");
            None
        }
    }
}

/// Action-log row. `warning_type` is the legacy column name for the
/// warning category.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRow {
    #[serde(default)]
    pub id: Option<i64>,
    pub agent_email: String,
    pub action_type: String,
    #[serde(default, alias = "warning_category")]
    pub warning_type: Option<String>,
    #[serde(default)]
    pub subject_role: Option<String>,
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
    #[serde(default)]
    pub source_key: Option<String>,
}

impl ActionRow {
    pub fn into_entry(self, fallback_id: i64) -> ActionLogEntry {
        let action_type = ActionType::from_label(&self.action_type);
        let warning_category = self
            .warning_type
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .map(WarningCategory::from_label);
        let subject_role = resolve_role(
            self.subject_role.as_deref(),
            &self.action_type,
            warning_category,
        );
        let expiration_date = self.expiration_date.or_else(|| {
            action_type
                .warning()
                .and_then(|warning| compute_expiration(warning, self.action_date))
        });

        ActionLogEntry {
            id: self.id.unwrap_or(fallback_id),
            agent_email: normalize_email(self.agent_email),
            action_type,
            warning_category,
            subject_role,
            action_date: self.action_date,
            week_start_date: self.week_start_date,
            week_end_date: self.week_end_date,
            expiration_date,
            is_active: self.is_active,
            client: self.client,
            category: self.category,
            taken_by: self
                .taken_by
                .map(normalize_email)
                .filter(|email| !email.is_empty()),
            description: self.description,
        }
    }
}

/// An explicit role column wins. Older rows only mark leader entries through
/// a "Leadership" action label or category.
pub fn resolve_role(
    explicit: Option<&str>,
    action_label: &str,
    category: Option<WarningCategory>,
) -> SubjectRole {
    if let Some(role) = explicit.filter(|value| !value.trim().is_empty()) {
        match role.parse() {
            Ok(role) => return role,
            Err(err) => tracing::warn!(%err, "falling back to inferred subject role"),
        }
    }

    let leadership_label = action_label
        .trim()
        .to_ascii_lowercase()
        .starts_with("leadership");
    if leadership_label || category == Some(WarningCategory::LeadershipBehavior) {
        SubjectRole::Leader
    } else {
        SubjectRole::Agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WarningType;
    use pretty_assertions::assert_eq;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn performance_rows_fill_dates_from_week_label() {
        let data = "\
agent_email,agent_name,client,category,task,kpi_qa,flag_qa,kpi_avg_prod,flag_prod,week_range
avery@example.com,Avery Lee,Acme,Billing,Claims,97.5,Low,100.2,GOOD,09/28/25 - 10/04/25
kiara@example.com,,Acme,Billing,Claims,99.1,N/A,98.0,,not a week
";
        let rows: Vec<PerformanceRow> = read_csv_from(data.as_bytes()).unwrap();
        let records: Vec<PerformanceRecord> =
            rows.into_iter().filter_map(PerformanceRow::into_record).collect();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.start_date, date(2025, 9, 28));
        assert_eq!(record.end_date, date(2025, 10, 4));
        assert_eq!((record.month_num, record.year_num), (10, 2025));
        assert_eq!(record.flag_qa, Some(PerformanceLevel::Low));
        assert_eq!(record.flag_prod, Some(PerformanceLevel::Good));
    }

    #[test]
    fn unknown_flag_falls_back_to_score() {
        assert_eq!(parse_flag(Some("N/A")), None);
        assert_eq!(parse_flag(Some(" ")), None);
        assert_eq!(parse_flag(Some("critical")), Some(PerformanceLevel::Critical));
    }

    #[test]
    fn action_rows_map_labels_and_expiration() {
        let data = "\
agent_email,action_type,warning_type,action_date,expiration_date,is_active,client,category
avery@example.com,Verbal Warning,Substandard Work - QA,2025-10-01,,,Acme,Billing
lead@example.com,Leadership Verbal Warning,Leadership Behavior,2025-10-02,,true,Acme,Billing
avery@example.com,Coaching,,2025-10-03,,,Acme,Billing
avery@example.com,Termination,Substandard Work - QA,2025-10-04,,,Acme,Billing
";
        let rows: Vec<ActionRow> = read_csv_from(data.as_bytes()).unwrap();
        let entries: Vec<ActionLogEntry> = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| row.into_entry(index as i64 + 1))
            .collect();

        assert_eq!(entries[0].warning_type(), Some(WarningType::Verbal));
        assert_eq!(entries[0].warning_category, Some(WarningCategory::SubstandardQa));
        assert_eq!(entries[0].expiration_date, Some(date(2025, 12, 30)));
        assert_eq!(entries[0].subject_role, SubjectRole::Agent);

        assert_eq!(entries[1].warning_type(), Some(WarningType::Verbal));
        assert_eq!(entries[1].subject_role, SubjectRole::Leader);
        assert_eq!(entries[1].is_active, Some(true));

        assert!(entries[2].is_coaching());
        assert_eq!(entries[2].warning_category, None);
        assert_eq!(entries[2].expiration_date, None);

        assert_eq!(entries[3].expiration_date, None);
        assert_eq!(entries[3].id, 4);
    }

    #[test]
    fn explicit_role_wins_over_inference() {
        assert_eq!(
            resolve_role(Some("agent"), "Leadership Verbal Warning", None),
            SubjectRole::Agent
        );
        assert_eq!(
            resolve_role(Some("bogus"), "Verbal Warning", Some(WarningCategory::LeadershipBehavior)),
            SubjectRole::Leader
        );
        assert_eq!(resolve_role(None, "Verbal Warning", None), SubjectRole::Agent);
    }

    #[test]
    fn padded_emails_still_match_their_warnings() {
        use crate::context::EngineContext;
        use crate::warnings::WarningLedger;

        let performance = PerformanceRow {
            agent_email: "  avery@example.com ".to_string(),
            agent_name: None,
            client: "Acme".to_string(),
            category: "Billing".to_string(),
            task: "Claims".to_string(),
            kpi_qa: 96.0,
            flag_qa: None,
            kpi_avg_prod: 100.0,
            flag_prod: None,
            week_range: None,
            start_date: Some(date(2025, 10, 5)),
            end_date: Some(date(2025, 10, 11)),
            month_num: None,
            year_num: None,
            source_key: None,
        };
        let action = ActionRow {
            id: Some(7),
            agent_email: "avery@example.com\t".to_string(),
            action_type: "Verbal Warning".to_string(),
            warning_type: Some("Substandard Work - QA".to_string()),
            subject_role: None,
            action_date: date(2025, 10, 1),
            week_start_date: None,
            week_end_date: None,
            expiration_date: None,
            is_active: None,
            client: "Acme".to_string(),
            category: "Billing".to_string(),
            taken_by: Some(" lead@example.com ".to_string()),
            description: None,
            source_key: None,
        };

        let record = performance.into_record().unwrap();
        let actions = vec![action.into_entry(0)];
        assert_eq!(record.agent_email, "avery@example.com");
        assert_eq!(actions[0].agent_email, "avery@example.com");
        assert_eq!(actions[0].taken_by.as_deref(), Some("lead@example.com"));

        let ledger = WarningLedger::new(&actions, EngineContext::as_of(date(2025, 10, 31)));
        let status = ledger.warning_status(&record.agent_email, WarningCategory::SubstandardQa);
        assert_eq!(status.verbal_warnings, 1);
        assert_eq!(ledger.actions_taken_by("lead@example.com", &record.agent_email), 1);
    }

    #[test]
    fn snapshot_filters_to_month() {
        let mut snapshot = Snapshot::default();
        let rows: Vec<PerformanceRow> = read_csv_from(
            "\
agent_email,client,category,task,kpi_qa,kpi_avg_prod,start_date,end_date
a@x.com,Acme,Billing,Claims,99,100,2025-09-21,2025-09-27
a@x.com,Acme,Billing,Claims,99,100,2025-09-28,2025-10-04
"
            .as_bytes(),
        )
        .unwrap();
        snapshot.records = rows.into_iter().filter_map(PerformanceRow::into_record).collect();

        let october = snapshot.for_month(10, 2025);
        assert_eq!(october.records.len(), 1);
        assert_eq!(october.records[0].week_range, "09/28/25 - 10/04/25");
    }
}
