use std::path::Path;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use qperform_compliance::calendar::{week_end, week_start, weeks_for_month};
use qperform_compliance::ingest::{self, ActionRow, PerformanceRow, Snapshot};
use qperform_compliance::thresholds::{classify, MetricType};
use qperform_compliance::warnings::compute_expiration;
use qperform_compliance::{
    ActionLogEntry, ActionType, PerformanceRecord, SubjectRole, WarningCategory, WarningType,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Loads the records attributed to one month together with the full
/// action log inside a single repeatable-read transaction, so a warning
/// cannot change state between the two reads.
pub async fn fetch_snapshot(pool: &PgPool, month: u32, year: i32) -> anyhow::Result<Snapshot> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let records = fetch_performance(&mut *tx, month, year).await?;
    let actions = fetch_actions(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(
        records = records.len(),
        actions = actions.len(),
        month,
        year,
        "loaded snapshot from database"
    );
    Ok(Snapshot { records, actions })
}

pub async fn fetch_performance(
    conn: &mut PgConnection,
    month: u32,
    year: i32,
) -> anyhow::Result<Vec<PerformanceRecord>> {
    let month = i32::try_from(month).context("month out of range")?;
    let rows = sqlx::query(
        "SELECT agent_email, agent_name, client, category, task, kpi_qa, flag_qa, \
         kpi_avg_prod, flag_prod, week_range, start_date, end_date, month_num, year_num \
         FROM qperform.performance_weeks \
         WHERE month_num = $1 AND year_num = $2 \
         ORDER BY agent_email, start_date",
    )
    .bind(month)
    .bind(year)
    .fetch_all(&mut *conn)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let month_num: i32 = row.try_get("month_num")?;
        let raw = PerformanceRow {
            agent_email: row.try_get("agent_email")?,
            agent_name: row.try_get("agent_name")?,
            client: row.try_get("client")?,
            category: row.try_get("category")?,
            task: row.try_get("task")?,
            kpi_qa: row.try_get("kpi_qa")?,
            flag_qa: row.try_get("flag_qa")?,
            kpi_avg_prod: row.try_get("kpi_avg_prod")?,
            flag_prod: row.try_get("flag_prod")?,
            week_range: row.try_get("week_range")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            month_num: u32::try_from(month_num).ok(),
            year_num: row.try_get("year_num")?,
            source_key: None,
        };
        records.extend(raw.into_record());
    }

    Ok(records)
}

pub async fn fetch_actions(conn: &mut PgConnection) -> anyhow::Result<Vec<ActionLogEntry>> {
    let rows = sqlx::query(
        "SELECT id, agent_email, action_type, warning_type, subject_role, action_date, \
         week_start_date, week_end_date, expiration_date, is_active, client, category, \
         taken_by, description \
         FROM qperform.action_log \
         ORDER BY action_date, id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut actions = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.try_get("id")?;
        let raw = ActionRow {
            id: Some(id),
            agent_email: row.try_get("agent_email")?,
            action_type: row.try_get("action_type")?,
            warning_type: row.try_get("warning_type")?,
            subject_role: row.try_get("subject_role")?,
            action_date: row.try_get("action_date")?,
            week_start_date: row.try_get("week_start_date")?,
            week_end_date: row.try_get("week_end_date")?,
            expiration_date: row.try_get("expiration_date")?,
            is_active: row.try_get("is_active")?,
            client: row.try_get("client")?,
            category: row.try_get("category")?,
            taken_by: row.try_get("taken_by")?,
            description: row.try_get("description")?,
            source_key: None,
        };
        actions.push(raw.into_entry(id));
    }

    Ok(actions)
}

async fn insert_performance(
    pool: &PgPool,
    record: &PerformanceRecord,
    source_key: &str,
) -> anyhow::Result<bool> {
    let month = i32::try_from(record.month_num).context("month out of range")?;
    let result = sqlx::query(
        r#"
        INSERT INTO qperform.performance_weeks
        (id, agent_email, agent_name, client, category, task, kpi_qa, flag_qa,
         kpi_avg_prod, flag_prod, week_range, start_date, end_date, month_num, year_num,
         source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&record.agent_email)
    .bind(&record.agent_name)
    .bind(&record.client)
    .bind(&record.category)
    .bind(&record.task)
    .bind(record.kpi_qa)
    .bind(record.flag_qa.map(|level| level.as_str()))
    .bind(record.kpi_avg_prod)
    .bind(record.flag_prod.map(|level| level.as_str()))
    .bind(&record.week_range)
    .bind(record.start_date)
    .bind(record.end_date)
    .bind(month)
    .bind(record.year_num)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_action(
    pool: &PgPool,
    entry: &ActionLogEntry,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO qperform.action_log
        (agent_email, action_type, warning_type, subject_role, action_date, week_start_date,
         week_end_date, expiration_date, is_active, client, category, taken_by, description,
         source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(&entry.agent_email)
    .bind(entry.action_type.label())
    .bind(entry.warning_category.map(|category| category.as_str()))
    .bind(entry.subject_role.as_str())
    .bind(entry.action_date)
    .bind(entry.week_start_date)
    .bind(entry.week_end_date)
    .bind(entry.expiration_date)
    .bind(entry.is_active)
    .bind(&entry.client)
    .bind(&entry.category)
    .bind(&entry.taken_by)
    .bind(&entry.description)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn import_key(explicit: Option<String>) -> String {
    explicit
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()))
}

pub async fn import_performance_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut inserted = 0usize;
    for row in ingest::read_csv::<PerformanceRow>(csv_path)? {
        let source_key = import_key(row.source_key.clone());
        let Some(record) = row.into_record() else {
            continue;
        };
        if insert_performance(pool, &record, &source_key).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

pub async fn import_actions_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut inserted = 0usize;
    for row in ingest::read_csv::<ActionRow>(csv_path)? {
        let source_key = import_key(row.source_key.clone());
        let entry = row.into_entry(0);
        if insert_action(pool, &entry, &source_key).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Sample agents and scores for October 2025. Idempotent: rows are keyed by
/// stable source keys.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let agents = [
        (
            "avery.lee@qperform.example",
            "Avery Lee",
            [97.2, 96.8, 99.4, 96.1, 96.5],
        ),
        (
            "jules.moreno@qperform.example",
            "Jules Moreno",
            [99.6, 100.0, 99.1, 98.4, 99.8],
        ),
        (
            "kiara.patel@qperform.example",
            "Kiara Patel",
            [98.2, 97.6, 97.9, 96.9, 97.4],
        ),
    ];

    for (email, name, qa_scores) in agents {
        for (week, qa) in weeks_for_month(10, 2025).into_iter().zip(qa_scores) {
            let production = if qa < 97.0 { 98.6 } else { 100.4 };
            let record = PerformanceRecord {
                agent_email: email.to_string(),
                agent_name: Some(name.to_string()),
                client: "Northwind".to_string(),
                category: "Claims".to_string(),
                task: "Adjudication".to_string(),
                kpi_qa: qa,
                flag_qa: Some(classify(qa, MetricType::Qa)),
                kpi_avg_prod: production,
                flag_prod: Some(classify(production, MetricType::Production)),
                week_range: week.label(),
                start_date: week.start,
                end_date: week.end,
                month_num: 10,
                year_num: 2025,
            };
            let source_key = format!("seed-{}-{}", email, week.start);
            insert_performance(pool, &record, &source_key).await?;
        }
    }

    let issued = |year, month, day| {
        NaiveDate::from_ymd_opt(year, month, day).context("invalid seed date")
    };
    let avery = "avery.lee@qperform.example";
    let kiara = "kiara.patel@qperform.example";
    let warnings = [
        ("seed-a-001", avery, WarningType::Verbal, issued(2025, 8, 20)?),
        ("seed-a-002", avery, WarningType::Verbal, issued(2025, 9, 24)?),
        ("seed-k-001", kiara, WarningType::Verbal, issued(2025, 6, 2)?),
        ("seed-k-002", kiara, WarningType::Written, issued(2025, 7, 14)?),
        ("seed-k-003", kiara, WarningType::Written, issued(2025, 9, 8)?),
    ];

    for (source_key, email, warning_type, action_date) in warnings {
        let entry = ActionLogEntry {
            id: 0,
            agent_email: email.to_string(),
            action_type: ActionType::Warning(warning_type),
            warning_category: Some(WarningCategory::SubstandardQa),
            subject_role: Default::default(),
            action_date,
            week_start_date: Some(week_start(action_date)),
            week_end_date: Some(week_end(action_date)),
            expiration_date: compute_expiration(warning_type, action_date),
            is_active: Some(true),
            client: "Northwind".to_string(),
            category: "Claims".to_string(),
            taken_by: Some("dana.ortiz@qperform.example".to_string()),
            description: Some(format!("{warning_type} for substandard QA")),
        };
        insert_action(pool, &entry, source_key).await?;
    }

    let coaching_date = issued(2025, 10, 20)?;
    let coaching = ActionLogEntry {
        id: 0,
        agent_email: "jules.moreno@qperform.example".to_string(),
        action_type: ActionType::Coaching,
        warning_category: None,
        subject_role: Default::default(),
        action_date: coaching_date,
        week_start_date: None,
        week_end_date: None,
        expiration_date: None,
        is_active: None,
        client: "Northwind".to_string(),
        category: "Claims".to_string(),
        taken_by: Some("dana.ortiz@qperform.example".to_string()),
        description: Some("Calibration review".to_string()),
    };
    insert_action(pool, &coaching, "seed-j-001").await?;

    let leader_warning_date = coaching_date - Duration::days(30);
    let leader_warning = ActionLogEntry {
        id: 0,
        agent_email: "dana.ortiz@qperform.example".to_string(),
        action_type: ActionType::Warning(WarningType::Verbal),
        warning_category: Some(WarningCategory::LeadershipBehavior),
        subject_role: SubjectRole::Leader,
        action_date: leader_warning_date,
        week_start_date: None,
        week_end_date: None,
        expiration_date: compute_expiration(WarningType::Verbal, leader_warning_date),
        is_active: Some(true),
        client: "Northwind".to_string(),
        category: "Claims".to_string(),
        taken_by: Some("avp@qperform.example".to_string()),
        description: Some("No action on underperforming agent".to_string()),
    };
    insert_action(pool, &leader_warning, "seed-l-001").await?;

    Ok(())
}
