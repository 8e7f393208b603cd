use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use qperform_compliance::calendar::{month_name, weeks_for_month};
use qperform_compliance::context::DEFAULT_COACHING_LOOKBACK_DAYS;
use qperform_compliance::ingest::Snapshot;
use qperform_compliance::thresholds::{format_score_with_level, level_config};
use qperform_compliance::warnings::days_until_expiration;
use qperform_compliance::{
    generate_all_recommendations, leadership_recommendation_for_agent, rank_at_risk_agents,
    EngineContext, MetricType, WarningCategory, WarningLedger, WarningType,
};

mod db;
mod report;

#[derive(Parser)]
#[command(name = "qperform-compliance")]
#[command(about = "Performance compliance engine for agent QA and production results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample performance weeks and action log entries
    Seed,
    /// Import performance weeks and/or action log entries from CSV files
    Import {
        #[arg(long)]
        performance: Option<PathBuf>,
        #[arg(long)]
        actions: Option<PathBuf>,
    },
    /// Classify a single score
    Classify {
        score: f64,
        #[arg(long, default_value = "qa")]
        metric: MetricType,
        #[arg(long)]
        json: bool,
    },
    /// List the Sunday-Saturday weeks attributed to a month
    Weeks {
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
    },
    /// Show active warnings for one agent in one category
    Status {
        #[arg(long)]
        agent: String,
        #[arg(long, default_value = "qa")]
        category: WarningCategory,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Check whether a new warning respects the progression ladder
    Validate {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        warning_type: WarningType,
        #[arg(long, default_value = "qa")]
        category: WarningCategory,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Rank agents at risk of termination
    AtRisk {
        #[arg(long, default_value = "qa")]
        category: WarningCategory,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Recommend one corrective action per agent, most urgent first
    Recommend {
        #[arg(long, default_value = "qa")]
        category: WarningCategory,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Evaluate leadership accountability for a leader and one of their agents
    Leadership {
        #[arg(long)]
        leader: String,
        #[arg(long)]
        agent: String,
        #[arg(long, default_value = "qa")]
        category: WarningCategory,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "qa")]
        category: WarningCategory,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
}

/// Where the snapshot comes from and the day it is evaluated on. Both CSV
/// paths select the file source; otherwise `DATABASE_URL` is used.
#[derive(Args)]
struct SnapshotArgs {
    /// Month to evaluate, 1-12. Defaults to the month of --as-of.
    #[arg(long)]
    month: Option<u32>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long, requires = "actions_csv")]
    performance_csv: Option<PathBuf>,
    #[arg(long, requires = "performance_csv")]
    actions_csv: Option<PathBuf>,
    /// Evaluation day (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    as_of: Option<NaiveDate>,
    #[arg(long, default_value_t = DEFAULT_COACHING_LOOKBACK_DAYS)]
    coaching_lookback_days: i64,
    #[arg(long)]
    json: bool,
}

impl SnapshotArgs {
    fn context(&self) -> EngineContext {
        self.as_of
            .map(EngineContext::as_of)
            .unwrap_or_else(EngineContext::today)
            .with_coaching_lookback(self.coaching_lookback_days)
    }

    fn period(&self, ctx: &EngineContext) -> (u32, i32) {
        use chrono::Datelike;
        (
            self.month.unwrap_or_else(|| ctx.as_of.month()),
            self.year.unwrap_or_else(|| ctx.as_of.year()),
        )
    }

    async fn load(&self, month: u32, year: i32) -> anyhow::Result<Snapshot> {
        match (&self.performance_csv, &self.actions_csv) {
            (Some(performance), Some(actions)) => {
                let snapshot = Snapshot::from_csv(performance, actions)?.for_month(month, year);
                tracing::info!(
                    records = snapshot.records.len(),
                    actions = snapshot.actions.len(),
                    "loaded snapshot from csv"
                );
                Ok(snapshot)
            }
            _ => {
                let pool = connect().await?;
                db::fetch_snapshot(&pool, month, year).await
            }
        }
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set, or pass --performance-csv and --actions-csv")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import {
            performance,
            actions,
        } => {
            if performance.is_none() && actions.is_none() {
                anyhow::bail!("pass --performance and/or --actions");
            }
            let pool = connect().await?;
            if let Some(path) = performance {
                let inserted = db::import_performance_csv(&pool, &path).await?;
                println!("Inserted {inserted} performance weeks from {}.", path.display());
            }
            if let Some(path) = actions {
                let inserted = db::import_actions_csv(&pool, &path).await?;
                println!("Inserted {inserted} action log entries from {}.", path.display());
            }
        }
        Commands::Classify {
            score,
            metric,
            json,
        } => {
            let band = level_config(score, metric);
            if json {
                print_json(band)?;
            } else {
                println!("{}", format_score_with_level(score, metric));
                println!("{}", band.description);
            }
        }
        Commands::Weeks { month, year } => {
            let weeks = weeks_for_month(month, year);
            if weeks.is_empty() {
                anyhow::bail!("month must be between 1 and 12, got {month}");
            }
            println!("{} {}:", month_name(month).unwrap_or("?"), year);
            for (index, week) in weeks.iter().enumerate() {
                println!("- Week {}: {}", index + 1, week.label());
            }
        }
        Commands::Status {
            agent,
            category,
            snapshot,
        } => {
            let ctx = snapshot.context();
            let (month, year) = snapshot.period(&ctx);
            let data = snapshot.load(month, year).await?;
            let ledger = WarningLedger::new(&data.actions, ctx);
            let agent = agent.trim();
            let status = ledger.warning_status(agent, category);

            if snapshot.json {
                return print_json(&status);
            }

            println!("{agent} ({category}) as of {}:", ctx.as_of);
            println!(
                "- Verbal {}, Written {}, Final {}, PIP {}",
                status.verbal_warnings,
                status.written_warnings,
                status.final_warnings,
                status.pip_warnings
            );
            println!("- Next action: {}", status.next_recommended_action);
            for warning in ledger.active_warnings(agent, category, None) {
                let expires = match warning.expiration_date {
                    Some(date) => format!(
                        "expires {date} ({} days)",
                        days_until_expiration(date, ctx.as_of)
                    ),
                    None => "never expires".to_string(),
                };
                println!("  - {} issued {}, {expires}", warning.action_type, warning.action_date);
            }
        }
        Commands::Validate {
            agent,
            warning_type,
            category,
            snapshot,
        } => {
            let ctx = snapshot.context();
            let (month, year) = snapshot.period(&ctx);
            let data = snapshot.load(month, year).await?;
            let ledger = WarningLedger::new(&data.actions, ctx);
            let agent = agent.trim();
            let check = ledger.validate_progression(agent, warning_type, category);

            if snapshot.json {
                return print_json(&check);
            }

            match check.message {
                None => println!("{warning_type} is allowed for {agent}."),
                Some(message) => println!("{warning_type} is not allowed for {agent}: {message}"),
            }
        }
        Commands::AtRisk {
            category,
            limit,
            snapshot,
        } => {
            let ctx = snapshot.context();
            let (month, year) = snapshot.period(&ctx);
            let data = snapshot.load(month, year).await?;
            let ledger = WarningLedger::new(&data.actions, ctx);
            let agents: Vec<_> = rank_at_risk_agents(&data.records, category, &ledger)
                .into_iter()
                .take(limit)
                .collect();

            if snapshot.json {
                return print_json(&agents);
            }
            if agents.is_empty() {
                println!("No agents at risk for this month.");
                return Ok(());
            }

            println!("Agents at risk of termination:");
            for agent in agents.iter() {
                println!(
                    "- {} ({}, {}) {}: {}",
                    agent.agent_name,
                    agent.agent_email,
                    agent.client,
                    agent.status.risk_level.as_str(),
                    agent.status.reasons.join("; ")
                );
            }
        }
        Commands::Recommend {
            category,
            limit,
            snapshot,
        } => {
            let ctx = snapshot.context();
            let (month, year) = snapshot.period(&ctx);
            let data = snapshot.load(month, year).await?;
            let ledger = WarningLedger::new(&data.actions, ctx);
            let recommendations: Vec<_> =
                generate_all_recommendations(&data.records, &ledger, category)
                    .into_iter()
                    .take(limit)
                    .collect();

            if snapshot.json {
                return print_json(&recommendations);
            }
            if recommendations.is_empty() {
                println!("No performance records for this month.");
                return Ok(());
            }

            println!("Recommended actions:");
            for entry in recommendations.iter() {
                println!(
                    "- [P{}] {} ({}): {}",
                    entry.recommendation.priority,
                    entry.agent_name,
                    entry.agent_email,
                    entry.recommendation.action
                );
            }
        }
        Commands::Leadership {
            leader,
            agent,
            category,
            snapshot,
        } => {
            let ctx = snapshot.context();
            let (month, year) = snapshot.period(&ctx);
            let data = snapshot.load(month, year).await?;
            let ledger = WarningLedger::new(&data.actions, ctx);
            let recommendation = leadership_recommendation_for_agent(
                leader.trim(),
                agent.trim(),
                &data.records,
                category,
                &ledger,
            );

            if snapshot.json {
                return print_json(&recommendation);
            }

            match recommendation {
                Some(result) => {
                    println!("{leader}: {} (case {})", result.action, result.case_type);
                    println!("{}", result.notes);
                }
                None => println!("No leadership action required for {leader}."),
            }
        }
        Commands::Report {
            category,
            out,
            snapshot,
        } => {
            let ctx = snapshot.context();
            let (month, year) = snapshot.period(&ctx);
            let data = snapshot.load(month, year).await?;
            let ledger = WarningLedger::new(&data.actions, ctx);
            let report = report::build_report(month, year, category, &data.records, &ledger);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
