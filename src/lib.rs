//! Performance-compliance decision engine.
//!
//! Given weekly agent performance records and a snapshot of the
//! disciplinary action log, the engine classifies weekly results, tracks
//! the warning ladder with time-based expiration, flags agents at risk of
//! termination and produces one ranked corrective action per agent or
//! leader. Every function is synchronous and pure over the borrowed
//! snapshot; the evaluation day travels in an [`EngineContext`].

pub mod calendar;
pub mod context;
pub mod error;
pub mod ingest;
pub mod models;
pub mod recommend;
pub mod risk;
pub mod thresholds;
pub mod warnings;

pub use calendar::{attribute_week, weeks_for_month, MonthOfYear, WeekSpan};
pub use context::EngineContext;
pub use error::ParseError;
pub use models::{
    ActionLogEntry, ActionType, PerformanceRecord, SubjectRole, WarningCategory, WarningType,
};
pub use recommend::{
    generate_agent_recommendation, generate_all_recommendations,
    generate_leadership_recommendation, leadership_recommendation_for_agent,
    AgentRecommendationWithContext, CaseType, RecommendationResult, TargetType,
};
pub use risk::{determine_at_risk_status, rank_at_risk_agents, AtRiskAgent, AtRiskStatus, RiskLevel};
pub use thresholds::{classify, is_underperforming, MetricType, PerformanceLevel};
pub use warnings::{ProgressionCheck, WarningLedger, WarningStatus};
