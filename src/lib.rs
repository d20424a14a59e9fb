//! ChurnScope: a Rust CLI for telecom customer churn analytics
//!
//! This library loads a cleaned customer table, computes descriptive
//! statistics (KPIs, churn cross-tabulations, summaries, correlations),
//! renders charts, and estimates individual churn risk with either
//! business-rule heuristics or a pre-trained gradient-boosted model.

pub mod cli;
pub mod data;
pub mod model;
pub mod report;
pub mod scoring;
pub mod stats;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Args, Command};
pub use data::{load_customer_data, ChurnData, CustomerFilter};
pub use model::{align_features, encode_profile, AlignedFeatures, GradientBoostedModel, ModelError};
pub use scoring::{
    predict, ChurnEstimator, Contract, CustomerProfile, HeuristicScorer, InternetService,
    PaymentMethod, Prediction, ProfileError, RetentionPlan, RiskLevel,
};
pub use stats::{
    churn_crosstab, churn_histogram, compute_kpis, correlation_matrix, describe, describe_by_churn,
    key_insights, mean_by_churn, CategoryBreakdown, Kpis,
};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
