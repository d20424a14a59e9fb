//! ChurnScope: telecom customer churn analytics CLI
//!
//! This is the main entrypoint that dispatches to the overview, dashboard,
//! EDA and prediction pages.

use anyhow::{Context, Result};
use churnscope::cli::{DashboardArgs, EdaArgs, OverviewArgs, PredictArgs};
use churnscope::data::{KEY_VARIABLES, NUMERIC_VARIABLES, PROFILE_COLUMNS, SERVICE_COLUMNS};
use churnscope::scoring::BASELINE_CHURN_PCT;
use churnscope::stats::DEFAULT_BINS;
use churnscope::{
    align_features, churn_crosstab, churn_histogram, compute_kpis, correlation_matrix,
    describe_by_churn, encode_profile, key_insights, load_customer_data, mean_by_churn, predict,
    report, viz, Args, ChurnData, ChurnEstimator, Command, GradientBoostedModel, HeuristicScorer,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    let start_time = Instant::now();
    match &args.command {
        Command::Overview(page) => run_overview(&args, page)?,
        Command::Dashboard(page) => run_dashboard(&args, page)?,
        Command::Eda(page) => run_eda(&args, page)?,
        Command::Predict(page) => run_prediction(&args, page)?,
    }
    debug!(elapsed_s = start_time.elapsed().as_secs_f64(), "page complete");

    Ok(())
}

/// Log to stderr so reports on stdout stay clean; RUST_LOG overrides the default
fn init_tracing(verbose: bool) {
    let default = if verbose { "churnscope=debug" } else { "churnscope=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Chart destination, or `None` when charts are disabled
fn chart_dir(args: &Args) -> Result<Option<PathBuf>> {
    if args.no_charts {
        return Ok(None);
    }
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating chart directory {}", args.output_dir.display()))?;
    Ok(Some(args.output_dir.clone()))
}

fn load(args: &Args) -> Result<ChurnData> {
    let data_start = Instant::now();
    let data = load_customer_data(&args.input)?;
    debug!(
        customers = data.len(),
        elapsed_s = data_start.elapsed().as_secs_f64(),
        "customer table ready"
    );
    Ok(data)
}

fn require_column(data: &ChurnData, column: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&column) {
        anyhow::bail!("'{}' is not one of: {}", column, allowed.join(", "));
    }
    if !data.has_column(column) {
        anyhow::bail!("Column '{}' not found in customer table", column);
    }
    Ok(())
}

/// Landing page: KPIs, dataset info, insights and a quick breakdown
fn run_overview(args: &Args, page: &OverviewArgs) -> Result<()> {
    println!("=== Telco Customer Churn Analytics ===");

    let data = load(args)?;
    let kpis = compute_kpis(&data)?;
    report::print_kpis(&kpis);
    report::print_dataset_info(&kpis);
    report::print_insights(&key_insights(&data)?);

    require_column(&data, &page.variable, &KEY_VARIABLES)?;
    let rows = churn_crosstab(&data, &page.variable)?;
    report::print_breakdown(&page.variable, &rows);

    if let Some(dir) = chart_dir(args)? {
        viz::create_churn_count_bar(&rows, &page.variable, &dir.join(format!("overview_{}.png", page.variable)))?;
    }
    Ok(())
}

/// Executive panel over the filtered customer subset
fn run_dashboard(args: &Args, page: &DashboardArgs) -> Result<()> {
    println!("=== Customer Executive Panel ===");

    let data = load(args)?;
    let filter = page.to_filter()?;
    let filtered = data.filter(&filter)?;

    if filtered.is_empty() {
        warn!(?filter, "no customers match the selected filters");
        println!("\nNo data matches the selected filters.");
        return Ok(());
    }

    let global = compute_kpis(&data)?;
    let kpis = compute_kpis(&filtered)?;
    report::print_filtered_kpis(&kpis, global.churn_rate);

    let mut breakdowns = Vec::new();
    for column in ["contract", "paymentmethod", "paperlessbilling"] {
        if filtered.has_column(column) {
            breakdowns.push((column.to_string(), churn_crosstab(&filtered, column)?));
        }
    }
    for (selected, allowed) in [(&page.service, &SERVICE_COLUMNS[..]), (&page.profile, &PROFILE_COLUMNS[..])] {
        if allowed.contains(&selected.as_str()) && filtered.has_column(selected) {
            breakdowns.push((selected.clone(), churn_crosstab(&filtered, selected)?));
        } else {
            warn!(column = selected.as_str(), "breakdown column unavailable, skipped");
        }
    }
    for (column, rows) in &breakdowns {
        report::print_breakdown(column, rows);
    }

    let monthly = filtered
        .has_column("monthlycharges")
        .then(|| mean_by_churn(&filtered, "monthlycharges"))
        .transpose()?;
    if let Some(means) = &monthly {
        report::print_mean_by_churn("monthlycharges", means);
    }

    let Some(dir) = chart_dir(args)? else {
        return Ok(());
    };
    let chart_start = Instant::now();

    if kpis.retained + kpis.churned > 0 {
        viz::create_churn_pie(kpis.retained, kpis.churned, &dir.join("dashboard_pie.png"))?;
    }
    for (column, rows) in &breakdowns {
        viz::create_churn_bar(rows, column, &dir.join(format!("dashboard_{}.png", column)))?;
    }
    for (column, title) in [
        ("tenure", "Tenure by customer status"),
        ("monthlycharges", "Monthly charges by customer status"),
    ] {
        if filtered.has_column(column) {
            let hist = churn_histogram(&filtered, column, DEFAULT_BINS)?;
            viz::create_histogram(&hist, column, Some(title), &dir.join(format!("dashboard_hist_{}.png", column)))?;
        }
    }
    if let Some(means) = &monthly {
        viz::create_avg_metric_bar(means, "monthlycharges", true, &dir.join("dashboard_avg_monthlycharges.png"))?;
    }

    info!(
        elapsed_s = chart_start.elapsed().as_secs_f64(),
        dir = %dir.display(),
        "dashboard charts generated"
    );
    Ok(())
}

/// Exploratory analysis of one numeric and one categorical variable
fn run_eda(args: &Args, page: &EdaArgs) -> Result<()> {
    println!("=== Exploratory Data Analysis ===");

    let data = load(args)?;
    require_column(&data, &page.numeric, &NUMERIC_VARIABLES)?;
    require_column(&data, &page.categorical, &KEY_VARIABLES)?;

    let summary = describe_by_churn(&data, &page.numeric)?;
    report::print_summary(&page.numeric, &summary);

    let rows = churn_crosstab(&data, &page.categorical)?;
    report::print_breakdown(&page.categorical, &rows);

    let matrix = correlation_matrix(&data)?;
    report::print_correlations(&matrix);

    if let Some(dir) = chart_dir(args)? {
        let hist = churn_histogram(&data, &page.numeric, page.bins)?;
        let title = format!("Distribution of {} by churn", page.numeric);
        viz::create_histogram(&hist, &page.numeric, Some(title.as_str()), &dir.join(format!("eda_hist_{}.png", page.numeric)))?;
        viz::create_churn_bar(&rows, &page.categorical, &dir.join(format!("eda_{}.png", page.categorical)))?;
        viz::create_correlation_heatmap(&matrix, &dir.join("eda_correlation.png"))?;
    }
    Ok(())
}

/// Score a single customer with the heuristic rules or a loaded model
fn run_prediction(args: &Args, page: &PredictArgs) -> Result<()> {
    println!("=== Individual Churn Predictor ===");

    let profile = page.to_profile()?;
    debug!(?profile, "scoring customer profile");

    let prediction = match &page.model {
        Some(path) => {
            let model = load_model(path)?;
            let prediction = predict(&model, &profile)?;
            report::print_prediction(&prediction, model.name());
            report::print_alignment(&align_features(&encode_profile(&profile), model.feature_names()));
            prediction
        }
        None => {
            info!("no model artifact given, using heuristic rules");
            let scorer = HeuristicScorer::default();
            let prediction = predict(&scorer, &profile)?;
            report::print_prediction(&prediction, scorer.name());
            report::print_adjustments(scorer.base_rate, &scorer.adjustments(&profile));
            prediction
        }
    };

    report::print_recommendations(prediction.plan);

    if let Some(dir) = chart_dir(args)? {
        viz::create_gauge_chart(prediction.probability, BASELINE_CHURN_PCT, &dir.join("predict_gauge.png"))?;
    }
    Ok(())
}

fn load_model(path: &Path) -> Result<GradientBoostedModel> {
    let model = GradientBoostedModel::load(path)
        .with_context(|| format!("loading model artifact {}", path.display()))?;
    info!(
        features = model.n_features(),
        trees = model.n_trees(),
        "gradient-boosted model loaded"
    );
    Ok(model)
}
