//! Console rendering of each page's figures

use crate::model::AlignedFeatures;
use crate::scoring::{Adjustment, Prediction, RetentionPlan, BASELINE_CHURN_PCT};
use crate::stats::{CategoryBreakdown, ChurnSplit, CorrelationMatrix, KeyInsights, Kpis, Summary};
use crate::viz::pretty_label;

/// Format an integer with thousands separators
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("${:.2}", v))
}

pub fn print_kpis(kpis: &Kpis) {
    println!("\n=== Key Indicators ===");
    println!("  Churn rate:          {:.1}%", kpis.churn_rate);
    println!("  ARPU:                {}", money(kpis.arpu));
    match kpis.avg_tenure {
        Some(t) => println!("  Average tenure:      {:.0} months", t),
        None => println!("  Average tenure:      n/a"),
    }
    println!("  Churned customers:   {}", thousands(kpis.churned));
}

pub fn print_dataset_info(kpis: &Kpis) {
    println!("\n=== Dataset ===");
    println!("  Metric              | Value");
    println!("  --------------------|----------");
    println!("  Total customers     | {}", thousands(kpis.total_customers));
    println!("  Variables           | {}", kpis.column_count);
    println!("  Churned customers   | {}", thousands(kpis.churned));
    println!("  Churn (%)           | {:.1}%", kpis.churn_rate);
}

/// Filtered KPIs next to the global churn rate
pub fn print_filtered_kpis(filtered: &Kpis, global_churn_rate: f64) {
    println!("\n=== Customer Panel ===");
    println!("  Total customers:         {}", thousands(filtered.total_customers));
    println!("  Churned customers:       {}", thousands(filtered.churned));
    println!(
        "  Churn rate:              {:.1}% ({:+.1} pts vs global {:.1}%)",
        filtered.churn_rate,
        filtered.churn_rate - global_churn_rate,
        global_churn_rate
    );
    println!("  Average monthly revenue: {}", money(filtered.arpu));
}

pub fn print_insights(insights: &KeyInsights) {
    println!("\n=== Key Insights ===");
    for row in &insights.by_contract {
        println!(
            "  {:<16} contract: {:5.1}% churn ({} customers)",
            row.category,
            row.churn_pct(),
            thousands(row.total())
        );
    }
    if let Some(share) = insights.month_to_month_share {
        println!("  {:.0}% of customers are on month-to-month contracts", share);
    }
    if let Some(rate) = insights.long_tenure_churn_rate {
        println!("  Tenure above 18 months: {:.1}% churn", rate);
    }
}

pub fn print_breakdown(column: &str, rows: &[CategoryBreakdown]) {
    println!("\n=== Churn by {} ===", pretty_label(column));
    println!("  {:<28} | {:>8} | {:>8} | {:>7}", "Category", "Retained", "Churned", "Churn %");
    println!("  {:-<28}-|-{:->8}-|-{:->8}-|-{:->7}", "", "", "", "");
    for row in rows {
        println!(
            "  {:<28} | {:>8} | {:>8} | {:>6.1}%",
            row.category,
            thousands(row.retained),
            thousands(row.churned),
            row.churn_pct()
        );
    }
}

pub fn print_mean_by_churn(metric: &str, means: &ChurnSplit<Option<f64>>) {
    println!("\n=== Average {} by status ===", pretty_label(metric));
    println!("  Retained: {}", money(means.retained));
    println!("  Churned:  {}", money(means.churned));
}

fn summary_cell(summary: &Option<Summary>, f: impl Fn(&Summary) -> String) -> String {
    summary.as_ref().map_or_else(|| "-".to_string(), f)
}

/// Side-by-side `describe()` tables for retained and churned customers
pub fn print_summary(column: &str, split: &ChurnSplit<Option<Summary>>) {
    println!("\n=== {} by churn status ===", pretty_label(column));
    println!("  {:<6} | {:>12} | {:>12}", "", "No churn", "Churn");
    println!("  {:-<6}-|-{:->12}-|-{:->12}", "", "", "");

    let rows: [(&str, fn(&Summary) -> f64); 8] = [
        ("count", |s: &Summary| s.count as f64),
        ("mean", |s: &Summary| s.mean),
        ("std", |s: &Summary| s.std),
        ("min", |s: &Summary| s.min),
        ("25%", |s: &Summary| s.q1),
        ("50%", |s: &Summary| s.median),
        ("75%", |s: &Summary| s.q3),
        ("max", |s: &Summary| s.max),
    ];
    for (name, get) in rows {
        let cell = |s: &Summary| format!("{:.2}", get(s));
        println!(
            "  {:<6} | {:>12} | {:>12}",
            name,
            summary_cell(&split.retained, cell),
            summary_cell(&split.churned, cell)
        );
    }
}

pub fn print_correlations(matrix: &CorrelationMatrix) {
    println!("\n=== Correlation Matrix ===");
    let width = matrix
        .columns
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max(6);

    print!("  {:<width$}", "", width = width);
    for c in &matrix.columns {
        print!(" {:>width$}", c, width = width);
    }
    println!();

    for (i, row_name) in matrix.columns.iter().enumerate() {
        print!("  {:<width$}", row_name, width = width);
        for j in 0..matrix.columns.len() {
            let r = matrix.values[[i, j]];
            if r.is_nan() {
                print!(" {:>width$}", "-", width = width);
            } else {
                print!(" {:>width$.2}", r, width = width);
            }
        }
        println!();
    }
}

pub fn print_prediction(prediction: &Prediction, estimator: &str) {
    println!("\n=== Churn Prediction ({}) ===", estimator);
    println!("  Churn probability: {:.1}%", prediction.percent());
    println!("  Risk level:        {}", prediction.risk);
    println!(
        "  vs baseline:       {:+.1} pts (baseline {:.1}%)",
        prediction.delta_vs_baseline(),
        BASELINE_CHURN_PCT
    );
}

pub fn print_adjustments(base_rate: f64, adjustments: &[Adjustment]) {
    println!("\n  Rule breakdown:");
    println!("    {:<28} {:>+7.2}", "base rate", base_rate);
    for a in adjustments {
        println!("    {:<28} {:>+7.2}", a.reason, a.delta);
    }
}

pub fn print_alignment(aligned: &AlignedFeatures) {
    println!("\n  Feature alignment: {} model features", aligned.values.len());
    if !aligned.filled.is_empty() {
        println!("    filled with 0: {}", aligned.filled.join(", "));
    }
    if !aligned.ignored.is_empty() {
        println!("    not used by model: {}", aligned.ignored.join(", "));
    }
}

pub fn print_recommendations(plan: RetentionPlan) {
    println!("\n=== Recommended Actions: {} ===", plan.title());
    for (i, (heading, actions)) in plan.actions().iter().enumerate() {
        println!("  {}. {}", i + 1, heading);
        for action in actions.iter() {
            println!("     - {}", action);
        }
    }
}
