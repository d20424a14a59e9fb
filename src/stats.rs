//! Descriptive statistics over the customer table

use crate::data::{ChurnData, CHURN_COLUMN};
use ndarray::Array2;
use polars::prelude::*;

/// Default histogram resolution
pub const DEFAULT_BINS: usize = 50;

/// Headline indicators shown at the top of every page
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub total_customers: usize,
    pub churned: usize,
    /// Customers labelled as not churned; rows without a label are neither
    pub retained: usize,
    /// Percent of customers with churn = 1
    pub churn_rate: f64,
    /// Average revenue per user (mean monthly charge)
    pub arpu: Option<f64>,
    pub avg_tenure: Option<f64>,
    pub column_count: usize,
}

/// Retained/churned counts for one category of a column
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryBreakdown {
    pub category: String,
    pub retained: usize,
    pub churned: usize,
}

impl CategoryBreakdown {
    pub fn total(&self) -> usize {
        self.retained + self.churned
    }

    pub fn churn_pct(&self) -> f64 {
        percent(self.churned, self.total())
    }

    pub fn retained_pct(&self) -> f64 {
        percent(self.retained, self.total())
    }
}

/// Count, moments and quartiles of a numeric sample
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (ddof = 1), NaN for a single value
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// A pair of values split by churn status
#[derive(Debug, Clone, PartialEq)]
pub struct ChurnSplit<T> {
    pub retained: T,
    pub churned: T,
}

/// Pearson correlation between numeric columns
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[[i, j]])
    }
}

/// Equal-width histogram counted separately for retained and churned customers
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges
    pub edges: Vec<f64>,
    pub retained: Vec<usize>,
    pub churned: Vec<usize>,
}

impl Histogram {
    pub fn bins(&self) -> usize {
        self.retained.len()
    }

    pub fn max_count(&self) -> usize {
        self.retained
            .iter()
            .chain(self.churned.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}

/// Findings derived from the data for the insight panel
#[derive(Debug, Clone)]
pub struct KeyInsights {
    pub by_contract: Vec<CategoryBreakdown>,
    /// Percent of customers on month-to-month contracts
    pub month_to_month_share: Option<f64>,
    /// Churn percent among customers with tenure above 18 months
    pub long_tenure_churn_rate: Option<f64>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn column_mean(data: &ChurnData, column: &str) -> crate::Result<Option<f64>> {
    if !data.has_column(column) {
        return Ok(None);
    }
    let values: Vec<f64> = data.numeric(column)?.into_iter().flatten().collect();
    Ok(mean(&values))
}

/// Compute the headline KPIs of a (possibly filtered) table
pub fn compute_kpis(data: &ChurnData) -> crate::Result<Kpis> {
    let total_customers = data.len();
    let labels = data.churn_labels()?;
    let churned = labels.iter().filter(|l| **l == Some(true)).count();
    let retained = labels.iter().filter(|l| **l == Some(false)).count();

    Ok(Kpis {
        total_customers,
        churned,
        retained,
        churn_rate: percent(churned, total_customers),
        arpu: column_mean(data, "monthlycharges")?,
        avg_tenure: column_mean(data, "tenure")?,
        column_count: data.column_count(),
    })
}

/// Cross-tabulate a column against churn status
///
/// Rows where either the category or the churn target is null are dropped.
/// Categories are returned in ascending order.
pub fn churn_crosstab(data: &ChurnData, column: &str) -> crate::Result<Vec<CategoryBreakdown>> {
    if !data.has_column(column) {
        anyhow::bail!("Column '{}' not found in customer table", column);
    }

    let grouped = data
        .df
        .clone()
        .lazy()
        .select([
            col(column).cast(DataType::String).alias("category"),
            col(CHURN_COLUMN).cast(DataType::Int64).alias("churn"),
        ])
        .drop_nulls(None)
        .group_by([col("category")])
        .agg([
            len().cast(DataType::Int64).alias("total"),
            col("churn").sum().cast(DataType::Int64).alias("churned"),
        ])
        .collect()?;

    let categories = grouped.column("category")?.str()?;
    let totals = grouped.column("total")?.i64()?;
    let churned = grouped.column("churned")?.i64()?;

    let mut rows: Vec<CategoryBreakdown> = categories
        .into_iter()
        .zip(totals.into_iter())
        .zip(churned.into_iter())
        .filter_map(|((category, total), churned)| {
            let total = total.unwrap_or(0).max(0) as usize;
            let churned = (churned.unwrap_or(0).max(0) as usize).min(total);
            Some(CategoryBreakdown {
                category: category?.to_string(),
                retained: total - churned,
                churned,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.category.cmp(&b.category));
    Ok(rows)
}

/// Linear-interpolated quantile of an ascending sample
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Summarize a sample the way `describe()` does; NaN values are ignored
pub fn describe(values: &[f64]) -> Option<Summary> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let count = sorted.len();
    let mean = mean(&sorted)?;
    let std = if count < 2 {
        f64::NAN
    } else {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    };

    Some(Summary {
        count,
        mean,
        std,
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[count - 1],
    })
}

/// Numeric values of a column partitioned by churn status
fn split_by_churn(data: &ChurnData, column: &str) -> crate::Result<ChurnSplit<Vec<f64>>> {
    if !data.has_column(column) {
        anyhow::bail!("Column '{}' not found in customer table", column);
    }

    let mut split = ChurnSplit {
        retained: Vec::new(),
        churned: Vec::new(),
    };
    for (value, label) in data.numeric(column)?.into_iter().zip(data.churn_labels()?) {
        match (value, label) {
            (Some(v), Some(true)) => split.churned.push(v),
            (Some(v), Some(false)) => split.retained.push(v),
            _ => {}
        }
    }
    Ok(split)
}

pub fn describe_by_churn(data: &ChurnData, column: &str) -> crate::Result<ChurnSplit<Option<Summary>>> {
    let split = split_by_churn(data, column)?;
    Ok(ChurnSplit {
        retained: describe(&split.retained),
        churned: describe(&split.churned),
    })
}

/// Mean of a metric for retained vs churned customers
pub fn mean_by_churn(data: &ChurnData, column: &str) -> crate::Result<ChurnSplit<Option<f64>>> {
    let split = split_by_churn(data, column)?;
    Ok(ChurnSplit {
        retained: mean(&split.retained),
        churned: mean(&split.churned),
    })
}

/// Pearson correlation over pairwise-complete observations
///
/// NaN when fewer than two pairs exist or either side has zero variance.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => Some((*a, *b)),
            _ => None,
        })
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

/// Correlation matrix over every numeric column of the table
pub fn correlation_matrix(data: &ChurnData) -> crate::Result<CorrelationMatrix> {
    let columns = data.numeric_column_names();
    let values = columns
        .iter()
        .map(|c| data.numeric(c))
        .collect::<crate::Result<Vec<_>>>()?;

    let n = columns.len();
    let mut matrix = Array2::from_elem((n, n), f64::NAN);
    for i in 0..n {
        for j in i..n {
            let r = pearson(&values[i], &values[j]);
            matrix[[i, j]] = r;
            matrix[[j, i]] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns,
        values: matrix,
    })
}

/// Bin a numeric column into equal-width bins split by churn status
pub fn churn_histogram(data: &ChurnData, column: &str, bins: usize) -> crate::Result<Histogram> {
    if bins == 0 {
        anyhow::bail!("Histogram needs at least one bin");
    }

    let split = split_by_churn(data, column)?;
    let all = split.retained.iter().chain(split.churned.iter());
    let min = all.clone().copied().fold(f64::INFINITY, f64::min);
    let max = all.copied().fold(f64::NEG_INFINITY, f64::max);

    if !min.is_finite() || !max.is_finite() {
        anyhow::bail!("Column '{}' has no numeric values to plot", column);
    }

    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };
    let edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();

    let count = |values: &[f64]| {
        let mut counts = vec![0usize; bins];
        for v in values {
            let idx = (((v - min) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }
        counts
    };

    Ok(Histogram {
        edges,
        retained: count(&split.retained),
        churned: count(&split.churned),
    })
}

/// Derive the insight panel figures from the data
pub fn key_insights(data: &ChurnData) -> crate::Result<KeyInsights> {
    let by_contract = if data.has_column("contract") {
        churn_crosstab(data, "contract")?
    } else {
        Vec::new()
    };

    let month_to_month_share = if by_contract.is_empty() {
        None
    } else {
        let total: usize = by_contract.iter().map(CategoryBreakdown::total).sum();
        let m2m = by_contract
            .iter()
            .find(|row| row.category == "Month-to-month")
            .map_or(0, CategoryBreakdown::total);
        Some(percent(m2m, total))
    };

    let long_tenure_churn_rate = if data.has_column("tenure") {
        let (mut total, mut churned) = (0usize, 0usize);
        for (tenure, label) in data.numeric("tenure")?.into_iter().zip(data.churn_labels()?) {
            if let (Some(t), Some(l)) = (tenure, label) {
                if t > 18.0 {
                    total += 1;
                    churned += usize::from(l);
                }
            }
        }
        (total > 0).then(|| percent(churned, total))
    } else {
        None
    };

    Ok(KeyInsights {
        by_contract,
        month_to_month_share,
        long_tenure_churn_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data() -> ChurnData {
        let df = df!(
            "contract" => &["Month-to-month", "Month-to-month", "One year", "Two year", "Month-to-month", "One year"],
            "tenure" => &[1i64, 5, 30, 60, 20, 24],
            "monthlycharges" => &[70.0, 90.0, 50.0, 20.0, 80.0, 60.0],
            "baja_binary" => &[1i64, 1, 0, 0, 0, 1]
        )
        .unwrap();
        ChurnData::from_frame(df).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_compute_kpis() {
        let kpis = compute_kpis(&create_test_data()).unwrap();

        assert_eq!(kpis.total_customers, 6);
        assert_eq!(kpis.churned, 3);
        assert_eq!(kpis.retained, 3);
        assert!(approx(kpis.churn_rate, 50.0));
        assert!(approx(kpis.arpu.unwrap(), 61.666666666666664));
        assert!(approx(kpis.avg_tenure.unwrap(), 140.0 / 6.0));
        assert_eq!(kpis.column_count, 4);
    }

    #[test]
    fn test_unlabelled_rows_not_retained() {
        let df = df!(
            "tenure" => &[1i64, 5, 9, 12],
            "baja" => &["Yes", "No", "", "No"]
        )
        .unwrap();
        let kpis = compute_kpis(&ChurnData::from_frame(df).unwrap()).unwrap();

        assert_eq!(kpis.total_customers, 4);
        assert_eq!((kpis.retained, kpis.churned), (2, 1));
        assert!(approx(kpis.churn_rate, 25.0));
    }

    #[test]
    fn test_churn_crosstab() {
        let rows = churn_crosstab(&create_test_data(), "contract").unwrap();

        let categories: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["Month-to-month", "One year", "Two year"]);
        assert_eq!((rows[0].retained, rows[0].churned), (1, 2));
        assert!(approx(rows[1].churn_pct(), 50.0));
        assert!(approx(rows[2].retained_pct(), 100.0));
    }

    #[test]
    fn test_crosstab_unknown_column() {
        assert!(churn_crosstab(&create_test_data(), "gender").is_err());
    }

    #[test]
    fn test_describe_matches_pandas() {
        let summary = describe(&[1.0, 2.0, 3.0, 4.0]).unwrap();

        assert_eq!(summary.count, 4);
        assert!(approx(summary.mean, 2.5));
        assert!(approx(summary.std, 1.2909944487358056));
        assert!(approx(summary.q1, 1.75));
        assert!(approx(summary.median, 2.5));
        assert!(approx(summary.q3, 3.25));
        assert_eq!((summary.min, summary.max), (1.0, 4.0));

        let single = describe(&[7.0]).unwrap();
        assert!(single.std.is_nan());
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn test_describe_by_churn() {
        let split = describe_by_churn(&create_test_data(), "tenure").unwrap();

        assert_eq!(split.churned.unwrap().count, 3);
        assert!(approx(split.retained.unwrap().mean, 110.0 / 3.0));
    }

    #[test]
    fn test_mean_by_churn() {
        let split = mean_by_churn(&create_test_data(), "monthlycharges").unwrap();
        assert!(approx(split.churned.unwrap(), 220.0 / 3.0));
        assert!(approx(split.retained.unwrap(), 50.0));
    }

    #[test]
    fn test_pearson() {
        let x = [Some(1.0), Some(2.0), Some(3.0), None];
        let y = [Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        assert!(approx(pearson(&x, &y), 1.0));

        let constant = [Some(1.0), Some(1.0), Some(1.0), Some(1.0)];
        assert!(pearson(&constant, &y).is_nan());
    }

    #[test]
    fn test_correlation_matrix() {
        let matrix = correlation_matrix(&create_test_data()).unwrap();

        assert_eq!(matrix.columns, vec!["tenure", "monthlycharges", "baja_binary"]);
        assert_eq!(matrix.values.shape(), &[3, 3]);
        assert!(approx(matrix.get("tenure", "tenure").unwrap(), 1.0));
        let r = matrix.get("tenure", "monthlycharges").unwrap();
        assert!(r < 0.0);
        assert!(approx(r, matrix.get("monthlycharges", "tenure").unwrap()));
    }

    #[test]
    fn test_churn_histogram() {
        let hist = churn_histogram(&create_test_data(), "tenure", 4).unwrap();

        assert_eq!(hist.edges.len(), 5);
        assert!(approx(hist.edges[0], 1.0));
        assert!(approx(hist.edges[4], 60.0));
        assert_eq!(hist.retained.iter().sum::<usize>(), 3);
        assert_eq!(hist.churned.iter().sum::<usize>(), 3);
        // max value lands in the last bin
        assert_eq!(hist.retained[3], 1);
        assert!(churn_histogram(&create_test_data(), "tenure", 0).is_err());
    }

    #[test]
    fn test_nan_treated_as_missing() {
        let df = df!(
            "tenure" => &[1i64, 5, 9],
            "monthlycharges" => &[f64::NAN, 20.0, 30.0],
            "baja_binary" => &[1i64, 0, 1]
        )
        .unwrap();
        let data = ChurnData::from_frame(df).unwrap();

        assert!(approx(compute_kpis(&data).unwrap().arpu.unwrap(), 25.0));

        let means = mean_by_churn(&data, "monthlycharges").unwrap();
        assert_eq!(means.retained, Some(20.0));
        assert_eq!(means.churned, Some(30.0));

        let hist = churn_histogram(&data, "monthlycharges", 5).unwrap();
        assert_eq!(hist.churned, vec![0, 0, 0, 0, 1]);
        assert_eq!(hist.retained, vec![1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_key_insights() {
        let insights = key_insights(&create_test_data()).unwrap();

        assert_eq!(insights.by_contract.len(), 3);
        assert!(approx(insights.month_to_month_share.unwrap(), 50.0));
        // tenures above 18: 30, 60, 20, 24 -> one churned
        assert!(approx(insights.long_tenure_churn_rate.unwrap(), 25.0));
    }
}
