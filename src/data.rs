//! Customer table loading and filtering using Polars

use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Binary churn target (1 = churned, 0 = retained)
pub const CHURN_COLUMN: &str = "baja_binary";
/// Raw churn label ("Yes" / "No") used to derive [`CHURN_COLUMN`]
pub const CHURN_LABEL_COLUMN: &str = "baja";

pub const NUMERIC_VARIABLES: [&str; 3] = ["tenure", "monthlycharges", "totalcharges"];
pub const KEY_VARIABLES: [&str; 4] = ["contract", "internetservice", "paymentmethod", "multiplelines"];
pub const SERVICE_COLUMNS: [&str; 9] = [
    "internetservice",
    "phoneservice",
    "multiplelines",
    "onlinesecurity",
    "onlinebackup",
    "deviceprotection",
    "techsupport",
    "streamingtv",
    "streamingmovies",
];
pub const PROFILE_COLUMNS: [&str; 4] = ["gender", "seniorcitizen", "partner", "dependents"];

/// Sentinel filter value meaning "do not filter on this column"
pub const ALL: &str = "All";

/// Cleaned customer table with a guaranteed churn target column
#[derive(Debug, Clone)]
pub struct ChurnData {
    pub df: DataFrame,
}

impl ChurnData {
    /// Wrap an in-memory frame, deriving the churn target and coercing charges
    pub fn from_frame(df: DataFrame) -> crate::Result<Self> {
        let df = normalize(df)?;
        if df.height() == 0 {
            anyhow::bail!("Customer table contains no rows");
        }
        Ok(Self { df })
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_count(&self) -> usize {
        self.df.width()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().iter().any(|c| *c == name)
    }

    /// Numeric values of a column; nulls, NaN and unparseable entries are `None`
    pub fn numeric(&self, name: &str) -> crate::Result<Vec<Option<f64>>> {
        let series = self.df.column(name)?.cast(&DataType::Float64)?;
        let values = series
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Ok(values)
    }

    /// Values of a column rendered as strings
    pub fn categorical(&self, name: &str) -> crate::Result<Vec<Option<String>>> {
        let series = self.df.column(name)?.cast(&DataType::String)?;
        let values = series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(values)
    }

    /// Churn target per row: `Some(true)` churned, `Some(false)` retained
    pub fn churn_labels(&self) -> crate::Result<Vec<Option<bool>>> {
        Ok(self
            .numeric(CHURN_COLUMN)?
            .into_iter()
            .map(|v| v.map(|x| x >= 0.5))
            .collect())
    }

    /// Names of all numeric columns, in table order
    pub fn numeric_column_names(&self) -> Vec<String> {
        self.df
            .get_columns()
            .iter()
            .filter(|s| s.dtype().is_numeric())
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Sorted distinct non-null values of a column
    pub fn distinct_values(&self, name: &str) -> crate::Result<Vec<String>> {
        let mut values: Vec<String> = self.categorical(name)?.into_iter().flatten().collect();
        values.sort();
        values.dedup();
        Ok(values)
    }

    /// Apply a customer filter, returning the matching subset
    pub fn filter(&self, filter: &CustomerFilter) -> crate::Result<ChurnData> {
        let Some(predicate) = filter.to_predicate(self) else {
            return Ok(self.clone());
        };

        let df = self.df.clone().lazy().filter(predicate).collect()?;
        debug!(before = self.len(), after = df.height(), "applied customer filter");
        Ok(ChurnData { df })
    }
}

/// Equality filters on categorical columns plus inclusive numeric ranges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerFilter {
    pub categories: Vec<(String, String)>,
    pub tenure: Option<(f64, f64)>,
    pub monthly_charges: Option<(f64, f64)>,
}

impl CustomerFilter {
    /// Add an equality filter; `None` or [`ALL`] leave the column unfiltered
    pub fn with_category(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            if !value.eq_ignore_ascii_case(ALL) {
                self.categories.push((column.to_string(), value.to_string()));
            }
        }
        self
    }

    pub fn with_tenure(mut self, range: Option<(f64, f64)>) -> Self {
        self.tenure = range;
        self
    }

    pub fn with_monthly_charges(mut self, range: Option<(f64, f64)>) -> Self {
        self.monthly_charges = range;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.tenure.is_none() && self.monthly_charges.is_none()
    }

    fn to_predicate(&self, data: &ChurnData) -> Option<Expr> {
        let mut predicate: Option<Expr> = None;
        let mut push = |expr: Expr| {
            predicate = Some(match predicate.take() {
                Some(p) => p.and(expr),
                None => expr,
            });
        };

        for (column, value) in &self.categories {
            if !data.has_column(column) {
                debug!(column = column.as_str(), "filter column missing, skipped");
                continue;
            }
            push(col(column.as_str()).cast(DataType::String).eq(lit(value.clone())));
        }

        for (column, range) in [("tenure", self.tenure), ("monthlycharges", self.monthly_charges)] {
            let Some((lo, hi)) = range else { continue };
            if !data.has_column(column) {
                debug!(column, "range filter column missing, skipped");
                continue;
            }
            let value = col(column).cast(DataType::Float64);
            push(value.clone().gt_eq(lit(lo)).and(value.lt_eq(lit(hi))));
        }

        predicate
    }
}

/// Load the cleaned customer table from a CSV file
///
/// # Arguments
/// * `path` - Path to the CSV file
///
/// # Returns
/// * `ChurnData` with `baja_binary` present and `totalcharges` numeric
pub fn load_customer_data(path: impl AsRef<Path>) -> crate::Result<ChurnData> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ext != "csv" {
        anyhow::bail!("Unsupported file format: '.{}' (expected a .csv file)", ext);
    }
    if !path.exists() {
        anyhow::bail!(
            "Data file not found: {}. Place the cleaned customer table there or pass --input",
            path.display()
        );
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    info!(rows = df.height(), columns = df.width(), path = %path.display(), "loaded customer table");
    ChurnData::from_frame(df)
}

/// Derive the churn target and coerce `totalcharges` to float
fn normalize(mut df: DataFrame) -> crate::Result<DataFrame> {
    let has = |df: &DataFrame, name: &str| df.get_column_names().iter().any(|c| *c == name);

    if !has(&df, CHURN_COLUMN) {
        if !has(&df, CHURN_LABEL_COLUMN) {
            anyhow::bail!(
                "Customer table needs a '{}' or '{}' column",
                CHURN_COLUMN,
                CHURN_LABEL_COLUMN
            );
        }

        let labels = df.column(CHURN_LABEL_COLUMN)?.cast(&DataType::String)?;
        let binary: Vec<Option<i32>> = labels
            .str()?
            .into_iter()
            .map(|v| match v.map(str::trim) {
                Some("Yes") => Some(1),
                Some("No") => Some(0),
                _ => None,
            })
            .collect();
        df.with_column(Series::new(CHURN_COLUMN, binary))?;
        debug!("derived {} from {}", CHURN_COLUMN, CHURN_LABEL_COLUMN);
    }

    if has(&df, "totalcharges") {
        let coerced = df.column("totalcharges")?.cast(&DataType::Float64)?;
        df.with_column(coerced)?;
    }

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn create_test_csv() -> NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "customerid,gender,seniorcitizen,tenure,contract,paymentmethod,monthlycharges,totalcharges,baja").unwrap();
        writeln!(file, "0001,Female,0,1,Month-to-month,Electronic check,29.85,29.85,No").unwrap();
        writeln!(file, "0002,Male,0,34,One year,Mailed check,56.95,1889.5,No").unwrap();
        writeln!(file, "0003,Male,1,2,Month-to-month,Mailed check,53.85,108.15,Yes").unwrap();
        writeln!(file, "0004,Female,0,0,Two year,Bank transfer (automatic),52.55, ,No").unwrap();
        writeln!(file, "0005,Female,1,8,Month-to-month,Electronic check,99.65,820.5,Yes").unwrap();
        file
    }

    #[test]
    fn test_load_derives_churn_binary() {
        let file = create_test_csv();
        let data = load_customer_data(file.path()).unwrap();

        assert_eq!(data.len(), 5);
        assert!(data.has_column(CHURN_COLUMN));
        let labels = data.churn_labels().unwrap();
        assert_eq!(
            labels,
            vec![Some(false), Some(false), Some(true), Some(false), Some(true)]
        );
    }

    #[test]
    fn test_blank_total_charges_become_null() {
        let file = create_test_csv();
        let data = load_customer_data(file.path()).unwrap();

        let totals = data.numeric("totalcharges").unwrap();
        assert_eq!(totals[0], Some(29.85));
        assert_eq!(totals[3], None);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = load_customer_data("customers.pkl");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Unsupported file format"));
    }

    #[test]
    fn test_missing_file() {
        let result = load_customer_data("/nonexistent/telco-customer.csv");
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_missing_churn_columns_rejected() {
        let df = df!("tenure" => &[1i64, 2]).unwrap();
        assert!(ChurnData::from_frame(df).is_err());
    }

    #[test]
    fn test_filter_by_category_and_range() {
        let file = create_test_csv();
        let data = load_customer_data(file.path()).unwrap();

        let filter = CustomerFilter::default()
            .with_category("contract", Some("Month-to-month"))
            .with_category("paymentmethod", Some("All"))
            .with_tenure(Some((0.0, 5.0)));
        let subset = data.filter(&filter).unwrap();
        assert_eq!(subset.len(), 2);

        let senior = CustomerFilter::default().with_category("seniorcitizen", Some("1"));
        assert_eq!(data.filter(&senior).unwrap().len(), 2);
    }

    #[test]
    fn test_header_only_table_rejected() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "customerid,tenure,monthlycharges,baja").unwrap();

        let err = load_customer_data(file.path()).unwrap_err().to_string();
        assert!(err.contains("no rows"), "unexpected error: {}", err);
    }

    #[test]
    fn test_nan_charges_are_missing() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "tenure,monthlycharges,baja").unwrap();
        writeln!(file, "1,NaN,Yes").unwrap();
        writeln!(file, "5,20.0,No").unwrap();
        writeln!(file, "9,30.0,Yes").unwrap();

        let data = load_customer_data(file.path()).unwrap();
        assert_eq!(
            data.numeric("monthlycharges").unwrap(),
            vec![None, Some(20.0), Some(30.0)]
        );
    }

    #[test]
    fn test_all_sentinel_is_case_insensitive() {
        let filter = CustomerFilter::default()
            .with_category("contract", Some("all"))
            .with_category("paymentmethod", Some("ALL"))
            .with_category("gender", None);
        assert!(filter.is_empty());

        let file = create_test_csv();
        let data = load_customer_data(file.path()).unwrap();
        assert_eq!(data.filter(&filter).unwrap().len(), 5);
    }

    #[test]
    fn test_filter_skips_unknown_columns() {
        let file = create_test_csv();
        let data = load_customer_data(file.path()).unwrap();

        let filter = CustomerFilter::default().with_category("partner", Some("Yes"));
        assert!(!filter.is_empty());
        assert_eq!(data.filter(&filter).unwrap().len(), 5);
    }

    #[test]
    fn test_distinct_values_sorted() {
        let file = create_test_csv();
        let data = load_customer_data(file.path()).unwrap();

        let contracts = data.distinct_values("contract").unwrap();
        assert_eq!(contracts, vec!["Month-to-month", "One year", "Two year"]);
        assert!(data.numeric_column_names().contains(&"tenure".to_string()));
    }
}
