//! Command-line interface definitions and argument parsing

use crate::data::CustomerFilter;
use crate::scoring::{Contract, CustomerProfile, InternetService, PaymentMethod};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Telecom customer churn analytics: KPIs, breakdowns, charts and churn-risk scoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the cleaned customer CSV
    #[arg(
        short,
        long,
        global = true,
        env = "CHURNSCOPE_DATA",
        default_value = "clean_data/telco-customer.csv"
    )]
    pub input: PathBuf,

    /// Directory where PNG charts are written
    #[arg(short, long, global = true, env = "CHURNSCOPE_OUTPUT_DIR", default_value = "charts")]
    pub output_dir: PathBuf,

    /// Print reports only, skip chart rendering
    #[arg(long, global = true)]
    pub no_charts: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Headline KPIs, dataset summary, insights and a quick churn breakdown
    Overview(OverviewArgs),
    /// Filterable executive panel
    Dashboard(DashboardArgs),
    /// Exploratory analysis of numeric and categorical variables
    Eda(EdaArgs),
    /// Churn probability for a single customer
    Predict(PredictArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct OverviewArgs {
    /// Variable for the quick churn breakdown
    #[arg(long, default_value = "contract")]
    pub variable: String,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DashboardArgs {
    /// Contract type ("All" for no filter)
    #[arg(long)]
    pub contract: Option<String>,

    #[arg(long)]
    pub internet_service: Option<String>,

    #[arg(long)]
    pub payment_method: Option<String>,

    #[arg(long)]
    pub paperless_billing: Option<String>,

    #[arg(long)]
    pub senior_citizen: Option<String>,

    #[arg(long)]
    pub partner: Option<String>,

    #[arg(long)]
    pub dependents: Option<String>,

    /// Tenure range in months as "min,max"
    /// Example: --tenure-range "0,12"
    #[arg(long)]
    pub tenure_range: Option<String>,

    /// Monthly charge range as "min,max"
    #[arg(long)]
    pub monthly_range: Option<String>,

    /// Service column shown in the services breakdown
    #[arg(long, default_value = "internetservice")]
    pub service: String,

    /// Profile column shown in the customer profile breakdown
    #[arg(long, default_value = "gender")]
    pub profile: String,
}

impl DashboardArgs {
    /// Build the customer filter from the selected options
    pub fn to_filter(&self) -> crate::Result<CustomerFilter> {
        let filter = CustomerFilter::default()
            .with_category("contract", self.contract.as_deref())
            .with_category("internetservice", self.internet_service.as_deref())
            .with_category("paymentmethod", self.payment_method.as_deref())
            .with_category("paperlessbilling", self.paperless_billing.as_deref())
            .with_category("seniorcitizen", self.senior_citizen.as_deref())
            .with_category("partner", self.partner.as_deref())
            .with_category("dependents", self.dependents.as_deref())
            .with_tenure(parse_range("tenure", self.tenure_range.as_deref())?)
            .with_monthly_charges(parse_range("monthly charges", self.monthly_range.as_deref())?);
        Ok(filter)
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct EdaArgs {
    /// Numeric variable: tenure, monthlycharges or totalcharges
    #[arg(long, default_value = "tenure")]
    pub numeric: String,

    /// Categorical variable: contract, paymentmethod, internetservice or multiplelines
    #[arg(long, default_value = "contract")]
    pub categorical: String,

    /// Number of histogram bins
    #[arg(long, default_value = "50")]
    pub bins: usize,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PredictArgs {
    /// Tenure in months (0-72)
    #[arg(long, default_value = "12", value_parser = clap::value_parser!(u32).range(0..=72))]
    pub tenure: u32,

    /// Monthly charge in dollars (0-200)
    #[arg(long, default_value = "70.0")]
    pub monthly_charges: f64,

    #[arg(long)]
    pub senior_citizen: bool,

    /// Month-to-month, One year or Two year
    #[arg(long, default_value = "Month-to-month")]
    pub contract: Contract,

    /// No, DSL or Fiber optic
    #[arg(long, default_value = "No")]
    pub internet_service: InternetService,

    #[arg(long)]
    pub multiple_lines: bool,

    /// Electronic check, Mailed check, Bank transfer (automatic) or Credit card (automatic)
    #[arg(long, default_value = "Electronic check")]
    pub payment_method: PaymentMethod,

    #[arg(long)]
    pub tech_support: bool,

    #[arg(long)]
    pub streaming_tv: bool,

    /// Pre-trained gradient-boosted model (JSON); heuristic rules when omitted
    #[arg(long, env = "CHURNSCOPE_MODEL")]
    pub model: Option<PathBuf>,
}

impl PredictArgs {
    pub fn to_profile(&self) -> crate::Result<CustomerProfile> {
        let profile = CustomerProfile {
            tenure_months: self.tenure,
            monthly_charges: self.monthly_charges,
            senior_citizen: self.senior_citizen,
            contract: self.contract,
            internet_service: self.internet_service,
            multiple_lines: self.multiple_lines,
            payment_method: self.payment_method,
            tech_support: self.tech_support,
            streaming_tv: self.streaming_tv,
        };
        profile.validate()?;
        Ok(profile)
    }
}

/// Parse an inclusive "min,max" range
pub fn parse_range(name: &str, raw: Option<&str>) -> crate::Result<Option<(f64, f64)>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("{} range must be in format 'min,max'", name);
    }

    let lo: f64 = parts[0]
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {} minimum: {}", name, parts[0]))?;
    let hi: f64 = parts[1]
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {} maximum: {}", name, parts[1]))?;

    if lo > hi {
        anyhow::bail!("{} range minimum {} exceeds maximum {}", name, lo, hi);
    }
    Ok(Some((lo, hi)))
}
