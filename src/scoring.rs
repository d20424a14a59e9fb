//! Churn-risk estimation for a single customer profile
//!
//! Two estimators share the [`ChurnEstimator`] seam: the rule-based
//! [`HeuristicScorer`] and the pre-trained gradient-boosted model in
//! [`crate::model`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Population churn rate used as the gauge reference, in percent
pub const BASELINE_CHURN_PCT: f64 = 26.5;
pub const MAX_TENURE_MONTHS: u32 = 72;
pub const MAX_MONTHLY_CHARGES: f64 = 200.0;

/// Errors raised while building a customer profile
#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("unknown {field} '{value}' (expected one of: {expected})")]
    UnknownValue {
        field: &'static str,
        value: String,
        expected: String,
    },

    #[error("tenure must be between 0 and 72 months, got {0}")]
    TenureOutOfRange(u32),

    #[error("monthly charges must be between 0 and 200, got {0}")]
    ChargesOutOfRange(f64),
}

/// Lowercase alphanumerics only, so "Month-to-month" == "month_to_month"
fn canonical(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn parse_label<T: Copy>(
    field: &'static str,
    input: &str,
    options: &[(T, &'static str, &'static [&'static str])],
) -> Result<T, ProfileError> {
    let key = canonical(input);
    options
        .iter()
        .find(|(_, label, aliases)| canonical(label) == key || aliases.iter().any(|a| *a == key))
        .map(|(value, _, _)| *value)
        .ok_or_else(|| ProfileError::UnknownValue {
            field,
            value: input.to_string(),
            expected: options
                .iter()
                .map(|(_, label, _)| *label)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contract {
    MonthToMonth,
    OneYear,
    TwoYear,
}

impl Contract {
    pub const ALL: [Contract; 3] = [Contract::MonthToMonth, Contract::OneYear, Contract::TwoYear];

    pub fn label(&self) -> &'static str {
        match self {
            Contract::MonthToMonth => "Month-to-month",
            Contract::OneYear => "One year",
            Contract::TwoYear => "Two year",
        }
    }
}

impl FromStr for Contract {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(
            "contract",
            s,
            &[
                (Contract::MonthToMonth, "Month-to-month", &["monthly", "m2m"]),
                (Contract::OneYear, "One year", &["1year", "annual"]),
                (Contract::TwoYear, "Two year", &["2year"]),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InternetService {
    None,
    Dsl,
    FiberOptic,
}

impl InternetService {
    pub const ALL: [InternetService; 3] = [
        InternetService::None,
        InternetService::Dsl,
        InternetService::FiberOptic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InternetService::None => "No",
            InternetService::Dsl => "DSL",
            InternetService::FiberOptic => "Fiber optic",
        }
    }
}

impl FromStr for InternetService {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(
            "internet service",
            s,
            &[
                (InternetService::None, "No", &["none"]),
                (InternetService::Dsl, "DSL", &[]),
                (InternetService::FiberOptic, "Fiber optic", &["fiber", "fibre"]),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    ElectronicCheck,
    MailedCheck,
    BankTransfer,
    CreditCard,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::ElectronicCheck,
        PaymentMethod::MailedCheck,
        PaymentMethod::BankTransfer,
        PaymentMethod::CreditCard,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::ElectronicCheck => "Electronic check",
            PaymentMethod::MailedCheck => "Mailed check",
            PaymentMethod::BankTransfer => "Bank transfer (automatic)",
            PaymentMethod::CreditCard => "Credit card (automatic)",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(
            "payment method",
            s,
            &[
                (PaymentMethod::ElectronicCheck, "Electronic check", &["echeck"]),
                (PaymentMethod::MailedCheck, "Mailed check", &[]),
                (PaymentMethod::BankTransfer, "Bank transfer (automatic)", &["banktransfer"]),
                (PaymentMethod::CreditCard, "Credit card (automatic)", &["creditcard"]),
            ],
        )
    }
}

macro_rules! display_label {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

display_label!(Contract, InternetService, PaymentMethod);

/// Inputs collected for an individual churn prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub tenure_months: u32,
    pub monthly_charges: f64,
    pub senior_citizen: bool,
    pub contract: Contract,
    pub internet_service: InternetService,
    pub multiple_lines: bool,
    pub payment_method: PaymentMethod,
    pub tech_support: bool,
    pub streaming_tv: bool,
}

impl Default for CustomerProfile {
    fn default() -> Self {
        Self {
            tenure_months: 12,
            monthly_charges: 70.0,
            senior_citizen: false,
            contract: Contract::MonthToMonth,
            internet_service: InternetService::None,
            multiple_lines: false,
            payment_method: PaymentMethod::ElectronicCheck,
            tech_support: false,
            streaming_tv: false,
        }
    }
}

impl CustomerProfile {
    /// Reject values outside the ranges the predictor accepts
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.tenure_months > MAX_TENURE_MONTHS {
            return Err(ProfileError::TenureOutOfRange(self.tenure_months));
        }
        if !(0.0..=MAX_MONTHLY_CHARGES).contains(&self.monthly_charges) {
            return Err(ProfileError::ChargesOutOfRange(self.monthly_charges));
        }
        Ok(())
    }
}

/// Anything that turns a customer profile into a churn probability
pub trait ChurnEstimator {
    fn name(&self) -> &str;

    /// Probability in `[0, 1]` that the customer leaves
    fn predict_proba(&self, profile: &CustomerProfile) -> crate::Result<f64>;
}

/// One rule that fired while scoring a profile
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub reason: &'static str,
    pub delta: f64,
}

/// Linear business-rule scorer starting from the population churn rate
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    pub base_rate: f64,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self { base_rate: 0.26 }
    }
}

impl HeuristicScorer {
    /// Rules that apply to a profile, in evaluation order
    pub fn adjustments(&self, profile: &CustomerProfile) -> Vec<Adjustment> {
        let mut out = Vec::new();
        let mut add = |reason, delta| out.push(Adjustment { reason, delta });

        match profile.contract {
            Contract::MonthToMonth => add("month-to-month contract", 0.20),
            Contract::TwoYear => add("two-year contract", -0.20),
            Contract::OneYear => {}
        }

        if profile.tenure_months < 12 {
            add("tenure under 12 months", 0.15);
        } else if profile.tenure_months > 24 {
            add("tenure over 24 months", -0.15);
        }

        if profile.multiple_lines {
            add("multiple lines", -0.08);
        }
        if profile.tech_support {
            add("tech support", -0.10);
        }
        if profile.payment_method == PaymentMethod::ElectronicCheck {
            add("electronic check payment", 0.10);
        }
        if profile.senior_citizen {
            add("senior citizen", 0.05);
        }

        out
    }

    /// Base rate plus every applicable adjustment, clamped to `[0, 1]`
    pub fn score(&self, profile: &CustomerProfile) -> f64 {
        let raw = self.base_rate
            + self
                .adjustments(profile)
                .iter()
                .map(|a| a.delta)
                .sum::<f64>();
        raw.clamp(0.0, 1.0)
    }
}

impl ChurnEstimator for HeuristicScorer {
    fn name(&self) -> &str {
        "heuristic rules"
    }

    fn predict_proba(&self, profile: &CustomerProfile) -> crate::Result<f64> {
        profile.validate()?;
        Ok(self.score(profile))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_probability(p: f64) -> Self {
        if p > 0.7 {
            RiskLevel::Critical
        } else if p > 0.5 {
            RiskLevel::High
        } else if p > 0.3 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A titled group of recommended actions
pub type ActionGroup = (&'static str, &'static [&'static str]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPlan {
    HighPriority,
    Maintenance,
}

impl RetentionPlan {
    pub fn for_probability(p: f64) -> Self {
        if p > 0.5 {
            RetentionPlan::HighPriority
        } else {
            RetentionPlan::Maintenance
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RetentionPlan::HighPriority => "High-priority retention plan",
            RetentionPlan::Maintenance => "Maintenance plan",
        }
    }

    pub fn actions(&self) -> &'static [ActionGroup] {
        match self {
            RetentionPlan::HighPriority => &[
                (
                    "Immediate special offer",
                    &[
                        "25% discount on upgrading to an annual contract",
                        "3 free months of premium streaming",
                    ],
                ),
                (
                    "Personal contact",
                    &["Assign to the VIP retention team", "Call within 24 hours"],
                ),
                (
                    "Payment incentive",
                    &[
                        "$50 bonus for switching to automatic payment",
                        "Fee-free billing for 6 months",
                    ],
                ),
                (
                    "Follow-up",
                    &[
                        "Personalised satisfaction survey",
                        "Monthly check-in for 3 months",
                    ],
                ),
            ],
            RetentionPlan::Maintenance => &[
                (
                    "Loyalty programme",
                    &["Points for every month of tenure", "Renewal discounts"],
                ),
                (
                    "Proactive communication",
                    &["Monthly newsletter with tips", "Exclusive offers for loyal customers"],
                ),
                (
                    "Soft upselling",
                    &["Suggest complementary services", "Bundle promotions"],
                ),
            ],
        }
    }
}

/// Scored outcome for one profile
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub probability: f64,
    pub risk: RiskLevel,
    pub plan: RetentionPlan,
}

impl Prediction {
    pub fn from_probability(probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            probability,
            risk: RiskLevel::from_probability(probability),
            plan: RetentionPlan::for_probability(probability),
        }
    }

    pub fn percent(&self) -> f64 {
        self.probability * 100.0
    }

    /// Percentage points above (or below) the population baseline
    pub fn delta_vs_baseline(&self) -> f64 {
        self.percent() - BASELINE_CHURN_PCT
    }
}

/// Score a profile with any estimator
pub fn predict(estimator: &dyn ChurnEstimator, profile: &CustomerProfile) -> crate::Result<Prediction> {
    let probability = estimator.predict_proba(profile)?;
    Ok(Prediction::from_probability(probability))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_worst_case_profile() {
        let profile = CustomerProfile {
            tenure_months: 3,
            senior_citizen: true,
            ..CustomerProfile::default()
        };
        // 0.26 + 0.20 + 0.15 + 0.10 + 0.05
        let p = HeuristicScorer::default().score(&profile);
        assert!(approx(p, 0.76));
        assert_eq!(RiskLevel::from_probability(p), RiskLevel::Critical);
    }

    #[test]
    fn test_loyal_profile_clamps_to_zero() {
        let profile = CustomerProfile {
            tenure_months: 60,
            contract: Contract::TwoYear,
            multiple_lines: true,
            tech_support: true,
            payment_method: PaymentMethod::CreditCard,
            ..CustomerProfile::default()
        };
        // 0.26 - 0.20 - 0.15 - 0.08 - 0.10 < 0
        assert_eq!(HeuristicScorer::default().score(&profile), 0.0);
    }

    #[test]
    fn test_tenure_band_boundaries() {
        let scorer = HeuristicScorer::default();
        let at = |tenure_months| {
            scorer.score(&CustomerProfile {
                tenure_months,
                contract: Contract::OneYear,
                payment_method: PaymentMethod::MailedCheck,
                ..CustomerProfile::default()
            })
        };

        assert!(approx(at(11), 0.41));
        assert!(approx(at(12), 0.26));
        assert!(approx(at(24), 0.26));
        assert!(approx(at(25), 0.11));
    }

    #[test]
    fn test_adjustments_report_reasons() {
        let scorer = HeuristicScorer::default();
        assert_eq!(scorer.name(), "heuristic rules");
        let adjustments = scorer.adjustments(&CustomerProfile::default());
        let reasons: Vec<&str> = adjustments.iter().map(|a| a.reason).collect();
        assert_eq!(
            reasons,
            vec!["month-to-month contract", "electronic check payment"]
        );
    }

    #[test]
    fn test_risk_thresholds_are_exclusive() {
        assert_eq!(RiskLevel::from_probability(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(0.5), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(0.3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.31), RiskLevel::Moderate);
    }

    #[test]
    fn test_retention_plan_selection() {
        assert_eq!(RetentionPlan::for_probability(0.51), RetentionPlan::HighPriority);
        assert_eq!(RetentionPlan::for_probability(0.5), RetentionPlan::Maintenance);
        assert_eq!(RetentionPlan::HighPriority.actions().len(), 4);
    }

    #[test]
    fn test_prediction_delta() {
        let prediction = Prediction::from_probability(0.46);
        assert!(approx(prediction.delta_vs_baseline(), 19.5));
        assert_eq!(prediction.risk, RiskLevel::Moderate);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("month-to-month".parse::<Contract>().unwrap(), Contract::MonthToMonth);
        assert_eq!("Two year".parse::<Contract>().unwrap(), Contract::TwoYear);
        assert_eq!(
            "Bank transfer (automatic)".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert_eq!("credit-card".parse::<PaymentMethod>().unwrap(), PaymentMethod::CreditCard);
        assert_eq!("fiber".parse::<InternetService>().unwrap(), InternetService::FiberOptic);
        assert!("weekly".parse::<Contract>().is_err());
    }

    #[test]
    fn test_validation() {
        let profile = CustomerProfile {
            tenure_months: 80,
            ..CustomerProfile::default()
        };
        assert_eq!(profile.validate(), Err(ProfileError::TenureOutOfRange(80)));

        let profile = CustomerProfile {
            monthly_charges: 250.0,
            ..CustomerProfile::default()
        };
        assert!(HeuristicScorer::default().predict_proba(&profile).is_err());
    }
}
