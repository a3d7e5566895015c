//! Goal planning records: inputs, breakdowns, daily-flow configuration and targets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::types::error::{self, FieldError, FlowError};

// =============================================================================
// Vertical
// =============================================================================

/// Supported business verticals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalId {
    NetworkMarketing,
    RealEstate,
    Finance,
    Coaching,
}

impl VerticalId {
    pub const ALL: [VerticalId; 4] = [
        VerticalId::NetworkMarketing,
        VerticalId::RealEstate,
        VerticalId::Finance,
        VerticalId::Coaching,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkMarketing => "network_marketing",
            Self::RealEstate => "real_estate",
            Self::Finance => "finance",
            Self::Coaching => "coaching",
        }
    }
}

impl fmt::Display for VerticalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VerticalId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "network_marketing" | "mlm" => Ok(Self::NetworkMarketing),
            "real_estate" | "immobilien" => Ok(Self::RealEstate),
            "finance" | "financial" => Ok(Self::Finance),
            "coaching" | "coach" => Ok(Self::Coaching),
            _ => Err(format!(
                "Unknown vertical '{}'. Valid values: network_marketing, real_estate, finance, coaching",
                s
            )),
        }
    }
}

// =============================================================================
// Goal Input
// =============================================================================

/// What the user wants to reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Income,
    Rank,
    Deals,
    Volume,
    Customers,
    Partners,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Rank => "rank",
            Self::Deals => "deals",
            Self::Volume => "volume",
            Self::Customers => "customers",
            Self::Partners => "partners",
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "rank" => Ok(Self::Rank),
            "deals" => Ok(Self::Deals),
            "volume" => Ok(Self::Volume),
            "customers" => Ok(Self::Customers),
            "partners" => Ok(Self::Partners),
            _ => Err(format!(
                "Unknown goal type '{}'. Valid values: income, rank, deals, volume, customers, partners",
                s
            )),
        }
    }
}

/// User-supplied goal
///
/// `vertical_id` stays a raw string so that unknown verticals can be resolved
/// to the default adapter instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalInput {
    pub vertical_id: String,
    pub goal_type: GoalType,
    pub target_value: f64,
    pub timeframe_months: u32,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub target_rank_id: Option<String>,
}

impl GoalInput {
    pub fn new(
        vertical: VerticalId,
        goal_type: GoalType,
        target_value: f64,
        timeframe_months: u32,
    ) -> Self {
        Self {
            vertical_id: vertical.as_str().to_string(),
            goal_type,
            target_value,
            timeframe_months,
            current_value: None,
            target_rank_id: None,
        }
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current_value = Some(current);
        self
    }

    pub fn with_rank(mut self, rank_id: impl Into<String>) -> Self {
        self.target_rank_id = Some(rank_id.into());
        self
    }

    /// Remaining amount after subtracting progress already made
    pub fn needed(&self) -> f64 {
        self.target_value - self.current_value.unwrap_or(0.0).max(0.0)
    }
}

// =============================================================================
// Goal Breakdown
// =============================================================================

/// Computed plan for a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalBreakdown {
    pub vertical_id: VerticalId,
    pub goal_type: GoalType,
    pub timeframe_months: u32,
    pub primary_unit_label: String,
    pub primary_units: u64,
    pub per_month: f64,
    pub per_week: f64,
    pub secondary_units: BTreeMap<String, f64>,
    pub target_income_monthly: Option<f64>,
    /// Inputs and constants used, so explainers can reconstruct the reasoning
    pub assumptions: BTreeMap<String, serde_json::Value>,
    pub confidence: f64,
}

impl GoalBreakdown {
    pub fn secondary(&self, key: &str) -> Option<f64> {
        self.secondary_units.get(key).copied()
    }

    /// True when the breakdown was produced for an already-met goal
    pub fn is_goal_met(&self) -> bool {
        self.assumptions
            .get("goal_already_met")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

// =============================================================================
// Daily Flow
// =============================================================================

/// Conversion assumptions feeding the daily-flow formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFlowConfig {
    pub working_days_per_week: u8,
    /// Share of contacts that convert into one primary unit
    pub contact_to_primary_unit: f64,
    /// Follow-up touches needed per primary unit
    pub followups_per_primary: f64,
    pub reactivation_share: f64,
    pub has_appointments: bool,
    pub appointment_conversion: f64,
}

impl Default for DailyFlowConfig {
    fn default() -> Self {
        Self {
            working_days_per_week: 5,
            contact_to_primary_unit: 0.1,
            followups_per_primary: 3.0,
            reactivation_share: 0.1,
            has_appointments: false,
            appointment_conversion: 0.0,
        }
    }
}

impl DailyFlowConfig {
    /// Collect every out-of-range field
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if !(1..=7).contains(&self.working_days_per_week) {
            errors.push(FieldError::new(
                "working_days_per_week",
                format!("must be between 1 and 7, got {}", self.working_days_per_week),
            ));
        }

        for (field, value) in [
            ("contact_to_primary_unit", self.contact_to_primary_unit),
            ("reactivation_share", self.reactivation_share),
            ("appointment_conversion", self.appointment_conversion),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                errors.push(FieldError::new(
                    field,
                    format!("must be a rate between 0 and 1, got {}", value),
                ));
            }
        }

        if !self.followups_per_primary.is_finite() || self.followups_per_primary < 0.0 {
            errors.push(FieldError::new(
                "followups_per_primary",
                format!("must be >= 0, got {}", self.followups_per_primary),
            ));
        }

        errors
    }
}

/// Daily quotas with weekly mirrors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyFlowTargets {
    pub working_days_per_week: u8,
    pub new_contacts: u32,
    pub followups: u32,
    pub reactivations: u32,
    pub appointments: Option<u32>,
    /// Team calls per week (network marketing only)
    pub team_calls: Option<u32>,
    pub weekly_contacts: u32,
    pub weekly_followups: u32,
    pub weekly_reactivations: u32,
    pub weekly_appointments: Option<u32>,
}

impl DailyFlowTargets {
    /// Build targets with weekly mirrors derived from the daily quotas
    pub fn from_daily(
        working_days_per_week: u8,
        new_contacts: u32,
        followups: u32,
        reactivations: u32,
    ) -> error::Result<Self> {
        Ok(Self {
            working_days_per_week,
            new_contacts,
            followups,
            reactivations,
            appointments: None,
            team_calls: None,
            weekly_contacts: weekly(new_contacts, working_days_per_week, "contacts")?,
            weekly_followups: weekly(followups, working_days_per_week, "follow-ups")?,
            weekly_reactivations: weekly(reactivations, working_days_per_week, "reactivations")?,
            weekly_appointments: None,
        })
    }

    /// Replace the contacts quota, keeping the weekly mirror in sync
    pub fn set_new_contacts(&mut self, value: u32) -> error::Result<()> {
        self.weekly_contacts = weekly(value, self.working_days_per_week, "contacts")?;
        self.new_contacts = value;
        Ok(())
    }

    pub fn set_appointments(&mut self, value: u32) -> error::Result<()> {
        self.weekly_appointments = Some(weekly(value, self.working_days_per_week, "appointments")?);
        self.appointments = Some(value);
        Ok(())
    }
}

fn weekly(daily: u32, working_days: u8, what: &str) -> error::Result<u32> {
    daily.checked_mul(u32::from(working_days)).ok_or_else(|| {
        FlowError::computation(
            "daily_flow",
            format!("weekly {} overflowed: {} per day", what, daily),
        )
    })
}

// =============================================================================
// KPIs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiAggregation {
    Sum,
    Avg,
    Max,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiPeriod {
    Daily,
    Weekly,
    Monthly,
    Total,
}

/// A tracked metric for a vertical
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiDefinition {
    pub id: String,
    pub label: String,
    pub unit: String,
    pub aggregation: KpiAggregation,
    pub period: KpiPeriod,
    pub is_primary: bool,
}

impl KpiDefinition {
    pub fn new(
        id: &str,
        label: &str,
        unit: &str,
        aggregation: KpiAggregation,
        period: KpiPeriod,
    ) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            aggregation,
            period,
            is_primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Vertical listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerticalInfo {
    pub id: VerticalId,
    pub label: String,
    pub kpis: Vec<KpiDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_parse() {
        assert_eq!(
            "network_marketing".parse::<VerticalId>().unwrap(),
            VerticalId::NetworkMarketing
        );
        assert_eq!(
            "Real-Estate".parse::<VerticalId>().unwrap(),
            VerticalId::RealEstate
        );
        assert!("insurance_broker".parse::<VerticalId>().is_err());
    }

    #[test]
    fn test_weekly_mirrors() {
        let mut targets = DailyFlowTargets::from_daily(5, 4, 3, 1).unwrap();
        assert_eq!(targets.weekly_contacts, 20);
        assert_eq!(targets.weekly_followups, 15);
        assert_eq!(targets.weekly_reactivations, 5);

        targets.set_new_contacts(6).unwrap();
        assert_eq!(targets.weekly_contacts, 30);
    }

    #[test]
    fn test_weekly_mirror_overflow_is_an_error() {
        let err = DailyFlowTargets::from_daily(7, u32::MAX / 2, 1, 0).unwrap_err();
        assert_eq!(err.code(), "ADAPTER_COMPUTATION_ERROR");

        let mut targets = DailyFlowTargets::from_daily(5, 4, 3, 1).unwrap();
        assert!(targets.set_new_contacts(u32::MAX).is_err());
        assert_eq!(targets.new_contacts, 4);
        assert!(targets.set_appointments(u32::MAX).is_err());
        assert_eq!(targets.appointments, None);
    }

    #[test]
    fn test_flow_config_validation() {
        let config = DailyFlowConfig {
            working_days_per_week: 0,
            contact_to_primary_unit: 1.5,
            ..DailyFlowConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(DailyFlowConfig::default().validate().is_empty());
    }

    #[test]
    fn test_needed_ignores_negative_current() {
        let input = GoalInput::new(VerticalId::Finance, GoalType::Income, 5000.0, 12)
            .with_current(-100.0);
        assert_eq!(input.needed(), 5000.0);
    }
}
