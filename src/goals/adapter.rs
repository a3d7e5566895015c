//! Vertical adapter contract and the shared daily-flow formula.
//!
//! Adapters are stateless computation modules. Each one knows its conversion
//! defaults, KPI definitions, and how to turn a [`GoalInput`] into a
//! [`GoalBreakdown`]. The daily-flow step is shared ([`default_daily_flow`])
//! and adapters only layer documented adjustments on top of it.

use serde_json::json;
use std::collections::BTreeMap;

use crate::constants::planning;
use crate::types::{
    DailyFlowConfig, DailyFlowTargets, FieldError, FlowError, GoalBreakdown, GoalInput, GoalType,
    KpiDefinition, Result, VerticalId,
};

/// Per-vertical goal computation
pub trait VerticalAdapter: Send + Sync {
    fn vertical_id(&self) -> VerticalId;

    /// Human label, e.g. "Real Estate"
    fn label(&self) -> &'static str;

    fn default_conversion_config(&self) -> DailyFlowConfig;

    fn kpi_definitions(&self) -> Vec<KpiDefinition>;

    /// Goal types this vertical can plan for
    fn supported_goal_types(&self) -> &'static [GoalType];

    /// Collect every field problem in `input`
    fn validate_goal_input(&self, input: &GoalInput) -> Vec<FieldError> {
        validate_common(input, self.vertical_id(), self.supported_goal_types())
    }

    fn compute_goal_breakdown(&self, input: &GoalInput) -> Result<GoalBreakdown>;

    /// Daily quotas for a breakdown; `None` uses the vertical's default conversion config
    fn compute_daily_flow_targets(
        &self,
        breakdown: &GoalBreakdown,
        config: Option<&DailyFlowConfig>,
    ) -> Result<DailyFlowTargets> {
        let config = config
            .cloned()
            .unwrap_or_else(|| self.default_conversion_config());
        default_daily_flow(self.vertical_id(), breakdown, &config)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Checks shared by every vertical
pub fn validate_common(
    input: &GoalInput,
    vertical: VerticalId,
    supported: &[GoalType],
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if !(planning::MIN_TIMEFRAME_MONTHS..=planning::MAX_TIMEFRAME_MONTHS)
        .contains(&input.timeframe_months)
    {
        errors.push(FieldError::new(
            "timeframe_months",
            format!(
                "must be between {} and {}, got {}",
                planning::MIN_TIMEFRAME_MONTHS,
                planning::MAX_TIMEFRAME_MONTHS,
                input.timeframe_months
            ),
        ));
    }

    if !input.target_value.is_finite() || input.target_value <= 0.0 {
        errors.push(FieldError::new(
            "target_value",
            format!("must be a positive number, got {}", input.target_value),
        ));
    }

    if let Some(current) = input.current_value
        && (!current.is_finite() || current < 0.0)
    {
        errors.push(FieldError::new(
            "current_value",
            format!("must be >= 0, got {}", current),
        ));
    }

    if !supported.contains(&input.goal_type) {
        let names: Vec<&str> = supported.iter().map(|g| g.as_str()).collect();
        errors.push(FieldError::new(
            "goal_type",
            format!(
                "'{}' is not supported by {}; supported: {}",
                input.goal_type,
                vertical,
                names.join(", ")
            ),
        ));
    }

    if input.goal_type == GoalType::Rank
        && input
            .target_rank_id
            .as_deref()
            .is_none_or(|r| r.trim().is_empty())
    {
        errors.push(FieldError::new(
            "target_rank_id",
            "is required for rank goals",
        ));
    }

    errors
}

/// Error for a goal type the adapter cannot plan
pub fn unsupported_goal_type(vertical: VerticalId, goal_type: GoalType) -> FlowError {
    FlowError::invalid_field(
        "goal_type",
        format!("'{}' is not supported by {}", goal_type, vertical),
    )
}

// =============================================================================
// Arithmetic Helpers
// =============================================================================

/// Round to `planning::RATE_DECIMALS` places
pub fn round_rate(value: f64) -> f64 {
    let factor = 10f64.powi(planning::RATE_DECIMALS);
    (value * factor).round() / factor
}

/// Ceiling that ignores float noise (25000.000000000004 stays 25000)
pub fn ceil_clean(value: f64) -> f64 {
    ((value * 1e6).round() / 1e6).ceil()
}

/// Checked division; zero or non-finite denominators are a computation error
pub fn checked_div(vertical: VerticalId, numerator: f64, denominator: f64, what: &str) -> Result<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return Err(FlowError::computation(
            vertical.as_str(),
            format!("cannot compute {}: {} / {}", what, numerator, denominator),
        ));
    }
    let result = numerator / denominator;
    if !result.is_finite() {
        return Err(FlowError::computation(
            vertical.as_str(),
            format!("{} overflowed", what),
        ));
    }
    Ok(result)
}

/// Whole units needed to cover `value`, ceiling-rounded so plans never fall short
pub fn needed_units(vertical: VerticalId, value: f64, what: &str) -> Result<u64> {
    if !value.is_finite() || value < 0.0 {
        return Err(FlowError::computation(
            vertical.as_str(),
            format!("{} is not a finite non-negative number: {}", what, value),
        ));
    }
    let units = ceil_clean(value);
    if units > u64::MAX as f64 / 2.0 {
        return Err(FlowError::computation(
            vertical.as_str(),
            format!("{} overflowed: {}", what, units),
        ));
    }
    Ok(units as u64)
}

/// Non-negative quota rounded up; values beyond `u32` are a computation error
pub fn quota(vertical: VerticalId, value: f64, what: &str) -> Result<u32> {
    if !value.is_finite() || value < 0.0 {
        return Err(FlowError::computation(
            vertical.as_str(),
            format!("{} quota is not finite: {}", what, value),
        ));
    }
    let rounded = ceil_clean(value);
    if rounded > f64::from(u32::MAX) {
        return Err(FlowError::computation(
            vertical.as_str(),
            format!("{} quota overflowed: {}", what, rounded),
        ));
    }
    Ok(rounded as u32)
}

// =============================================================================
// Breakdown Construction
// =============================================================================

/// Skeleton breakdown with unit rates filled in; adapters add secondaries
pub fn base_breakdown(
    vertical: VerticalId,
    input: &GoalInput,
    primary_unit_label: &str,
    primary_units: u64,
    confidence: f64,
) -> Result<GoalBreakdown> {
    if input.timeframe_months == 0 {
        return Err(FlowError::computation(
            vertical.as_str(),
            "timeframe_months is zero",
        ));
    }
    let months = f64::from(input.timeframe_months);
    let units = primary_units as f64;

    let mut assumptions = BTreeMap::new();
    assumptions.insert("target_value".to_string(), json!(input.target_value));
    assumptions.insert("timeframe_months".to_string(), json!(input.timeframe_months));
    if let Some(current) = input.current_value {
        assumptions.insert("current_value".to_string(), json!(current));
    }

    Ok(GoalBreakdown {
        vertical_id: vertical,
        goal_type: input.goal_type,
        timeframe_months: input.timeframe_months,
        primary_unit_label: primary_unit_label.to_string(),
        primary_units,
        per_month: round_rate(units / months),
        per_week: round_rate(units / (months * planning::WEEKS_PER_MONTH)),
        secondary_units: BTreeMap::new(),
        target_income_monthly: None,
        assumptions,
        confidence: confidence.clamp(0.0, 1.0),
    })
}

/// Zero-unit breakdown for a goal that progress already covers
pub fn goal_met_breakdown(
    vertical: VerticalId,
    input: &GoalInput,
    primary_unit_label: &str,
    confidence: f64,
) -> Result<GoalBreakdown> {
    let mut breakdown = base_breakdown(vertical, input, primary_unit_label, 0, confidence)?;
    breakdown
        .assumptions
        .insert("goal_already_met".to_string(), json!(true));
    tracing::debug!(
        "{} goal for {} already met (target {}, current {:?})",
        input.goal_type,
        vertical,
        input.target_value,
        input.current_value
    );
    Ok(breakdown)
}

// =============================================================================
// Daily Flow
// =============================================================================

/// Shared daily-flow formula
///
/// Contacts and follow-ups are floored at 1 per day, reactivations at 0.
/// Weekly mirrors are daily × working days. An appointments line is added
/// when the config asks for one.
pub fn default_daily_flow(
    vertical: VerticalId,
    breakdown: &GoalBreakdown,
    config: &DailyFlowConfig,
) -> Result<DailyFlowTargets> {
    let config_errors = config.validate();
    if !config_errors.is_empty() {
        return Err(FlowError::InvalidGoalInput(
            config_errors
                .into_iter()
                .map(|e| FieldError::new(format!("daily_flow_config.{}", e.field), e.message))
                .collect(),
        ));
    }

    let days_per_month = f64::from(config.working_days_per_week) * planning::WEEKS_PER_MONTH;
    let working_days = f64::from(breakdown.timeframe_months) * days_per_month;
    let primary_per_day = checked_div(
        vertical,
        breakdown.primary_units as f64,
        working_days,
        "primary units per day",
    )?;

    let contacts = if config.contact_to_primary_unit > 0.0 {
        checked_div(
            vertical,
            primary_per_day,
            config.contact_to_primary_unit,
            "contacts per day",
        )?
    } else {
        primary_per_day * planning::ZERO_RATE_CONTACT_MULTIPLIER
    };
    let followups = primary_per_day * config.followups_per_primary;
    let reactivations = (contacts + followups) * config.reactivation_share;

    let mut targets = DailyFlowTargets::from_daily(
        config.working_days_per_week,
        quota(vertical, contacts, "contacts")?.max(1),
        quota(vertical, followups, "follow-ups")?.max(1),
        quota(vertical, reactivations, "reactivations")?,
    )?;

    if config.has_appointments {
        let appointments = checked_div(
            vertical,
            primary_per_day,
            config.appointment_conversion,
            "appointments per day",
        )?;
        targets.set_appointments(quota(vertical, appointments, "appointments")?)?;
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(units: u64, months: u32) -> GoalBreakdown {
        let input = GoalInput::new(VerticalId::Coaching, GoalType::Customers, units as f64, months);
        base_breakdown(VerticalId::Coaching, &input, "clients", units, 0.9).unwrap()
    }

    #[test]
    fn test_ceil_clean_ignores_float_noise() {
        assert_eq!(ceil_clean(2000.0 / 0.08 / 100.0), 250.0);
        assert_eq!(ceil_clean(6.0 / 0.15), 40.0);
        assert_eq!(ceil_clean(40.2), 41.0);
    }

    #[test]
    fn test_round_rate() {
        assert_eq!(round_rate(250.0 / 6.0), 41.67);
        assert_eq!(round_rate(1.0), 1.0);
    }

    #[test]
    fn test_checked_div_rejects_zero() {
        let err = checked_div(VerticalId::Finance, 10.0, 0.0, "x").unwrap_err();
        assert_eq!(err.code(), "ADAPTER_COMPUTATION_ERROR");
    }

    #[test]
    fn test_validate_common_collects_all_errors() {
        let input = GoalInput::new(VerticalId::RealEstate, GoalType::Rank, -5.0, 0);
        let errors = validate_common(&input, VerticalId::RealEstate, &[GoalType::Deals]);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["timeframe_months", "target_value", "goal_type", "target_rank_id"]
        );
    }

    #[test]
    fn test_validate_common_rejects_long_timeframe() {
        let input = GoalInput::new(VerticalId::Coaching, GoalType::Income, 100.0, 61);
        let errors = validate_common(&input, VerticalId::Coaching, &[GoalType::Income]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "timeframe_months");
    }

    #[test]
    fn test_default_flow_floors_and_mirrors() {
        let targets =
            default_daily_flow(VerticalId::Coaching, &breakdown(0, 3), &DailyFlowConfig::default())
                .unwrap();
        assert_eq!(targets.new_contacts, 1);
        assert_eq!(targets.followups, 1);
        assert_eq!(targets.reactivations, 0);
        assert_eq!(targets.weekly_contacts, 5);
        assert!(targets.appointments.is_none());
    }

    #[test]
    fn test_default_flow_zero_contact_rate_uses_multiplier() {
        let config = DailyFlowConfig {
            contact_to_primary_unit: 0.0,
            ..DailyFlowConfig::default()
        };
        // 650 units over 129.9 working days is just over 5 per day, times 5 rounds up to 26
        let targets = default_daily_flow(VerticalId::Coaching, &breakdown(650, 6), &config).unwrap();
        assert_eq!(targets.new_contacts, 26);
    }

    #[test]
    fn test_default_flow_rejects_invalid_config() {
        let config = DailyFlowConfig {
            working_days_per_week: 0,
            ..DailyFlowConfig::default()
        };
        let err = default_daily_flow(VerticalId::Coaching, &breakdown(10, 3), &config).unwrap_err();
        assert_eq!(err.code(), "INVALID_GOAL_INPUT");
        assert_eq!(err.field_errors()[0].field, "daily_flow_config.working_days_per_week");
    }

    #[test]
    fn test_default_flow_appointments_need_conversion() {
        let config = DailyFlowConfig {
            has_appointments: true,
            appointment_conversion: 0.0,
            ..DailyFlowConfig::default()
        };
        let err = default_daily_flow(VerticalId::Coaching, &breakdown(10, 3), &config).unwrap_err();
        assert_eq!(err.code(), "ADAPTER_COMPUTATION_ERROR");
    }
}
