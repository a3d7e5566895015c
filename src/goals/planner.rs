//! Goal planner: validate, dispatch to the vertical adapter, compose the plan.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::registry::VerticalRegistry;
use crate::types::{
    DailyFlowConfig, DailyFlowTargets, FieldError, FlowError, GoalBreakdown, GoalInput, Result,
    VerticalId, capitalize_first,
};

/// Breakdown, daily targets and a preformatted summary for one goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Vertical that actually computed the plan (may differ from the input on fallback)
    pub vertical_id: VerticalId,
    pub breakdown: GoalBreakdown,
    pub targets: DailyFlowTargets,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub struct GoalPlanner {
    registry: Arc<VerticalRegistry>,
}

impl GoalPlanner {
    pub fn new(registry: Arc<VerticalRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &VerticalRegistry {
        &self.registry
    }

    /// Plan with the vertical's default conversion config
    pub fn plan(&self, input: &GoalInput) -> Result<Plan> {
        self.plan_with_config(input, None)
    }

    /// Plan with an optional conversion override
    pub fn plan_with_config(
        &self,
        input: &GoalInput,
        config: Option<&DailyFlowConfig>,
    ) -> Result<Plan> {
        let adapter = self.registry.get_or_default(&input.vertical_id);
        let mut warnings = Vec::new();
        if self.registry.get_adapter(&input.vertical_id).is_none() {
            warnings.push(format!(
                "Unknown vertical '{}', planned as {}",
                input.vertical_id,
                adapter.vertical_id()
            ));
        }

        let mut errors: Vec<FieldError> = adapter.validate_goal_input(input);
        if let Some(config) = config {
            errors.extend(config.validate().into_iter().map(|e| {
                FieldError::new(format!("daily_flow_config.{}", e.field), e.message)
            }));
        }
        if !errors.is_empty() {
            debug!("Goal input rejected with {} field error(s)", errors.len());
            return Err(FlowError::InvalidGoalInput(errors));
        }

        let breakdown = adapter.compute_goal_breakdown(input)?;
        let targets = adapter.compute_daily_flow_targets(&breakdown, config)?;
        let summary = summarize(adapter.label(), input, &breakdown, &targets);

        info!(
            "Planned {} {} goal: {} {} over {} months",
            adapter.vertical_id(),
            input.goal_type,
            breakdown.primary_units,
            breakdown.primary_unit_label,
            breakdown.timeframe_months
        );

        Ok(Plan {
            vertical_id: adapter.vertical_id(),
            breakdown,
            targets,
            summary,
            warnings,
        })
    }
}

/// One-paragraph summary for UI and coach prompts
pub fn summarize(
    label: &str,
    input: &GoalInput,
    breakdown: &GoalBreakdown,
    targets: &DailyFlowTargets,
) -> String {
    let mut daily = format!(
        "{} new contacts, {} follow-ups, {} reactivations",
        targets.new_contacts, targets.followups, targets.reactivations
    );
    if let Some(appointments) = targets.appointments {
        daily.push_str(&format!(", {} appointments", appointments));
    }
    let team = targets
        .team_calls
        .map(|calls| format!(" Plus {} team call(s) per week.", calls))
        .unwrap_or_default();

    if breakdown.is_goal_met() {
        return format!(
            "{}: {} goal of {} is already met. Keep the minimum daily rhythm: {}.{}",
            label,
            capitalize_first(input.goal_type.as_str()),
            input.target_value,
            daily,
            team
        );
    }

    format!(
        "{}: {} goal of {} over {} months needs {} {} ({} per month, {} per week). Daily: {}.{}",
        label,
        capitalize_first(input.goal_type.as_str()),
        input.target_value,
        breakdown.timeframe_months,
        breakdown.primary_units,
        breakdown.primary_unit_label,
        breakdown.per_month,
        breakdown.per_week,
        daily,
        team
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GoalType;

    fn planner() -> GoalPlanner {
        GoalPlanner::new(Arc::new(VerticalRegistry::new()))
    }

    #[test]
    fn test_plan_mlm_income() {
        let input = GoalInput::new(VerticalId::NetworkMarketing, GoalType::Income, 2000.0, 6);
        let plan = planner().plan(&input).unwrap();

        assert_eq!(plan.vertical_id, VerticalId::NetworkMarketing);
        assert_eq!(plan.breakdown.primary_units, 250);
        assert!(plan.targets.new_contacts >= 1);
        assert!(plan.summary.contains("250 customers + partners"));
        assert!(plan.summary.contains("team call"));
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_plan_rejects_invalid_input_with_all_fields() {
        let input = GoalInput::new(VerticalId::RealEstate, GoalType::Deals, 0.0, 61);
        let err = planner().plan(&input).unwrap_err();

        assert_eq!(err.code(), "INVALID_GOAL_INPUT");
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["timeframe_months", "target_value"]);
    }

    #[test]
    fn test_plan_rejects_invalid_config_override() {
        let input = GoalInput::new(VerticalId::Coaching, GoalType::Customers, 10.0, 6);
        let config = DailyFlowConfig {
            reactivation_share: 1.5,
            ..DailyFlowConfig::default()
        };
        let err = planner().plan_with_config(&input, Some(&config)).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "daily_flow_config.reactivation_share");
    }

    #[test]
    fn test_plan_unknown_vertical_uses_default() {
        let mut input = GoalInput::new(VerticalId::NetworkMarketing, GoalType::Customers, 30.0, 3);
        input.vertical_id = "insurance".to_string();
        let plan = planner().plan(&input).unwrap();

        assert_eq!(plan.vertical_id, VerticalId::NetworkMarketing);
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn test_plan_goal_met_summary() {
        let input = GoalInput::new(VerticalId::RealEstate, GoalType::Deals, 4.0, 6).with_current(5.0);
        let plan = planner().plan(&input).unwrap();
        assert_eq!(plan.breakdown.primary_units, 0);
        assert!(plan.summary.contains("already met"));
    }
}
