//! Coaching adapter: clients are won through discovery calls.

use serde_json::json;

use super::adapter::{
    VerticalAdapter, base_breakdown, checked_div, goal_met_breakdown, needed_units, round_rate,
    unsupported_goal_type,
};
use crate::constants::coaching as co;
use crate::types::{
    DailyFlowConfig, GoalBreakdown, GoalInput, GoalType, KpiAggregation, KpiDefinition,
    KpiPeriod, Result, VerticalId,
};

const UNIT_LABEL: &str = "clients";
const SUPPORTED: &[GoalType] = &[GoalType::Income, GoalType::Customers];

#[derive(Debug, Clone)]
pub struct CoachingAdapter {
    pub avg_client_value: f64,
    pub call_to_client: f64,
    pub contact_to_call: f64,
}

impl Default for CoachingAdapter {
    fn default() -> Self {
        Self {
            avg_client_value: co::AVG_CLIENT_VALUE,
            call_to_client: co::CALL_TO_CLIENT,
            contact_to_call: co::CONTACT_TO_CALL,
        }
    }
}

impl CoachingAdapter {
    const ID: VerticalId = VerticalId::Coaching;

    fn clients_breakdown(
        &self,
        input: &GoalInput,
        clients: u64,
        confidence: f64,
    ) -> Result<GoalBreakdown> {
        let calls = checked_div(Self::ID, clients as f64, self.call_to_client, "discovery calls")?;
        let contacts = checked_div(Self::ID, calls, self.contact_to_call, "contacts")?;

        let mut b = base_breakdown(Self::ID, input, UNIT_LABEL, clients, confidence)?;
        b.secondary_units.insert(
            "discovery_calls".into(),
            needed_units(Self::ID, calls, "discovery calls")? as f64,
        );
        b.secondary_units.insert(
            "contacts".into(),
            needed_units(Self::ID, contacts, "contacts")? as f64,
        );
        b.secondary_units.insert(
            "estimated_revenue".into(),
            round_rate(clients as f64 * self.avg_client_value),
        );
        b.assumptions
            .insert("avg_client_value".into(), json!(self.avg_client_value));
        b.assumptions
            .insert("call_to_client".into(), json!(self.call_to_client));
        b.assumptions
            .insert("contact_to_call".into(), json!(self.contact_to_call));
        Ok(b)
    }
}

impl VerticalAdapter for CoachingAdapter {
    fn vertical_id(&self) -> VerticalId {
        Self::ID
    }

    fn label(&self) -> &'static str {
        "Coaching"
    }

    fn default_conversion_config(&self) -> DailyFlowConfig {
        DailyFlowConfig {
            working_days_per_week: 5,
            contact_to_primary_unit: self.contact_to_call * self.call_to_client,
            followups_per_primary: 2.5,
            reactivation_share: 0.1,
            has_appointments: true,
            appointment_conversion: self.call_to_client,
        }
    }

    fn kpi_definitions(&self) -> Vec<KpiDefinition> {
        use KpiAggregation::*;
        use KpiPeriod::*;
        vec![
            KpiDefinition::new("new_contacts", "New contacts", "contacts", Sum, Daily),
            KpiDefinition::new("followups", "Follow-ups", "touches", Sum, Daily),
            KpiDefinition::new("discovery_calls", "Discovery calls", "calls", Sum, Weekly),
            KpiDefinition::new("new_clients", "New clients", "clients", Sum, Monthly).primary(),
            KpiDefinition::new("revenue", "Revenue", "EUR", Sum, Monthly),
        ]
    }

    fn supported_goal_types(&self) -> &'static [GoalType] {
        SUPPORTED
    }

    fn compute_goal_breakdown(&self, input: &GoalInput) -> Result<GoalBreakdown> {
        if SUPPORTED.contains(&input.goal_type) && input.needed() <= 0.0 {
            return goal_met_breakdown(Self::ID, input, UNIT_LABEL, co::CONFIDENCE_CLIENTS);
        }
        match input.goal_type {
            GoalType::Customers => {
                let clients = needed_units(Self::ID, input.needed(), "clients")?;
                self.clients_breakdown(input, clients, co::CONFIDENCE_CLIENTS)
            }
            GoalType::Income => {
                let horizon = input.needed() * f64::from(input.timeframe_months);
                let raw = checked_div(Self::ID, horizon, self.avg_client_value, "clients")?;
                let clients = needed_units(Self::ID, raw, "clients")?;
                let mut b = self.clients_breakdown(input, clients, co::CONFIDENCE_INCOME)?;
                b.target_income_monthly = Some(input.target_value);
                Ok(b)
            }
            other => Err(unsupported_goal_type(Self::ID, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_income_goal_breakdown() {
        let adapter = CoachingAdapter::default();
        let input = GoalInput::new(VerticalId::Coaching, GoalType::Income, 6000.0, 3);
        let b = adapter.compute_goal_breakdown(&input).unwrap();

        assert_eq!(b.primary_units, 6);
        assert_eq!(b.secondary("discovery_calls"), Some(24.0));
        assert_eq!(b.secondary("contacts"), Some(120.0));
        assert_eq!(b.per_month, 2.0);
    }

    #[test]
    fn test_income_rounds_up_partial_client() {
        let adapter = CoachingAdapter::default();
        let input = GoalInput::new(VerticalId::Coaching, GoalType::Income, 1000.0, 4);
        let b = adapter.compute_goal_breakdown(&input).unwrap();
        // 4000 / 3000 = 1.33 clients
        assert_eq!(b.primary_units, 2);
    }

    #[test]
    fn test_volume_not_supported() {
        let adapter = CoachingAdapter::default();
        let input = GoalInput::new(VerticalId::Coaching, GoalType::Volume, 1000.0, 4);
        assert!(!adapter.validate_goal_input(&input).is_empty());
    }
}
