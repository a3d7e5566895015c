//! Financial advisory adapter: clients are won through advisory appointments.

use serde_json::json;

use super::adapter::{
    VerticalAdapter, base_breakdown, checked_div, goal_met_breakdown, needed_units, round_rate,
    unsupported_goal_type,
};
use crate::constants::finance as fin;
use crate::types::{
    DailyFlowConfig, GoalBreakdown, GoalInput, GoalType, KpiAggregation, KpiDefinition,
    KpiPeriod, Result, VerticalId,
};

const UNIT_LABEL: &str = "clients";
/// `deals` counts signed contracts, one per client
const SUPPORTED: &[GoalType] = &[GoalType::Income, GoalType::Customers, GoalType::Deals];

#[derive(Debug, Clone)]
pub struct FinanceAdapter {
    pub avg_client_value: f64,
    pub appointment_to_client: f64,
    pub contact_to_appointment: f64,
}

impl Default for FinanceAdapter {
    fn default() -> Self {
        Self {
            avg_client_value: fin::AVG_CLIENT_VALUE,
            appointment_to_client: fin::APPOINTMENT_TO_CLIENT,
            contact_to_appointment: fin::CONTACT_TO_APPOINTMENT,
        }
    }
}

impl FinanceAdapter {
    const ID: VerticalId = VerticalId::Finance;

    fn clients_breakdown(
        &self,
        input: &GoalInput,
        clients: u64,
        confidence: f64,
    ) -> Result<GoalBreakdown> {
        let appointments = checked_div(
            Self::ID,
            clients as f64,
            self.appointment_to_client,
            "appointments",
        )?;
        let contacts = checked_div(
            Self::ID,
            appointments,
            self.contact_to_appointment,
            "contacts",
        )?;

        let mut b = base_breakdown(Self::ID, input, UNIT_LABEL, clients, confidence)?;
        b.secondary_units.insert(
            "appointments".into(),
            needed_units(Self::ID, appointments, "appointments")? as f64,
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
            .insert("appointment_to_client".into(), json!(self.appointment_to_client));
        b.assumptions
            .insert("contact_to_appointment".into(), json!(self.contact_to_appointment));
        Ok(b)
    }
}

impl VerticalAdapter for FinanceAdapter {
    fn vertical_id(&self) -> VerticalId {
        Self::ID
    }

    fn label(&self) -> &'static str {
        "Finance"
    }

    fn default_conversion_config(&self) -> DailyFlowConfig {
        DailyFlowConfig {
            working_days_per_week: 5,
            contact_to_primary_unit: self.contact_to_appointment * self.appointment_to_client,
            followups_per_primary: 3.0,
            reactivation_share: 0.15,
            has_appointments: true,
            appointment_conversion: self.appointment_to_client,
        }
    }

    fn kpi_definitions(&self) -> Vec<KpiDefinition> {
        use KpiAggregation::*;
        use KpiPeriod::*;
        vec![
            KpiDefinition::new("new_contacts", "New contacts", "contacts", Sum, Daily),
            KpiDefinition::new("followups", "Follow-ups", "touches", Sum, Daily),
            KpiDefinition::new("appointments", "Advisory appointments", "appointments", Sum, Weekly),
            KpiDefinition::new("new_clients", "New clients", "clients", Sum, Monthly).primary(),
            KpiDefinition::new("revenue", "Revenue", "EUR", Sum, Monthly),
            KpiDefinition::new("close_rate", "Close rate", "%", Avg, Monthly),
        ]
    }

    fn supported_goal_types(&self) -> &'static [GoalType] {
        SUPPORTED
    }

    fn compute_goal_breakdown(&self, input: &GoalInput) -> Result<GoalBreakdown> {
        if SUPPORTED.contains(&input.goal_type) && input.needed() <= 0.0 {
            return goal_met_breakdown(Self::ID, input, UNIT_LABEL, fin::CONFIDENCE_CLIENTS);
        }
        match input.goal_type {
            GoalType::Customers | GoalType::Deals => {
                let clients = needed_units(Self::ID, input.needed(), "clients")?;
                self.clients_breakdown(input, clients, fin::CONFIDENCE_CLIENTS)
            }
            GoalType::Income => {
                let horizon = input.needed() * f64::from(input.timeframe_months);
                let raw = checked_div(Self::ID, horizon, self.avg_client_value, "clients")?;
                let clients = needed_units(Self::ID, raw, "clients")?;
                let mut b = self.clients_breakdown(input, clients, fin::CONFIDENCE_INCOME)?;
                b.target_income_monthly = Some(input.target_value);
                Ok(b)
            }
            other => Err(unsupported_goal_type(Self::ID, other)),
        }
    }
}
