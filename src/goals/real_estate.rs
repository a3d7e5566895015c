//! Real estate adapter: deals are the primary unit, viewings the funnel step.

use serde_json::json;

use super::adapter::{
    VerticalAdapter, base_breakdown, checked_div, goal_met_breakdown, needed_units, round_rate,
    unsupported_goal_type,
};
use crate::constants::real_estate as re;
use crate::types::{
    DailyFlowConfig, GoalBreakdown, GoalInput, GoalType, KpiAggregation, KpiDefinition,
    KpiPeriod, Result, VerticalId,
};

const UNIT_LABEL: &str = "deals";
const SUPPORTED: &[GoalType] = &[GoalType::Income, GoalType::Deals];

#[derive(Debug, Clone)]
pub struct RealEstateAdapter {
    pub avg_commission_per_deal: f64,
    pub viewing_to_deal: f64,
    pub contact_to_viewing: f64,
}

impl Default for RealEstateAdapter {
    fn default() -> Self {
        Self {
            avg_commission_per_deal: re::AVG_COMMISSION_PER_DEAL,
            viewing_to_deal: re::VIEWING_TO_DEAL,
            contact_to_viewing: re::CONTACT_TO_VIEWING,
        }
    }
}

impl RealEstateAdapter {
    const ID: VerticalId = VerticalId::RealEstate;

    fn deals_breakdown(&self, input: &GoalInput, deals: u64, confidence: f64) -> Result<GoalBreakdown> {
        let viewings = checked_div(Self::ID, deals as f64, self.viewing_to_deal, "viewings")?;
        let contacts = checked_div(Self::ID, viewings, self.contact_to_viewing, "contacts")?;
        let commission = deals as f64 * self.avg_commission_per_deal;

        let mut b = base_breakdown(Self::ID, input, UNIT_LABEL, deals, confidence)?;
        b.secondary_units.insert(
            "viewings".into(),
            needed_units(Self::ID, viewings, "viewings")? as f64,
        );
        b.secondary_units.insert(
            "contacts".into(),
            needed_units(Self::ID, contacts, "contacts")? as f64,
        );
        b.secondary_units
            .insert("estimated_commission".into(), round_rate(commission));
        b.assumptions
            .insert("avg_commission_per_deal".into(), json!(self.avg_commission_per_deal));
        b.assumptions
            .insert("viewing_to_deal".into(), json!(self.viewing_to_deal));
        b.assumptions
            .insert("contact_to_viewing".into(), json!(self.contact_to_viewing));
        Ok(b)
    }
}

impl VerticalAdapter for RealEstateAdapter {
    fn vertical_id(&self) -> VerticalId {
        Self::ID
    }

    fn label(&self) -> &'static str {
        "Real Estate"
    }

    fn default_conversion_config(&self) -> DailyFlowConfig {
        DailyFlowConfig {
            working_days_per_week: 5,
            contact_to_primary_unit: self.contact_to_viewing * self.viewing_to_deal,
            followups_per_primary: 4.0,
            reactivation_share: 0.2,
            has_appointments: true,
            appointment_conversion: self.viewing_to_deal,
        }
    }

    fn kpi_definitions(&self) -> Vec<KpiDefinition> {
        use KpiAggregation::*;
        use KpiPeriod::*;
        vec![
            KpiDefinition::new("new_contacts", "New contacts", "contacts", Sum, Daily),
            KpiDefinition::new("followups", "Follow-ups", "touches", Sum, Daily),
            KpiDefinition::new("viewings", "Viewings", "viewings", Sum, Weekly),
            KpiDefinition::new("listings", "New listings", "listings", Sum, Monthly),
            KpiDefinition::new("deals", "Closed deals", "deals", Sum, Monthly).primary(),
            KpiDefinition::new("commission", "Commission", "EUR", Sum, Monthly),
        ]
    }

    fn supported_goal_types(&self) -> &'static [GoalType] {
        SUPPORTED
    }

    fn compute_goal_breakdown(&self, input: &GoalInput) -> Result<GoalBreakdown> {
        if SUPPORTED.contains(&input.goal_type) && input.needed() <= 0.0 {
            return goal_met_breakdown(Self::ID, input, UNIT_LABEL, re::CONFIDENCE_DEALS);
        }
        match input.goal_type {
            GoalType::Deals => {
                let deals = needed_units(Self::ID, input.needed(), "deals")?;
                let mut b = self.deals_breakdown(input, deals, re::CONFIDENCE_DEALS)?;
                b.target_income_monthly = Some(round_rate(
                    deals as f64 * self.avg_commission_per_deal / f64::from(input.timeframe_months),
                ));
                Ok(b)
            }
            GoalType::Income => {
                let horizon = input.needed() * f64::from(input.timeframe_months);
                let raw = checked_div(Self::ID, horizon, self.avg_commission_per_deal, "deals")?;
                let deals = needed_units(Self::ID, raw, "deals")?;
                let mut b = self.deals_breakdown(input, deals, re::CONFIDENCE_INCOME)?;
                b.target_income_monthly = Some(input.target_value);
                b.assumptions
                    .insert("horizon_income".into(), json!(round_rate(horizon)));
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
    fn test_deals_goal_breakdown() {
        let adapter = RealEstateAdapter::default();
        let input =
            GoalInput::new(VerticalId::RealEstate, GoalType::Deals, 6.0, 6).with_current(0.0);
        let b = adapter.compute_goal_breakdown(&input).unwrap();

        assert_eq!(b.primary_units, 6);
        assert_eq!(b.per_month, 1.0);
        assert_eq!(b.secondary("viewings"), Some(40.0));
        assert_eq!(b.secondary("estimated_commission"), Some(63000.0));
        assert_eq!(b.secondary("contacts"), Some(160.0));
    }

    #[test]
    fn test_income_goal_breakdown() {
        let adapter = RealEstateAdapter::default();
        let input = GoalInput::new(VerticalId::RealEstate, GoalType::Income, 10_500.0, 12);
        let b = adapter.compute_goal_breakdown(&input).unwrap();

        assert_eq!(b.primary_units, 12);
        assert_eq!(b.target_income_monthly, Some(10_500.0));
    }

    #[test]
    fn test_daily_flow_has_appointments() {
        let adapter = RealEstateAdapter::default();
        let input = GoalInput::new(VerticalId::RealEstate, GoalType::Deals, 6.0, 6);
        let b = adapter.compute_goal_breakdown(&input).unwrap();
        let t = adapter.compute_daily_flow_targets(&b, None).unwrap();

        assert!(t.appointments.is_some());
        assert_eq!(t.weekly_appointments, t.appointments.map(|a| a * 5));
        assert!(t.new_contacts >= 1);
        assert!(t.team_calls.is_none());
    }

    #[test]
    fn test_partial_progress_reduces_units() {
        let adapter = RealEstateAdapter::default();
        let input =
            GoalInput::new(VerticalId::RealEstate, GoalType::Deals, 6.0, 6).with_current(2.0);
        let b = adapter.compute_goal_breakdown(&input).unwrap();
        assert_eq!(b.primary_units, 4);
    }

    #[test]
    fn test_zero_viewing_rate_is_computation_error() {
        let adapter = RealEstateAdapter {
            viewing_to_deal: 0.0,
            ..RealEstateAdapter::default()
        };
        let input = GoalInput::new(VerticalId::RealEstate, GoalType::Deals, 6.0, 6);
        let err = adapter.compute_goal_breakdown(&input).unwrap_err();
        assert_eq!(err.code(), "ADAPTER_COMPUTATION_ERROR");
    }
}
