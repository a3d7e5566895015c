//! Network marketing adapter.
//!
//! Income and volume goals are converted through team volume: monthly income
//! divided by the commission rate gives the volume the team must move, and
//! each active customer or partner contributes a fixed personal volume.
//! Rank goals use a built-in requirements table.

use serde_json::json;

use super::adapter::{
    VerticalAdapter, base_breakdown, checked_div, default_daily_flow, goal_met_breakdown,
    needed_units, quota, round_rate, unsupported_goal_type, validate_common,
};
use crate::constants::network_marketing as nm;
use crate::types::{
    DailyFlowConfig, DailyFlowTargets, FieldError, FlowError, GoalBreakdown, GoalInput, GoalType,
    KpiAggregation, KpiDefinition, KpiPeriod, Result, VerticalId,
};

const UNIT_LABEL: &str = "customers + partners";
const SUPPORTED: &[GoalType] = &[
    GoalType::Income,
    GoalType::Rank,
    GoalType::Volume,
    GoalType::Customers,
    GoalType::Partners,
];

/// Requirements for reaching a rank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankRequirement {
    pub id: &'static str,
    pub label: &'static str,
    pub monthly_volume: f64,
    pub active_partners: u64,
}

/// Look up a rank in the built-in table (case-insensitive)
pub fn rank_requirement(rank_id: &str) -> Option<RankRequirement> {
    let wanted = rank_id.trim().to_lowercase();
    nm::RANK_REQUIREMENTS
        .iter()
        .find(|(id, ..)| *id == wanted)
        .map(|&(id, label, monthly_volume, active_partners)| RankRequirement {
            id,
            label,
            monthly_volume,
            active_partners,
        })
}

#[derive(Debug, Clone)]
pub struct NetworkMarketingAdapter {
    pub commission_rate: f64,
    pub avg_customer_volume: f64,
    pub partner_share: f64,
}

impl Default for NetworkMarketingAdapter {
    fn default() -> Self {
        Self {
            commission_rate: nm::COMMISSION_RATE,
            avg_customer_volume: nm::AVG_CUSTOMER_VOLUME,
            partner_share: nm::PARTNER_SHARE,
        }
    }
}

impl NetworkMarketingAdapter {
    const ID: VerticalId = VerticalId::NetworkMarketing;

    /// Split units into (customers, partners) using the partner share
    fn split(&self, units: u64, min_partners: u64) -> (u64, u64) {
        let partners = ((units as f64 * self.partner_share).round() as u64)
            .max(min_partners)
            .min(units);
        (units - partners, partners)
    }

    fn volume_breakdown(
        &self,
        input: &GoalInput,
        team_volume: f64,
        confidence: f64,
        min_partners: u64,
    ) -> Result<GoalBreakdown> {
        let raw_units = checked_div(Self::ID, team_volume, self.avg_customer_volume, "units")?;
        let units = needed_units(Self::ID, raw_units, "units")?;
        let (customers, partners) = self.split(units, min_partners);

        let mut b = base_breakdown(Self::ID, input, UNIT_LABEL, units, confidence)?;
        b.secondary_units.insert("customers".into(), customers as f64);
        b.secondary_units.insert("partners".into(), partners as f64);
        b.secondary_units
            .insert("team_volume".into(), round_rate(team_volume));
        self.insert_assumptions(&mut b);
        Ok(b)
    }

    fn direct_breakdown(&self, input: &GoalInput, partners_goal: bool) -> Result<GoalBreakdown> {
        let units = needed_units(Self::ID, input.needed(), "units")?;
        let (customers, partners) = if partners_goal { (0, units) } else { (units, 0) };

        let mut b = base_breakdown(Self::ID, input, UNIT_LABEL, units, nm::CONFIDENCE_DIRECT)?;
        b.secondary_units.insert("customers".into(), customers as f64);
        b.secondary_units.insert("partners".into(), partners as f64);
        b.secondary_units.insert(
            "team_volume".into(),
            round_rate(units as f64 * self.avg_customer_volume),
        );
        self.insert_assumptions(&mut b);
        Ok(b)
    }

    fn rank_breakdown(&self, input: &GoalInput) -> Result<GoalBreakdown> {
        let rank_id = input.target_rank_id.as_deref().unwrap_or_default();
        let rank = rank_requirement(rank_id)
            .ok_or_else(|| FlowError::invalid_field("target_rank_id", unknown_rank(rank_id)))?;

        let current_volume = input.current_value.unwrap_or(0.0).max(0.0);
        let needed_volume = rank.monthly_volume - current_volume;

        let mut b = if needed_volume <= 0.0 {
            goal_met_breakdown(Self::ID, input, UNIT_LABEL, nm::CONFIDENCE_RANK)?
        } else {
            self.volume_breakdown(input, needed_volume, nm::CONFIDENCE_RANK, rank.active_partners)?
        };
        b.target_income_monthly = Some(round_rate(rank.monthly_volume * self.commission_rate));
        b.secondary_units
            .insert("rank_volume".into(), rank.monthly_volume);
        b.secondary_units
            .insert("rank_partners".into(), rank.active_partners as f64);
        b.assumptions.insert("rank_id".into(), json!(rank.id));
        b.assumptions.insert("rank_label".into(), json!(rank.label));
        b.assumptions
            .insert("rank_source".into(), json!("built_in_requirements_table"));
        Ok(b)
    }

    fn insert_assumptions(&self, b: &mut GoalBreakdown) {
        b.assumptions
            .insert("commission_rate".into(), json!(self.commission_rate));
        b.assumptions
            .insert("avg_customer_volume".into(), json!(self.avg_customer_volume));
        b.assumptions
            .insert("partner_share".into(), json!(self.partner_share));
    }
}

fn unknown_rank(rank_id: &str) -> String {
    let known: Vec<&str> = nm::RANK_REQUIREMENTS.iter().map(|(id, ..)| *id).collect();
    format!("unknown rank '{}'; known ranks: {}", rank_id, known.join(", "))
}

impl VerticalAdapter for NetworkMarketingAdapter {
    fn vertical_id(&self) -> VerticalId {
        Self::ID
    }

    fn label(&self) -> &'static str {
        "Network Marketing"
    }

    fn default_conversion_config(&self) -> DailyFlowConfig {
        DailyFlowConfig::default()
    }

    fn kpi_definitions(&self) -> Vec<KpiDefinition> {
        use KpiAggregation::*;
        use KpiPeriod::*;
        vec![
            KpiDefinition::new("new_contacts", "New contacts", "contacts", Sum, Daily),
            KpiDefinition::new("followups", "Follow-ups", "touches", Sum, Daily),
            KpiDefinition::new("presentations", "Presentations", "presentations", Sum, Weekly),
            KpiDefinition::new("new_customers", "New customers", "customers", Sum, Monthly)
                .primary(),
            KpiDefinition::new("new_partners", "New partners", "partners", Sum, Monthly),
            KpiDefinition::new("team_volume", "Team volume", "PV", Last, Monthly),
            KpiDefinition::new("rank", "Rank", "rank", Max, Total),
        ]
    }

    fn supported_goal_types(&self) -> &'static [GoalType] {
        SUPPORTED
    }

    fn validate_goal_input(&self, input: &GoalInput) -> Vec<FieldError> {
        let mut errors = validate_common(input, Self::ID, SUPPORTED);
        if input.goal_type == GoalType::Rank
            && let Some(rank_id) = input.target_rank_id.as_deref()
            && !rank_id.trim().is_empty()
            && rank_requirement(rank_id).is_none()
        {
            errors.push(FieldError::new("target_rank_id", unknown_rank(rank_id)));
        }
        errors
    }

    fn compute_goal_breakdown(&self, input: &GoalInput) -> Result<GoalBreakdown> {
        match input.goal_type {
            GoalType::Rank => self.rank_breakdown(input),
            _ if input.needed() <= 0.0 => {
                goal_met_breakdown(Self::ID, input, UNIT_LABEL, nm::CONFIDENCE_DIRECT)
            }
            GoalType::Income => {
                let team_volume =
                    checked_div(Self::ID, input.needed(), self.commission_rate, "team volume")?;
                let mut b =
                    self.volume_breakdown(input, team_volume, nm::CONFIDENCE_INCOME, 0)?;
                b.target_income_monthly = Some(input.target_value);
                Ok(b)
            }
            GoalType::Volume => {
                let mut b =
                    self.volume_breakdown(input, input.needed(), nm::CONFIDENCE_VOLUME, 0)?;
                b.target_income_monthly =
                    Some(round_rate(input.target_value * self.commission_rate));
                Ok(b)
            }
            GoalType::Customers => self.direct_breakdown(input, false),
            GoalType::Partners => self.direct_breakdown(input, true),
            other => Err(unsupported_goal_type(Self::ID, other)),
        }
    }

    /// Partner recruiting needs more prospecting: contacts are boosted by
    /// `1 + partner_share × 0.5`, and one weekly team call is planned per five partners.
    fn compute_daily_flow_targets(
        &self,
        breakdown: &GoalBreakdown,
        config: Option<&DailyFlowConfig>,
    ) -> Result<DailyFlowTargets> {
        let config = config
            .cloned()
            .unwrap_or_else(|| self.default_conversion_config());
        let mut targets = default_daily_flow(Self::ID, breakdown, &config)?;

        let partners = breakdown.secondary("partners").unwrap_or(0.0).max(0.0);
        if breakdown.primary_units > 0 && partners > 0.0 {
            let share = partners / breakdown.primary_units as f64;
            let boosted = f64::from(targets.new_contacts) * (1.0 + share * nm::PARTNER_CONTACT_BOOST);
            targets.set_new_contacts(quota(Self::ID, boosted, "boosted contacts")?)?;
        }
        let calls = (partners / nm::PARTNERS_PER_TEAM_CALL as f64).floor().max(1.0);
        targets.team_calls = Some(quota(Self::ID, calls, "team calls")?);

        Ok(targets)
    }
}
