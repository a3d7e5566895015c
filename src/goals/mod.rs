//! Goal Engine
//!
//! Translates an abstract business goal into concrete unit targets
//! ([`GoalBreakdown`](crate::types::GoalBreakdown)) and daily activity quotas
//! ([`DailyFlowTargets`](crate::types::DailyFlowTargets)).
//!
//! ## Components
//!
//! - [`VerticalAdapter`]: per-vertical computation contract
//! - [`VerticalRegistry`]: `vertical_id → adapter` lookup with default fallback
//! - [`GoalPlanner`]: validate, compute, summarize

pub mod adapter;
mod coaching;
mod finance;
mod network_marketing;
mod planner;
mod real_estate;
mod registry;

pub use adapter::{VerticalAdapter, default_daily_flow};
pub use coaching::CoachingAdapter;
pub use finance::FinanceAdapter;
pub use network_marketing::{NetworkMarketingAdapter, RankRequirement, rank_requirement};
pub use planner::{GoalPlanner, Plan};
pub use real_estate::RealEstateAdapter;
pub use registry::{SharedAdapter, VerticalRegistry};

#[cfg(test)]
mod breakdown_properties {
    use super::*;
    use crate::constants::network_marketing::RANK_REQUIREMENTS;
    use crate::types::{GoalInput, GoalType, VerticalId};
    use proptest::prelude::*;

    fn check_breakdown(adapter: &SharedAdapter, input: &GoalInput) -> Result<(), TestCaseError> {
        let b = adapter
            .compute_goal_breakdown(input)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let months = f64::from(input.timeframe_months);
        prop_assert!((b.per_month * months - b.primary_units as f64).abs() <= 1.0);
        prop_assert!((0.0..=1.0).contains(&b.confidence));

        let t = adapter
            .compute_daily_flow_targets(&b, None)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let days = u32::from(t.working_days_per_week);
        prop_assert!(t.new_contacts >= 1);
        prop_assert!(t.followups >= 1);
        prop_assert_eq!(t.weekly_contacts, t.new_contacts * days);
        prop_assert_eq!(t.weekly_followups, t.followups * days);
        prop_assert_eq!(t.weekly_reactivations, t.reactivations * days);
        prop_assert_eq!(t.weekly_appointments, t.appointments.map(|a| a * days));
        Ok(())
    }

    proptest! {
        #[test]
        fn breakdown_is_consistent_for_every_vertical(
            vertical_idx in 0usize..4,
            goal_idx in 0usize..6,
            target in 1.0f64..500_000.0,
            months in 1u32..=60,
            current in proptest::option::of(0.0f64..600_000.0),
        ) {
            let registry = VerticalRegistry::new();
            let vertical = VerticalId::ALL[vertical_idx];
            let adapter = registry.get_or_default(vertical.as_str());
            let supported = adapter.supported_goal_types();
            let goal_type = supported[goal_idx % supported.len()];
            prop_assume!(goal_type != GoalType::Rank);

            let mut input = GoalInput::new(vertical, goal_type, target, months);
            input.current_value = current;
            prop_assert!(adapter.validate_goal_input(&input).is_empty());
            check_breakdown(&adapter, &input)?;
        }

        #[test]
        fn rank_breakdown_is_consistent(
            rank_idx in 0usize..5,
            months in 1u32..=60,
            current in proptest::option::of(0.0f64..50_000.0),
        ) {
            let registry = VerticalRegistry::new();
            let adapter = registry.get_or_default("network_marketing");
            let mut input = GoalInput::new(VerticalId::NetworkMarketing, GoalType::Rank, 1.0, months)
                .with_rank(RANK_REQUIREMENTS[rank_idx].0);
            input.current_value = current;

            check_breakdown(&adapter, &input)?;
            let b = adapter.compute_goal_breakdown(&input).unwrap();
            prop_assert!(b.confidence <= 0.8);
        }
    }
}
