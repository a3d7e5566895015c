//! Plan Command
//!
//! Turn a revenue goal into daily activity targets.

use std::sync::Arc;

use crate::cli::ui::Output;
use crate::cli::util::{is_json, print_json};
use crate::config::ConfigLoader;
use crate::goals::{GoalPlanner, Plan, VerticalRegistry};
use crate::types::{GoalInput, Result};

pub fn run(input: &GoalInput, format: &str) -> Result<()> {
    let config = ConfigLoader::load()?;
    let registry = VerticalRegistry::new().with_default(config.planner.default_vertical);
    let planner = GoalPlanner::new(Arc::new(registry));

    let plan = planner.plan(input)?;
    if is_json(format) {
        return print_json(&plan);
    }
    print_plan(&plan);
    Ok(())
}

fn print_plan(plan: &Plan) {
    let out = Output::new();
    let b = &plan.breakdown;
    let t = &plan.targets;

    for warning in &plan.warnings {
        out.warning(warning);
    }

    out.header(&format!("{} plan", plan.vertical_id));
    println!("{}", plan.summary);

    out.section("Breakdown");
    out.field("Goal", format!("{} over {} months", b.goal_type, b.timeframe_months));
    out.field(&b.primary_unit_label, b.primary_units);
    out.field("Per month", b.per_month);
    out.field("Per week", b.per_week);
    if let Some(income) = b.target_income_monthly {
        out.field("Monthly income", format!("{:.2}", income));
    }
    for (key, value) in &b.secondary_units {
        out.field(key, value);
    }
    out.field("Confidence", format!("{:.0}%", b.confidence * 100.0));

    out.section(&format!("Daily flow ({} days/week)", t.working_days_per_week));
    out.field("New contacts", t.new_contacts);
    out.field("Follow-ups", t.followups);
    out.field("Reactivations", t.reactivations);
    if let Some(appointments) = t.appointments {
        out.field("Appointments", appointments);
    }
    if let Some(calls) = t.team_calls {
        out.field("Team calls / week", calls);
    }
}

/// List registered verticals and their KPIs
pub fn verticals(format: &str) -> Result<()> {
    let registry = VerticalRegistry::new();
    let verticals = registry.list_verticals();
    if is_json(format) {
        return print_json(&verticals);
    }

    let out = Output::new();
    for vertical in &verticals {
        out.section(&format!("{} ({})", vertical.label, vertical.id));
        for kpi in &vertical.kpis {
            let marker = if kpi.is_primary { "*" } else { " " };
            println!("  {} {:<28} {}", marker, kpi.label, kpi.unit);
        }
    }
    Ok(())
}
