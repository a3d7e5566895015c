//! Lifecycle Commands
//!
//! Usage:
//!   leadflow lead state <lead_id> <state> --user <id>
//!   leadflow queue list --user <id> [--status pending]
//!   leadflow queue sent <queue_id> --user <id>

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, is_json, print_json};
use crate::followup::CycleRepository;
use crate::types::{LeadId, LifecycleState, QueueEntry, QueueStatus, Result};

pub async fn change_state(
    user_id: &str,
    lead_id: &LeadId,
    new_state: LifecycleState,
    format: &str,
) -> Result<()> {
    let ctx = CommandContext::load()?;
    let outcome = ctx
        .cycle_service()
        .change_lead_state(user_id, lead_id.as_str(), new_state)
        .await?;

    if is_json(format) {
        return print_json(&outcome);
    }

    let out = Output::new();
    out.success(&format!(
        "Lead {}: {} -> {}",
        lead_id, outcome.previous_state, outcome.new_state
    ));
    out.field("Cancelled follow-ups", outcome.cancelled_entries);
    match &outcome.next_followup {
        Some(entry) => print_entry(&out, entry),
        None => out.info("No cycle steps configured for this state"),
    }
    Ok(())
}

pub async fn list(user_id: &str, status: Option<QueueStatus>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let entries = ctx.db.list_queue(user_id, status).await?;

    if is_json(format) {
        return print_json(&entries);
    }

    let out = Output::new();
    out.header(&format!("Cycle queue for {} ({} entries)", user_id, entries.len()));
    for entry in &entries {
        print_entry(&out, entry);
    }
    Ok(())
}

pub async fn sent(user_id: &str, queue_id: &str, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let outcome = ctx
        .cycle_service()
        .process_sent_followup(user_id, queue_id)
        .await?;

    if is_json(format) {
        return print_json(&outcome);
    }

    let out = Output::new();
    if !outcome.ok {
        out.warning(&format!("Queue entry {} is not open for sending", queue_id));
        return Ok(());
    }
    out.success(&format!("Marked {} as sent", queue_id));
    match &outcome.next {
        Some(entry) => print_entry(&out, entry),
        None => out.info("Cycle complete for this state"),
    }
    Ok(())
}

fn print_entry(out: &Output, entry: &QueueEntry) {
    println!(
        "\n  {} step {} ({}) via {} due {}",
        entry.lead_id,
        entry.step_order,
        entry.lead_state,
        entry.channel,
        entry.due_at.format("%Y-%m-%d %H:%M UTC")
    );
    out.field("Queue id", &entry.id);
    out.field("Status", entry.status.as_str());
}
