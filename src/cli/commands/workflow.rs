//! Workflow Commands
//!
//! Usage:
//!   leadflow workflow detect <snapshot.json>
//!   leadflow workflow queue --user <id> [--limit N]

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, is_json, print_json};
use crate::config::ConfigLoader;
use crate::types::{LeadContext, QueueItem, Result};
use crate::workflow::WorkflowDetector;

/// Lead snapshot as exported by the CRM; `now` pins the evaluation time
#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(flatten)]
    context: LeadContext,
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

/// Classify one lead snapshot; needs no database
pub fn detect(path: &Path, format: &str) -> Result<()> {
    let config = ConfigLoader::load()?;
    let snapshot: Snapshot = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let now = snapshot.now.unwrap_or_else(Utc::now);

    let item = WorkflowDetector::new(config.queue.cold_after_days).detect(&snapshot.context, now);
    if is_json(format) {
        return print_json(&item);
    }
    print_item(&Output::new(), &item);
    Ok(())
}

pub async fn queue(user_id: &str, limit: Option<usize>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let limit = limit.unwrap_or(ctx.config.queue.default_limit);
    let items = ctx
        .queue_builder()
        .get_prioritized_queue(user_id, limit)
        .await;

    if is_json(format) {
        return print_json(&items);
    }

    let out = Output::new();
    out.header(&format!("Action queue for {} ({} items)", user_id, items.len()));
    for item in &items {
        print_item(&out, item);
    }
    Ok(())
}

fn print_item(out: &Output, item: &QueueItem) {
    println!(
        "\n{} {} ({}) score {}",
        out.priority(item.priority),
        item.lead.display_first_name(),
        item.lead.id,
        item.score
    );
    out.field("Case", item.workflow_case.as_str());
    out.field("Action", &item.action_label);
    out.field("Reason", &item.reason);
    out.field("Channel", item.channel);
    out.field("Urgency", item.urgency.as_str());
    if let Some(message) = &item.suggested_message {
        out.field("Suggested message", message);
    }
}
