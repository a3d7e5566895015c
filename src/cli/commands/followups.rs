//! Follow-up Commands
//!
//! Usage:
//!   leadflow followups next <lead_id>
//!   leadflow followups today [--user <id>]
//!   leadflow followups sent <suggestion_id> [--content <text>]
//!   leadflow followups reply <lead_id> <positive|negative|neutral>
//!   leadflow followups resume|stop <lead_id>

use chrono::Utc;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, is_json, print_json};
use crate::types::{FollowUpSuggestion, LeadId, ReplyKind, Result, SequenceState};

pub async fn next(lead_id: &LeadId, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let engine = ctx.followup_engine()?;

    let suggestion = engine.get_next_follow_up(lead_id.as_str()).await?;
    if is_json(format) {
        return print_json(&suggestion);
    }

    match suggestion {
        Some(s) => print_suggestion(&Output::new(), &s),
        None => println!("No follow-up due for lead {}", lead_id),
    }
    Ok(())
}

pub async fn today(user_id: Option<&str>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let engine = ctx.followup_engine()?;

    let suggestions = engine.get_today_followups(user_id).await?;
    if is_json(format) {
        return print_json(&suggestions);
    }

    let out = Output::new();
    out.header(&format!(
        "Follow-ups for {} ({} due)",
        Utc::now().format("%Y-%m-%d"),
        suggestions.len()
    ));
    if suggestions.is_empty() {
        out.success("Nothing due today");
    }
    for suggestion in &suggestions {
        print_suggestion(&out, suggestion);
    }
    Ok(())
}

pub async fn sent(suggestion_id: &str, content: Option<String>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let engine = ctx.followup_engine()?;

    let state = engine.process_sent_suggestion(suggestion_id, content).await?;
    report_state(
        state.as_ref(),
        format,
        &format!("Recorded send of suggestion {}", suggestion_id),
        &format!("Suggestion {} not found", suggestion_id),
    )
}

pub async fn reply(lead_id: &LeadId, kind: ReplyKind, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let engine = ctx.followup_engine()?;

    let state = engine.handle_reply(lead_id.as_str(), kind).await?;
    report_state(
        state.as_ref(),
        format,
        &format!("Recorded {} for lead {}", kind.interaction_type(), lead_id),
        &format!("Recorded {}; lead {} has no sequence", kind.interaction_type(), lead_id),
    )
}

pub async fn resume(lead_id: &LeadId, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let state = ctx.followup_engine()?.resume_sequence(lead_id.as_str()).await?;
    report_state(
        state.as_ref(),
        format,
        &format!("Sequence for lead {}", lead_id),
        &format!("Lead {} has no sequence", lead_id),
    )
}

pub async fn stop(lead_id: &LeadId, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let state = ctx.followup_engine()?.stop_sequence(lead_id.as_str()).await?;
    report_state(
        state.as_ref(),
        format,
        &format!("Sequence for lead {}", lead_id),
        &format!("Lead {} has no sequence", lead_id),
    )
}

fn report_state(
    state: Option<&SequenceState>,
    format: &str,
    found: &str,
    missing: &str,
) -> Result<()> {
    if is_json(format) {
        return print_json(&state);
    }

    let out = Output::new();
    match state {
        Some(state) => {
            out.success(found);
            out.field("Sequence", &state.sequence_id);
            out.field("Status", state.status.as_str());
            out.field(
                "Completed steps",
                state.current_step_index.map_or(0, |i| i + 1),
            );
        }
        None => out.warning(missing),
    }
    Ok(())
}

fn print_suggestion(out: &Output, s: &FollowUpSuggestion) {
    println!(
        "\n{} {} via {} at {}",
        out.priority(s.priority),
        s.lead_id,
        s.recommended_channel,
        s.recommended_time.format("%Y-%m-%d %H:%M UTC")
    );
    out.field("Suggestion", &s.id);
    out.field("Reason", &s.reason);
    out.field("Status", s.status.as_str());
    if let Some(content) = &s.content {
        out.field("Draft", content);
    }
}
