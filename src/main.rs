use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadflow::channels::NormalizedMessage;
use leadflow::cli::commands;
use leadflow::types::{
    Channel, GoalInput, GoalType, LeadId, LifecycleState, QueueStatus, ReplyKind,
};

/// Parse reply classification from string
fn parse_reply_kind(s: &str) -> Result<ReplyKind, String> {
    match s.to_lowercase().as_str() {
        "positive" => Ok(ReplyKind::Positive),
        "negative" => Ok(ReplyKind::Negative),
        "neutral" => Ok(ReplyKind::Neutral),
        _ => Err(format!(
            "Invalid reply '{}'. Valid values: positive, negative, neutral",
            s
        )),
    }
}

#[derive(Parser)]
#[command(name = "leadflow")]
#[command(
    version,
    about = "Goal planning, follow-up sequencing and daily action queues for sales practitioners"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,

    #[arg(
        short = 'f',
        long,
        global = true,
        default_value = "text",
        help = "Output format: text, json"
    )]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize leadflow in the current directory
    Init {
        #[arg(long, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Break a goal down into daily activity targets
    Plan {
        #[arg(long, help = "network_marketing, real_estate, finance, coaching")]
        vertical: String,
        #[arg(long = "goal-type", help = "income, rank, deals, volume, customers, partners")]
        goal_type: GoalType,
        #[arg(long, help = "Target value (income per month, units, ...)")]
        target: f64,
        #[arg(long, help = "Timeframe in months")]
        months: u32,
        #[arg(long, help = "Current value already achieved")]
        current: Option<f64>,
        #[arg(long, help = "Target rank id for rank goals")]
        rank: Option<String>,
    },

    /// List verticals and their KPIs
    Verticals,

    /// Sequence follow-ups
    Followups {
        #[command(subcommand)]
        action: FollowupAction,
    },

    /// Lead lifecycle
    Lead {
        #[command(subcommand)]
        action: LeadAction,
    },

    /// Lifecycle follow-up queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Workflow detection and the daily action queue
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Import leads, sequences and cycle steps from a JSON or YAML file
    Import {
        #[arg(help = "Dataset file")]
        file: PathBuf,
    },

    /// Messaging channels
    Channels {
        #[command(subcommand)]
        action: ChannelAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum FollowupAction {
    /// Next follow-up for one lead
    Next { lead_id: LeadId },
    /// Follow-ups due today across leads
    Today {
        #[arg(long, help = "Only leads owned by this user")]
        user: Option<String>,
    },
    /// Acknowledge a sent suggestion
    Sent {
        suggestion_id: String,
        #[arg(long, help = "Text actually sent")]
        content: Option<String>,
    },
    /// Record a reply from the lead
    Reply {
        lead_id: LeadId,
        #[arg(value_parser = parse_reply_kind)]
        kind: ReplyKind,
    },
    /// Resume a paused sequence
    Resume { lead_id: LeadId },
    /// Stop a sequence
    Stop { lead_id: LeadId },
}

#[derive(Subcommand)]
enum LeadAction {
    /// Move a lead to a new lifecycle state
    State {
        lead_id: LeadId,
        #[arg(help = "new, engaged, opportunity, won, lost, churned, dormant")]
        state: LifecycleState,
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// List cycle queue entries
    List {
        #[arg(long)]
        user: String,
        #[arg(long, help = "pending, sent, cancelled, skipped")]
        status: Option<QueueStatus>,
    },
    /// Mark a queue entry sent and schedule the next step
    Sent {
        queue_id: String,
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Classify a JSON lead snapshot
    Detect { file: PathBuf },
    /// Prioritized action queue for a user
    Queue {
        #[arg(long)]
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum ChannelAction {
    /// Check a recipient address for a channel
    Validate { channel: Channel, recipient: String },
    /// Send one message (dry run unless a webhook is configured)
    Send {
        channel: Channel,
        recipient: String,
        body: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, help = "Idempotency key, e.g. the suggestion id")]
        key: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mleadflow encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let format = cli.format.as_str();

    match cli.command {
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Plan {
            vertical,
            goal_type,
            target,
            months,
            current,
            rank,
        } => {
            let input = GoalInput {
                vertical_id: vertical,
                goal_type,
                target_value: target,
                timeframe_months: months,
                current_value: current,
                target_rank_id: rank,
            };
            commands::plan::run(&input, format)?;
        }
        Commands::Verticals => commands::plan::verticals(format)?,
        Commands::Followups { action } => {
            let rt = Runtime::new()?;
            match action {
                FollowupAction::Next { lead_id } => {
                    rt.block_on(commands::followups::next(&lead_id, format))?
                }
                FollowupAction::Today { user } => {
                    rt.block_on(commands::followups::today(user.as_deref(), format))?
                }
                FollowupAction::Sent {
                    suggestion_id,
                    content,
                } => rt.block_on(commands::followups::sent(&suggestion_id, content, format))?,
                FollowupAction::Reply { lead_id, kind } => {
                    rt.block_on(commands::followups::reply(&lead_id, kind, format))?
                }
                FollowupAction::Resume { lead_id } => {
                    rt.block_on(commands::followups::resume(&lead_id, format))?
                }
                FollowupAction::Stop { lead_id } => {
                    rt.block_on(commands::followups::stop(&lead_id, format))?
                }
            }
        }
        Commands::Lead { action } => match action {
            LeadAction::State {
                lead_id,
                state,
                user,
            } => Runtime::new()?.block_on(commands::cycle::change_state(
                &user, &lead_id, state, format,
            ))?,
        },
        Commands::Queue { action } => {
            let rt = Runtime::new()?;
            match action {
                QueueAction::List { user, status } => {
                    rt.block_on(commands::cycle::list(&user, status, format))?
                }
                QueueAction::Sent { queue_id, user } => {
                    rt.block_on(commands::cycle::sent(&user, &queue_id, format))?
                }
            }
        }
        Commands::Workflow { action } => match action {
            WorkflowAction::Detect { file } => commands::workflow::detect(&file, format)?,
            WorkflowAction::Queue { user, limit } => {
                Runtime::new()?.block_on(commands::workflow::queue(&user, limit, format))?
            }
        },
        Commands::Import { file } => commands::import::run(&file)?,
        Commands::Channels { action } => match action {
            ChannelAction::Validate { channel, recipient } => {
                commands::channels::validate(channel, &recipient, format)?
            }
            ChannelAction::Send {
                channel,
                recipient,
                body,
                subject,
                key,
            } => {
                let mut message = NormalizedMessage::new(recipient, body);
                message.subject = subject;
                message.idempotency_key = key;
                Runtime::new()?.block_on(commands::channels::send(channel, message, format))?
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { global } => commands::config::show(global, format)?,
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?
                } else {
                    commands::config::init_project(force)?
                }
            }
        },
    }

    Ok(())
}
