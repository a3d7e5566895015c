//! SQLite Storage with Connection Pooling and Safe Transactions
//!
//! Implements every repository port on one pooled SQLite file:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - Version-tracked migrations
//! - WAL mode for optimal read/write performance
//!
//! Aggregates (leads, sequences, states, suggestions, queue entries) are
//! stored as JSON next to the columns queries filter on.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Dataset;
use crate::followup::{CycleRepository, FollowUpRepository, WorkflowRepository};
use crate::types::{
    CycleStep, FlowError, FollowUpMessage, FollowUpSuggestion, Interaction, Lead, LeadContext,
    LifecycleState, QueueEntry, QueuePass, QueueStatus, Result, ResultExt, Sequence,
    SequenceBinding, SequenceState, SuggestionStatus, enum_to_str, log_filter_warn, pick_binding,
};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

/// Migration definitions
struct Migration {
    version: u32,
    description: &'static str,
    up: &'static str,
}

/// Applied in order to files whose `user_version` is below the entry's version
const MIGRATIONS: &[Migration] = &[];

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: u32,
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 16;

    /// Two connections per core, clamped
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        (cores * 2).clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }

    pub fn auto() -> Self {
        let max_size = Self::optimal_pool_size();
        Self {
            max_size,
            min_idle: (max_size / 4).max(1),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| FlowError::Repository(format!("Invalid stored timestamp '{}': {}", value, e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

/// Inverse of `enum_to_str` for unit enums stored as text
fn enum_from_str<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(
        raw.to_string(),
    ))?)
}

/// Run a single-column JSON query and decode each row
fn query_json<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
    let mut decoded = Vec::new();
    for raw in rows {
        decoded.push(from_json(&raw?)?);
    }
    Ok(decoded)
}

fn query_json_opt<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>> {
    let raw: Option<String> = conn
        .query_row(sql, params, |row| row.get(0))
        .optional()?;
    raw.as_deref().map(from_json).transpose()
}

fn owned_by(lead: &Lead, user_id: &str) -> bool {
    lead.user_id.as_deref().is_none_or(|owner| owner == user_id)
}

fn write_lead(conn: &Connection, ctx: &LeadContext) -> Result<()> {
    conn.execute(
        "INSERT INTO leads (id, user_id, status, context_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             user_id = excluded.user_id,
             status = excluded.status,
             context_json = excluded.context_json,
             updated_at = excluded.updated_at",
        params![
            ctx.lead.id,
            ctx.lead.user_id,
            enum_to_str(&ctx.lead.status),
            to_json(ctx)?,
            timestamp(&Utc::now()),
        ],
    )?;
    Ok(())
}

fn write_queue_entry(conn: &Connection, entry: &QueueEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO queue_entries (id, user_id, lead_id, status, due_at, entry_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             status = excluded.status,
             due_at = excluded.due_at,
             entry_json = excluded.entry_json",
        params![
            entry.id,
            entry.user_id,
            entry.lead_id,
            enum_to_str(&entry.status),
            timestamp(&entry.due_at),
            to_json(entry)?,
        ],
    )?;
    Ok(())
}

fn write_interaction(conn: &Connection, lead_id: &str, interaction: &Interaction) -> Result<()> {
    conn.execute(
        "INSERT INTO interactions (lead_id, interaction_type, content, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            lead_id,
            interaction.interaction_type,
            interaction.content,
            timestamp(&interaction.created_at),
        ],
    )?;
    Ok(())
}

fn write_cycle_step(conn: &Connection, step: &CycleStep) -> Result<()> {
    conn.execute(
        "INSERT INTO cycle_steps (id, lead_state, step_order, step_json)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             lead_state = excluded.lead_state,
             step_order = excluded.step_order,
             step_json = excluded.step_json",
        params![
            step.id,
            enum_to_str(&step.lead_state),
            step.step_order,
            to_json(step)?,
        ],
    )?;
    Ok(())
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (creating parent directories) and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Self::open_with_config(path, PoolConfig::default())?;
        db.initialize()?;
        Ok(db)
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| {
                FlowError::Repository(format!("Failed to create connection pool: {}", e))
            })?;

        Ok(Self { pool })
    }

    /// In-memory database with the schema applied, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(|e| {
            FlowError::Repository(format!("Failed to create in-memory pool: {}", e))
        })?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            FlowError::Repository(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Create tables; fresh files start at the current version, older ones migrate.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;

        if current_version == 0 {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to set schema version")?;
            return Ok(());
        }

        drop(conn);
        self.migrate(current_version)
    }

    fn migrate(&self, current_version: u32) -> Result<()> {
        let conn = self.conn()?;

        for migration in MIGRATIONS {
            if migration.version > current_version {
                conn.execute_batch(migration.up).with_context_fn(|| {
                    format!(
                        "Failed to apply migration {}: {}",
                        migration.version, migration.description
                    )
                })?;

                tracing::info!(
                    "Applied migration {}: {}",
                    migration.version,
                    migration.description
                );
            }
        }

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to update schema version")?;
        }

        Ok(())
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// A panicking closure rolls the transaction back and surfaces as an
    /// error instead of poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            // Rolled back on drop
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(FlowError::Repository(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    /// Load a dataset in one transaction.
    ///
    /// Leads, sequences and cycle steps are upserted by id; bindings are
    /// replaced when the dataset carries any; interactions are appended.
    pub fn import(&self, dataset: &Dataset) -> Result<()> {
        self.transaction(|conn| {
            for ctx in &dataset.leads {
                write_lead(conn, ctx)?;
            }
            for sequence in &dataset.sequences {
                conn.execute(
                    "INSERT INTO sequences (id, sequence_json) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET sequence_json = excluded.sequence_json",
                    params![sequence.id, to_json(sequence)?],
                )?;
            }
            if !dataset.bindings.is_empty() {
                conn.execute("DELETE FROM sequence_bindings", [])?;
                for binding in &dataset.bindings {
                    conn.execute(
                        "INSERT INTO sequence_bindings (sequence_id, binding_json) VALUES (?1, ?2)",
                        params![binding.sequence_id, to_json(binding)?],
                    )?;
                }
            }
            for step in &dataset.cycle_steps {
                write_cycle_step(conn, step)?;
            }
            for (lead_id, interactions) in &dataset.interactions {
                for interaction in interactions {
                    write_interaction(conn, lead_id, interaction)?;
                }
            }
            Ok(())
        })?;

        tracing::info!(
            "Imported {} leads, {} sequences, {} cycle steps",
            dataset.leads.len(),
            dataset.sequences.len(),
            dataset.cycle_steps.len()
        );
        Ok(())
    }

    pub fn insert_lead(&self, ctx: &LeadContext) -> Result<()> {
        write_lead(&*self.conn()?, ctx)
    }

    pub fn insert_queue_entry(&self, entry: &QueueEntry) -> Result<()> {
        write_queue_entry(&*self.conn()?, entry)
    }

    fn load_leads(&self, user_id: Option<&str>) -> Result<Vec<LeadContext>> {
        let conn = self.conn()?;
        query_json(
            &conn,
            "SELECT context_json FROM leads
             WHERE ?1 IS NULL OR user_id IS NULL OR user_id = ?1
             ORDER BY id",
            &[&user_id],
        )
    }
}

#[async_trait]
impl FollowUpRepository for Database {
    async fn get_lead_context(&self, lead_id: &str) -> Result<Option<LeadContext>> {
        let conn = self.conn()?;
        query_json_opt(
            &conn,
            "SELECT context_json FROM leads WHERE id = ?1",
            &[&lead_id],
        )
    }

    async fn list_all_leads(&self, user_id: Option<&str>) -> Result<Vec<LeadContext>> {
        self.load_leads(user_id)
    }

    async fn get_active_sequence_state(&self, lead_id: &str) -> Result<Option<SequenceState>> {
        let conn = self.conn()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT state_json, version FROM sequence_states WHERE lead_id = ?1",
                params![lead_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(raw, version)| -> Result<SequenceState> {
            let mut state: SequenceState = from_json(&raw)?;
            state.version = version;
            Ok(state)
        })
        .transpose()
    }

    async fn upsert_sequence_state(&self, state: &SequenceState) -> Result<SequenceState> {
        self.transaction(|conn| {
            let stored_version: Option<i64> = conn
                .query_row(
                    "SELECT version FROM sequence_states WHERE lead_id = ?1",
                    params![state.lead_id],
                    |row| row.get(0),
                )
                .optional()?;

            if stored_version.unwrap_or(0) != state.version {
                return Err(FlowError::VersionConflict {
                    lead_id: state.lead_id.clone(),
                    expected: state.version,
                });
            }

            let mut stored = state.clone();
            stored.version = state.version + 1;
            conn.execute(
                "INSERT INTO sequence_states (lead_id, sequence_id, status, state_json, version)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(lead_id) DO UPDATE SET
                     sequence_id = excluded.sequence_id,
                     status = excluded.status,
                     state_json = excluded.state_json,
                     version = excluded.version",
                params![
                    stored.lead_id,
                    stored.sequence_id,
                    stored.status.as_str(),
                    to_json(&stored)?,
                    stored.version,
                ],
            )?;
            Ok(stored)
        })
    }

    async fn get_sequence_by_id(&self, sequence_id: &str) -> Result<Option<Sequence>> {
        let conn = self.conn()?;
        query_json_opt(
            &conn,
            "SELECT sequence_json FROM sequences WHERE id = ?1",
            &[&sequence_id],
        )
    }

    async fn get_default_sequence_for_lead(&self, lead: &Lead) -> Result<Option<Sequence>> {
        let bindings: Vec<SequenceBinding> = {
            let conn = self.conn()?;
            query_json(
                &conn,
                "SELECT binding_json FROM sequence_bindings ORDER BY id",
                &[],
            )?
        };

        match pick_binding(&bindings, lead) {
            Some(binding) => self.get_sequence_by_id(&binding.sequence_id).await,
            None => {
                tracing::debug!("No sequence binding matches lead {}", lead.id);
                Ok(None)
            }
        }
    }

    async fn get_recent_interactions(
        &self,
        lead_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT interaction_type, content, created_at FROM interactions
             WHERE lead_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![lead_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut interactions = Vec::new();
        for row in rows {
            let (interaction_type, content, created_at) = row?;
            interactions.push(Interaction {
                interaction_type,
                created_at: parse_timestamp(&created_at)?,
                content,
            });
        }
        Ok(interactions)
    }

    async fn record_interaction(&self, lead_id: &str, interaction: &Interaction) -> Result<()> {
        write_interaction(&*self.conn()?, lead_id, interaction)
    }

    async fn log_followup_suggestion(&self, suggestion: &FollowUpSuggestion) -> Result<()> {
        self.transaction(|conn| {
            let existing: Option<FollowUpSuggestion> = query_json_opt(
                conn,
                "SELECT suggestion_json FROM followup_suggestions WHERE id = ?1",
                &[&suggestion.id],
            )?;

            let mut stored = suggestion.clone();
            if let Some(existing) = existing {
                stored.status = existing.status;
            }
            conn.execute(
                "INSERT INTO followup_suggestions (id, lead_id, status, suggestion_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     status = excluded.status,
                     suggestion_json = excluded.suggestion_json,
                     updated_at = excluded.updated_at",
                params![
                    stored.id,
                    stored.lead_id,
                    stored.status.as_str(),
                    to_json(&stored)?,
                    timestamp(&Utc::now()),
                ],
            )?;
            Ok(())
        })
    }

    async fn get_suggestion(&self, suggestion_id: &str) -> Result<Option<FollowUpSuggestion>> {
        let conn = self.conn()?;
        query_json_opt(
            &conn,
            "SELECT suggestion_json FROM followup_suggestions WHERE id = ?1",
            &[&suggestion_id],
        )
    }

    async fn update_suggestion_status(
        &self,
        suggestion_id: &str,
        status: SuggestionStatus,
    ) -> Result<()> {
        self.transaction(|conn| {
            let mut suggestion: FollowUpSuggestion = query_json_opt(
                conn,
                "SELECT suggestion_json FROM followup_suggestions WHERE id = ?1",
                &[&suggestion_id],
            )?
            .ok_or_else(|| {
                FlowError::Repository(format!("Suggestion not found: {}", suggestion_id))
            })?;

            suggestion.status = status;
            conn.execute(
                "UPDATE followup_suggestions
                 SET status = ?2, suggestion_json = ?3, updated_at = ?4
                 WHERE id = ?1",
                params![
                    suggestion_id,
                    status.as_str(),
                    to_json(&suggestion)?,
                    timestamp(&Utc::now()),
                ],
            )?;
            Ok(())
        })
    }

    async fn log_followup_message(&self, message: &FollowUpMessage) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO followup_messages (suggestion_id, lead_id, channel, content, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.suggestion_id,
                message.lead_id,
                message.channel.as_str(),
                message.content,
                timestamp(&message.sent_at),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl CycleRepository for Database {
    async fn get_lead_state(
        &self,
        user_id: &str,
        lead_id: &str,
    ) -> Result<Option<LifecycleState>> {
        let conn = self.conn()?;
        let ctx: Option<LeadContext> = query_json_opt(
            &conn,
            "SELECT context_json FROM leads WHERE id = ?1",
            &[&lead_id],
        )?;
        let Some(ctx) = ctx.filter(|ctx| owned_by(&ctx.lead, user_id)) else {
            return Ok(None);
        };

        let recorded: Option<String> = conn
            .query_row(
                "SELECT state FROM lead_states WHERE lead_id = ?1",
                params![lead_id],
                |row| row.get(0),
            )
            .optional()?;

        // An unreadable stored state falls back to the CRM status
        let state = recorded
            .and_then(|raw| log_filter_warn(enum_from_str::<LifecycleState>(&raw), "Stored lifecycle state"))
            .unwrap_or_else(|| LifecycleState::from(ctx.lead.status));
        Ok(Some(state))
    }

    async fn get_cycle_steps(&self, state: LifecycleState) -> Result<Vec<CycleStep>> {
        let conn = self.conn()?;
        query_json(
            &conn,
            "SELECT step_json FROM cycle_steps WHERE lead_state = ?1 ORDER BY step_order",
            &[&enum_to_str(&state)],
        )
    }

    async fn get_queue_entry(&self, user_id: &str, queue_id: &str) -> Result<Option<QueueEntry>> {
        let conn = self.conn()?;
        query_json_opt(
            &conn,
            "SELECT entry_json FROM queue_entries WHERE id = ?1 AND user_id = ?2",
            &[&queue_id, &user_id],
        )
    }

    async fn list_queue(
        &self,
        user_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<QueueEntry>> {
        let conn = self.conn()?;
        let status = status.map(|s| enum_to_str(&s));
        query_json(
            &conn,
            "SELECT entry_json FROM queue_entries
             WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY due_at, id",
            &[&user_id, &status],
        )
    }

    async fn apply_state_change(
        &self,
        user_id: &str,
        lead_id: &str,
        new_state: LifecycleState,
        seed: Option<&QueueEntry>,
    ) -> Result<usize> {
        self.transaction(|conn| {
            let pending: Vec<QueueEntry> = query_json(
                conn,
                "SELECT entry_json FROM queue_entries
                 WHERE user_id = ?1 AND lead_id = ?2 AND status = ?3",
                &[&user_id, &lead_id, &enum_to_str(&QueueStatus::Pending)],
            )?;

            for mut entry in pending.iter().cloned() {
                entry.status = QueueStatus::Cancelled;
                write_queue_entry(conn, &entry)?;
            }

            conn.execute(
                "INSERT INTO lead_states (lead_id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(lead_id) DO UPDATE SET
                     state = excluded.state,
                     updated_at = excluded.updated_at",
                params![lead_id, enum_to_str(&new_state), timestamp(&Utc::now())],
            )?;

            if let Some(seed) = seed {
                write_queue_entry(conn, seed)?;
            }
            Ok(pending.len())
        })
    }

    async fn complete_entry(
        &self,
        queue_id: &str,
        sent_at: DateTime<Utc>,
        next: Option<&QueueEntry>,
    ) -> Result<()> {
        self.transaction(|conn| {
            let mut entry: QueueEntry = query_json_opt(
                conn,
                "SELECT entry_json FROM queue_entries WHERE id = ?1",
                &[&queue_id],
            )?
            .ok_or_else(|| FlowError::Repository(format!("Queue entry not found: {}", queue_id)))?;

            entry.status = QueueStatus::Sent;
            entry.sent_at = Some(sent_at);
            write_queue_entry(conn, &entry)?;

            if let Some(next) = next {
                write_queue_entry(conn, next)?;
            }
            Ok(())
        })
    }
}

#[async_trait]
impl WorkflowRepository for Database {
    async fn list_leads_for_pass(
        &self,
        user_id: &str,
        pass: QueuePass,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeadContext>> {
        let statuses: Vec<String> = pass
            .statuses()
            .unwrap_or(&[])
            .iter()
            .map(enum_to_str)
            .collect();

        let mut sql = String::from(
            "SELECT context_json FROM leads WHERE (user_id IS NULL OR user_id = ?1)",
        );
        if !statuses.is_empty() {
            let placeholders: Vec<String> =
                (0..statuses.len()).map(|i| format!("?{}", i + 2)).collect();
            sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY id");

        let mut values: Vec<&dyn ToSql> = vec![&user_id];
        values.extend(statuses.iter().map(|s| s as &dyn ToSql));

        let conn = self.conn()?;
        let leads: Vec<LeadContext> = query_json(&conn, &sql, &values)?;
        Ok(leads
            .into_iter()
            .filter(|ctx| pass.matches(ctx, now))
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, LeadStatus, Priority};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
    }

    fn db() -> Database {
        Database::open_in_memory().expect("Failed to open in-memory database")
    }

    fn lead(id: &str, user: Option<&str>, status: LeadStatus) -> LeadContext {
        let mut lead = Lead::new(id);
        lead.user_id = user.map(String::from);
        lead.status = status;
        LeadContext::new(lead)
    }

    #[test]
    fn test_open_creates_tables() {
        let db = db();
        let conn = db.conn().expect("Failed to get connection");
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in ["leads", "sequence_states", "followup_suggestions", "queue_entries"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_open_file_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("leadflow.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_lead(&lead("l1", None, LeadStatus::New)).unwrap();
        }
        let reopened = Database::open(&path).unwrap();
        let leads = reopened.load_leads(None).unwrap();
        assert_eq!(leads.len(), 1);

        let version: u32 = reopened
            .conn()
            .unwrap()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_transaction_panic_safety() {
        let db = db();

        let result: Result<()> = db.transaction(|_conn| {
            panic!("Intentional panic for testing");
        });

        assert!(result.unwrap_err().to_string().contains("panicked"));
        assert!(db.conn().is_ok());
    }

    #[tokio::test]
    async fn test_sequence_state_version_check() {
        let db = db();
        let state = SequenceState::start("l1", "s1", now());

        let first = db.upsert_sequence_state(&state).await.unwrap();
        assert_eq!(first.version, 1);
        assert!(matches!(
            db.upsert_sequence_state(&state).await,
            Err(FlowError::VersionConflict { .. })
        ));

        let mut next = first.clone();
        next.current_step_index = Some(0);
        let second = db.upsert_sequence_state(&next).await.unwrap();
        assert_eq!(second.version, 2);

        let loaded = db.get_active_sequence_state("l1").await.unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn test_suggestion_status_kept_and_message_logged_once() {
        let db = db();
        let suggestion = FollowUpSuggestion {
            id: "sg1".into(),
            lead_id: "l1".into(),
            sequence_id: "s1".into(),
            step_id: "st1".into(),
            recommended_channel: Channel::Email,
            recommended_time: now(),
            priority: Priority::High,
            reason: "test".into(),
            meta: serde_json::json!({"day_offset": 2}),
            content: Some("Hallo".into()),
            status: SuggestionStatus::Pending,
        };
        db.log_followup_suggestion(&suggestion).await.unwrap();
        db.update_suggestion_status("sg1", SuggestionStatus::Sent)
            .await
            .unwrap();
        db.log_followup_suggestion(&suggestion).await.unwrap();
        assert_eq!(
            db.get_suggestion("sg1").await.unwrap().unwrap().status,
            SuggestionStatus::Sent
        );
        assert!(
            db.update_suggestion_status("missing", SuggestionStatus::Sent)
                .await
                .is_err()
        );

        let message = FollowUpMessage {
            suggestion_id: "sg1".into(),
            lead_id: "l1".into(),
            channel: Channel::Email,
            content: Some("Hallo".into()),
            sent_at: now(),
        };
        db.log_followup_message(&message).await.unwrap();
        db.log_followup_message(&message).await.unwrap();
        let count: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM followup_messages", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_interactions_newest_first_with_limit() {
        let db = db();
        for (i, kind) in ["message_sent", "reply_neutral", "reply_positive"]
            .iter()
            .enumerate()
        {
            db.record_interaction("l1", &Interaction::new(*kind, now() + Duration::hours(i as i64)))
                .await
                .unwrap();
        }
        let recent = db.get_recent_interactions("l1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].interaction_type, "reply_positive");
        assert_eq!(recent[0].created_at, now() + Duration::hours(2));
    }

    #[tokio::test]
    async fn test_interactions_tie_prefers_latest_insert() {
        let db = db();
        for kind in ["message_sent", "reply_positive", "reply_negative"] {
            db.record_interaction("l1", &Interaction::new(kind, now()))
                .await
                .unwrap();
        }
        let recent = db.get_recent_interactions("l1", 3).await.unwrap();
        let kinds: Vec<_> = recent.iter().map(|i| i.interaction_type.as_str()).collect();
        assert_eq!(kinds, ["reply_negative", "reply_positive", "message_sent"]);
    }

    #[tokio::test]
    async fn test_state_change_cancels_pending_and_seeds() {
        let db = db();
        db.insert_lead(&lead("l1", Some("u1"), LeadStatus::New)).unwrap();
        assert_eq!(
            db.get_lead_state("u1", "l1").await.unwrap(),
            Some(LifecycleState::New)
        );
        assert_eq!(db.get_lead_state("u2", "l1").await.unwrap(), None);

        let step = CycleStep {
            id: "c1".into(),
            lead_state: LifecycleState::New,
            step_order: 1,
            days_after_previous: 0,
            channel: Channel::Whatsapp,
            action: "intro".into(),
            template_key: "intro".into(),
        };
        let old = QueueEntry::schedule("u1", "l1", &step, now(), now());
        db.insert_queue_entry(&old).unwrap();

        let engaged = CycleStep {
            id: "c2".into(),
            lead_state: LifecycleState::Engaged,
            ..step.clone()
        };
        let seed = QueueEntry::schedule("u1", "l1", &engaged, now(), now());
        let cancelled = db
            .apply_state_change("u1", "l1", LifecycleState::Engaged, Some(&seed))
            .await
            .unwrap();
        assert_eq!(cancelled, 1);
        assert_eq!(
            db.get_lead_state("u1", "l1").await.unwrap(),
            Some(LifecycleState::Engaged)
        );

        let pending = db
            .list_queue("u1", Some(QueueStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, seed.id);

        db.complete_entry(&seed.id, now(), None).await.unwrap();
        let sent = db.get_queue_entry("u1", &seed.id).await.unwrap().unwrap();
        assert_eq!(sent.status, QueueStatus::Sent);
        assert_eq!(sent.sent_at, Some(now()));
        assert!(db.complete_entry("missing", now(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_pass_query_filters_status_and_owner() {
        let db = db();
        db.insert_lead(&lead("a", Some("u1"), LeadStatus::New)).unwrap();
        db.insert_lead(&lead("b", None, LeadStatus::New)).unwrap();
        db.insert_lead(&lead("c", Some("u2"), LeadStatus::New)).unwrap();
        db.insert_lead(&lead("d", Some("u1"), LeadStatus::Qualified))
            .unwrap();

        let new_leads = db
            .list_leads_for_pass("u1", QueuePass::NewLeads, 10, now())
            .await
            .unwrap();
        let ids: Vec<&str> = new_leads.iter().map(|c| c.lead.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let pipeline = db
            .list_leads_for_pass("u1", QueuePass::ActivePipeline, 10, now())
            .await
            .unwrap();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline[0].lead.id, "d");

        let fallback = db
            .list_leads_for_pass("u1", QueuePass::Fallback, 2, now())
            .await
            .unwrap();
        assert_eq!(fallback.len(), 2);
    }

    #[test]
    fn test_pool_config_bounds() {
        let size = PoolConfig::optimal_pool_size();
        assert!(size >= PoolConfig::MIN_POOL_SIZE);
        assert!(size <= PoolConfig::MAX_POOL_SIZE);
        assert!(PoolConfig::auto().min_idle <= size);
    }
}
