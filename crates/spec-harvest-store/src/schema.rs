// crates/spec-harvest-store/src/schema.rs
// ============================================================================
// Module: SpecDb Schema
// Description: DDL, forward-only migrations, slot sweeps, integrity checks.
// Purpose: Bring a database file to the current schema and verify the
//          startup invariants before any operation runs.
// Dependencies: rusqlite, crate::error
// ============================================================================

//! ## Overview
//! Startup order is fixed: create tables and indexes if missing, apply
//! forward-only add-column migrations (each idempotent), create the partial
//! slot-identity indexes, delete slot-incomplete key review states (a
//! pre-existing corruption from older schemas, cascading to runs, run
//! sources, and audit entries), then verify invariants. Any remaining
//! violation is fatal; there is no automatic repair beyond the sweep.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::IntegrityViolation;
use crate::error::SpecDbError;
use crate::error::db_err;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current SpecDb schema version.
pub const SCHEMA_VERSION: i64 = 3;

/// Predicate matching slot-incomplete key review states.
const INCOMPLETE_SLOT_PREDICATE: &str = "(kind = 'grid_key' AND item_state_id IS NULL)
     OR (kind = 'enum_key' AND list_value_id IS NULL)
     OR (kind = 'component_key' AND component_value_id IS NULL
         AND (component_identity_id IS NULL
              OR property_key IS NULL OR property_key = ''))";

/// Base table DDL for a fresh database.
const CREATE_TABLES_SQL: &str = "
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    brand TEXT,
    model TEXT,
    variant TEXT,
    seed_urls TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'active',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (category, product_id)
);
CREATE TABLE IF NOT EXISTS component_identities (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    component_type TEXT NOT NULL,
    canonical_name TEXT NOT NULL,
    maker TEXT NOT NULL,
    review_status TEXT NOT NULL DEFAULT 'pending',
    aliases_overridden INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (category, component_type, canonical_name, maker)
);
CREATE TABLE IF NOT EXISTS component_aliases (
    id INTEGER PRIMARY KEY,
    identity_id INTEGER NOT NULL REFERENCES component_identities(id),
    alias TEXT NOT NULL,
    UNIQUE (identity_id, alias)
);
CREATE TABLE IF NOT EXISTS component_values (
    id INTEGER PRIMARY KEY,
    identity_id INTEGER NOT NULL REFERENCES component_identities(id),
    category TEXT NOT NULL,
    component_type TEXT NOT NULL,
    canonical_name TEXT NOT NULL,
    maker TEXT NOT NULL,
    property_key TEXT NOT NULL,
    value TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0,
    variance_policy TEXT NOT NULL DEFAULT 'authoritative',
    constraints TEXT NOT NULL DEFAULT '[]',
    needs_review INTEGER NOT NULL DEFAULT 0,
    overridden INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    UNIQUE (category, component_type, canonical_name, maker, property_key)
);
CREATE TABLE IF NOT EXISTS enum_lists (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    field_key TEXT NOT NULL,
    UNIQUE (category, field_key)
);
CREATE TABLE IF NOT EXISTS enum_values (
    id INTEGER PRIMARY KEY,
    list_id INTEGER NOT NULL REFERENCES enum_lists(id),
    category TEXT NOT NULL,
    field_key TEXT NOT NULL,
    value TEXT NOT NULL,
    normalized TEXT NOT NULL,
    policy TEXT NOT NULL DEFAULT 'open',
    UNIQUE (category, field_key, value)
);
CREATE TABLE IF NOT EXISTS candidates (
    candidate_id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    field_key TEXT NOT NULL,
    value TEXT NOT NULL,
    score REAL NOT NULL DEFAULT 0,
    rank INTEGER NOT NULL DEFAULT 0,
    source_url TEXT NOT NULL DEFAULT '',
    source_host TEXT NOT NULL DEFAULT '',
    source_tier TEXT NOT NULL DEFAULT '',
    source_method TEXT NOT NULL DEFAULT '',
    snippet_id TEXT NOT NULL DEFAULT '',
    snippet_hash TEXT NOT NULL DEFAULT '',
    quote TEXT NOT NULL DEFAULT '',
    retrieved_at TEXT NOT NULL DEFAULT '',
    run_id TEXT NOT NULL DEFAULT '',
    is_component_field INTEGER NOT NULL DEFAULT 0,
    is_list_field INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_candidates_product
    ON candidates (category, product_id);
CREATE INDEX IF NOT EXISTS idx_candidates_product_field
    ON candidates (category, product_id, field_key);
CREATE TABLE IF NOT EXISTS item_field_states (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    field_key TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT 'unk',
    confidence REAL NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT '',
    accepted_candidate_id TEXT,
    overridden INTEGER NOT NULL DEFAULT 0,
    needs_ai_review INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    UNIQUE (category, product_id, field_key)
);
CREATE TABLE IF NOT EXISTS item_component_links (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    field_key TEXT NOT NULL,
    identity_id INTEGER NOT NULL REFERENCES component_identities(id),
    match_type TEXT NOT NULL DEFAULT 'unresolved',
    match_score REAL NOT NULL DEFAULT 0,
    UNIQUE (category, product_id, field_key)
);
CREATE TABLE IF NOT EXISTS item_list_links (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    field_key TEXT NOT NULL,
    list_value_id INTEGER NOT NULL REFERENCES enum_values(id),
    UNIQUE (category, product_id, field_key, list_value_id)
);
CREATE TABLE IF NOT EXISTS candidate_reviews (
    id INTEGER PRIMARY KEY,
    candidate_id TEXT NOT NULL,
    context_type TEXT NOT NULL,
    context_id INTEGER NOT NULL,
    human_decision TEXT,
    human_decided_at INTEGER,
    ai_decision TEXT,
    ai_decided_at INTEGER,
    ai_model TEXT,
    UNIQUE (candidate_id, context_type, context_id)
);
CREATE TABLE IF NOT EXISTS source_registry (
    source_id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    host TEXT NOT NULL,
    run_id TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    tier TEXT NOT NULL DEFAULT '',
    method TEXT NOT NULL DEFAULT '',
    captured_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS source_assertions (
    assertion_id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL REFERENCES source_registry(source_id),
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    field_key TEXT NOT NULL,
    context_kind TEXT NOT NULL,
    item_state_id INTEGER REFERENCES item_field_states(id),
    component_value_id INTEGER REFERENCES component_values(id),
    list_value_id INTEGER REFERENCES enum_values(id),
    enum_list_id INTEGER REFERENCES enum_lists(id),
    selected_candidate_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_assertions_source
    ON source_assertions (source_id);
CREATE TABLE IF NOT EXISTS source_evidence_refs (
    id INTEGER PRIMARY KEY,
    assertion_id TEXT NOT NULL REFERENCES source_assertions(assertion_id),
    snippet_id TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    quote TEXT NOT NULL DEFAULT '',
    snippet_hash TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_evidence_refs_assertion
    ON source_evidence_refs (assertion_id);
CREATE TABLE IF NOT EXISTS key_review_states (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    kind TEXT NOT NULL,
    item_state_id INTEGER REFERENCES item_field_states(id),
    list_value_id INTEGER REFERENCES enum_values(id),
    component_value_id INTEGER REFERENCES component_values(id),
    component_identity_id INTEGER REFERENCES component_identities(id),
    property_key TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    needs_review INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS key_review_runs (
    id INTEGER PRIMARY KEY,
    review_state_id INTEGER NOT NULL REFERENCES key_review_states(id),
    provider TEXT NOT NULL DEFAULT '',
    model TEXT NOT NULL DEFAULT '',
    tokens_in INTEGER NOT NULL DEFAULT 0,
    tokens_out INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    verdict TEXT,
    started_at INTEGER NOT NULL,
    completed_at INTEGER
);
CREATE TABLE IF NOT EXISTS key_review_run_sources (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL REFERENCES key_review_runs(id),
    source_id TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS key_review_audit (
    id INTEGER PRIMARY KEY,
    review_state_id INTEGER NOT NULL REFERENCES key_review_states(id),
    event TEXT NOT NULL,
    actor TEXT NOT NULL DEFAULT '',
    model TEXT,
    detail TEXT,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS product_queue (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    product_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 3,
    attempts_total INTEGER NOT NULL DEFAULT 0,
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 5,
    next_retry_at INTEGER,
    last_summary TEXT,
    last_urls_attempted TEXT NOT NULL DEFAULT '[]',
    last_completed_at INTEGER,
    next_action TEXT,
    updated_at INTEGER NOT NULL,
    UNIQUE (category, product_id)
);
";

/// Partial uniqueness indexes enforcing slot identity per review kind.
const CREATE_SLOT_INDEXES_SQL: &str = "
CREATE UNIQUE INDEX IF NOT EXISTS idx_review_grid_slot
    ON key_review_states (category, item_state_id)
    WHERE kind = 'grid_key';
CREATE UNIQUE INDEX IF NOT EXISTS idx_review_enum_slot
    ON key_review_states (category, list_value_id)
    WHERE kind = 'enum_key';
CREATE UNIQUE INDEX IF NOT EXISTS idx_review_component_value_slot
    ON key_review_states (category, component_value_id)
    WHERE kind = 'component_key' AND component_value_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_review_component_property_slot
    ON key_review_states (category, component_identity_id, property_key)
    WHERE kind = 'component_key' AND component_identity_id IS NOT NULL;
";

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Brings a connection to the current schema and verifies invariants.
///
/// # Errors
///
/// Returns [`SpecDbError::Integrity`] when startup invariants fail after the
/// slot-incomplete sweep, [`SpecDbError::VersionMismatch`] for a database
/// written by a newer binary, and engine errors otherwise.
pub fn initialize(connection: &mut Connection) -> Result<(), SpecDbError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_err)?;
            tx.execute_batch(CREATE_TABLES_SQL).map_err(db_err)?;
            apply_column_migrations(&tx)?;
        }
        Some(value) if value < SCHEMA_VERSION => {
            tx.execute_batch(CREATE_TABLES_SQL).map_err(db_err)?;
            apply_column_migrations(&tx)?;
            tx.execute("UPDATE store_meta SET version = ?1", params![SCHEMA_VERSION])
                .map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {
            tx.execute_batch(CREATE_TABLES_SQL).map_err(db_err)?;
            apply_column_migrations(&tx)?;
        }
        Some(value) => {
            return Err(SpecDbError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.execute_batch(CREATE_SLOT_INDEXES_SQL).map_err(db_err)?;
    sweep_incomplete_review_slots(&tx)?;
    let violations = collect_integrity_violations(&tx)?;
    if !violations.is_empty() {
        return Err(SpecDbError::Integrity {
            violations,
        });
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}

// ============================================================================
// SECTION: Column Migrations
// ============================================================================

/// Forward-only add-column migrations; each is idempotent.
fn apply_column_migrations(tx: &rusqlite::Transaction<'_>) -> Result<(), SpecDbError> {
    add_column_if_missing(
        tx,
        "item_field_states",
        "ai_review_complete",
        "INTEGER NOT NULL DEFAULT 0",
    )?;
    add_column_if_missing(tx, "key_review_states", "selected_candidate_id", "TEXT")?;
    add_column_if_missing(tx, "product_queue", "cost_usd_total", "REAL NOT NULL DEFAULT 0")?;
    add_column_if_missing(
        tx,
        "product_queue",
        "rounds_completed",
        "INTEGER NOT NULL DEFAULT 0",
    )?;
    Ok(())
}

/// Adds a column when the table does not already have it.
fn add_column_if_missing(
    tx: &rusqlite::Transaction<'_>,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<(), SpecDbError> {
    let mut stmt =
        tx.prepare(&format!("PRAGMA table_info({table})")).map_err(db_err)?;
    let mut present = false;
    let mut rows = stmt.query([]).map_err(db_err)?;
    while let Some(row) = rows.next().map_err(db_err)? {
        let name: String = row.get(1).map_err(db_err)?;
        if name == column {
            present = true;
            break;
        }
    }
    drop(rows);
    drop(stmt);
    if !present {
        tx.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition};"))
            .map_err(db_err)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Slot Sweep
// ============================================================================

/// Deletes slot-incomplete key review states with their run and audit
/// history.
fn sweep_incomplete_review_slots(tx: &rusqlite::Transaction<'_>) -> Result<(), SpecDbError> {
    let select_incomplete =
        format!("SELECT id FROM key_review_states WHERE {INCOMPLETE_SLOT_PREDICATE}");
    tx.execute(
        &format!(
            "DELETE FROM key_review_run_sources WHERE run_id IN
             (SELECT id FROM key_review_runs WHERE review_state_id IN ({select_incomplete}))"
        ),
        params![],
    )
    .map_err(db_err)?;
    tx.execute(
        &format!(
            "DELETE FROM key_review_runs WHERE review_state_id IN ({select_incomplete})"
        ),
        params![],
    )
    .map_err(db_err)?;
    tx.execute(
        &format!(
            "DELETE FROM key_review_audit WHERE review_state_id IN ({select_incomplete})"
        ),
        params![],
    )
    .map_err(db_err)?;
    tx.execute(
        &format!("DELETE FROM key_review_states WHERE {INCOMPLETE_SLOT_PREDICATE}"),
        params![],
    )
    .map_err(db_err)?;
    Ok(())
}

// ============================================================================
// SECTION: Integrity Verification
// ============================================================================

/// Counts rows matching a violation query.
fn count_violations(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
) -> Result<u64, SpecDbError> {
    let count: i64 = tx.query_row(sql, params![], |row| row.get(0)).map_err(db_err)?;
    u64::try_from(count)
        .map_err(|_| SpecDbError::Invalid("negative violation count".to_string()))
}

/// Verifies startup invariants 1 through 4 and reports every violation.
fn collect_integrity_violations(
    tx: &rusqlite::Transaction<'_>,
) -> Result<Vec<IntegrityViolation>, SpecDbError> {
    let mut violations = Vec::new();

    let component_value_orphans = count_violations(
        tx,
        "SELECT COUNT(1) FROM component_values cv
         LEFT JOIN component_identities ci ON ci.id = cv.identity_id
         WHERE ci.id IS NULL",
    )?;
    if component_value_orphans > 0 {
        violations.push(IntegrityViolation {
            invariant: "component_value_identity_ref",
            violating_rows: component_value_orphans,
        });
    }

    let list_value_orphans = count_violations(
        tx,
        "SELECT COUNT(1) FROM enum_values ev
         LEFT JOIN enum_lists el ON el.id = ev.list_id
         WHERE el.id IS NULL",
    )?;
    if list_value_orphans > 0 {
        violations.push(IntegrityViolation {
            invariant: "list_value_enum_list_ref",
            violating_rows: list_value_orphans,
        });
    }

    let incomplete_slots = count_violations(
        tx,
        &format!("SELECT COUNT(1) FROM key_review_states WHERE {INCOMPLETE_SLOT_PREDICATE}"),
    )?;
    if incomplete_slots > 0 {
        violations.push(IntegrityViolation {
            invariant: "review_state_slot_complete",
            violating_rows: incomplete_slots,
        });
    }

    let unanchored_assertions = count_violations(
        tx,
        "SELECT COUNT(1) FROM source_assertions WHERE NOT (
            (context_kind = 'item' AND item_state_id IS NOT NULL
                AND component_value_id IS NULL AND list_value_id IS NULL)
            OR (context_kind = 'component' AND component_value_id IS NOT NULL
                AND item_state_id IS NULL AND list_value_id IS NULL)
            OR (context_kind = 'list' AND list_value_id IS NOT NULL
                AND enum_list_id IS NOT NULL
                AND item_state_id IS NULL AND component_value_id IS NULL)
         )",
    )?;
    if unanchored_assertions > 0 {
        violations.push(IntegrityViolation {
            invariant: "assertion_slot_anchor",
            violating_rows: unanchored_assertions,
        });
    }

    Ok(violations)
}
