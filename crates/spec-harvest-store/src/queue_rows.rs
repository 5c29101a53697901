// crates/spec-harvest-store/src/queue_rows.rs
// ============================================================================
// Module: Product Queue Persistence
// Description: Upsert, load, and list product-queue rows.
// Purpose: Persist the queue keeper's authoritative per-product rows.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! The queue keeper owns the queue policy; this module only persists its
//! rows. The summary snapshot and the bounded URL list serialize as JSON
//! columns so snapshot mirroring stays shape-identical with the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use spec_harvest_core::Category;
use spec_harvest_core::ProductId;
use spec_harvest_core::ProductQueueRow;
use spec_harvest_core::QueueStatus;
use spec_harvest_core::RunSummarySnapshot;

use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Columns selected for queue-row reads, in [`read_queue_row`] order.
const QUEUE_COLUMNS: &str = "product_id, status, priority, attempts_total, retry_count, \
     max_attempts, next_retry_at, last_summary, cost_usd_total, last_urls_attempted, \
     last_completed_at, next_action, rounds_completed";

// ============================================================================
// SECTION: Operations
// ============================================================================

impl SpecDb {
    /// Inserts or updates one queue row.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_queue_row(&mut self, row: &ProductQueueRow) -> Result<(), SpecDbError> {
        let last_summary = row
            .last_summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
        let last_urls = serde_json::to_string(&row.last_urls_attempted)
            .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO product_queue
                 (category, product_id, status, priority, attempts_total, retry_count,
                  max_attempts, next_retry_at, last_summary, cost_usd_total,
                  last_urls_attempted, last_completed_at, next_action, rounds_completed,
                  updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT (category, product_id) DO UPDATE SET
                   status = excluded.status,
                   priority = excluded.priority,
                   attempts_total = excluded.attempts_total,
                   retry_count = excluded.retry_count,
                   max_attempts = excluded.max_attempts,
                   next_retry_at = excluded.next_retry_at,
                   last_summary = excluded.last_summary,
                   cost_usd_total = excluded.cost_usd_total,
                   last_urls_attempted = excluded.last_urls_attempted,
                   last_completed_at = excluded.last_completed_at,
                   next_action = excluded.next_action,
                   rounds_completed = excluded.rounds_completed,
                   updated_at = excluded.updated_at",
                params![
                    row.category.as_str(),
                    row.product_id.as_str(),
                    row.status.as_str(),
                    i64::from(row.priority),
                    i64::from(row.attempts_total),
                    i64::from(row.retry_count),
                    i64::from(row.max_attempts),
                    row.next_retry_at,
                    last_summary,
                    row.cost_usd_total,
                    last_urls,
                    row.last_completed_at,
                    row.next_action.as_deref(),
                    i64::from(row.rounds_completed),
                    unix_millis()
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Loads one queue row when present.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn queue_row(
        &self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<Option<ProductQueueRow>, SpecDbError> {
        let raw = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {QUEUE_COLUMNS} FROM product_queue
                     WHERE category = ?1 AND product_id = ?2"
                ),
                params![category.as_str(), product_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, Option<i64>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, f64>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, Option<i64>>(10)?,
                        row.get::<_, Option<String>>(11)?,
                        row.get::<_, i64>(12)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let row = build_queue_row(category, raw)?;
        Ok(Some(row))
    }

    /// Lists every queue row in a category, ascending by product id.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn queue_rows(&self, category: &Category) -> Result<Vec<ProductQueueRow>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(&format!(
                "SELECT {QUEUE_COLUMNS} FROM product_queue
                 WHERE category = ?1 ORDER BY product_id"
            ))
            .map_err(db_err)?;
        let raw_rows = stmt
            .query_map(params![category.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, f64>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, Option<i64>>(10)?,
                    row.get::<_, Option<String>>(11)?,
                    row.get::<_, i64>(12)?,
                ))
            })
            .map_err(db_err)?;
        let mut rows = Vec::new();
        for raw in raw_rows {
            rows.push(build_queue_row(category, raw.map_err(db_err)?)?);
        }
        Ok(rows)
    }
}

/// Raw tuple shape read from the product-queue table.
type RawQueueRow = (
    String,
    String,
    i64,
    i64,
    i64,
    i64,
    Option<i64>,
    Option<String>,
    f64,
    String,
    Option<i64>,
    Option<String>,
    i64,
);

/// Builds the shared row shape from a raw tuple.
fn build_queue_row(
    category: &Category,
    raw: RawQueueRow,
) -> Result<ProductQueueRow, SpecDbError> {
    let (
        product_id,
        status,
        priority,
        attempts_total,
        retry_count,
        max_attempts,
        next_retry_at,
        last_summary,
        cost_usd_total,
        last_urls,
        last_completed_at,
        next_action,
        rounds_completed,
    ) = raw;
    let status = QueueStatus::parse(&status)
        .ok_or_else(|| SpecDbError::Invalid(format!("unknown queue status: {status}")))?;
    let last_summary: Option<RunSummarySnapshot> = last_summary
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
    let last_urls_attempted: Vec<String> = serde_json::from_str(&last_urls)
        .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
    Ok(ProductQueueRow {
        category: category.clone(),
        product_id: ProductId::new(product_id),
        status,
        priority: u8::try_from(priority.clamp(1, 5)).unwrap_or(3),
        attempts_total: u32::try_from(attempts_total).unwrap_or(u32::MAX),
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
        max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
        next_retry_at,
        last_summary,
        cost_usd_total,
        last_urls_attempted,
        last_completed_at,
        next_action,
        rounds_completed: u32::try_from(rounds_completed).unwrap_or(u32::MAX),
    })
}
