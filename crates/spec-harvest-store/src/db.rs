// crates/spec-harvest-store/src/db.rs
// ============================================================================
// Module: SpecDb Handle
// Description: Connection lifecycle, products, counts, and seed probes.
// Purpose: Own the single-writer connection and the cross-cutting utility
//          operations.
// Dependencies: rusqlite, spec-harvest-core, crate::schema
// ============================================================================

//! ## Overview
//! [`SpecDb`] owns one `SQLite` connection for the lifetime of a run:
//! construct (open file, run schema, integrity check, prune legacy slots),
//! mutate, drop. All operations are synchronous; multi-row writes run inside
//! one transaction. Reads are read-committed; there is no long-lived reader
//! lock. One process owns the store at a time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::Category;
use spec_harvest_core::ProductId;

use crate::error::SpecDbError;
use crate::error::db_err;
use crate::schema;

// ============================================================================
// SECTION: Store Handle
// ============================================================================

/// Single-writer handle over the embedded SpecDb.
///
/// # Invariants
/// - Exactly one process owns the database file at a time.
/// - Construction fails fatally when startup invariants are violated.
#[derive(Debug)]
pub struct SpecDb {
    /// The sole database connection.
    connection: Connection,
}

impl SpecDb {
    /// Opens (or creates) a SpecDb at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError::Integrity`] when startup invariants fail, and
    /// engine errors when the file cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, SpecDbError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| SpecDbError::Db(err.to_string()))?;
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(path, flags).map_err(db_err)?;
        Self::from_connection(connection)
    }

    /// Opens an in-memory SpecDb, primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] when schema initialization fails.
    pub fn open_in_memory() -> Result<Self, SpecDbError> {
        let connection = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(connection)
    }

    /// Applies pragmas and schema to a fresh connection.
    fn from_connection(mut connection: Connection) -> Result<Self, SpecDbError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        connection.execute_batch("PRAGMA journal_mode = wal;").map_err(db_err)?;
        connection.execute_batch("PRAGMA synchronous = full;").map_err(db_err)?;
        schema::initialize(&mut connection)?;
        Ok(Self {
            connection,
        })
    }

    /// Returns the connection for read statements.
    pub(crate) const fn conn(&self) -> &Connection {
        &self.connection
    }

    /// Returns the connection for transactional writes.
    pub(crate) const fn conn_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }
}

// ============================================================================
// SECTION: Products
// ============================================================================

/// One product row.
///
/// # Invariants
/// - `(category, product_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Category scope.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Brand name.
    pub brand: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Variant label.
    pub variant: Option<String>,
    /// Seed URLs to start harvesting from.
    pub seed_urls: Vec<String>,
    /// Product status label.
    pub status: String,
}

impl SpecDb {
    /// Inserts or updates a product row.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_product(&mut self, product: &ProductRecord) -> Result<(), SpecDbError> {
        let seed_urls = serde_json::to_string(&product.seed_urls)
            .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
        let now = unix_millis();
        self.connection
            .execute(
                "INSERT INTO products
                 (category, product_id, brand, model, variant, seed_urls, status,
                  created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT (category, product_id) DO UPDATE SET
                   brand = excluded.brand,
                   model = excluded.model,
                   variant = excluded.variant,
                   seed_urls = excluded.seed_urls,
                   status = excluded.status,
                   updated_at = excluded.updated_at",
                params![
                    product.category.as_str(),
                    product.product_id.as_str(),
                    product.brand.as_deref(),
                    product.model.as_deref(),
                    product.variant.as_deref(),
                    seed_urls,
                    product.status.as_str(),
                    now
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Loads a product row when present.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn product(
        &self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<Option<ProductRecord>, SpecDbError> {
        self.connection
            .query_row(
                "SELECT brand, model, variant, seed_urls, status FROM products
                 WHERE category = ?1 AND product_id = ?2",
                params![category.as_str(), product_id.as_str()],
                |row| {
                    let brand: Option<String> = row.get(0)?;
                    let model: Option<String> = row.get(1)?;
                    let variant: Option<String> = row.get(2)?;
                    let seed_urls: String = row.get(3)?;
                    let status: String = row.get(4)?;
                    Ok((brand, model, variant, seed_urls, status))
                },
            )
            .optional()
            .map_err(db_err)?
            .map(|(brand, model, variant, seed_urls, status)| {
                let seed_urls: Vec<String> = serde_json::from_str(&seed_urls)
                    .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
                Ok(ProductRecord {
                    category: category.clone(),
                    product_id: product_id.clone(),
                    brand,
                    model,
                    variant,
                    seed_urls,
                    status,
                })
            })
            .transpose()
    }

    /// Lists product identifiers in a category, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn product_ids(&self, category: &Category) -> Result<Vec<ProductId>, SpecDbError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT product_id FROM products WHERE category = ?1 ORDER BY product_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![category.as_str()], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(ProductId::new(row.map_err(db_err)?));
        }
        Ok(ids)
    }
}

// ============================================================================
// SECTION: Counts and Seed Probe
// ============================================================================

/// Row counts per principal table for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    /// Product rows.
    pub products: u64,
    /// Component identity rows.
    pub component_identities: u64,
    /// Component value rows.
    pub component_values: u64,
    /// Enum list rows.
    pub enum_lists: u64,
    /// Enum value rows.
    pub enum_values: u64,
    /// Candidate rows.
    pub candidates: u64,
    /// Item field state rows.
    pub item_field_states: u64,
    /// Key review state rows.
    pub key_review_states: u64,
    /// Product queue rows.
    pub product_queue: u64,
}

impl SpecDb {
    /// Counts rows in one table for a category.
    fn count_table(&self, table: &str, category: &Category) -> Result<u64, SpecDbError> {
        let count: i64 = self
            .connection
            .query_row(
                &format!("SELECT COUNT(1) FROM {table} WHERE category = ?1"),
                params![category.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        u64::try_from(count).map_err(|_| SpecDbError::Invalid("negative count".to_string()))
    }

    /// Returns per-table row counts for a category.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn counts(&self, category: &Category) -> Result<CategoryCounts, SpecDbError> {
        Ok(CategoryCounts {
            products: self.count_table("products", category)?,
            component_identities: self.count_table("component_identities", category)?,
            component_values: self.count_table("component_values", category)?,
            enum_lists: self.count_table("enum_lists", category)?,
            enum_values: self.count_table("enum_values", category)?,
            candidates: self.count_table("candidates", category)?,
            item_field_states: self.count_table("item_field_states", category)?,
            key_review_states: self.count_table("key_review_states", category)?,
            product_queue: self.count_table("product_queue", category)?,
        })
    }

    /// Returns true when any seed-bearing table has a row in the category.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn is_seeded(&self, category: &Category) -> Result<bool, SpecDbError> {
        Ok(self.count_table("component_identities", category)? > 0
            || self.count_table("enum_values", category)? > 0
            || self.count_table("item_field_states", category)? > 0
            || self.count_table("products", category)? > 0)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current unix epoch in milliseconds.
pub(crate) fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
