//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the fipe-sync database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per upstream reference table (monthly snapshot)
CREATE TABLE IF NOT EXISTS reference_tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code INTEGER NOT NULL UNIQUE,
    month INTEGER NOT NULL,
    year INTEGER NOT NULL,
    crawled_at TEXT
);

CREATE TABLE IF NOT EXISTS brands (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fipe_code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS models (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brand_id INTEGER NOT NULL REFERENCES brands(id),
    fipe_code TEXT NOT NULL,
    name TEXT NOT NULL,
    segment TEXT,
    segment_source TEXT,
    UNIQUE(brand_id, fipe_code)
);

CREATE TABLE IF NOT EXISTS model_years (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id INTEGER NOT NULL REFERENCES models(id),
    year INTEGER NOT NULL,
    fuel_code INTEGER NOT NULL,
    fuel_name TEXT NOT NULL,
    UNIQUE(model_id, year, fuel_code)
);

CREATE TABLE IF NOT EXISTS prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_year_id INTEGER NOT NULL REFERENCES model_years(id),
    reference_table_id INTEGER NOT NULL REFERENCES reference_tables(id),
    fipe_code TEXT NOT NULL,
    amount TEXT NOT NULL,
    crawled_at TEXT NOT NULL,
    UNIQUE(model_year_id, reference_table_id)
);

CREATE INDEX IF NOT EXISTS idx_prices_reference ON prices(reference_table_id);
CREATE INDEX IF NOT EXISTS idx_prices_fipe_code ON prices(fipe_code);

-- Checkpoint: all models of a brand fetched for a period
CREATE TABLE IF NOT EXISTS reference_brands (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_table_id INTEGER NOT NULL REFERENCES reference_tables(id),
    brand_id INTEGER NOT NULL REFERENCES brands(id),
    models_crawled_at TEXT,
    UNIQUE(reference_table_id, brand_id)
);

-- Checkpoint: all model-years of a model fetched for a period
CREATE TABLE IF NOT EXISTS reference_models (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_table_id INTEGER NOT NULL REFERENCES reference_tables(id),
    model_id INTEGER NOT NULL REFERENCES models(id),
    years_crawled_at TEXT,
    UNIQUE(reference_table_id, model_id)
);

-- Checkpoint: price of a model-year fetched for a period
CREATE TABLE IF NOT EXISTS reference_model_years (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_table_id INTEGER NOT NULL REFERENCES reference_tables(id),
    model_year_id INTEGER NOT NULL REFERENCES model_years(id),
    price_crawled_at TEXT,
    UNIQUE(reference_table_id, model_year_id)
);

CREATE INDEX IF NOT EXISTS idx_reference_brands_pending
    ON reference_brands(reference_table_id, models_crawled_at);
CREATE INDEX IF NOT EXISTS idx_reference_models_pending
    ON reference_models(reference_table_id, years_crawled_at);
CREATE INDEX IF NOT EXISTS idx_reference_model_years_pending
    ON reference_model_years(reference_table_id, price_crawled_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
