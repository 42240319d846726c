//! Storage module for persisting the mirrored price tables
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent create-or-fetch of periods, brands, models, model-years and prices
//! - Per-period crawl checkpoints at the brand, model and model-year levels
//! - Queries returning the checkpoints that still need crawling
//! - Aggregate counts for status reporting

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::classifier::Segment;

/// A reference period (one monthly snapshot of the price tables)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePeriodRecord {
    pub id: i64,
    pub code: i64,
    pub month: u32,
    pub year: i32,
    pub crawled_at: Option<String>,
}

/// A vehicle brand, shared across all periods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandRecord {
    pub id: i64,
    pub fipe_code: String,
    pub name: String,
}

/// A vehicle model, shared across all periods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub id: i64,
    pub brand_id: i64,
    pub fipe_code: String,
    pub name: String,
    pub segment: Option<Segment>,
    pub segment_source: Option<SegmentSource>,
}

/// A model-year/fuel combination, shared across all periods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelYearRecord {
    pub id: i64,
    pub model_id: i64,
    pub year: i32,
    pub fuel_code: i32,
    pub fuel_name: String,
}

/// The quoted price of a model-year in one period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    pub id: i64,
    pub model_year_id: i64,
    pub reference_table_id: i64,
    pub fipe_code: String,
    /// Plain decimal text, e.g. `"4147.00"`
    pub amount: String,
    pub crawled_at: String,
}

/// Checkpoint: all models of a brand fetched for a period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceBrandRecord {
    pub id: i64,
    pub reference_table_id: i64,
    pub brand_id: i64,
    pub models_crawled_at: Option<String>,
}

/// Checkpoint: all model-years of a model fetched for a period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceModelRecord {
    pub id: i64,
    pub reference_table_id: i64,
    pub model_id: i64,
    pub years_crawled_at: Option<String>,
}

/// Checkpoint: price of a model-year fetched for a period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceModelYearRecord {
    pub id: i64,
    pub reference_table_id: i64,
    pub model_year_id: i64,
    pub price_crawled_at: Option<String>,
}

/// Result of a create-or-fetch that reports whether the row was inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted<T> {
    pub record: T,
    pub is_new: bool,
}

/// What an upsert did to the stored price
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceChange {
    Inserted,
    Updated { previous: String },
    Unchanged,
}

/// Result of `upsert_price`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpsert {
    pub record: PriceRecord,
    pub change: PriceChange,
}

/// A brand checkpoint still waiting for its models
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBrand {
    pub checkpoint_id: i64,
    pub brand_id: i64,
    pub fipe_code: String,
    pub name: String,
}

/// A model checkpoint still waiting for its model-years
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingModel {
    pub checkpoint_id: i64,
    pub model_id: i64,
    pub fipe_code: String,
    pub name: String,
    pub brand_fipe_code: String,
    pub brand_name: String,
}

/// A model-year checkpoint still waiting for its price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingModelYear {
    pub checkpoint_id: i64,
    pub model_year_id: i64,
    pub year: i32,
    pub fuel_code: i32,
    pub model_fipe_code: String,
    pub model_name: String,
    pub brand_fipe_code: String,
}

/// A model with no segment assigned yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclassifiedModel {
    pub id: i64,
    pub brand_name: String,
    pub model_name: String,
}

/// Checkpoints of one period still pending, per level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub brands: u64,
    pub models: u64,
    pub model_years: u64,
}

impl PendingCounts {
    pub fn total(&self) -> u64 {
        self.brands + self.models + self.model_years
    }

    pub fn is_complete(&self) -> bool {
        self.total() == 0
    }
}

/// Checkpoint progress of one period, per level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointCounts {
    pub brands_total: u64,
    pub brands_crawled: u64,
    pub models_total: u64,
    pub models_crawled: u64,
    pub model_years_total: u64,
    pub model_years_crawled: u64,
}

/// Row counts of the mirrored entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub reference_periods: u64,
    pub brands: u64,
    pub models: u64,
    pub model_years: u64,
    pub prices: u64,
}

/// Who assigned a model's segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentSource {
    Ai,
    Manual,
}

impl SegmentSource {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Manual => "manual",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ai" => Some(Self::Ai),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}
