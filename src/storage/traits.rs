//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::classifier::Segment;
use crate::storage::{
    BrandRecord, CheckpointCounts, ModelRecord, ModelYearRecord, PendingBrand, PendingCounts,
    PendingModel, PendingModelYear, PriceRecord, PriceUpsert, ReferenceBrandRecord,
    ReferenceModelRecord, ReferenceModelYearRecord, ReferencePeriodRecord, SegmentSource,
    SyncStats, UnclassifiedModel, Upserted,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Entity upserts look rows up by natural key and return the existing row
/// unchanged, or insert a new one. Only prices (when the amount differs) and
/// checkpoint markers are ever updated in place.
pub trait Storage {
    // ===== Reference Periods =====

    /// Inserts a reference period by code or returns the existing one
    fn upsert_reference_period(
        &mut self,
        code: i64,
        month: u32,
        year: i32,
    ) -> StorageResult<ReferencePeriodRecord>;

    /// Gets a reference period by upstream code
    fn get_reference_period(&self, code: i64) -> StorageResult<Option<ReferencePeriodRecord>>;

    /// Lists all stored reference periods, newest first
    fn list_reference_periods(&self) -> StorageResult<Vec<ReferencePeriodRecord>>;

    /// Sets the period's crawled timestamp to now
    fn mark_reference_period_crawled(&mut self, period_id: i64) -> StorageResult<()>;

    // ===== Entities =====

    /// Inserts a brand by FIPE code or returns the existing one
    fn upsert_brand(&mut self, fipe_code: &str, name: &str) -> StorageResult<BrandRecord>;

    /// Inserts a model by (brand, FIPE code) or returns the existing one
    ///
    /// `is_new` is true only the first time this natural key is ever stored.
    fn upsert_model(
        &mut self,
        brand_id: i64,
        fipe_code: &str,
        name: &str,
    ) -> StorageResult<Upserted<ModelRecord>>;

    /// Inserts a model-year by (model, year, fuel) or returns the existing one
    fn upsert_model_year(
        &mut self,
        model_id: i64,
        year: i32,
        fuel_code: i32,
        fuel_name: &str,
    ) -> StorageResult<ModelYearRecord>;

    /// Inserts a price, or updates the stored amount if it differs
    ///
    /// The crawled timestamp is refreshed only when the amount changes.
    fn upsert_price(
        &mut self,
        model_year_id: i64,
        reference_table_id: i64,
        fipe_code: &str,
        amount: &str,
    ) -> StorageResult<PriceUpsert>;

    /// Gets the price of a model-year in a period
    fn get_price(
        &self,
        model_year_id: i64,
        reference_table_id: i64,
    ) -> StorageResult<Option<PriceRecord>>;

    /// Gets a model by ID
    fn get_model(&self, model_id: i64) -> StorageResult<ModelRecord>;

    // ===== Segments =====

    /// Assigns a segment to a model
    fn update_model_segment(
        &mut self,
        model_id: i64,
        segment: Segment,
        source: SegmentSource,
    ) -> StorageResult<()>;

    /// Lists models that have no segment yet
    fn get_models_without_segment(&self) -> StorageResult<Vec<UnclassifiedModel>>;

    // ===== Checkpoints =====

    /// Links a brand to a period, creating a pending checkpoint if absent
    ///
    /// Returns the checkpoint ID.
    fn upsert_reference_brand(&mut self, period_id: i64, brand_id: i64) -> StorageResult<i64>;

    /// Links a model to a period, creating a pending checkpoint if absent
    fn upsert_reference_model(&mut self, period_id: i64, model_id: i64) -> StorageResult<i64>;

    /// Links a model-year to a period, creating a pending checkpoint if absent
    fn upsert_reference_model_year(
        &mut self,
        period_id: i64,
        model_year_id: i64,
    ) -> StorageResult<i64>;

    /// Brand checkpoints of a period whose models have not been crawled
    fn get_uncrawled_reference_brands(&self, period_id: i64) -> StorageResult<Vec<PendingBrand>>;

    /// Model checkpoints of a period whose model-years have not been crawled
    fn get_uncrawled_reference_models(&self, period_id: i64) -> StorageResult<Vec<PendingModel>>;

    /// Model-year checkpoints of a period whose price has not been crawled
    fn get_uncrawled_reference_model_years(
        &self,
        period_id: i64,
    ) -> StorageResult<Vec<PendingModelYear>>;

    /// Marks a brand checkpoint crawled; an already crawled row keeps its timestamp
    fn mark_reference_brand_models_crawled(&mut self, checkpoint_id: i64) -> StorageResult<()>;

    /// Marks a model checkpoint crawled; an already crawled row keeps its timestamp
    fn mark_reference_model_years_crawled(&mut self, checkpoint_id: i64) -> StorageResult<()>;

    /// Marks a model-year checkpoint crawled; an already crawled row keeps its timestamp
    fn mark_reference_model_year_price_crawled(&mut self, checkpoint_id: i64)
        -> StorageResult<()>;

    /// Deletes every checkpoint of a period at all three levels
    ///
    /// Brands, models, model-years and prices are left untouched.
    fn clear_crawl_status(&mut self, period_id: i64) -> StorageResult<()>;

    /// Lists the brand checkpoints of a period
    fn list_reference_brands(&self, period_id: i64) -> StorageResult<Vec<ReferenceBrandRecord>>;

    /// Lists the model checkpoints of a period
    fn list_reference_models(&self, period_id: i64) -> StorageResult<Vec<ReferenceModelRecord>>;

    /// Lists the model-year checkpoints of a period
    fn list_reference_model_years(
        &self,
        period_id: i64,
    ) -> StorageResult<Vec<ReferenceModelYearRecord>>;

    // ===== Statistics =====

    /// Counts pending checkpoints of a period per level
    fn count_pending_checkpoints(&self, period_id: i64) -> StorageResult<PendingCounts>;

    /// Counts total and crawled checkpoints of a period per level
    fn get_checkpoint_counts(&self, period_id: i64) -> StorageResult<CheckpointCounts>;

    /// Counts the stored entities
    fn get_stats(&self) -> StorageResult<SyncStats>;
}
