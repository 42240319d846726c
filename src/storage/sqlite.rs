//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::classifier::Segment;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BrandRecord, CheckpointCounts, ModelRecord, ModelYearRecord, PendingBrand, PendingCounts,
    PendingModel, PendingModelYear, PriceChange, PriceRecord, PriceUpsert, ReferenceBrandRecord,
    ReferenceModelRecord, ReferenceModelYearRecord, ReferencePeriodRecord, SegmentSource,
    SyncStats, UnclassifiedModel, Upserted,
};
use crate::SyncError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SyncError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str, period_id: i64) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row(sql, params![period_id], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_all(&self, table: &str) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    /// Returns (total, crawled) for one checkpoint table of a period
    fn checkpoint_progress(
        &self,
        table: &str,
        crawled_column: &str,
        period_id: i64,
    ) -> StorageResult<(u64, u64)> {
        let sql = format!(
            "SELECT COUNT(*), COUNT({}) FROM {} WHERE reference_table_id = ?1",
            crawled_column, table
        );
        let (total, crawled): (i64, i64) = self
            .conn
            .query_row(&sql, params![period_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok((total as u64, crawled as u64))
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn period_from_row(row: &Row<'_>) -> rusqlite::Result<ReferencePeriodRecord> {
    Ok(ReferencePeriodRecord {
        id: row.get(0)?,
        code: row.get(1)?,
        month: row.get(2)?,
        year: row.get(3)?,
        crawled_at: row.get(4)?,
    })
}

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<ModelRecord> {
    let segment: Option<String> = row.get(4)?;
    let segment_source: Option<String> = row.get(5)?;
    Ok(ModelRecord {
        id: row.get(0)?,
        brand_id: row.get(1)?,
        fipe_code: row.get(2)?,
        name: row.get(3)?,
        segment: segment.as_deref().and_then(Segment::from_label),
        segment_source: segment_source
            .as_deref()
            .and_then(SegmentSource::from_db_string),
    })
}

fn price_from_row(row: &Row<'_>) -> rusqlite::Result<PriceRecord> {
    Ok(PriceRecord {
        id: row.get(0)?,
        model_year_id: row.get(1)?,
        reference_table_id: row.get(2)?,
        fipe_code: row.get(3)?,
        amount: row.get(4)?,
        crawled_at: row.get(5)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Reference Periods =====

    fn upsert_reference_period(
        &mut self,
        code: i64,
        month: u32,
        year: i32,
    ) -> StorageResult<ReferencePeriodRecord> {
        if let Some(existing) = self.get_reference_period(code)? {
            return Ok(existing);
        }

        self.conn.execute(
            "INSERT INTO reference_tables (code, month, year) VALUES (?1, ?2, ?3)",
            params![code, month, year],
        )?;

        Ok(ReferencePeriodRecord {
            id: self.conn.last_insert_rowid(),
            code,
            month,
            year,
            crawled_at: None,
        })
    }

    fn get_reference_period(&self, code: i64) -> StorageResult<Option<ReferencePeriodRecord>> {
        let period = self
            .conn
            .query_row(
                "SELECT id, code, month, year, crawled_at FROM reference_tables WHERE code = ?1",
                params![code],
                period_from_row,
            )
            .optional()?;
        Ok(period)
    }

    fn list_reference_periods(&self) -> StorageResult<Vec<ReferencePeriodRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, month, year, crawled_at FROM reference_tables
             ORDER BY year DESC, month DESC, code DESC",
        )?;

        let periods = stmt
            .query_map([], period_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(periods)
    }

    fn mark_reference_period_crawled(&mut self, period_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE reference_tables SET crawled_at = ?1 WHERE id = ?2",
            params![now(), period_id],
        )?;
        Ok(())
    }

    // ===== Entities =====

    fn upsert_brand(&mut self, fipe_code: &str, name: &str) -> StorageResult<BrandRecord> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, fipe_code, name FROM brands WHERE fipe_code = ?1",
                params![fipe_code],
                |row| {
                    Ok(BrandRecord {
                        id: row.get(0)?,
                        fipe_code: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(brand) = existing {
            return Ok(brand);
        }

        self.conn.execute(
            "INSERT INTO brands (fipe_code, name) VALUES (?1, ?2)",
            params![fipe_code, name],
        )?;

        Ok(BrandRecord {
            id: self.conn.last_insert_rowid(),
            fipe_code: fipe_code.to_string(),
            name: name.to_string(),
        })
    }

    fn upsert_model(
        &mut self,
        brand_id: i64,
        fipe_code: &str,
        name: &str,
    ) -> StorageResult<Upserted<ModelRecord>> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, brand_id, fipe_code, name, segment, segment_source
                 FROM models WHERE brand_id = ?1 AND fipe_code = ?2",
                params![brand_id, fipe_code],
                model_from_row,
            )
            .optional()?;

        if let Some(model) = existing {
            return Ok(Upserted {
                record: model,
                is_new: false,
            });
        }

        self.conn.execute(
            "INSERT INTO models (brand_id, fipe_code, name) VALUES (?1, ?2, ?3)",
            params![brand_id, fipe_code, name],
        )?;

        Ok(Upserted {
            record: ModelRecord {
                id: self.conn.last_insert_rowid(),
                brand_id,
                fipe_code: fipe_code.to_string(),
                name: name.to_string(),
                segment: None,
                segment_source: None,
            },
            is_new: true,
        })
    }

    fn upsert_model_year(
        &mut self,
        model_id: i64,
        year: i32,
        fuel_code: i32,
        fuel_name: &str,
    ) -> StorageResult<ModelYearRecord> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, model_id, year, fuel_code, fuel_name FROM model_years
                 WHERE model_id = ?1 AND year = ?2 AND fuel_code = ?3",
                params![model_id, year, fuel_code],
                |row| {
                    Ok(ModelYearRecord {
                        id: row.get(0)?,
                        model_id: row.get(1)?,
                        year: row.get(2)?,
                        fuel_code: row.get(3)?,
                        fuel_name: row.get(4)?,
                    })
                },
            )
            .optional()?;

        if let Some(model_year) = existing {
            return Ok(model_year);
        }

        self.conn.execute(
            "INSERT INTO model_years (model_id, year, fuel_code, fuel_name) VALUES (?1, ?2, ?3, ?4)",
            params![model_id, year, fuel_code, fuel_name],
        )?;

        Ok(ModelYearRecord {
            id: self.conn.last_insert_rowid(),
            model_id,
            year,
            fuel_code,
            fuel_name: fuel_name.to_string(),
        })
    }

    fn upsert_price(
        &mut self,
        model_year_id: i64,
        reference_table_id: i64,
        fipe_code: &str,
        amount: &str,
    ) -> StorageResult<PriceUpsert> {
        if let Some(existing) = self.get_price(model_year_id, reference_table_id)? {
            if existing.amount == amount {
                return Ok(PriceUpsert {
                    record: existing,
                    change: PriceChange::Unchanged,
                });
            }

            let crawled_at = now();
            self.conn.execute(
                "UPDATE prices SET amount = ?1, crawled_at = ?2 WHERE id = ?3",
                params![amount, crawled_at, existing.id],
            )?;

            return Ok(PriceUpsert {
                change: PriceChange::Updated {
                    previous: existing.amount,
                },
                record: PriceRecord {
                    amount: amount.to_string(),
                    crawled_at,
                    ..existing
                },
            });
        }

        let crawled_at = now();
        self.conn.execute(
            "INSERT INTO prices (model_year_id, reference_table_id, fipe_code, amount, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![model_year_id, reference_table_id, fipe_code, amount, crawled_at],
        )?;

        Ok(PriceUpsert {
            record: PriceRecord {
                id: self.conn.last_insert_rowid(),
                model_year_id,
                reference_table_id,
                fipe_code: fipe_code.to_string(),
                amount: amount.to_string(),
                crawled_at,
            },
            change: PriceChange::Inserted,
        })
    }

    fn get_price(
        &self,
        model_year_id: i64,
        reference_table_id: i64,
    ) -> StorageResult<Option<PriceRecord>> {
        let price = self
            .conn
            .query_row(
                "SELECT id, model_year_id, reference_table_id, fipe_code, amount, crawled_at
                 FROM prices WHERE model_year_id = ?1 AND reference_table_id = ?2",
                params![model_year_id, reference_table_id],
                price_from_row,
            )
            .optional()?;
        Ok(price)
    }

    fn get_model(&self, model_id: i64) -> StorageResult<ModelRecord> {
        self.conn
            .query_row(
                "SELECT id, brand_id, fipe_code, name, segment, segment_source
                 FROM models WHERE id = ?1",
                params![model_id],
                model_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("Model ID {}", model_id)))
    }

    // ===== Segments =====

    fn update_model_segment(
        &mut self,
        model_id: i64,
        segment: Segment,
        source: SegmentSource,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE models SET segment = ?1, segment_source = ?2 WHERE id = ?3",
            params![segment.as_str(), source.to_db_string(), model_id],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("Model ID {}", model_id)));
        }
        Ok(())
    }

    fn get_models_without_segment(&self) -> StorageResult<Vec<UnclassifiedModel>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, b.name, m.name FROM models m
             JOIN brands b ON b.id = m.brand_id
             WHERE m.segment IS NULL
             ORDER BY m.id",
        )?;

        let models = stmt
            .query_map([], |row| {
                Ok(UnclassifiedModel {
                    id: row.get(0)?,
                    brand_name: row.get(1)?,
                    model_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(models)
    }

    // ===== Checkpoints =====

    fn upsert_reference_brand(&mut self, period_id: i64, brand_id: i64) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO reference_brands (reference_table_id, brand_id) VALUES (?1, ?2)",
            params![period_id, brand_id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM reference_brands WHERE reference_table_id = ?1 AND brand_id = ?2",
            params![period_id, brand_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn upsert_reference_model(&mut self, period_id: i64, model_id: i64) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO reference_models (reference_table_id, model_id) VALUES (?1, ?2)",
            params![period_id, model_id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM reference_models WHERE reference_table_id = ?1 AND model_id = ?2",
            params![period_id, model_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn upsert_reference_model_year(
        &mut self,
        period_id: i64,
        model_year_id: i64,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO reference_model_years (reference_table_id, model_year_id)
             VALUES (?1, ?2)",
            params![period_id, model_year_id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM reference_model_years
             WHERE reference_table_id = ?1 AND model_year_id = ?2",
            params![period_id, model_year_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_uncrawled_reference_brands(&self, period_id: i64) -> StorageResult<Vec<PendingBrand>> {
        let mut stmt = self.conn.prepare(
            "SELECT rb.id, b.id, b.fipe_code, b.name
             FROM reference_brands rb
             JOIN brands b ON b.id = rb.brand_id
             WHERE rb.reference_table_id = ?1 AND rb.models_crawled_at IS NULL
             ORDER BY rb.id",
        )?;

        let brands = stmt
            .query_map(params![period_id], |row| {
                Ok(PendingBrand {
                    checkpoint_id: row.get(0)?,
                    brand_id: row.get(1)?,
                    fipe_code: row.get(2)?,
                    name: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(brands)
    }

    fn get_uncrawled_reference_models(&self, period_id: i64) -> StorageResult<Vec<PendingModel>> {
        let mut stmt = self.conn.prepare(
            "SELECT rm.id, m.id, m.fipe_code, m.name, b.fipe_code, b.name
             FROM reference_models rm
             JOIN models m ON m.id = rm.model_id
             JOIN brands b ON b.id = m.brand_id
             WHERE rm.reference_table_id = ?1 AND rm.years_crawled_at IS NULL
             ORDER BY rm.id",
        )?;

        let models = stmt
            .query_map(params![period_id], |row| {
                Ok(PendingModel {
                    checkpoint_id: row.get(0)?,
                    model_id: row.get(1)?,
                    fipe_code: row.get(2)?,
                    name: row.get(3)?,
                    brand_fipe_code: row.get(4)?,
                    brand_name: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(models)
    }

    fn get_uncrawled_reference_model_years(
        &self,
        period_id: i64,
    ) -> StorageResult<Vec<PendingModelYear>> {
        let mut stmt = self.conn.prepare(
            "SELECT rmy.id, my.id, my.year, my.fuel_code, m.fipe_code, m.name, b.fipe_code
             FROM reference_model_years rmy
             JOIN model_years my ON my.id = rmy.model_year_id
             JOIN models m ON m.id = my.model_id
             JOIN brands b ON b.id = m.brand_id
             WHERE rmy.reference_table_id = ?1 AND rmy.price_crawled_at IS NULL
             ORDER BY rmy.id",
        )?;

        let model_years = stmt
            .query_map(params![period_id], |row| {
                Ok(PendingModelYear {
                    checkpoint_id: row.get(0)?,
                    model_year_id: row.get(1)?,
                    year: row.get(2)?,
                    fuel_code: row.get(3)?,
                    model_fipe_code: row.get(4)?,
                    model_name: row.get(5)?,
                    brand_fipe_code: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(model_years)
    }

    fn mark_reference_brand_models_crawled(&mut self, checkpoint_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE reference_brands SET models_crawled_at = ?1
             WHERE id = ?2 AND models_crawled_at IS NULL",
            params![now(), checkpoint_id],
        )?;
        Ok(())
    }

    fn mark_reference_model_years_crawled(&mut self, checkpoint_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE reference_models SET years_crawled_at = ?1
             WHERE id = ?2 AND years_crawled_at IS NULL",
            params![now(), checkpoint_id],
        )?;
        Ok(())
    }

    fn mark_reference_model_year_price_crawled(
        &mut self,
        checkpoint_id: i64,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE reference_model_years SET price_crawled_at = ?1
             WHERE id = ?2 AND price_crawled_at IS NULL",
            params![now(), checkpoint_id],
        )?;
        Ok(())
    }

    fn clear_crawl_status(&mut self, period_id: i64) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM reference_model_years WHERE reference_table_id = ?1",
            params![period_id],
        )?;
        tx.execute(
            "DELETE FROM reference_models WHERE reference_table_id = ?1",
            params![period_id],
        )?;
        tx.execute(
            "DELETE FROM reference_brands WHERE reference_table_id = ?1",
            params![period_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_reference_brands(&self, period_id: i64) -> StorageResult<Vec<ReferenceBrandRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, reference_table_id, brand_id, models_crawled_at
             FROM reference_brands WHERE reference_table_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![period_id], |row| {
                Ok(ReferenceBrandRecord {
                    id: row.get(0)?,
                    reference_table_id: row.get(1)?,
                    brand_id: row.get(2)?,
                    models_crawled_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn list_reference_models(&self, period_id: i64) -> StorageResult<Vec<ReferenceModelRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, reference_table_id, model_id, years_crawled_at
             FROM reference_models WHERE reference_table_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![period_id], |row| {
                Ok(ReferenceModelRecord {
                    id: row.get(0)?,
                    reference_table_id: row.get(1)?,
                    model_id: row.get(2)?,
                    years_crawled_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn list_reference_model_years(
        &self,
        period_id: i64,
    ) -> StorageResult<Vec<ReferenceModelYearRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, reference_table_id, model_year_id, price_crawled_at
             FROM reference_model_years WHERE reference_table_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![period_id], |row| {
                Ok(ReferenceModelYearRecord {
                    id: row.get(0)?,
                    reference_table_id: row.get(1)?,
                    model_year_id: row.get(2)?,
                    price_crawled_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    // ===== Statistics =====

    fn count_pending_checkpoints(&self, period_id: i64) -> StorageResult<PendingCounts> {
        Ok(PendingCounts {
            brands: self.count(
                "SELECT COUNT(*) FROM reference_brands
                 WHERE reference_table_id = ?1 AND models_crawled_at IS NULL",
                period_id,
            )?,
            models: self.count(
                "SELECT COUNT(*) FROM reference_models
                 WHERE reference_table_id = ?1 AND years_crawled_at IS NULL",
                period_id,
            )?,
            model_years: self.count(
                "SELECT COUNT(*) FROM reference_model_years
                 WHERE reference_table_id = ?1 AND price_crawled_at IS NULL",
                period_id,
            )?,
        })
    }

    fn get_checkpoint_counts(&self, period_id: i64) -> StorageResult<CheckpointCounts> {
        let (brands_total, brands_crawled) =
            self.checkpoint_progress("reference_brands", "models_crawled_at", period_id)?;
        let (models_total, models_crawled) =
            self.checkpoint_progress("reference_models", "years_crawled_at", period_id)?;
        let (model_years_total, model_years_crawled) =
            self.checkpoint_progress("reference_model_years", "price_crawled_at", period_id)?;

        Ok(CheckpointCounts {
            brands_total,
            brands_crawled,
            models_total,
            models_crawled,
            model_years_total,
            model_years_crawled,
        })
    }

    fn get_stats(&self) -> StorageResult<SyncStats> {
        Ok(SyncStats {
            reference_periods: self.count_all("reference_tables")?,
            brands: self.count_all("brands")?,
            models: self.count_all("models")?,
            model_years: self.count_all("model_years")?,
            prices: self.count_all("prices")?,
        })
    }
}
