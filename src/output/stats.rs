//! Statistics generation from the sync database
//!
//! This module provides functionality for extracting and displaying
//! mirror statistics from the storage layer.

use crate::storage::{CheckpointCounts, Storage, SyncStats};
use crate::SyncError;

/// Checkpoint progress of one stored reference period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodStatus {
    pub code: i64,
    pub month: u32,
    pub year: i32,
    pub crawled_at: Option<String>,
    pub checkpoints: CheckpointCounts,
}

/// Database statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatistics {
    /// Row counts of every entity
    pub totals: SyncStats,

    /// Models still waiting for a segment
    pub unclassified_models: usize,

    /// Stored periods, newest first
    pub periods: Vec<PeriodStatus>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(SyncStatistics)` - Successfully loaded statistics
/// * `Err(SyncError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<SyncStatistics, SyncError> {
    let totals = storage.get_stats()?;
    let unclassified_models = storage.get_models_without_segment()?.len();

    let mut periods = Vec::new();
    for period in storage.list_reference_periods()? {
        let checkpoints = storage.get_checkpoint_counts(period.id)?;
        periods.push(PeriodStatus {
            code: period.code,
            month: period.month,
            year: period.year,
            crawled_at: period.crawled_at,
            checkpoints,
        });
    }

    Ok(SyncStatistics {
        totals,
        unclassified_models,
        periods,
    })
}

/// Renders statistics as the text printed by `status`
pub fn format_statistics(stats: &SyncStatistics) -> String {
    let mut out = String::new();
    let totals = &stats.totals;

    out.push_str("Database status:\n");
    out.push_str(&format!("  References: {}\n", totals.reference_periods));
    out.push_str(&format!("  Brands: {}\n", totals.brands));
    out.push_str(&format!(
        "  Models: {} ({} without segment)\n",
        totals.models, stats.unclassified_models
    ));
    out.push_str(&format!("  Model-years: {}\n", totals.model_years));
    out.push_str(&format!("  Prices: {}\n", totals.prices));

    if !stats.periods.is_empty() {
        out.push_str("\nReference periods:\n");
        for period in &stats.periods {
            let c = &period.checkpoints;
            let state = if period.crawled_at.is_some() {
                "crawled"
            } else {
                "pending"
            };
            out.push_str(&format!(
                "  {} ({:02}/{}) {}: brands {}/{}, models {}/{}, prices {}/{}\n",
                period.code,
                period.month,
                period.year,
                state,
                c.brands_crawled,
                c.brands_total,
                c.models_crawled,
                c.models_total,
                c.model_years_crawled,
                c.model_years_total
            ));
        }
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &SyncStatistics) {
    print!("{}", format_statistics(stats));
}
