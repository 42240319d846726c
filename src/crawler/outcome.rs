//! Per-phase and per-run crawl reports

use std::time::Duration;

/// Aggregated per-item results of one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PhaseReport {
    /// Folds one item outcome into the report
    pub fn record<T, E>(&mut self, outcome: &Result<T, E>) {
        self.attempted += 1;
        match outcome {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// What happened to one reference period
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodReport {
    pub code: i64,
    pub label: String,
    /// Brands returned by the upstream after filtering
    pub brands_linked: usize,
    /// The brand list could not be fetched, so phases 2-4 were skipped
    pub brands_failed: bool,
    pub models: PhaseReport,
    pub model_years: PhaseReport,
    pub prices: PhaseReport,
    /// Whether the period was marked crawled at the end of the pass
    pub marked_crawled: bool,
}

/// Summary of a whole crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub periods: Vec<PeriodReport>,
    pub prices_fetched: usize,
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn failed_items(&self) -> usize {
        self.periods
            .iter()
            .map(|p| p.models.failed + p.model_years.failed + p.prices.failed)
            .sum()
    }
}
