//! Output module for status and run summaries
//!
//! This module handles:
//! - Loading and printing database statistics for `status`
//! - Rendering the summary of a finished crawl run

pub mod stats;

pub use stats::{format_statistics, load_statistics, print_statistics, SyncStatistics};

use crate::crawler::CrawlReport;

/// Renders a finished crawl run, one line per period
pub fn format_crawl_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    for period in &report.periods {
        let status = if period.brands_failed {
            "brand list unavailable"
        } else if period.marked_crawled {
            "complete"
        } else {
            "incomplete"
        };
        out.push_str(&format!(
            "Reference {} ({}): {} brands, models {}/{}, model-years {}/{}, prices {}/{} [{}]\n",
            period.code,
            period.label,
            period.brands_linked,
            period.models.succeeded,
            period.models.attempted,
            period.model_years.succeeded,
            period.model_years.attempted,
            period.prices.succeeded,
            period.prices.attempted,
            status
        ));
    }

    out.push_str(&format!(
        "{} prices fetched, {} items failed, {:.1}s elapsed\n",
        report.prices_fetched,
        report.failed_items(),
        report.elapsed.as_secs_f64()
    ));

    out
}
