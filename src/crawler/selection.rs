//! Reference period selection

use crate::crawler::CrawlOptions;
use crate::fipe::{parse_period_label, ReferencePeriodEntry};
use crate::{FetchError, FetchResult};
use tracing::warn;

/// A reference period chosen for this run, with its decoded label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPeriod {
    pub code: i64,
    pub label: String,
    pub month: u32,
    pub year: i32,
}

/// Picks the periods a run should crawl from the upstream catalog
///
/// An explicit `reference_code` wins over year and month filters. Without
/// it, periods are matched by year (defaulting to `current_year`) and
/// optionally by month. Periods whose label cannot be decoded are skipped
/// while filtering, but requesting one by code is an error.
pub fn select_periods(
    catalog: &[ReferencePeriodEntry],
    options: &CrawlOptions,
    current_year: i32,
) -> FetchResult<Vec<SelectedPeriod>> {
    if let Some(code) = options.reference_code {
        return catalog
            .iter()
            .filter(|entry| entry.code == code)
            .map(|entry| {
                let decoded = parse_period_label(&entry.label).map_err(|e| {
                    FetchError::validation("ConsultarTabelaDeReferencia", e.to_string())
                })?;
                Ok(selected(entry, decoded.month, decoded.year))
            })
            .collect();
    }

    let default_years = [current_year];
    let years = options.years.as_deref().unwrap_or(&default_years);

    let mut periods = Vec::new();
    for entry in catalog {
        let decoded = match parse_period_label(&entry.label) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Skipping reference table {}: {}", entry.code, e);
                continue;
            }
        };

        let year_match = years.contains(&decoded.year);
        let month_match = options
            .months
            .as_ref()
            .map_or(true, |months| months.contains(&decoded.month));

        if year_match && month_match {
            periods.push(selected(entry, decoded.month, decoded.year));
        }
    }

    Ok(periods)
}

fn selected(entry: &ReferencePeriodEntry, month: u32, year: i32) -> SelectedPeriod {
    SelectedPeriod {
        code: entry.code,
        label: entry.label.trim().to_string(),
        month,
        year,
    }
}
