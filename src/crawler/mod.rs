//! Crawler module for mirroring the FIPE reference tables
//!
//! This module contains the crawl engine, including:
//! - Run options and number-list parsing
//! - Reference period selection
//! - The four-phase, checkpointed coordinator
//! - Progress reporting and per-run reports

mod coordinator;
mod options;
mod outcome;
mod progress;
mod selection;

pub use coordinator::{run_crawl, Coordinator};
pub use options::{parse_months, parse_number_list, parse_years, CrawlOptions, OptionsError};
pub use outcome::{CrawlReport, PeriodReport, PhaseReport};
pub use progress::{ProgressSink, RecordingProgress, TracingProgress};
pub use selection::{select_periods, SelectedPeriod};
