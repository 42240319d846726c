//! FIPE API module
//!
//! This module contains everything that talks to the upstream service:
//! - Payload types for each endpoint
//! - Parsers for amounts, model-year values and period labels
//! - The adaptive `ThrottleController`
//! - The rate-limited `FipeClient`

mod client;
pub mod parse;
pub mod throttle;
pub mod types;

pub use client::{build_http_client, FipeClient};
pub use parse::{parse_amount, parse_period_label, parse_year_value, ParseError, PeriodMonth, YearFuel};
pub use throttle::ThrottleController;
pub use types::{
    BrandEntry, ModelEntry, ModelYearEntry, ModelsResponse, PriceEntry, PriceQuery,
    ReferencePeriodEntry,
};
