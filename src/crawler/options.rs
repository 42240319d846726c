//! Per-run crawl options and number-list parsing

use thiserror::Error;

/// Widest range accepted in a number list
pub const MAX_RANGE_SPAN: i64 = 10_000;

/// Errors raised while parsing run options
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Invalid number {0:?}")]
    InvalidNumber(String),

    #[error("Invalid range {0:?}: start is after end")]
    InvalidRange(String),

    #[error("Month {0} is outside 1..=12")]
    InvalidMonth(i64),

    #[error("Number {0} is out of range")]
    OutOfRange(i64),

    #[error("Range {0:?} spans more than {max} values", max = MAX_RANGE_SPAN + 1)]
    RangeTooWide(String),

    #[error("--model requires --brand")]
    ModelWithoutBrand,
}

/// What a single crawl run should cover
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Only this upstream reference table code
    pub reference_code: Option<i64>,

    /// Reference years to crawl; defaults to the current year
    pub years: Option<Vec<i32>>,

    /// Reference months to crawl; all months when unset
    pub months: Option<Vec<u32>>,

    /// Only link this brand in phase 1
    pub brand_code: Option<String>,

    /// Only store these models in phase 2; the brand stays pending
    pub model_codes: Option<Vec<String>>,

    /// Classify newly discovered models
    pub classify: bool,

    /// Clear the period's checkpoints before crawling it
    pub force: bool,
}

impl CrawlOptions {
    /// Rejects option combinations that cannot be honored
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.model_codes.is_some() && self.brand_code.is_none() {
            return Err(OptionsError::ModelWithoutBrand);
        }
        Ok(())
    }
}

/// Parses a list of numbers such as `"2023"`, `"2020-2023"` or `"1,3,6"`
///
/// Parts are comma separated and may be inclusive ranges. The result is
/// deduplicated and sorted.
pub fn parse_number_list(input: &str) -> Result<Vec<i64>, OptionsError> {
    let mut values = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_number(start)?;
                let end = parse_number(end)?;
                if start > end {
                    return Err(OptionsError::InvalidRange(part.to_string()));
                }
                if end - start > MAX_RANGE_SPAN {
                    return Err(OptionsError::RangeTooWide(part.to_string()));
                }
                values.extend(start..=end);
            }
            None => values.push(parse_number(part)?),
        }
    }

    values.sort_unstable();
    values.dedup();
    Ok(values)
}

/// Parses a year list, see [`parse_number_list`]
pub fn parse_years(input: &str) -> Result<Vec<i32>, OptionsError> {
    parse_number_list(input)?
        .into_iter()
        .map(|n| i32::try_from(n).map_err(|_| OptionsError::OutOfRange(n)))
        .collect()
}

/// Parses a month list, see [`parse_number_list`]
pub fn parse_months(input: &str) -> Result<Vec<u32>, OptionsError> {
    parse_number_list(input)?
        .into_iter()
        .map(|n| match n {
            1..=12 => Ok(n as u32),
            _ => Err(OptionsError::InvalidMonth(n)),
        })
        .collect()
}

fn parse_number(text: &str) -> Result<i64, OptionsError> {
    let text = text.trim();
    text.parse()
        .map_err(|_| OptionsError::InvalidNumber(text.to_string()))
}
