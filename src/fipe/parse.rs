//! Parsers for the free-text values the FIPE API embeds in its payloads

use thiserror::Error;

/// A value embedded in an upstream payload could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid currency amount: '{0}'")]
    Amount(String),

    #[error("Invalid model-year value: '{0}'")]
    YearValue(String),

    #[error("Invalid reference period label: '{0}'")]
    PeriodLabel(String),

    #[error("Unknown month name '{month}' in reference period label '{label}'")]
    UnknownMonth { month: String, label: String },
}

/// Year and fuel type decoded from a model-year value such as `"2020-1"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearFuel {
    pub year: i32,
    pub fuel_code: i32,
}

/// Month and year decoded from a reference period label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodMonth {
    pub month: u32,
    pub year: i32,
}

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// Normalizes a localized currency amount to a plain decimal string
///
/// `"R$ 4.147,00"` becomes `"4147.00"`.
pub fn parse_amount(text: &str) -> Result<String, ParseError> {
    let stripped = text
        .trim()
        .trim_start_matches("R$")
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');

    let normalized: String = stripped
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let (integer, fraction) = match normalized.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (normalized.as_str(), None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(integer) || !fraction.map_or(true, all_digits) {
        return Err(ParseError::Amount(text.to_string()));
    }

    Ok(normalized)
}

/// Decodes a model-year value such as `"2020-1"` into year and fuel code
pub fn parse_year_value(value: &str) -> Result<YearFuel, ParseError> {
    let (year, fuel) = value
        .trim()
        .split_once('-')
        .ok_or_else(|| ParseError::YearValue(value.to_string()))?;

    let year = year
        .parse::<i32>()
        .map_err(|_| ParseError::YearValue(value.to_string()))?;
    let fuel_code = fuel
        .parse::<i32>()
        .map_err(|_| ParseError::YearValue(value.to_string()))?;

    Ok(YearFuel { year, fuel_code })
}

/// Decodes a reference period label such as `"dezembro/2025 "`
///
/// Month names are Portuguese; an unknown name is an error rather than
/// month zero.
pub fn parse_period_label(label: &str) -> Result<PeriodMonth, ParseError> {
    let lowered = label.trim().to_lowercase();
    let (month_name, year) = lowered
        .split_once('/')
        .ok_or_else(|| ParseError::PeriodLabel(label.to_string()))?;

    let month_name = month_name.trim();
    let month = MONTHS
        .iter()
        .position(|name| *name == month_name)
        .map(|index| index as u32 + 1)
        .ok_or_else(|| ParseError::UnknownMonth {
            month: month_name.to_string(),
            label: label.to_string(),
        })?;

    let year = year
        .trim()
        .parse::<i32>()
        .map_err(|_| ParseError::PeriodLabel(label.to_string()))?;

    Ok(PeriodMonth { month, year })
}
