//! Display formatting for pages (Brazilian conventions)

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};

/// `R$ 1.234,56`
pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}R$ {},{}", sign, grouped, cents)
}

/// `dd/mm/YYYY HH:MM` from a stored `YYYY-MM-DD HH:MM:SS` timestamp;
/// anything unparseable is shown as stored
pub fn format_timestamp(stored: &str) -> String {
    NaiveDateTime::parse_from_str(stored, "%Y-%m-%d %H:%M:%S")
        .map(|ts| ts.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|_| stored.to_string())
}

/// `dd/mm/YYYY` from a stored timestamp
pub fn format_date(stored: &str) -> String {
    NaiveDateTime::parse_from_str(stored, "%Y-%m-%d %H:%M:%S")
        .map(|ts| ts.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| stored.to_string())
}
