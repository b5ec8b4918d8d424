//! Currency codes and display formatting. Amounts are plain `f64`; rounding
//! happens only here, at display time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("CLP")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presentation rules for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyStyle {
    pub symbol: &'static str,
    pub decimals: usize,
    pub grouping_separator: char,
    pub decimal_separator: char,
}

impl CurrencyStyle {
    pub fn for_code(code: &CurrencyCode) -> Option<Self> {
        let style = match code.as_str() {
            "CLP" => Self {
                symbol: "$",
                decimals: 0,
                grouping_separator: '.',
                decimal_separator: ',',
            },
            "USD" => Self {
                symbol: "US$",
                decimals: 2,
                grouping_separator: ',',
                decimal_separator: '.',
            },
            "EUR" => Self {
                symbol: "€",
                decimals: 2,
                grouping_separator: '.',
                decimal_separator: ',',
            },
            "GBP" => Self {
                symbol: "£",
                decimals: 2,
                grouping_separator: ',',
                decimal_separator: '.',
            },
            "JPY" => Self {
                symbol: "¥",
                decimals: 0,
                grouping_separator: ',',
                decimal_separator: '.',
            },
            _ => return None,
        };
        Some(style)
    }
}

/// Formats `amount` for display, e.g. `$150.000` for CLP or `US$1,234.50` for USD.
/// Unknown codes fall back to `CODE 1,234.50`.
pub fn format_currency(amount: f64, code: &CurrencyCode) -> String {
    let (prefix, style) = match CurrencyStyle::for_code(code) {
        Some(style) => (style.symbol.to_string(), style),
        None => (
            format!("{} ", code.as_str()),
            CurrencyStyle {
                symbol: "",
                decimals: 2,
                grouping_separator: ',',
                decimal_separator: '.',
            },
        ),
    };
    if !amount.is_finite() {
        return format!("{prefix}{amount}");
    }
    let rounded = format!("{:.*}", style.decimals, amount.abs());
    let (integer, fraction) = match rounded.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (rounded.as_str(), None),
    };
    let mut body = group_digits(integer, style.grouping_separator);
    if let Some(fraction) = fraction {
        body.push(style.decimal_separator);
        body.push_str(fraction);
    }
    let is_zero = rounded.chars().all(|ch| ch == '0' || ch == '.');
    let sign = if amount < 0.0 && !is_zero { "-" } else { "" };
    format!("{sign}{prefix}{body}")
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}
