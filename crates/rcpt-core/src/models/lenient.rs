//! Forgiving serde adapters for model-produced JSON.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

lazy_static! {
    // First numeric run, allowing thousands separators and spaces inside.
    static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"-?\d(?:[\d.,'\s\u{00a0}]*\d)?"
    ).unwrap();

    // Machine-formatted decimal, read exactly.
    static ref PLAIN_DECIMAL: Regex = Regex::new(r"^-?\d+(?:\.\d+)?$").unwrap();
}

/// Deserialize `T`, treating `null` as the default.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Any scalar as text; empty strings and non-scalars become `None`.
pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// A non-negative count from a number or numeric string.
pub fn count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A monetary amount or quantity from a number or formatted string.
pub fn decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Some(Value::String(s)) => exact_or_amount(&s),
        _ => None,
    })
}

/// Write an amount as its exact decimal string.
///
/// JSON numbers pass through `f64` when read back, which cannot hold every
/// amount; the string form is read exactly by [`decimal`].
pub fn serialize_decimal<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(d) => serializer.collect_str(d),
        None => serializer.serialize_none(),
    }
}

fn exact_or_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if PLAIN_DECIMAL.is_match(trimmed) {
        if let Ok(d) = Decimal::from_str(trimmed) {
            return Some(d);
        }
    }
    parse_amount(s)
}

/// Parse an amount as printed on a receipt.
///
/// Handles currency symbols, `1,234.56`, `1.234,56`, `1 234,56` and `12,50`.
/// A single separator followed by exactly three digits is read as a
/// thousands separator.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let token = AMOUNT_TOKEN.find(s)?.as_str();
    let negative = token.starts_with('-');
    let cleaned: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => single_separator(&cleaned, c, ','),
        (None, Some(d)) => single_separator(&cleaned, d, '.'),
        (None, None) => cleaned,
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

fn single_separator(cleaned: &str, last: usize, sep: char) -> String {
    let occurrences = cleaned.matches(sep).count();
    let trailing = cleaned.len() - last - 1;

    if occurrences > 1 || trailing == 3 {
        cleaned.replace(sep, "")
    } else {
        cleaned.replace(sep, ".")
    }
}
