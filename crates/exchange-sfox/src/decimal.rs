//! Exact decoding of JSON numbers into [`Decimal`].
//!
//! SFOX sends prices and quantities as bare JSON numbers. They are parsed
//! from their shortest textual form so `9379.48` stays `9379.48` instead of
//! picking up binary floating point noise.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Parses a JSON number or numeric string.
pub(crate) fn from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse(&number.to_string()),
        Value::String(text) => parse(text),
        _ => None,
    }
}

fn parse(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// `deserialize_with` helper for required fields; `null` decodes as zero.
pub(crate) fn exact<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(Decimal::ZERO);
    }
    from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a decimal number, got {value}")))
}
