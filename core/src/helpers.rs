//! Stateless helpers shared by gateway integrations.

use serde_json::error::Category;
use serde_json::Value;

use crate::error::{Error, Result};

/// Luhn checksum of a card number.
///
/// Only ASCII digits are accepted; separators must be stripped by the
/// caller. An empty number is invalid.
pub fn validate_luhn(card_number: &str) -> bool {
    if card_number.is_empty() || !card_number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = card_number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                doubled / 10 + doubled % 10
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

/// Convert an amount to `f64`.
///
/// Accepts JSON numbers and decimal strings of the form
/// `-?[0-9]+(\.[0-9]*)?`.
pub fn to_float(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::MalformedInput(format!("{n} is not a valid decimal number"))),
        Value::String(s) if is_decimal(s) => s
            .parse()
            .map_err(|_| Error::MalformedInput(format!("'{s}' is not a valid decimal number"))),
        Value::String(s) => Err(Error::MalformedInput(format!(
            "'{s}' is not a valid decimal number"
        ))),
        _ => Err(Error::MalformedInput(
            "data type is not a valid decimal number".to_string(),
        )),
    }
}

fn is_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (unsigned, ""),
    };
    !int.is_empty() && int.bytes().all(|b| b.is_ascii_digit()) && frac.bytes().all(|b| b.is_ascii_digit())
}

/// Parse JSON text, reporting the failure category on error.
pub fn json_decode(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| {
        let category = match e.classify() {
            Category::Syntax => "syntax error, malformed JSON",
            Category::Eof => "unexpected end of input",
            Category::Data => "data does not match the expected shape",
            Category::Io => "I/O failure while reading",
        };
        Error::MalformedInput(format!("unable to parse JSON data: {category} ({e})"))
    })
}
