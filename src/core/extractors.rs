//! Total accessors over semi-structured order JSON.
//!
//! Every extractor accepts any [`Value`] (including `Null`, arrays where a map
//! was expected, and so on) and answers `Null`/`None` instead of failing.
//! The one exception is [`sum_amounts`], where a non-numeric discount amount
//! is reported as an error for the batch.

use crate::utils::error::{EtlError, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Size tokens searched in variant titles. Order is the match priority.
pub const PREDEFINED_SIZES: &[&str] = &[
    "Standard",
    "L",
    "13/14 ans",
    "11/12 ans",
    "5/6 ans",
    "9/10 ans",
    "7/8 ans",
    "XL",
    "S",
    "M",
    "XS",
    "2XL",
    "XXL",
    "3XL",
    "4XL",
    "5XL",
    "3/4 ans",
    "4 ans",
    "14 ans",
    "10 ans",
    "12 ans",
    "8 ans",
    "6 ans",
    "Taille unique",
];

static QUANTITY_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(X\d+\)").expect("static pattern"));
static SLASH_AND_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\s*").expect("static pattern"));

/// `record[key]` when `record` is an object holding `key`, else `Null`.
pub fn extract_field(record: &Value, key: &str) -> Value {
    record
        .as_object()
        .and_then(|obj| obj.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Joins `element[key]` over a list of objects, skipping elements without `key`.
/// `Null` when `list` is not an array.
pub fn extract_joined(list: &Value, key: &str, separator: &str) -> Value {
    let Some(items) = list.as_array() else {
        return Value::Null;
    };

    let parts: Vec<String> = items
        .iter()
        .filter_map(|item| item.as_object().and_then(|obj| obj.get(key)))
        .map(value_to_string)
        .collect();

    Value::String(parts.join(separator))
}

/// Sums the `amount` of each discount entry. Not-an-array counts as zero.
pub fn sum_amounts(list: &Value) -> Result<f64> {
    let Some(items) = list.as_array() else {
        return Ok(0.0);
    };

    let mut total = 0.0;
    for (index, item) in items.iter().enumerate() {
        let amount = item.get("amount").ok_or_else(|| EtlError::ProcessingError {
            message: format!("discount entry #{} has no amount: {}", index, item),
        })?;
        total += coerce_f64(amount).ok_or_else(|| EtlError::ProcessingError {
            message: format!("discount entry #{} has a non-numeric amount: {}", index, amount),
        })?;
    }
    Ok(total)
}

/// Strips `(X<n>)` annotations, `+`, `/` with trailing blanks, and any
/// character outside the Basic Multilingual Plane, then trims.
pub fn sanitize_title(text: &str) -> String {
    let mut current = sanitize_once(text);
    // 移除字元後可能拼出新的 "(X2)"，重複到穩定為止
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let text = QUANTITY_ANNOTATION.replace_all(text, "");
    let text = text.replace('+', "");
    let text = SLASH_AND_SPACES.replace_all(&text, "");
    let text: String = text.chars().filter(|c| (*c as u32) <= 0xFFFF).collect();
    text.trim().to_string()
}

/// Compiled size tokens, matched case-insensitively on word boundaries.
#[derive(Debug, Clone)]
pub struct SizeTable {
    entries: Vec<(String, Regex)>,
}

impl SizeTable {
    pub fn new<S: AsRef<str>>(sizes: &[S]) -> std::result::Result<Self, regex::Error> {
        let entries = sizes
            .iter()
            .map(|size| {
                let size = size.as_ref();
                let pattern = format!(r"(?i)\b{}\b", regex::escape(size));
                Regex::new(&pattern).map(|re| (size.to_string(), re))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn predefined() -> &'static SizeTable {
        static TABLE: LazyLock<SizeTable> =
            LazyLock::new(|| SizeTable::new(PREDEFINED_SIZES).expect("static size patterns"));
        &TABLE
    }

    pub fn sizes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(size, _)| size.as_str())
    }
}

/// First size of `table` (in table order) found in `text`; `None` if `text`
/// is not a string or nothing matches.
pub fn extract_size<'t>(text: &Value, table: &'t SizeTable) -> Option<&'t str> {
    let text = text.as_str()?;
    table
        .entries
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(size, _)| size.as_str())
}

/// Lenient numeric coercion: numbers pass through, numeric strings are parsed,
/// everything else is `None`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
