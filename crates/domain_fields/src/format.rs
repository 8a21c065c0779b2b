//! Value formatting for CRM custom fields
//!
//! Form values arrive as loosely typed JSON (checkbox maps, localized
//! numbers, several date notations). `ValueFormatter::format` coerces one
//! value to the representation the CRM expects for a `DataType`. `Value::Null`
//! means "not representable"; such values are left out of the payload.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::str::FromStr;

use crate::catalog::DataType;
use crate::translations::translate_or_keep;

/// Strings that coerce to `true`; everything else is `false`
const TRUE_WORDS: [&str; 6] = ["1", "true", "yes", "ano", "on", "y"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d. %m. %Y"];

/// Flattens nested objects into dot-path keys
///
/// The nested value is kept under its original key as well, so both
/// `stepNotes` and `stepNotes.1` are addressable. Arrays are leaves.
pub fn flatten(data: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    flatten_into(&mut flat, None, data);
    flat
}

fn flatten_into(flat: &mut Map<String, Value>, prefix: Option<&str>, data: &Map<String, Value>) {
    for (key, value) in data {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };
        if let Value::Object(nested) = value {
            flatten_into(flat, Some(&path), nested);
        }
        flat.insert(path, value.clone());
    }
}

/// Strict boolean coercion
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => TRUE_WORDS.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

/// Parses `"1 234,50"`, `"1234.5"`, `"15 %"` or `"120 000 Kč"`
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let mut compact: String = raw
        .trim()
        .trim_end_matches('%')
        .trim_end_matches("Kč")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if compact.contains(',') {
        if compact.contains('.') {
            compact = compact.replace('.', "");
        }
        compact = compact.replace(',', ".");
    }
    Decimal::from_str(&compact).ok()
}

fn decimal_to_json(value: Decimal) -> Value {
    let value = value.normalize();
    if value.scale() == 0 {
        if let Some(int) = value.to_i64() {
            return Value::Number(int.into());
        }
    }
    value
        .to_f64()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn to_number(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(n.clone()),
        Value::String(s) => parse_decimal(s).map_or(Value::Null, decimal_to_json),
        Value::Bool(b) => Value::Number(u8::from(*b).into()),
        _ => Value::Null,
    }
}

fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.naive_local());
            }
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .or_else(|| {
                    DATE_FORMATS
                        .iter()
                        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Items selected in a multi-select value
///
/// Accepts a list of keys or a checkbox map `{ key: bool }`.
fn selected_items(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => obj
                        .get("value")
                        .or_else(|| obj.get("label"))
                        .and_then(scalar_to_string),
                    other => scalar_to_string(other),
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::Object(map) if map.values().all(is_checkbox_state) => Some(
            map.iter()
                .filter(|(_, checked)| to_bool(checked))
                .map(|(key, _)| key.clone())
                .collect(),
        ),
        _ => None,
    }
}

fn is_checkbox_state(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0 | 1)),
        Value::String(s) => matches!(s.trim(), "" | "0" | "1" | "on" | "off" | "true" | "false"),
        _ => false,
    }
}

fn to_text(value: &Value) -> Value {
    if let Some(items) = selected_items(value) {
        if items.is_empty() {
            return Value::Null;
        }
        let labels: Vec<String> = items.iter().map(|item| translate_or_keep(item)).collect();
        return Value::String(labels.join(", "));
    }
    match value {
        Value::Object(map) => {
            let lines: Vec<String> = map
                .iter()
                .filter_map(|(key, item)| match to_text(item) {
                    Value::String(text) if !text.is_empty() => Some(format!("{}: {}", key, text)),
                    _ => None,
                })
                .collect();
            if lines.is_empty() {
                Value::Null
            } else {
                Value::String(lines.join("\n"))
            }
        }
        other => match scalar_to_string(other) {
            Some(s) if !s.is_empty() => Value::String(translate_or_keep(&s)),
            _ => Value::Null,
        },
    }
}

fn stringify(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Formats form values for the CRM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueFormatter {
    /// Prefix for relative file paths in `FILE_LINKS` values
    pub file_base_url: Option<String>,
}

impl ValueFormatter {
    pub fn new(file_base_url: Option<String>) -> Self {
        Self { file_base_url }
    }

    pub fn format(&self, value: &Value, data_type: DataType) -> Value {
        match data_type {
            DataType::Boolean => Value::Bool(to_bool(value)),
            DataType::Decimal | DataType::Monetary | DataType::Percent => to_number(value),
            DataType::Date => parse_datetime(value)
                .map_or(Value::Null, |dt| Value::String(dt.format("%Y-%m-%d").to_string())),
            DataType::Datetime => parse_datetime(value)
                .map_or(Value::Null, |dt| Value::String(dt.format("%Y-%m-%d %H:%M").to_string())),
            DataType::Text | DataType::String | DataType::Enumeration => to_text(value),
            DataType::FileLinks => self.file_links(value),
            DataType::Hyperlink => stringify(value),
        }
    }

    fn absolute_url(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        match &self.file_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), location.trim_start_matches('/')),
            None => location.to_string(),
        }
    }

    /// One line per file, `name: url` when the descriptor is named
    fn file_links(&self, value: &Value) -> Value {
        let descriptors: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            single => vec![single],
        };

        let lines: Vec<String> = descriptors
            .into_iter()
            .filter_map(|descriptor| match descriptor {
                Value::String(url) if !url.trim().is_empty() => Some(self.absolute_url(url.trim())),
                Value::Object(obj) => {
                    let location = obj
                        .get("url")
                        .or_else(|| obj.get("path"))
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|l| !l.is_empty())?;
                    let url = self.absolute_url(location);
                    match obj.get("name").and_then(Value::as_str).map(str::trim) {
                        Some(name) if !name.is_empty() => Some(format!("{}: {}", name, url)),
                        _ => Some(url),
                    }
                }
                _ => None,
            })
            .collect();

        if lines.is_empty() {
            Value::Null
        } else {
            Value::String(lines.join("\n"))
        }
    }
}

/// Formats with no file base URL
pub fn format_value(value: &Value, data_type: DataType) -> Value {
    ValueFormatter::default().format(value, data_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(format_value(&json!("yes"), DataType::Boolean), json!(true));
        assert_eq!(format_value(&json!("Ano"), DataType::Boolean), json!(true));
        assert_eq!(format_value(&json!("0"), DataType::Boolean), json!(false));
        assert_eq!(format_value(&json!("maybe"), DataType::Boolean), json!(false));
        assert_eq!(format_value(&json!(2), DataType::Boolean), json!(true));
        assert_eq!(format_value(&json!([1]), DataType::Boolean), json!(false));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(parse_decimal("1 234,50"), Some(dec!(1234.50)));
        assert_eq!(parse_decimal("1.234,5"), Some(dec!(1234.5)));
        assert_eq!(parse_decimal("15 %"), Some(dec!(15)));
        assert_eq!(parse_decimal("120 000 Kč"), Some(dec!(120000)));
        assert_eq!(format_value(&json!("250 000"), DataType::Monetary), json!(250000));
        assert_eq!(format_value(&json!("12,5"), DataType::Percent), json!(12.5));
        assert_eq!(format_value(&json!("a lot"), DataType::Decimal), Value::Null);
        assert_eq!(format_value(&json!(3.25), DataType::Decimal), json!(3.25));
    }

    #[test]
    fn test_dates() {
        assert_eq!(format_value(&json!("2024-03-05"), DataType::Date), json!("2024-03-05"));
        assert_eq!(format_value(&json!("5.3.2024"), DataType::Date), json!("2024-03-05"));
        assert_eq!(
            format_value(&json!("2024-03-05T14:30:00+01:00"), DataType::Datetime),
            json!("2024-03-05 14:30")
        );
        assert_eq!(format_value(&json!("2024-03-05"), DataType::Datetime), json!("2024-03-05 00:00"));
        assert_eq!(format_value(&json!("next week"), DataType::Date), Value::Null);
    }

    #[test]
    fn test_text_translation_and_multiselect() {
        assert_eq!(format_value(&json!("eshop"), DataType::Enumeration), json!("E-shop"));
        assert_eq!(format_value(&json!("Free text"), DataType::Text), json!("Free text"));
        assert_eq!(
            format_value(&json!(["web", "seo", "custom"]), DataType::Text),
            json!("Tvorba webu, Optimalizace pro vyhledávače, custom")
        );
        assert_eq!(
            format_value(&json!({ "web": true, "eshop": false, "support": "1" }), DataType::Enumeration),
            json!("Tvorba webu, Technická podpora")
        );
        assert_eq!(format_value(&json!({ "web": false }), DataType::Text), Value::Null);
        assert_eq!(
            format_value(&json!({ "1": "Zavolat", "2": "" }), DataType::Text),
            json!("1: Zavolat")
        );
    }

    #[test]
    fn test_file_links() {
        let formatter = ValueFormatter::new(Some("https://forms.example.cz/uploads/".to_string()));
        let value = json!([
            "https://cdn.example.cz/a.pdf",
            { "name": "Výkres", "path": "/2024/b.dwg" },
            { "url": "c.png" },
            { "name": "missing" }
        ]);
        assert_eq!(
            formatter.format(&value, DataType::FileLinks),
            json!("https://cdn.example.cz/a.pdf\nVýkres: https://forms.example.cz/uploads/2024/b.dwg\nhttps://forms.example.cz/uploads/c.png")
        );
        assert_eq!(formatter.format(&json!([]), DataType::FileLinks), Value::Null);
    }

    #[test]
    fn test_hyperlink_stringifies() {
        assert_eq!(format_value(&json!("https://a.cz"), DataType::Hyperlink), json!("https://a.cz"));
        assert_eq!(format_value(&json!(42), DataType::Hyperlink), json!("42"));
    }

    #[test]
    fn test_flatten_keeps_nested_key() {
        let data = json!({ "stepNotes": { "1": "x", "2": { "a": 1 } }, "name": "n" });
        let flat = flatten(data.as_object().unwrap());
        assert_eq!(flat["stepNotes.1"], json!("x"));
        assert_eq!(flat["stepNotes.2.a"], json!(1));
        assert_eq!(flat["stepNotes.2"], json!({ "a": 1 }));
        assert_eq!(flat["stepNotes"], json!({ "1": "x", "2": { "a": 1 } }));
        assert_eq!(flat["name"], json!("n"));
    }
}
