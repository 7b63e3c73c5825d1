//! Typed view over the single-slot attribute value rows.
//!
//! Storage keeps four nullable slots (`value_text`, `value_int`, `value_decimal`,
//! `value_choice_id`); exactly one is populated and it must match the attribute
//! type. Booleans live in the text slot as `"true"` / `"false"`.

use rust_decimal::Decimal;
use serde_json::Value;
use std::borrow::Cow;
use std::str::FromStr;

use crate::entities::AttributeType;

/// A stored attribute value, tagged by type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    Text(String),
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    /// Id of an `attribute_choice_values` row
    Choice(i64),
}

/// The four storage slots of an attribute value row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSlots {
    pub text: Option<String>,
    pub int: Option<i64>,
    pub decimal: Option<Decimal>,
    pub choice_id: Option<i64>,
}

impl AttributeValue {
    /// Reads the slot that matches `attribute_type`. Other slots are ignored; a row
    /// whose matching slot is empty yields `None`.
    pub fn from_slots(attribute_type: AttributeType, slots: &ValueSlots) -> Option<Self> {
        match attribute_type {
            AttributeType::Text => slots
                .text
                .as_ref()
                .filter(|t| !t.trim().is_empty())
                .map(|t| AttributeValue::Text(t.clone())),
            AttributeType::Int => slots.int.map(AttributeValue::Int),
            AttributeType::Decimal => slots.decimal.map(AttributeValue::Decimal),
            AttributeType::Boolean => slots
                .text
                .as_deref()
                .and_then(parse_bool)
                .map(AttributeValue::Bool),
            AttributeType::Choice => slots.choice_id.map(AttributeValue::Choice),
        }
    }

    pub fn to_slots(&self) -> ValueSlots {
        match self {
            AttributeValue::Text(t) => ValueSlots {
                text: Some(t.clone()),
                ..Default::default()
            },
            AttributeValue::Int(i) => ValueSlots {
                int: Some(*i),
                ..Default::default()
            },
            AttributeValue::Decimal(d) => ValueSlots {
                decimal: Some(*d),
                ..Default::default()
            },
            AttributeValue::Bool(b) => ValueSlots {
                text: Some(b.to_string()),
                ..Default::default()
            },
            AttributeValue::Choice(id) => ValueSlots {
                choice_id: Some(*id),
                ..Default::default()
            },
        }
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::Text(_) => AttributeType::Text,
            AttributeValue::Int(_) => AttributeType::Int,
            AttributeValue::Decimal(_) => AttributeType::Decimal,
            AttributeValue::Bool(_) => AttributeType::Boolean,
            AttributeValue::Choice(_) => AttributeType::Choice,
        }
    }

    /// Numeric view used by set membership and range bounds.
    pub fn numeric(&self) -> Option<Decimal> {
        match self {
            AttributeValue::Int(i) => Some(Decimal::from(*i)),
            AttributeValue::Decimal(d) => Some(d.normalize()),
            _ => None,
        }
    }

    /// Text seen by substring filters: text values, and booleans as `"true"`/`"false"`.
    pub fn match_text(&self) -> Option<Cow<'_, str>> {
        match self {
            AttributeValue::Text(t) => Some(Cow::Borrowed(t.as_str())),
            AttributeValue::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }

    pub fn choice_id(&self) -> Option<i64> {
        match self {
            AttributeValue::Choice(id) => Some(*id),
            _ => None,
        }
    }
}

/// Reference to a choice value in write input, resolved against the catalog later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceRef {
    Id(i64),
    /// Slug or display text
    Label(String),
}

/// Write input after parsing, before choice resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    Value(AttributeValue),
    Choice(ChoiceRef),
}

/// Keys accepted for each slot in a slot object. The `valeur_*` spellings are the
/// catalog's storage column names.
const TEXT_KEYS: &[&str] = &["value_text", "valeur_text"];
const INT_KEYS: &[&str] = &["value_int", "valeur_int"];
const DECIMAL_KEYS: &[&str] = &["value_decimal", "valeur_dec", "valeur_decimal"];
const CHOICE_KEYS: &[&str] = &["value_choice", "valeur_choice"];
const BOOL_KEYS: &[&str] = &["value_bool", "valeur_bool"];

fn slot_keys() -> impl Iterator<Item = &'static str> {
    [TEXT_KEYS, INT_KEYS, DECIMAL_KEYS, CHOICE_KEYS, BOOL_KEYS]
        .into_iter()
        .flatten()
        .copied()
}

/// True when the input carries nothing worth writing: null, blank string, empty
/// array or object, or a slot object with every slot empty.
pub fn is_unusable(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty() || items.iter().all(is_unusable),
        Value::Object(map) => {
            map.is_empty()
                || (slot_keys().any(|k| map.contains_key(k))
                    && slot_keys().all(|k| map.get(k).map_or(true, is_unusable)))
        }
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Parses one write-time value for an attribute of `attribute_type`.
///
/// `Ok(None)` means write-skip: the stored value must stay untouched. Errors carry a
/// reason suitable for `ServiceError::invalid_field`.
pub fn parse_input(attribute_type: AttributeType, raw: &Value) -> Result<Option<ParsedInput>, String> {
    if is_unusable(raw) {
        return Ok(None);
    }

    let raw = match raw {
        Value::Array(items) => {
            let usable: Vec<&Value> = items.iter().filter(|v| !is_unusable(v)).collect();
            match usable.as_slice() {
                [single] => *single,
                _ => return Err("expected a single value".to_string()),
            }
        }
        Value::Object(map) => {
            let keys = slot_for(attribute_type);
            match keys.iter().filter_map(|k| map.get(*k)).find(|v| !is_unusable(v)) {
                Some(slot) => slot,
                None => return Err(format!("expected a value in the {} slot", keys[0])),
            }
        }
        other => other,
    };

    let parsed = match attribute_type {
        AttributeType::Text => match raw {
            Value::String(s) => ParsedInput::Value(AttributeValue::Text(s.trim().to_string())),
            Value::Number(n) => ParsedInput::Value(AttributeValue::Text(n.to_string())),
            _ => return Err("expected text".to_string()),
        },
        AttributeType::Int => {
            let n = match raw {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            ParsedInput::Value(AttributeValue::Int(
                n.ok_or_else(|| "expected an integer".to_string())?,
            ))
        }
        AttributeType::Decimal => {
            let d = match raw {
                Value::Number(n) => Decimal::from_str(&n.to_string())
                    .or_else(|_| Decimal::from_scientific(&n.to_string()))
                    .ok(),
                Value::String(s) => parse_decimal(s),
                _ => None,
            };
            ParsedInput::Value(AttributeValue::Decimal(
                d.ok_or_else(|| "expected a decimal number".to_string())?,
            ))
        }
        AttributeType::Boolean => {
            let b = match raw {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(1) => Some(true),
                    Some(0) => Some(false),
                    _ => None,
                },
                Value::String(s) => parse_bool(s),
                _ => None,
            };
            ParsedInput::Value(AttributeValue::Bool(
                b.ok_or_else(|| "expected a boolean".to_string())?,
            ))
        }
        AttributeType::Choice => match raw {
            Value::Number(n) => ParsedInput::Choice(ChoiceRef::Id(
                n.as_i64().ok_or_else(|| "expected a choice id".to_string())?,
            )),
            Value::String(s) => ParsedInput::Choice(ChoiceRef::Label(s.trim().to_string())),
            _ => return Err("expected a choice value".to_string()),
        },
    };

    Ok(Some(parsed))
}

fn slot_for(attribute_type: AttributeType) -> &'static [&'static str] {
    match attribute_type {
        AttributeType::Text => TEXT_KEYS,
        AttributeType::Int => INT_KEYS,
        AttributeType::Decimal => DECIMAL_KEYS,
        AttributeType::Boolean => BOOL_KEYS,
        AttributeType::Choice => CHOICE_KEYS,
    }
}

/// Accepts the usual spellings in both catalog languages.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "oui" => Some(true),
        "false" | "0" | "no" | "non" => Some(false),
        _ => None,
    }
}

/// Decimal parsing shared by write input and filter terms; a decimal comma is accepted.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_str(&trimmed.replace(',', ".")))
        .ok()
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to `-`.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.trim().chars() {
        let folded = fold_accent(ch);
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn fold_accent(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ä' | 'À' | 'Á' | 'Â' | 'Ä' => 'a',
        'ç' | 'Ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'Î' | 'Ï' => 'i',
        'ò' | 'ó' | 'ô' | 'ö' | 'Ô' | 'Ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Û' | 'Ü' => 'u',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn slots_round_trip_through_matching_type() {
        let v = AttributeValue::Bool(true);
        let slots = v.to_slots();
        assert_eq!(slots.text.as_deref(), Some("true"));
        assert_eq!(AttributeValue::from_slots(AttributeType::Boolean, &slots), Some(v));
    }

    #[test]
    fn from_slots_ignores_mismatched_slot() {
        let slots = ValueSlots {
            text: Some("16".into()),
            ..Default::default()
        };
        assert_eq!(AttributeValue::from_slots(AttributeType::Int, &slots), None);
    }

    #[test]
    fn numeric_view_normalizes_scale() {
        assert_eq!(AttributeValue::Decimal(dec!(16.00)).numeric(), Some(dec!(16)));
        assert_eq!(AttributeValue::Int(16).numeric(), Some(dec!(16)));
        assert_eq!(AttributeValue::Text("16".into()).numeric(), None);
    }

    #[test]
    fn unusable_inputs_are_skipped() {
        for raw in [
            json!(null),
            json!(""),
            json!("   "),
            json!([]),
            json!({}),
            json!({"value_int": null, "value_text": ""}),
            json!({"valeur_text": ""}),
            json!({"valeur_int": null}),
            json!({"valeur_dec": " ", "valeur_choice": null}),
        ] {
            assert_eq!(parse_input(AttributeType::Int, &raw), Ok(None), "{raw}");
        }
        assert_eq!(parse_input(AttributeType::Text, &json!({"valeur_text": ""})), Ok(None));
    }

    #[test]
    fn storage_column_spellings_are_accepted() {
        assert_eq!(
            parse_input(AttributeType::Decimal, &json!({"valeur_dec": "15.6"})),
            Ok(Some(ParsedInput::Value(AttributeValue::Decimal(dec!(15.6)))))
        );
        assert_eq!(
            parse_input(AttributeType::Text, &json!({"valeur_text": "IPS"})),
            Ok(Some(ParsedInput::Value(AttributeValue::Text("IPS".into()))))
        );
    }

    #[test]
    fn slot_object_without_the_matching_slot_names_it() {
        assert_eq!(
            parse_input(AttributeType::Int, &json!({"valeur_text": "x"})),
            Err("expected a value in the value_int slot".to_string())
        );
    }

    #[test]
    fn parses_by_type() {
        assert_eq!(
            parse_input(AttributeType::Int, &json!("16")),
            Ok(Some(ParsedInput::Value(AttributeValue::Int(16))))
        );
        assert_eq!(
            parse_input(AttributeType::Decimal, &json!("13,3")),
            Ok(Some(ParsedInput::Value(AttributeValue::Decimal(dec!(13.3)))))
        );
        assert_eq!(
            parse_input(AttributeType::Boolean, &json!("oui")),
            Ok(Some(ParsedInput::Value(AttributeValue::Bool(true))))
        );
        assert_eq!(
            parse_input(AttributeType::Choice, &json!(["Intel"])),
            Ok(Some(ParsedInput::Choice(ChoiceRef::Label("Intel".into()))))
        );
        assert_eq!(
            parse_input(AttributeType::Int, &json!({"value_int": 8})),
            Ok(Some(ParsedInput::Value(AttributeValue::Int(8))))
        );
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert_matches!(parse_input(AttributeType::Int, &json!("sixteen")), Err(_));
        assert_matches!(parse_input(AttributeType::Decimal, &json!(true)), Err(_));
        assert_matches!(parse_input(AttributeType::Int, &json!([1, 2])), Err(_));
    }

    #[test]
    fn slugify_folds_accents_and_separators() {
        assert_eq!(slugify("Écran  Tactile / 4K"), "ecran-tactile-4k");
        assert_eq!(slugify("  Intel Core i7 "), "intel-core-i7");
    }
}
