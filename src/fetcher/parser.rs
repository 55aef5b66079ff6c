//! Pokémon API record parser
//!
//! Stateless conversion of raw JSON records into [`Pokemon`] and [`Combat`].
//! Raw snapshots keep the API's JSON untouched; parsing happens per record so
//! a single malformed record can be reported and skipped.
//!
//! The API is loose about its payloads: field names vary in case, ids and
//! stats may arrive as numeric strings, and types come either as
//! `"Grass/Poison"` or as an array.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::{Combat, Pokemon};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fields that never become numeric attributes
const NON_ATTRIBUTE_FIELDS: [&str; 5] = ["id", "name", "types", "legendary", "is_legendary"];

/// Stateless parser for Pokémon API records
pub struct PokemonParser;

impl PokemonParser {
    /// Parse a `/pokemon/{id}` detail (or listing) record
    ///
    /// # Errors
    /// Returns FetcherError::ParseError if the record is not an object or
    /// lacks a usable `id` or `name`
    pub fn parse_pokemon(record: &Value) -> FetcherResult<Pokemon> {
        let object = as_object(record)?;

        let id = field(object, "id")
            .and_then(as_i64_lenient)
            .ok_or_else(|| FetcherError::ParseError(format!("Pokemon without a valid id: {record}")))?;

        let name = field(object, "name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FetcherError::ParseError(format!("Pokemon {id} has no name")))?
            .to_string();

        let types = field(object, "types").map(parse_types).unwrap_or_default();

        let is_legendary = field(object, "legendary")
            .or_else(|| field(object, "is_legendary"))
            .and_then(as_bool_lenient)
            .unwrap_or(false);

        let numeric_attributes: BTreeMap<String, f64> = object
            .iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .filter(|(key, _)| !NON_ATTRIBUTE_FIELDS.contains(&key.as_str()))
            .filter_map(|(key, value)| as_f64_lenient(value).map(|number| (key, number)))
            .collect();

        Ok(Pokemon {
            id,
            name,
            numeric_attributes,
            types,
            is_legendary,
        })
    }

    /// Parse a `/combats` record
    ///
    /// # Errors
    /// Returns FetcherError::ParseError if any of `first_pokemon`,
    /// `second_pokemon` or `winner` is missing or not an id
    pub fn parse_combat(record: &Value) -> FetcherResult<Combat> {
        let object = as_object(record)?;
        let id_field = |name: &str| {
            field(object, name).and_then(as_i64_lenient).ok_or_else(|| {
                FetcherError::ParseError(format!("Combat field `{name}` missing or invalid: {record}"))
            })
        };

        Ok(Combat {
            first_pokemon: id_field("first_pokemon")?,
            second_pokemon: id_field("second_pokemon")?,
            winner: id_field("winner")?,
        })
    }

    /// Id of a raw record, if it has one
    pub fn record_id(record: &Value) -> Option<i64> {
        record
            .as_object()
            .and_then(|object| field(object, "id"))
            .and_then(as_i64_lenient)
    }
}

fn as_object(record: &Value) -> FetcherResult<&Map<String, Value>> {
    record
        .as_object()
        .ok_or_else(|| FetcherError::ParseError(format!("Record is not an object: {record}")))
}

/// Case-insensitive field lookup; an exact match wins
fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn as_i64_lenient(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_bool_lenient(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Split types into an ordered, de-duplicated list
fn parse_types(value: &Value) -> Vec<String> {
    let parts: Vec<String> = match value {
        Value::String(s) => s.split('/').map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(object) => field(object, "name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut types: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        let part = part.trim();
        if !part.is_empty() && !types.iter().any(|t| t == part) {
            types.push(part.to_string());
        }
    }
    types
}
