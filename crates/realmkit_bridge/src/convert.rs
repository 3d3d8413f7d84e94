//! Conversion between JSON argument maps and engine values.

use crate::error::{BridgeError, BridgeResult};
use realmkit_core::{CoreError, Fields, PrimaryKey, Query, Record, ResultSet, Value};
use serde_json::{Map, Value as Json};

/// Deepest nesting accepted in an argument value.
pub const MAX_JSON_DEPTH: usize = 64;

/// Argument key holding the class name.
pub const CLASS_KEY: &str = "$";

/// Argument keys that may carry the primary key on `createObject`, in
/// lookup order.
pub const PRIMARY_KEY_ALIASES: [&str; 3] = ["uuid", "localId", "id"];

/// Routing keys that are never stored as fields.
const ROUTING_KEYS: [&str; 2] = [CLASS_KEY, "realmId"];

/// Converts a JSON value into an engine value.
///
/// # Errors
///
/// Returns `UnsupportedType` for numbers that are not 64-bit integers and
/// `InvalidArgument` when nesting exceeds [`MAX_JSON_DEPTH`].
pub fn json_to_value(json: &Json) -> BridgeResult<Value> {
    json_to_value_checked(json, 0)
}

fn json_to_value_checked(json: &Json, depth: usize) -> BridgeResult<Value> {
    if depth > MAX_JSON_DEPTH {
        return Err(BridgeError::invalid_argument(format!(
            "nesting depth exceeds maximum of {MAX_JSON_DEPTH}"
        )));
    }
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n.as_i64().map(Value::Int).ok_or_else(|| {
            CoreError::unsupported_type(format!("number {n} is not a 64-bit integer")).into()
        }),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(json_to_value_checked(item, depth + 1)?);
            }
            Ok(Value::List(out))
        }
        Json::Object(map) => {
            let mut fields = Fields::new();
            for (key, item) in map {
                fields.insert(key.clone(), json_to_value_checked(item, depth + 1)?);
            }
            Ok(Value::Object(fields))
        }
    }
}

/// Converts an engine value into JSON. Null members of nested objects are
/// omitted.
#[must_use]
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Object(fields) => Json::Object(fields_to_json(fields)),
    }
}

fn fields_to_json(fields: &Fields) -> Map<String, Json> {
    fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| (name.clone(), value_to_json(value)))
        .collect()
}

/// Encodes a record as a JSON object without its null fields.
#[must_use]
pub fn record_to_json(record: &Record) -> Json {
    Json::Object(fields_to_json(record.fields()))
}

/// Encodes a result set as a JSON array.
#[must_use]
pub fn results_to_json(results: &ResultSet) -> Json {
    Json::Array(results.iter().map(record_to_json).collect())
}

/// Extracts the storable fields of an argument map.
///
/// The class and instance routing keys and every primary-key alias are
/// skipped; the key itself is passed separately.
///
/// # Errors
///
/// Returns an error if a field value cannot be converted.
pub fn fields_from_json(map: &Map<String, Json>) -> BridgeResult<Fields> {
    let mut fields = Fields::new();
    for (name, json) in map {
        if ROUTING_KEYS.contains(&name.as_str()) || PRIMARY_KEY_ALIASES.contains(&name.as_str()) {
            continue;
        }
        fields.insert(name.clone(), json_to_value(json)?);
    }
    Ok(fields)
}

/// Converts a JSON scalar into a primary key.
///
/// # Errors
///
/// Returns `UnsupportedType` for anything but a string or an integer.
pub fn primary_key_from_json(json: &Json) -> BridgeResult<PrimaryKey> {
    let value = json_to_value(json)?;
    Ok(PrimaryKey::try_from_value(&value)?)
}

/// Returns the first non-null primary-key alias of a `createObject` map.
///
/// # Errors
///
/// Returns `UnsupportedType` if the alias holds neither a string nor an
/// integer.
pub fn primary_key_from_aliases(map: &Map<String, Json>) -> BridgeResult<Option<PrimaryKey>> {
    PRIMARY_KEY_ALIASES
        .iter()
        .find_map(|alias| map.get(*alias).filter(|json| !json.is_null()))
        .map(primary_key_from_json)
        .transpose()
}

/// Parses a predicate term list such as `[["greaterThan", "age", 20]]`.
///
/// A missing or null predicate matches everything.
///
/// # Errors
///
/// Returns `InvalidArgument` if the predicate is not a list of lists, or
/// the query parser's error.
pub fn predicate_from_json(json: Option<&Json>) -> BridgeResult<Query> {
    let terms = match json {
        None | Some(Json::Null) => return Ok(Query::all()),
        Some(Json::Array(terms)) => terms,
        Some(other) => {
            return Err(BridgeError::invalid_argument(format!(
                "predicate must be a list, got {other}"
            )))
        }
    };

    let mut parsed = Vec::with_capacity(terms.len());
    for term in terms {
        let Json::Array(parts) = term else {
            return Err(BridgeError::invalid_argument(format!(
                "predicate term must be a list, got {term}"
            )));
        };
        parsed.push(
            parts
                .iter()
                .map(json_to_value)
                .collect::<BridgeResult<Vec<_>>>()?,
        );
    }
    Ok(Query::parse(&parsed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmkit_core::ErrorKind;
    use serde_json::json;

    fn kind(err: &BridgeError) -> Option<ErrorKind> {
        match err {
            BridgeError::Core(core) => Some(core.kind()),
            _ => None,
        }
    }

    #[test]
    fn nested_values_convert() {
        let value = json_to_value(&json!({"tags": ["a", "b"], "n": 3, "ok": true})).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields["n"], Value::Int(3));
        assert_eq!(fields["ok"], Value::Bool(true));
        assert_eq!(fields["tags"].as_list().unwrap().len(), 2);
    }

    #[test]
    fn floats_are_unsupported() {
        let err = json_to_value(&json!(1.5)).unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::UnsupportedType));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut json = json!(1);
        for _ in 0..=MAX_JSON_DEPTH {
            json = json!([json]);
        }
        let err = json_to_value(&json).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
    }

    #[test]
    fn null_fields_are_omitted() {
        let mut fields = Fields::new();
        fields.insert("a".into(), Value::Int(1));
        fields.insert("b".into(), Value::Null);
        let json = value_to_json(&Value::Object(fields));
        assert_eq!(json, json!({"a": 1}));
    }

    #[test]
    fn routing_keys_and_aliases_are_not_fields() {
        let args = json!({"$": "Person", "realmId": "r", "uuid": "u1", "id": "x", "localId": "y", "name": "Ann"});
        let fields = fields_from_json(args.as_object().unwrap()).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], Value::from("Ann"));
    }

    #[test]
    fn alias_order_is_uuid_then_local_id_then_id() {
        let args = json!({"id": "c", "localId": "b"});
        let key = primary_key_from_aliases(args.as_object().unwrap()).unwrap();
        assert_eq!(key, Some(PrimaryKey::from("b")));

        let args = json!({"uuid": null, "id": 7});
        let key = primary_key_from_aliases(args.as_object().unwrap()).unwrap();
        assert_eq!(key, Some(PrimaryKey::Int(7)));

        let args = json!({"name": "x"});
        assert_eq!(primary_key_from_aliases(args.as_object().unwrap()).unwrap(), None);
    }

    #[test]
    fn boolean_key_is_unsupported() {
        let err = primary_key_from_json(&json!(true)).unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::UnsupportedType));
    }

    #[test]
    fn missing_predicate_matches_all() {
        assert!(predicate_from_json(None).unwrap().is_all());
        assert!(predicate_from_json(Some(&Json::Null)).unwrap().is_all());
    }

    #[test]
    fn predicate_terms_are_parsed() {
        let json = json!([["greaterThan", "age", 20], ["or"], ["equalTo", "name", "Bob"]]);
        let query = predicate_from_json(Some(&json)).unwrap();
        assert!(!query.is_all());
    }

    #[test]
    fn malformed_predicate_is_rejected() {
        let err = predicate_from_json(Some(&json!({"age": 1}))).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));

        let err = predicate_from_json(Some(&json!(["greaterThan"]))).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));

        let err = predicate_from_json(Some(&json!([["between", "age", 1]]))).unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::UnknownOperator));
    }
}
