//! Query command implementation.

use super::open_store;
use realmkit_bridge::convert::{predicate_from_json, record_to_json};
use realmkit_core::{Query, Realm, ResultSet};
use std::path::Path;

/// Runs the query command.
///
/// `predicate` is a JSON term list; without one every record of the class
/// is printed.
pub fn run(path: &Path, class: &str, predicate: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let query = parse(predicate)?;
    let (_registry, realm) = open_store(path)?;
    let results = execute(&realm, class, &query)?;
    for record in &results {
        println!("{}", serde_json::to_string(&record_to_json(record))?);
    }
    tracing::debug!(class, matched = results.len(), "query finished");
    Ok(())
}

fn parse(predicate: Option<&str>) -> Result<Query, Box<dyn std::error::Error>> {
    let json = predicate
        .map(|text| serde_json::from_str::<serde_json::Value>(text))
        .transpose()?;
    Ok(predicate_from_json(json.as_ref())?)
}

fn execute(realm: &Realm, class: &str, query: &Query) -> Result<ResultSet, Box<dyn std::error::Error>> {
    Ok(realm.objects(class, query)?)
}
