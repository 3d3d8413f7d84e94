//! Dump command implementation.

use super::open_store;
use realmkit_bridge::convert::record_to_json;
use realmkit_core::{Realm, Record};
use std::io::Write;
use std::path::Path;

/// Runs the dump command.
pub fn run(path: &Path, class: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let (_registry, realm) = open_store(path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in collect(&realm, class)? {
        writeln!(out, "{}", line(&record)?)?;
    }
    Ok(())
}

/// Returns the records to dump: one class, or every class in name order.
fn collect(realm: &Realm, class: Option<&str>) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let classes = match class {
        Some(class) => vec![class.to_string()],
        None => realm.class_names()?,
    };
    let mut records = Vec::new();
    for class in &classes {
        records.extend(realm.all_objects(class)?);
    }
    Ok(records)
}

/// One JSON line: `{"class": .., "record": {..}}`.
fn line(record: &Record) -> serde_json::Result<String> {
    serde_json::to_string(&serde_json::json!({
        "class": record.class(),
        "record": record_to_json(record),
    }))
}
