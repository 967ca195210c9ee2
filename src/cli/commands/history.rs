//! History command implementation.
//!
//! Merges the audit trail of a tracked event with that of its content item.

use chrono::DateTime;
use serde_json::json;

use super::sync::Locations;
use crate::content::SqliteContentStore;
use crate::error::{Error, Result};
use crate::storage::audit::AuditEvent;
use crate::storage::{SqliteStorage, StateStore};

/// Execute the history command.
///
/// # Errors
///
/// Returns `Error::RecordNotFound` if the event is not tracked, or an error
/// if the database cannot be read.
pub fn execute(locations: &Locations<'_>, event_id: &str, limit: u32, json: bool) -> Result<()> {
    let db_path = locations.db_path()?;
    if !db_path.exists() {
        return Err(Error::RecordNotFound {
            event_id: event_id.to_string(),
        });
    }

    let storage = SqliteStorage::open(&db_path)?;
    let record = storage.get(event_id)?.ok_or_else(|| Error::RecordNotFound {
        event_id: event_id.to_string(),
    })?;
    let content = SqliteContentStore::open(&db_path)?;

    let mut entries = storage.record_history(event_id, Some(limit))?;
    entries.extend(content.history(&record.content_item_id, Some(limit))?);
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    entries.truncate(limit as usize);

    if json {
        let output = json!({
            "event_id": record.event_id,
            "content_item_id": record.content_item_id,
            "status": record.status,
            "history": entries.iter().map(entry_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} ({})", record.snapshot.title, record.status);
    println!("  Event:   {}", record.event_id);
    println!("  Content: {}", record.content_item_id);
    println!();
    if entries.is_empty() {
        println!("No history.");
    }
    for entry in &entries {
        let when = DateTime::from_timestamp_millis(entry.created_at)
            .map_or_else(|| entry.created_at.to_string(), |t| t.to_rfc3339());
        let change = match (&entry.old_value, &entry.new_value) {
            (Some(old), Some(new)) => format!(" {old} -> {new}"),
            (None, Some(new)) => format!(" {new}"),
            _ => String::new(),
        };
        println!("  {when}  {:<16} {}{change}", entry.event_type.as_str(), entry.actor);
    }

    Ok(())
}

fn entry_json(entry: &AuditEvent) -> serde_json::Value {
    json!({
        "entity_type": entry.entity_type,
        "entity_id": entry.entity_id,
        "event_type": entry.event_type.as_str(),
        "actor": entry.actor,
        "old_value": entry.old_value,
        "new_value": entry.new_value,
        "comment": entry.comment,
        "created_at": entry.created_at,
    })
}
