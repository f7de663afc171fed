//! Printing change records

use chrono::Local;
use dirwatch_core::{ChangeRecord, ChangeType};
use owo_colors::OwoColorize;

/// Line body for a record, e.g. `NewFile >> /srv/inbox/a.xml >>> a.xml`
fn line(kind: &str, record: &ChangeRecord) -> String {
    format!("{} >> {}", kind, detail(record))
}

/// `old >>> new` for renames, `path >>> name` otherwise
fn detail(record: &ChangeRecord) -> String {
    match record.old_path() {
        Some(old_path) => format!("{} >>> {}", old_path.display(), record.path().display()),
        None => format!("{} >>> {}", record.path().display(), record.name()),
    }
}

/// Print a record with a local timestamp
pub fn print_record(record: &ChangeRecord) {
    let time = Local::now().format("%H:%M:%S%.3f").to_string();
    let kind = record.change_type().to_string();

    let kind = match record.change_type() {
        ChangeType::NewFile | ChangeType::NewFolder => kind.green().to_string(),
        ChangeType::Modified => kind.yellow().to_string(),
        ChangeType::Deleted => kind.red().to_string(),
        ChangeType::Renamed => kind.cyan().to_string(),
        ChangeType::None => kind.dimmed().to_string(),
    };

    println!("{} : {}", time.dimmed(), line(&kind, record));
}

/// Print a record as one JSON line
pub fn print_json(record: &ChangeRecord) {
    match serde_json::to_string(record) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!("Failed to serialize record: {}", e),
    }
}
