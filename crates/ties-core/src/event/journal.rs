//! Append-only JSON-lines journal of relationship events.
//!
//! One event per line, UTF-8, newline-terminated. Lines are written with a
//! single `write_all` on a file opened in append mode, so concurrent writers
//! in separate processes interleave whole lines.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};

use super::RelationshipEvent;
use super::sink::{EventSink, SinkError};

/// File name of the journal inside the `.ties` directory.
pub const JOURNAL_FILE_NAME: &str = "events.jsonl";

/// Sink appending each event to a JSON-lines file.
#[derive(Debug)]
pub struct JournalSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JournalSink {
    /// Open (or create) the journal at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create journal directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open event journal {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JournalSink {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn publish(&self, event: &RelationshipEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Read every event in the journal at `path`, oldest first.
///
/// A missing journal reads as empty. Blank lines are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not a valid
/// event; the message names the offending line number.
pub fn read_journal(path: &Path) -> Result<Vec<RelationshipEvent>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("open event journal {}", path.display()));
        }
    };

    let mut events = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed event", path.display(), idx + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::model::identity::UserId;
    use chrono::Utc;

    fn event(kind: EventKind, actor: &str, target: &str) -> RelationshipEvent {
        RelationshipEvent::new(
            kind,
            UserId::parse(actor).unwrap(),
            UserId::parse(target).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn missing_journal_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let events = read_journal(&dir.path().join(JOURNAL_FILE_NAME)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn appends_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ties").join(JOURNAL_FILE_NAME);

        {
            let sink = JournalSink::open(&path).unwrap();
            sink.publish(&event(EventKind::Followed, "alice", "bob")).unwrap();
        }
        let sink = JournalSink::open(&path).unwrap();
        sink.publish(&event(EventKind::Blocked, "bob", "alice")).unwrap();

        let events = read_journal(&path).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Followed, EventKind::Blocked]);
        assert_eq!(events[1].actor.as_str(), "bob");
    }

    #[test]
    fn malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        fs::write(&path, "\n{not json}\n").unwrap();

        let err = read_journal(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":2: malformed event"), "{err:#}");
    }
}
