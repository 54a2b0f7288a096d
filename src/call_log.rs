//! @ai:module:intent Append-only audit log of model calls and batch transfers
//! @ai:module:layer infrastructure
//! @ai:module:public_api CallLog, CallLogEntry, FileCallLog, MemoryCallLog
//! @ai:module:stateless false

use crate::batch::types::Turn;
use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SEPARATOR: &str = "*******************************************";

/// @ai:intent One record of the audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallLogEntry {
    /// Interactive call: free-form context plus the full transcript
    Transcript { context: String, turns: Vec<Turn> },
    /// Arbitrary text, e.g. an uploaded or downloaded batch file
    Note(String),
}

impl CallLogEntry {
    /// @ai:intent Render the entry body the way it appears in calls.LOG
    /// @ai:effects pure
    pub fn render(&self, timestamp: &str) -> String {
        let mut out = format!("{}\n{}\n", SEPARATOR, timestamp);

        match self {
            CallLogEntry::Transcript { context, turns } => {
                if !context.trim().is_empty() {
                    out.push_str(context);
                    out.push('\n');
                }
                for turn in turns {
                    out.push_str("****** ");
                    out.push_str(turn.role.as_str());
                    out.push('\n');
                    out.push_str(&turn.text);
                    out.push('\n');
                }
            }
            CallLogEntry::Note(text) => {
                out.push_str(text);
                out.push('\n');
            }
        }

        out
    }
}

/// @ai:intent Injected logging collaborator
pub trait CallLog: Send + Sync {
    /// @ai:intent Append an entry
    /// @ai:post returns the non-empty timestamp written with the entry
    fn record(&self, entry: &CallLogEntry) -> Result<String>;
}

fn now_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

/// @ai:intent Log appended to a text file (calls.LOG)
pub struct FileCallLog {
    path: PathBuf,
}

impl FileCallLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CallLog for FileCallLog {
    fn record(&self, entry: &CallLogEntry) -> Result<String> {
        let timestamp = now_timestamp();

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.render(&timestamp).as_bytes())?;

        Ok(timestamp)
    }
}

/// @ai:intent In-memory log for tests and dry runs
#[derive(Default)]
pub struct MemoryCallLog {
    entries: Mutex<Vec<(String, CallLogEntry)>>,
}

impl MemoryCallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// @ai:intent Snapshot of the recorded entries with their timestamps
    pub fn entries(&self) -> Vec<(String, CallLogEntry)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl CallLog for MemoryCallLog {
    fn record(&self, entry: &CallLogEntry) -> Result<String> {
        let timestamp = now_timestamp();

        if let Ok(mut entries) = self.entries.lock() {
            entries.push((timestamp.clone(), entry.clone()));
        }

        Ok(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_render_transcript() {
        let entry = CallLogEntry::Transcript {
            context: "Strategy_1_Goal_1".to_string(),
            turns: vec![Turn::user("Is it viable?"), Turn::assistant("Yes.")],
        };

        assert_eq!(
            entry.render("2025-06-01 14:03:09.000001"),
            "*******************************************\n\
             2025-06-01 14:03:09.000001\n\
             Strategy_1_Goal_1\n\
             ****** user\n\
             Is it viable?\n\
             ****** assistant\n\
             Yes.\n"
        );
    }

    #[test]
    fn test_render_skips_blank_context() {
        let entry = CallLogEntry::Transcript {
            context: "  ".to_string(),
            turns: vec![Turn::user("q")],
        };
        assert_eq!(entry.render("t"), format!("{}\nt\n****** user\nq\n", SEPARATOR));
    }

    #[test]
    fn test_file_log_appends() {
        let temp = TempDir::new().unwrap();
        let log = FileCallLog::new(temp.path().join("calls.LOG"));

        let first = log.record(&CallLogEntry::Note("uploaded".to_string())).unwrap();
        log.record(&CallLogEntry::Note("downloaded".to_string())).unwrap();

        assert!(!first.is_empty());
        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.matches(SEPARATOR).count(), 2);
        assert!(content.find("uploaded").unwrap() < content.find("downloaded").unwrap());
    }

    #[test]
    fn test_memory_log_records() {
        let log = MemoryCallLog::new();
        let ts = log.record(&CallLogEntry::Note("x".to_string())).unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, ts);
    }
}
