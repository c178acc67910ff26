//! Append-only decision history.
//!
//! One JSON object per line. Readers skip lines they cannot parse, so a torn
//! or foreign line never blocks a decision.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::core::compact::clip;
use crate::core::types::HistoryEntry;

const PROMPT_TEXT_LEN: usize = 24;
const PROMPT_REASON_LEN: usize = 60;

/// Storage seam for history, injected into the pipeline.
pub trait HistoryStore {
    /// Up to `limit` most recent entries, oldest first.
    fn read_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>>;
    fn append(&mut self, entry: &HistoryEntry) -> Result<()>;
}

/// JSONL file store shared across invocations.
#[derive(Debug, Clone)]
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonlHistory {
    fn read_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read history {}", self.path.display()));
            }
        };
        let mut entries = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %err,
                    "skip unreadable history line"
                ),
            }
        }
        Ok(tail(entries, limit))
    }

    /// A single `write_all` of one newline-terminated record in append mode.
    fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create history dir {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(entry).context("serialize history entry")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open history {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append history {}", self.path.display()))
    }
}

/// Process-local store for runs without a history file, and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    entries: Vec<HistoryEntry>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

impl HistoryStore for MemoryHistory {
    fn read_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        Ok(tail(self.entries.clone(), limit))
    }

    fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        self.entries.push(entry.clone());
        Ok(())
    }
}

fn tail(mut entries: Vec<HistoryEntry>, limit: usize) -> Vec<HistoryEntry> {
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    entries
}

/// One line per entry for the arbiter prompt, most recent last.
pub fn render_for_prompt(entries: &[HistoryEntry], limit: usize) -> String {
    let start = entries.len().saturating_sub(limit);
    let lines: Vec<String> = entries[start..]
        .iter()
        .map(|entry| {
            let action = &entry.action;
            format!(
                "- ts={} phase={} sig={} action={} tidx={} key={} text={} reason={}",
                entry.ts,
                entry.phase.as_str(),
                entry.state_sig,
                action.action.as_str(),
                action
                    .target_idx
                    .map_or_else(|| "null".to_string(), |idx| idx.to_string()),
                action
                    .keycode
                    .map_or_else(|| "null".to_string(), |code| code.to_string()),
                clip(&action.text, PROMPT_TEXT_LEN),
                clip(&action.reason, PROMPT_REASON_LEN),
            )
        })
        .collect();
    if lines.is_empty() {
        return "(none)".to_string();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Phase, ResolvedAction};
    use crate::test_support::sample_plan;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            ts: format!("2026-10-19T10:00:{n:02}Z"),
            phase: Phase::Unknown,
            state_sig: format!("{n:012}"),
            plan: sample_plan(),
            instruction: "go".to_string(),
            action: ResolvedAction::back(format!("step {n}")).summary(),
        }
    }

    #[test]
    fn missing_file_reads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JsonlHistory::new(temp.path().join("none.jsonl"));
        assert!(store.read_recent(10).expect("read").is_empty());
    }

    #[test]
    fn appends_create_directories_and_read_back_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = JsonlHistory::new(temp.path().join("a").join("b").join("history.jsonl"));
        for n in 0..5 {
            store.append(&entry(n)).expect("append");
        }
        let recent = store.read_recent(3).expect("read");
        let sigs: Vec<&str> = recent.iter().map(|e| e.state_sig.as_str()).collect();
        assert_eq!(sigs, ["000000000002", "000000000003", "000000000004"]);

        let raw = fs::read_to_string(store.path()).expect("read raw");
        assert_eq!(raw.lines().count(), 5);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.jsonl");
        let good = serde_json::to_string(&entry(1)).expect("serialize");
        fs::write(&path, format!("{good}\nnot json\n{{\"ts\":1}}\n\n{good}\n")).expect("write");
        let store = JsonlHistory::new(&path);
        assert_eq!(store.read_recent(10).expect("read").len(), 2);
    }

    #[test]
    fn memory_store_keeps_tail() {
        let mut store = MemoryHistory::new();
        for n in 0..4 {
            store.append(&entry(n)).expect("append");
        }
        let recent = store.read_recent(2).expect("read");
        assert_eq!(recent[0].state_sig, "000000000002");
        assert_eq!(recent[1].state_sig, "000000000003");
        assert_eq!(store.read_recent(0).expect("read").len(), 0);
    }

    #[test]
    fn prompt_rendering_is_bounded() {
        assert_eq!(render_for_prompt(&[], 8), "(none)");

        let mut long = entry(0);
        long.action.reason = "r".repeat(100);
        long.action.text = "t".repeat(40);
        let entries: Vec<HistoryEntry> = std::iter::once(long).chain((1..12).map(entry)).collect();

        let rendered = render_for_prompt(&entries, 8);
        assert_eq!(rendered.lines().count(), 8);
        assert!(rendered.starts_with("- ts=2026-10-19T10:00:04Z"));
        assert!(rendered.contains("action=key tidx=null key=4"));

        let first = render_for_prompt(&entries[..1], 8);
        assert!(first.contains(&format!("text={}…", "t".repeat(23))));
        assert!(first.ends_with(&format!("reason={}…", "r".repeat(59))));
    }
}
