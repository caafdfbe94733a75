//! `compile_commands.json` generation.
//!
//! Emits the clang JSON compilation database consumed by language servers
//! and static analyzers. Entries accumulate behind a mutex while compile
//! workers run; the database is written once at the end of the run.
//!
//! With `builder.combineCmds` set, entries for sources that were *not*
//! compiled this run are preserved by merging the existing file, so a
//! partial rebuild does not shrink the database.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs::{read_to_string, write_atomic};
use crate::util::process::ProcessBuilder;

pub const DB_FILENAME: &str = "compile_commands.json";

/// One compilation database entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileCommand {
    /// Working directory the command runs in.
    pub directory: PathBuf,
    /// The source file, as passed to the compiler.
    pub file: PathBuf,
    /// Full command line, shell-quoted into one string.
    pub command: String,
    /// The same command line as an argv list, compiler first. Databases
    /// written by other tools may carry only `command`.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// The object file produced.
    pub output: PathBuf,
}

/// Thread-safe accumulator for one build run.
#[derive(Debug, Default)]
pub struct CompileCommandsDb {
    entries: Mutex<Vec<CompileCommand>>,
}

impl CompileCommandsDb {
    pub fn new() -> Self {
        CompileCommandsDb::default()
    }

    /// Record one compiler invocation. Called from compile workers.
    pub fn record(&self, directory: &Path, source: &Path, object: &Path, cmd: &ProcessBuilder) {
        let mut arguments = vec![cmd.get_program().display().to_string()];
        arguments.extend(cmd.get_args().iter().cloned());

        let entry = CompileCommand {
            directory: directory.to_path_buf(),
            file: source.to_path_buf(),
            command: cmd.display_command(),
            arguments,
            output: object.to_path_buf(),
        };
        // Lock poisoning means a worker panicked; the run is aborting anyway.
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Move all recorded entries out, leaving the accumulator empty. Used
    /// when per-project entries roll up into a combined workspace database.
    pub fn drain(&self) -> Vec<CompileCommand> {
        self.entries
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    /// Append entries produced elsewhere.
    pub fn extend(&self, entries: Vec<CompileCommand>) {
        if let Ok(mut e) = self.entries.lock() {
            e.extend(entries);
        }
    }

    /// Number of entries recorded so far.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the database under `dir`. With `merge` set, entries from an
    /// existing database are kept unless this run recorded a newer entry
    /// for the same source file.
    pub fn write(&self, dir: &Path, merge: bool) -> Result<PathBuf> {
        let path = dir.join(DB_FILENAME);
        let fresh = self
            .entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default();

        let mut combined = fresh.clone();
        if merge {
            for old in load(&path).unwrap_or_default() {
                if !fresh.iter().any(|e| e.file == old.file) {
                    combined.push(old);
                }
            }
        }
        combined.sort_by(|a, b| a.file.cmp(&b.file));

        let json = serde_json::to_string_pretty(&combined)
            .context("failed to serialize compilation database")?;
        write_atomic(&path, &json)?;

        tracing::debug!(
            "wrote {} with {} entries",
            path.display(),
            combined.len()
        );
        Ok(path)
    }
}

/// Load an existing database. A missing or malformed file yields `None`;
/// the caller starts fresh.
pub fn load(path: &Path) -> Option<Vec<CompileCommand>> {
    let contents = read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(entries) => Some(entries),
        Err(e) => {
            tracing::warn!("ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}
