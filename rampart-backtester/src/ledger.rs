//! Append-only record of every account's outcome at every step.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use rampart_core::{AccountId, Action, Price, Quantity};
use rampart_risk::DrawdownTransition;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{SessionError, SessionResult};

/// Outcome of one account at one step.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub step: usize,
    pub account_id: AccountId,
    /// What the policy asked for.
    pub requested: Action,
    /// What was actually applied after risk controls.
    pub executed: Action,
    pub price: Price,
    pub balance: Price,
    pub shares_held: Quantity,
    pub net_worth: Price,
    /// Change in net worth since the previous step.
    pub reward: f64,
    pub drawdown: f64,
    pub halted: bool,
    pub transition: DrawdownTransition,
    #[serde(default)]
    pub stop_triggered: bool,
}

impl LedgerEntry {
    /// True when a BUY or SELL actually changed the position.
    #[must_use]
    pub fn is_trade(&self) -> bool {
        self.executed != Action::Hold
    }

    /// True when risk controls replaced the requested action.
    #[must_use]
    pub fn was_overridden(&self) -> bool {
        self.requested != self.executed
    }
}

/// Entries can be appended and read, never edited or removed.
#[derive(Clone, Debug, Default)]
pub struct PerformanceLedger {
    entries: Vec<LedgerEntry>,
}

impl PerformanceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_account<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a LedgerEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.account_id == account_id)
    }

    /// Write every entry as one JSON object per line. The target is replaced atomically.
    pub fn export_jsonl(&self, path: &Path) -> SessionResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|err| SessionError::io(dir, err))?;
        let temp = NamedTempFile::new_in(dir).map_err(|err| SessionError::io(dir, err))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            for entry in &self.entries {
                serde_json::to_writer(&mut writer, entry)?;
                writer
                    .write_all(b"\n")
                    .map_err(|err| SessionError::io(path, err))?;
            }
            writer.flush().map_err(|err| SessionError::io(path, err))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|err| SessionError::io(temp.path(), err))?;
        temp.persist(path)
            .map_err(|err| SessionError::io(path, err.error))?;
        Ok(())
    }

    /// Read entries previously written by [`Self::export_jsonl`].
    pub fn import_jsonl(path: &Path) -> SessionResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| SessionError::io(path, err))?;
        let entries = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<LedgerEntry>, _>>()?;
        Ok(Self { entries })
    }
}
