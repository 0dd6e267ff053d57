//! Atomic persistence of the last good trading-pair list.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rampart_core::{StrategyMode, Symbol, TradingPairList};
use tempfile::NamedTempFile;

use crate::{PersistenceError, PersistenceResult};

/// File-backed store holding the pair list as a JSON array of symbols.
#[derive(Clone, Debug)]
pub struct PairListStore {
    path: PathBuf,
}

impl PairListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self::new(dir.as_ref().join(file_name))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Replace the stored list. The previous file stays intact until the new one is complete.
    pub fn save(&self, list: &TradingPairList) -> PersistenceResult<()> {
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|err| PersistenceError::io(dir, err))?;
        let mut temp = NamedTempFile::new_in(dir).map_err(|err| PersistenceError::io(dir, err))?;
        serde_json::to_writer_pretty(temp.as_file_mut(), &list.symbols).map_err(|source| {
            PersistenceError::Serialization {
                path: self.path.clone(),
                source,
            }
        })?;
        temp.write_all(b"\n")
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|err| PersistenceError::io(temp.path(), err))?;
        temp.persist(&self.path)
            .map_err(|err| PersistenceError::io(&self.path, err.error))?;
        Ok(())
    }

    /// Load the stored list, tagging it with `mode` and the file's modification time.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    pub fn load(&self, mode: StrategyMode) -> PersistenceResult<Option<TradingPairList>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PersistenceError::io(&self.path, err)),
        };
        let symbols: Vec<Symbol> =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Serialization {
                path: self.path.clone(),
                source,
            })?;
        let generated_at = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(TradingPairList {
            symbols,
            strategy_mode: mode,
            generated_at,
        }))
    }

    /// [`Self::save`] on the blocking pool, keeping file I/O and fsync off the async workers.
    pub async fn save_async(&self, list: &TradingPairList) -> PersistenceResult<()> {
        let store = self.clone();
        let list = list.clone();
        tokio::task::spawn_blocking(move || store.save(&list)).await?
    }

    /// [`Self::load`] on the blocking pool.
    pub async fn load_async(&self, mode: StrategyMode) -> PersistenceResult<Option<TradingPairList>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load(mode)).await?
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn round_trips_symbols_as_plain_array() {
        let dir = tempdir().unwrap();
        let store = PairListStore::in_dir(dir.path(), "trading_pairs.json");
        let list = TradingPairList::new(
            vec!["BTC/EUR".to_string(), "ETH/EUR".to_string()],
            StrategyMode::Swing,
        );
        store.save(&list).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!(["BTC/EUR", "ETH/EUR"]));

        let loaded = store.load(StrategyMode::Scalping).unwrap().unwrap();
        assert_eq!(loaded.symbols, list.symbols);
        assert_eq!(loaded.strategy_mode, StrategyMode::Scalping);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let store = PairListStore::in_dir(dir.path(), "absent.json");
        assert!(store.load(StrategyMode::Swing).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = PairListStore::in_dir(dir.path(), "pairs.json");
        fs::write(store.path(), b"[\"BTC").unwrap();
        assert!(matches!(
            store.load(StrategyMode::Swing),
            Err(PersistenceError::Serialization { .. })
        ));
    }

    #[test]
    fn overwrite_leaves_no_temporary_files() {
        let dir = tempdir().unwrap();
        let store = PairListStore::in_dir(dir.path().join("nested"), "pairs.json");
        for symbols in [vec!["A/EUR"], vec!["B/EUR", "C/EUR"]] {
            let list = TradingPairList::new(
                symbols.into_iter().map(String::from).collect(),
                StrategyMode::Intraday,
            );
            store.save(&list).unwrap();
        }
        let entries: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("pairs.json")]);
        let loaded = store.load(StrategyMode::Intraday).unwrap().unwrap();
        assert_eq!(loaded.symbols, vec!["B/EUR", "C/EUR"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn async_access_runs_on_a_single_threaded_runtime() {
        let dir = tempdir().unwrap();
        let store = PairListStore::in_dir(dir.path(), "pairs.json");
        assert!(store.load_async(StrategyMode::Swing).await.unwrap().is_none());

        let list = TradingPairList::new(vec!["SOL/EUR".to_string()], StrategyMode::Scalping);
        store.save_async(&list).await.unwrap();
        let loaded = store.load_async(StrategyMode::Scalping).await.unwrap().unwrap();
        assert_eq!(loaded.symbols, list.symbols);
        assert_eq!(store.load(StrategyMode::Scalping).unwrap().unwrap().symbols, list.symbols);
    }
}
