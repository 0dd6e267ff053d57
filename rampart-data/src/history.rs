//! Close-price history datasets.
//!
//! CSV files hold one observation per row with a `symbol` and a `close` column; an optional
//! `timestamp` column orders rows within a symbol, otherwise file order is kept. JSON files hold
//! a serialized [`PriceHistory`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rampart_core::{Price, PriceHistory, Symbol};

/// Encodings accepted by [`read_price_history`] and [`write_price_history`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatasetFormat {
    Csv,
    Json,
}

impl DatasetFormat {
    /// Infer the format from the file extension, defaulting to CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

pub fn read_price_history(path: &Path) -> Result<PriceHistory> {
    match DatasetFormat::from_path(path) {
        DatasetFormat::Csv => read_csv(path)
            .with_context(|| format!("failed to load CSV history {}", path.display())),
        DatasetFormat::Json => {
            let raw = fs::read(path).with_context(|| format!("failed to open {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse JSON history {}", path.display()))
        }
    }
}

pub fn write_price_history(path: &Path, history: &PriceHistory) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    match DatasetFormat::from_path(path) {
        DatasetFormat::Csv => write_csv(path, history),
        DatasetFormat::Json => {
            let raw = serde_json::to_vec_pretty(history)?;
            fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
        }
    }
}

struct Columns {
    symbol: usize,
    close: usize,
    timestamp: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        Ok(Self {
            symbol: find("symbol").ok_or_else(|| anyhow!("missing 'symbol' column"))?,
            close: find("close").ok_or_else(|| anyhow!("missing 'close' column"))?,
            timestamp: find("timestamp"),
        })
    }
}

fn read_csv(path: &Path) -> Result<PriceHistory> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut rows: BTreeMap<Symbol, Vec<(i64, usize, Price)>> = BTreeMap::new();
    for (line, row) in reader.records().enumerate() {
        let record = row.with_context(|| format!("invalid row {} in {}", line + 2, path.display()))?;
        let symbol = match record.get(columns.symbol) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => bail!("row {} has no symbol", line + 2),
        };
        let close: Price = record
            .get(columns.close)
            .ok_or_else(|| anyhow!("row {} has no close", line + 2))?
            .parse()
            .with_context(|| format!("row {} has an invalid close", line + 2))?;
        let timestamp = match columns.timestamp.and_then(|index| record.get(index)) {
            Some(value) if !value.is_empty() => value
                .parse::<i64>()
                .with_context(|| format!("row {} has an invalid timestamp", line + 2))?,
            _ => 0,
        };
        rows.entry(symbol).or_default().push((timestamp, line, close));
    }

    let mut history = PriceHistory::new();
    for (symbol, mut observations) in rows {
        observations.sort_by_key(|(timestamp, line, _)| (*timestamp, *line));
        history.insert(
            symbol,
            observations.into_iter().map(|(_, _, close)| close).collect(),
        );
    }
    Ok(history)
}

fn write_csv(path: &Path, history: &PriceHistory) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(["symbol", "timestamp", "close"])?;
    for symbol in history.symbols() {
        for (index, close) in history.series(symbol).unwrap_or_default().iter().enumerate() {
            writer.write_record([symbol.clone(), index.to_string(), close.to_string()])?;
        }
    }
    writer.flush()?;
    Ok(())
}
