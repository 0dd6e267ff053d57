use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rampart_broker::{
    MarketSnapshotProvider, PayloadExt, ProviderError, ProviderErrorKind, ProviderResult,
};
use rampart_core::MarketSnapshot;
use tracing::debug;

/// Serves market snapshots recorded as a JSON array on disk.
///
/// The file is re-read on every fetch so an external recorder can refresh it between cycles.
/// Only markets quoted in the requested currency (`BASE/QUOTE`) are returned.
#[derive(Clone, Debug)]
pub struct FileSnapshotProvider {
    name: String,
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn quoted_in(symbol: &str, quote_currency: &str) -> bool {
    symbol
        .rsplit_once('/')
        .is_some_and(|(_, quote)| quote.eq_ignore_ascii_case(quote_currency))
}

#[async_trait]
impl MarketSnapshotProvider for FileSnapshotProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, quote_currency: &str) -> ProviderResult<Vec<MarketSnapshot>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
            let kind = match err.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => ProviderErrorKind::InvalidRequest,
                _ => ProviderErrorKind::Transport,
            };
            ProviderError::from_display(format!("{}: {err}", self.path.display()), kind)
        })?;
        let snapshots = Vec::<MarketSnapshot>::from_json_bytes(&bytes)?;
        let total = snapshots.len();
        let quoted: Vec<MarketSnapshot> = snapshots
            .into_iter()
            .filter(|snapshot| quoted_in(&snapshot.symbol, quote_currency))
            .collect();
        debug!(
            provider = %self.name,
            quote = quote_currency,
            total,
            quoted = quoted.len(),
            "loaded snapshot file"
        );
        Ok(quoted)
    }
}
