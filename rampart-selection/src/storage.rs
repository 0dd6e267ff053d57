use std::fs;
use std::path::PathBuf;

use rampart_config::PersistenceConfig;
use tracing::{debug, info};

use crate::{PairListStore, PersistenceError, PersistenceResult};

/// Resolves where the pair list lives: the first existing mount path, else a local directory.
#[derive(Clone, Debug)]
pub struct StorageLocator {
    mount_paths: Vec<PathBuf>,
    fallback_dir: PathBuf,
}

impl StorageLocator {
    pub fn new(mount_paths: Vec<PathBuf>, fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            mount_paths,
            fallback_dir: fallback_dir.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(config.mount_paths.clone(), config.fallback_dir.clone())
    }

    pub fn resolve(&self) -> PersistenceResult<PathBuf> {
        if let Some(mount) = self.mount_paths.iter().find(|path| path.is_dir()) {
            debug!(path = %mount.display(), "using mounted storage");
            return Ok(mount.clone());
        }
        fs::create_dir_all(&self.fallback_dir)
            .map_err(|err| PersistenceError::io(&self.fallback_dir, err))?;
        info!(
            path = %self.fallback_dir.display(),
            "no mounted storage found; using local directory"
        );
        Ok(self.fallback_dir.clone())
    }

    pub fn pair_list_store(&self, file_name: &str) -> PersistenceResult<PairListStore> {
        Ok(PairListStore::in_dir(self.resolve()?, file_name))
    }
}
