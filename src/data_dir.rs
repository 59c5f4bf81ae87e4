use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::error::{Error, Result};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "FAQDEX_DATA_DIR";

const STORE_FILE: &str = "faq.redb";
const INDEX_DIR: &str = "tantivy";

/// Where the data directory location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Flag,
    Env,
    Xdg,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Flag => "--data-dir",
            Source::Env => DATA_DIR_ENV,
            Source::Xdg => "XDG data home",
        })
    }
}

/// Pick the data directory: `--data-dir`, then a non-empty
/// `FAQDEX_DATA_DIR`, then `$XDG_DATA_HOME/faqdex`.
pub fn locate(
    explicit: Option<&Path>,
    env: Option<&str>,
) -> Result<(PathBuf, Source)> {
    if let Some(path) = explicit {
        return Ok((path.to_path_buf(), Source::Flag));
    }
    if let Some(val) = env.filter(|v| !v.trim().is_empty()) {
        return Ok((PathBuf::from(val), Source::Env));
    }
    xdg::BaseDirectories::with_prefix("faqdex")
        .get_data_home()
        .map(|path| (path, Source::Xdg))
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}

/// On-disk home of the content store and the full-text index.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    source: Source,
}

impl DataDir {
    /// Locate the data directory from the flag and the process environment,
    /// creating it if needed.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let env = std::env::var(DATA_DIR_ENV).ok();
        let (root, source) = locate(explicit, env.as_deref())?;
        Self::create(root, source)
    }

    fn create(root: PathBuf, source: Source) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;
        Ok(Self { root, source })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// The redb file holding entries and settings.
    pub fn store_db(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    /// The full-text index directory, created if missing. It can always be
    /// regenerated from the store.
    pub fn index_dir(&self) -> Result<PathBuf> {
        let path = self.root.join(INDEX_DIR);
        std::fs::create_dir_all(&path)
            .map_err(|_| Error::DataDir(path.clone()))?;
        Ok(path)
    }
}

impl fmt::Display for DataDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.root.display(), self.source)
    }
}
