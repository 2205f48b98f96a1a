use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PersistError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        PersistError::Io { path: path.to_path_buf(), source }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        PersistError::Json { path: path.to_path_buf(), source }
    }

    pub fn csv(path: &Path, source: csv::Error) -> Self {
        PersistError::Csv { path: path.to_path_buf(), source }
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Publication mode: `latest` only refreshes `data/latest/`, `daily` also archives and
/// appends history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PublishMode {
    Latest,
    #[default]
    Daily,
}

impl std::fmt::Display for PublishMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishMode::Latest => write!(f, "latest"),
            PublishMode::Daily => write!(f, "daily"),
        }
    }
}

/// Outcome of one history append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendSummary {
    pub appended: usize,
    pub skipped: usize,
}
