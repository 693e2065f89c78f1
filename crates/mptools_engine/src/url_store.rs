use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{read_optional, AtomicFileWriter, PersistError};

pub const URL_STORE_FILENAME: &str = "class.json";

#[derive(Debug, Error)]
pub enum UrlStoreError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("malformed url store: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredUrl {
    #[serde(default)]
    url: Option<String>,
}

/// The shell's one persisted setting: the page to open on launch, kept as
/// `{"url": "..."}` in `class.json`.
#[derive(Debug, Clone)]
pub struct UrlStore {
    writer: AtomicFileWriter,
}

impl UrlStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    /// The saved URL, or `None` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<String>, UrlStoreError> {
        let Some(text) = read_optional(self.writer.dir(), URL_STORE_FILENAME)? else {
            return Ok(None);
        };
        let stored: StoredUrl = serde_json::from_str(&text)?;
        Ok(stored.url.filter(|url| !url.trim().is_empty()))
    }

    pub fn save(&self, url: &str) -> Result<(), UrlStoreError> {
        let url = url.trim();
        url::Url::parse(url).map_err(|source| UrlStoreError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let content = serde_json::to_string(&StoredUrl {
            url: Some(url.to_string()),
        })?;
        let path = self.writer.write(URL_STORE_FILENAME, &content)?;
        engine_info!("Saved start page to {:?}", path);
        Ok(())
    }
}
