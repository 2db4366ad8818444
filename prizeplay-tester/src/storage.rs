//! File-backed adapters for the engine's storage and promotions traits.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use prizeplay_game::{LedgerStorage, Promotion, PromotionSource};
use thiserror::Error;

/// One JSON file per ledger key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the record for `key`.
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are percent-encoded, so distinct keys
    /// never share a file.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

impl LedgerStorage for FileStorage {
    type Error = io::Error;

    fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn store(&self, key: &str, payload: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload)?;
        fs::rename(staging, path)
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum PromotionFileError {
    #[error("failed to read promotions from {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid promotions JSON in {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Promotions read from a JSON array of `{id, title, description, image_url?}`.
#[derive(Debug, Clone)]
pub struct PromotionsFile {
    path: PathBuf,
}

impl PromotionsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PromotionSource for PromotionsFile {
    type Error = PromotionFileError;

    fn load_promotions(&self) -> Result<Vec<Promotion>, Self::Error> {
        let path = self.path.display().to_string();
        let raw = fs::read_to_string(&self.path).map_err(|source| PromotionFileError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| PromotionFileError::Parse { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::unique_temp_path;
    use prizeplay_game::ProgressLedger;

    #[test]
    fn ledger_round_trips_through_files() {
        let storage = FileStorage::new(unique_temp_path("ledger")).unwrap();
        {
            let mut ledger = ProgressLedger::open(storage.clone(), "prizeplay:wheel").unwrap();
            ledger.add("coins", 30).unwrap();
        }
        assert!(storage.path_for("prizeplay:wheel").ends_with("prizeplay%3Awheel.json"));
        let ledger = ProgressLedger::open(storage.clone(), "prizeplay:wheel").unwrap();
        assert_eq!(ledger.get("coins"), 30);

        storage.remove("prizeplay:wheel").unwrap();
        storage.remove("prizeplay:wheel").unwrap();
        assert!(storage.load("prizeplay:wheel").unwrap().is_none());
    }

    #[test]
    fn similar_keys_keep_separate_files() {
        let storage = FileStorage::new(unique_temp_path("keys")).unwrap();
        assert_ne!(
            storage.path_for("prizeplay:wheel"),
            storage.path_for("prizeplay_wheel")
        );
        assert!(storage.path_for("50%/café").ends_with("50%25%2Fcaf%C3%A9.json"));

        storage.store("prizeplay:wheel", "colon").unwrap();
        storage.store("prizeplay_wheel", "underscore").unwrap();
        storage.store("prizeplay%3Awheel", "escaped").unwrap();
        assert_eq!(storage.load("prizeplay:wheel").unwrap().as_deref(), Some("colon"));
        assert_eq!(storage.load("prizeplay_wheel").unwrap().as_deref(), Some("underscore"));
        assert_eq!(storage.load("prizeplay%3Awheel").unwrap().as_deref(), Some("escaped"));
    }

    #[test]
    fn promotions_file_reports_missing_and_bad_json() {
        let missing = PromotionsFile::new(unique_temp_path("missing.json"));
        assert!(matches!(
            missing.load_promotions(),
            Err(PromotionFileError::Io { .. })
        ));

        let path = unique_temp_path("bad.json");
        fs::write(&path, "{\"id\": 1}").unwrap();
        assert!(matches!(
            PromotionsFile::new(&path).load_promotions(),
            Err(PromotionFileError::Parse { .. })
        ));

        fs::write(&path, r#"[{"id": 7, "title": "Free drink", "description": "Any size"}]"#)
            .unwrap();
        let list = PromotionsFile::new(&path).load_promotions().unwrap();
        assert_eq!(list[0].id, 7);
    }
}
