use iat_core::{PersistenceError, SessionId, SessionPersistence, SessionRecord};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One pretty-printed JSON file per session, named `<session_id>.json`.
///
/// Files are written to a temporary sibling first and moved into place
/// without clobbering, so a second save under the same id fails with
/// [`PersistenceError::Duplicate`] and never overwrites.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.json"))
    }
}

impl SessionPersistence for JsonDirStore {
    fn save(&mut self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let id = checked_id(record.session_id.as_str())?;
        let path = self.path_for(&record.session_id);
        if path.exists() {
            return Err(PersistenceError::Duplicate(id.to_string()));
        }

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, record)
            .map_err(|e| PersistenceError::Encoding(e.to_string()))?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                tracing::debug!(path = %path.display(), "session written");
                Ok(())
            }
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                Err(PersistenceError::Duplicate(id.to_string()))
            }
            Err(err) => Err(PersistenceError::Io(err.error)),
        }
    }

    fn list(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path)?;
            match serde_json::from_slice::<SessionRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable session file");
                }
            }
        }
        records.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(records)
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, PersistenceError> {
        let path = self.path_for(&SessionId::from(checked_id(session_id)?.to_string()));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PersistenceError::Encoding(e.to_string()))
    }
}

/// Session ids become file names directly under the store root.
fn checked_id(id: &str) -> Result<&str, PersistenceError> {
    if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
        return Err(PersistenceError::Encoding(format!(
            "session id {id:?} is not usable as a file name"
        )));
    }
    Ok(id)
}
