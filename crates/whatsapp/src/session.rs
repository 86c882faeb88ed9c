//! Persistence of the authenticated WhatsApp Web session blob.
//!
//! The blob is opaque: whatever the sidecar reports in its `authenticated`
//! event is written back verbatim and handed to it again on the next start.

use std::path::{Path, PathBuf};

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, info},
};

use crate::error::{Error, Result};

/// Opaque vendor session (credentials, cookies, keys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(pub serde_json::Value);

impl Session {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// File-backed store for the single global session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file is not an error.
    pub async fn load(&self) -> Result<Option<Session>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored session");
                return Ok(None);
            },
            Err(e) => return Err(Error::session(&self.path, e)),
        };
        let session: Session = serde_json::from_slice(&raw)?;
        info!(path = %self.path.display(), "loaded stored session");
        Ok(Some(session))
    }

    /// Overwrite the stored session.
    ///
    /// Writes a sibling temp file and renames it over the target so the path
    /// always holds one complete blob.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_vec(session)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::session(parent, e))?;
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| Error::session(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::session(&self.path, e))?;
        debug!(path = %self.path.display(), "saved session");
        Ok(())
    }

    /// Remove the stored session, e.g. after the vendor rejected it.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "removed stored session");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::session(&self.path, e)),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        Session::new(serde_json::json!({
            "WABrowserId": "\"abc==\"",
            "WASecretBundle": { "key": "k", "encKey": "e", "macKey": "m" },
            "WAToken1": "\"t1\"",
            "WAToken2": "\"1@t2\"",
        }))
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("wa-session.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("wa-session.json"));
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn save_overwrites_and_leaves_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("wa-session.json"));
        store.save(&sample()).await.unwrap();
        let newer = Session::new(serde_json::json!({ "WAToken1": "rotated" }));
        store.save(&newer).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(newer));
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("state/nested/session.json"));
        store.save(&sample()).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn clear_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("wa-session.json"));
        store.save(&sample()).await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.path().exists());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wa-session.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = SessionStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, Error::SerdeJson(_)));
    }
}
