//! On-disk layout for captured images.
//!
//! ```text
//! <root>/webcam_images/<session_id>/<timestamp>_<suffix>.png
//! <root>/screenshots/<session_id>/<timestamp>_<suffix>.png
//! ```
//!
//! File names start with a millisecond timestamp so a plain name sort is capture
//! order; the random suffix keeps two captures in the same millisecond apart.

use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::CaptureRole;

#[derive(Debug, Clone)]
pub struct CaptureStore {
    root: PathBuf,
}

impl CaptureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn role_dir(&self, role: CaptureRole) -> PathBuf {
        self.root.join(role.dir_name())
    }

    pub fn session_dir(&self, role: CaptureRole, session_id: &str) -> PathBuf {
        self.role_dir(role).join(session_id)
    }

    /// Like [`session_dir`](Self::session_dir), but refuses ids that would leave the
    /// role directory.
    fn checked_session_dir(&self, role: CaptureRole, session_id: &str) -> Result<PathBuf> {
        if !is_valid_session_id(session_id) {
            bail!("invalid session id {session_id:?}");
        }
        Ok(self.session_dir(role, session_id))
    }

    pub async fn create_session_dirs(&self, session_id: &str) -> Result<()> {
        for role in CaptureRole::ALL {
            let dir = self.checked_session_dir(role, session_id)?;
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create capture directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Writes one captured image and returns its path.
    pub async fn write_capture(
        &self,
        session_id: &str,
        role: CaptureRole,
        bytes: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let dir = self.checked_session_dir(role, session_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create capture directory {}", dir.display()))?;

        let path = dir.join(capture_file_name(captured_at));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write capture {}", path.display()))?;

        Ok(path)
    }

    /// Images in a session's directory for `role`, in capture order.
    ///
    /// `None` means the directory does not exist (or the id cannot name one), which
    /// callers report differently from an existing directory with no images in it.
    pub async fn list_session_images(
        &self,
        role: CaptureRole,
        session_id: &str,
    ) -> Result<Option<Vec<PathBuf>>> {
        if !is_valid_session_id(session_id) {
            return Ok(None);
        }
        let dir = self.session_dir(role, session_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", dir.display()))
            }
        };

        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !entry.file_type().await?.is_file() {
                continue;
            }
            images.push(entry.path());
        }

        images.sort();
        Ok(Some(images))
    }

    /// Session ids that have a webcam capture directory, sorted.
    pub async fn list_session_ids(&self) -> Result<Vec<String>> {
        let dir = self.role_dir(CaptureRole::Webcam);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", dir.display()))
            }
        };

        let mut ids = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }

        Ok(ids.into_iter().collect())
    }
}

/// A session id must name exactly one plain, non-hidden directory entry.
pub fn is_valid_session_id(session_id: &str) -> bool {
    if session_id.starts_with('.') || session_id.contains(|c: char| c == '/' || c == '\\') {
        return false;
    }

    let mut components = Path::new(session_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn capture_file_name(captured_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}.png",
        captured_at.format("%Y-%m-%d_%H-%M-%S-%3f"),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn file_names_sort_by_capture_time() {
        let early = Utc.with_ymd_and_hms(2024, 3, 9, 9, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();

        let early_name = capture_file_name(early);
        let late_name = capture_file_name(late);

        assert!(early_name.starts_with("2024-03-09_09-59-59-000_"));
        assert!(early_name.ends_with(".png"));
        assert!(early_name < late_name);
    }

    #[test]
    fn same_millisecond_gets_distinct_names() {
        let at = Utc::now();
        assert_ne!(capture_file_name(at), capture_file_name(at));
    }

    #[tokio::test]
    async fn writes_and_lists_in_capture_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = CaptureStore::new(dir.path());
        store.create_session_dirs("session_1").await.unwrap();

        let first = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 3).unwrap();
        let b = store
            .write_capture("session_1", CaptureRole::Webcam, b"second", second)
            .await
            .unwrap();
        let a = store
            .write_capture("session_1", CaptureRole::Webcam, b"first", first)
            .await
            .unwrap();
        store
            .write_capture("session_1", CaptureRole::Screenshot, b"shot", first)
            .await
            .unwrap();
        std::fs::write(store.session_dir(CaptureRole::Webcam, "session_1").join(".DS_Store"), b"")
            .unwrap();

        let images = store
            .list_session_images(CaptureRole::Webcam, "session_1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(images, vec![a, b]);
        assert_eq!(std::fs::read(&images[0]).unwrap(), b"first");
    }

    #[test]
    fn session_ids_must_be_one_plain_component() {
        assert!(is_valid_session_id("session_1718000000000"));
        for bad in ["", ".", "..", "../..", "a/b", "a\\b", "/etc", ".hidden"] {
            assert!(!is_valid_session_id(bad), "{bad:?} accepted");
        }
    }

    #[tokio::test]
    async fn hostile_ids_never_touch_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let store = CaptureStore::new(&root);
        std::fs::write(dir.path().join("secret.txt"), b"hunter2").unwrap();

        assert!(store.create_session_dirs("../..").await.is_err());
        assert!(store
            .write_capture("../escape", CaptureRole::Webcam, b"x", Utc::now())
            .await
            .is_err());
        assert!(store
            .list_session_images(CaptureRole::Webcam, "../..")
            .await
            .unwrap()
            .is_none());
        assert!(!dir.path().join("escape").exists());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn distinguishes_missing_from_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CaptureStore::new(dir.path());

        assert!(store
            .list_session_images(CaptureRole::Webcam, "nope")
            .await
            .unwrap()
            .is_none());
        assert!(store.list_session_ids().await.unwrap().is_empty());

        store.create_session_dirs("session_2").await.unwrap();
        store.create_session_dirs("session_1").await.unwrap();

        assert_eq!(
            store
                .list_session_images(CaptureRole::Webcam, "session_2")
                .await
                .unwrap(),
            Some(Vec::new())
        );
        assert_eq!(
            store.list_session_ids().await.unwrap(),
            vec!["session_1".to_string(), "session_2".to_string()]
        );
    }
}
