use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{error::AccessError, member::Member};

/// Signed-in administrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    /// The administrator.
    pub user: Member,
    /// Bearer token for admin endpoints.
    pub token: String,
    /// Sign-in time.
    pub signed_in_at: DateTime<Utc>,
}

impl AdminSession {
    /// Starts a session now.
    #[must_use]
    pub fn new(user: Member, token: impl Into<String>) -> Self {
        Self {
            user,
            token: token.into(),
            signed_in_at: Utc::now(),
        }
    }

    /// Whether `member_id` is the signed-in administrator.
    #[must_use]
    pub fn is_self(&self, member_id: &str) -> bool {
        self.user.id == member_id
    }
}

/// The single admin session, persisted as JSON with an explicit load/save lifecycle.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<AdminSession>>,
}

impl SessionStore {
    /// Creates a store backed by `path`. Nothing is read until [`Self::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted session, if any, and makes it current.
    pub async fn load(&self) -> Result<Option<AdminSession>, AccessError> {
        let session = match fs::read(&self.path).await {
            Ok(bytes) => Some(serde_json::from_slice::<AdminSession>(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        self.current.write().clone_from(&session);
        Ok(session)
    }

    /// Persists the current session, removing the file when signed out.
    pub async fn save(&self) -> Result<(), AccessError> {
        let snapshot = self.current();
        match snapshot {
            Some(session) => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&self.path, serde_json::to_vec_pretty(&session)?).await?;
            }
            None => match fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            },
        }
        Ok(())
    }

    /// Makes `session` current and persists it.
    pub async fn begin(&self, session: AdminSession) -> Result<(), AccessError> {
        *self.current.write() = Some(session);
        self.save().await
    }

    /// Clears the session and removes the persisted copy.
    pub async fn end(&self) -> Result<(), AccessError> {
        self.current.write().take();
        self.save().await
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current(&self) -> Option<AdminSession> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{member::NewMember, policy::Role};
    use tempfile::tempdir;

    fn admin() -> Member {
        NewMember::new("Root", Role::Admin, "4321")
            .email("root@home.test")
            .into_member("a-1")
    }

    #[tokio::test]
    async fn session_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state/session.json");
        let store = SessionStore::new(&path);
        assert!(store.load().await.unwrap().is_none());

        store.begin(AdminSession::new(admin(), "tok-1")).await.unwrap();

        let reloaded = SessionStore::new(&path);
        let session = reloaded.load().await.unwrap().unwrap();
        assert_eq!(session.token, "tok-1");
        assert!(session.is_self("a-1"));
        assert_eq!(reloaded.current().unwrap().user, admin());
    }

    #[tokio::test]
    async fn end_removes_persisted_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.begin(AdminSession::new(admin(), "tok")).await.unwrap();
        store.end().await.unwrap();
        assert!(store.current().is_none());
        assert!(!store.path().exists());
        store.end().await.unwrap();
    }
}
