//! A [`UserStore`] persisted as a single JSON document.
//!
//! The file looks like:
//!
//! ```text
//! {"users":[{"username":"alice","password_hash":"$argon2id$...",
//!            "display_name":"Alice","roles":["user"]}]}
//! ```
//!
//! It is read once on open and rewritten wholesale after every successful
//! mutation: first to a sibling temp file, then renamed over the original,
//! so a crash mid-write never leaves a truncated document behind.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{AuthError, User, UserStore};

#[derive(Debug, Default, Deserialize)]
struct UserFile {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Serialize)]
struct UserFileRef<'a> {
    users: Vec<&'a User>,
}

/// A [`UserStore`] backed by a JSON file.
///
/// The write lock is held across the file write, so concurrent mutations
/// are applied and persisted one at a time, in order.
#[derive(Debug)]
pub struct JsonFileUserStore {
    path: PathBuf,
    users: RwLock<HashMap<String, User>>,
}

impl JsonFileUserStore {
    /// Opens the store at `path`. A missing file is an empty store; the
    /// file is created on the first mutation.
    ///
    /// # Errors
    /// [`AuthError::Storage`] if the file can't be read,
    /// [`AuthError::Corrupt`] if it isn't a user document.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref().to_path_buf();

        let file = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<UserFile>(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "user file not found, starting empty");
                UserFile::default()
            }
            Err(e) => return Err(AuthError::Storage(e)),
        };

        let users: HashMap<_, _> = file
            .users
            .into_iter()
            .map(|user| (user.username.clone(), user))
            .collect();
        tracing::info!(path = %path.display(), count = users.len(), "loaded users");

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    /// The file this store writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, users: &HashMap<String, User>) -> Result<(), AuthError> {
        let mut sorted: Vec<&User> = users.values().collect();
        sorted.sort_by(|a, b| a.username.cmp(&b.username));
        let bytes = serde_json::to_vec_pretty(&UserFileRef { users: sorted })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(AuthError::Storage)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(AuthError::Storage)
    }

    /// Persists `users`; on failure restores `previous` for `username`.
    async fn commit(
        &self,
        users: &mut HashMap<String, User>,
        username: &str,
        previous: Option<User>,
    ) -> Result<(), AuthError> {
        if let Err(e) = self.persist(users).await {
            tracing::warn!(path = %self.path.display(), error = %e, "user file write failed, rolling back");
            match previous {
                Some(user) => {
                    users.insert(username.to_string(), user);
                }
                None => {
                    users.remove(username);
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

impl UserStore for JsonFileUserStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create_user(&self, user: User) -> Result<bool, AuthError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Ok(false);
        }
        let username = user.username.clone();
        users.insert(username.clone(), user);
        self.commit(&mut users, &username, None).await?;
        Ok(true)
    }

    async fn update_user(&self, user: User) -> Result<bool, AuthError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.username) {
            return Ok(false);
        }
        let username = user.username.clone();
        let previous = users.insert(username.clone(), user);
        self.commit(&mut users, &username, previous).await?;
        Ok(true)
    }

    async fn delete_user(&self, username: &str) -> Result<bool, AuthError> {
        let mut users = self.users.write().await;
        let Some(previous) = users.remove(username) else {
            return Ok(false);
        };
        self.commit(&mut users, username, Some(previous)).await?;
        Ok(true)
    }

    async fn get_all_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.users.read().await.contains_key(username))
    }

    async fn get_user_count(&self) -> Result<usize, AuthError> {
        Ok(self.users.read().await.len())
    }
}
