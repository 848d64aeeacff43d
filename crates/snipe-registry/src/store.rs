//! The user store and the seams the trading core consumes.
//!
//! `UserDirectory` and `DeliverySink` are the whole surface the core sees
//! of the chat front-end: active-user snapshots in, notifications out.
//! `UserStore` is the JSON-document store backing the directory, with
//! credentials encrypted before they touch disk.

use crate::crypto::CredentialCipher;
use crate::error::RegistryResult;
use crate::user::UserRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Read-only view of subscribed users.
pub trait UserDirectory: Send + Sync {
    /// Snapshot of every user passing the dispatch gate.
    fn active_users(&self) -> Vec<UserRecord>;

    /// Snapshot of a single user, decrypted.
    fn user(&self, user_id: i64) -> Option<UserRecord>;
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    /// Symbol offered for one-click close, when the front-end supports it.
    pub close_symbol: Option<String>,
}

impl Notice {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            close_symbol: None,
        }
    }

    pub fn with_close(text: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            close_symbol: Some(symbol.into()),
        }
    }
}

/// Outbound delivery to the chat front-end.
///
/// Delivery is best-effort: implementations log failures instead of
/// propagating them into the trading path.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, user_id: i64, notice: Notice);
}

/// Sink that writes notices to the log. Used when no chat transport is
/// wired in, and as the default in tests.
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    async fn deliver(&self, user_id: i64, notice: Notice) {
        info!(user = user_id, close = ?notice.close_symbol, "{}", notice.text);
    }
}

/// On-disk document; the credential fields of every row hold sealed blobs.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    users: HashMap<i64, UserRecord>,
}

/// Encrypted JSON-document user store.
pub struct UserStore {
    path: PathBuf,
    cipher: CredentialCipher,
    db: RwLock<Database>,
}

impl UserStore {
    /// Open the store, loading any existing database file.
    pub fn open(path: impl AsRef<Path>, cipher: CredentialCipher) -> RegistryResult<Self> {
        let path = path.as_ref().to_path_buf();

        let db = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Database>(&data) {
                Ok(db) => {
                    info!(users = db.users.len(), path = %path.display(), "Loaded user database");
                    db
                }
                Err(e) => {
                    warn!(?e, path = %path.display(), "Unreadable user database, starting empty");
                    Database::default()
                }
            }
        } else {
            Database::default()
        };

        Ok(Self {
            path,
            cipher,
            db: RwLock::new(db),
        })
    }

    /// Insert or replace a user, sealing credentials before persisting.
    pub fn save_user(&self, user: &UserRecord) -> RegistryResult<()> {
        let mut sealed = user.clone();
        sealed.api_key = self.cipher.seal(&user.api_key)?;
        sealed.api_secret = self.cipher.seal(&user.api_secret)?;
        sealed.api_passphrase = self.cipher.seal(&user.api_passphrase)?;

        let mut db = self.db.write();
        db.users.insert(user.user_id, sealed);
        self.persist(&db)
    }

    /// Number of stored users (active or not).
    pub fn len(&self) -> usize {
        self.db.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, db: &Database) -> RegistryResult<()> {
        let data = serde_json::to_string_pretty(db)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    fn unseal(&self, stored: &UserRecord) -> UserRecord {
        let mut record = stored.clone();
        // A credential that fails to decrypt is dropped to empty, which
        // fails the dispatch gate instead of producing garbage signatures.
        for (label, field) in [
            ("api_key", &mut record.api_key),
            ("api_secret", &mut record.api_secret),
            ("api_passphrase", &mut record.api_passphrase),
        ] {
            match self.cipher.open(field) {
                Ok(plain) => *field = plain,
                Err(e) => {
                    warn!(user = record.user_id, field = label, ?e, "Credential decrypt failed");
                    field.clear();
                }
            }
        }
        record
    }
}

impl UserDirectory for UserStore {
    fn active_users(&self) -> Vec<UserRecord> {
        let db = self.db.read();
        db.users
            .values()
            .filter(|stored| stored.active)
            .map(|stored| self.unseal(stored))
            .collect()
    }

    fn user(&self, user_id: i64) -> Option<UserRecord> {
        let db = self.db.read();
        db.users.get(&user_id).map(|stored| self.unseal(stored))
    }
}
