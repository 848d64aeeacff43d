//! Single-document persistence for the active-position map.
//!
//! The document is an object keyed `"{user_id}_{symbol}"` so an operator
//! can read and hand-edit it. It is rewritten whole on every mutation;
//! the map is small (one entry per user per open symbol).

use crate::error::PersistenceResult;
use snipe_core::{OpenPosition, PositionKey};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load/save access to the positions document.
#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the document, returning an empty map when the file does not
    /// exist or cannot be parsed.
    pub fn load(&self) -> HashMap<PositionKey, OpenPosition> {
        if !self.path.exists() {
            return HashMap::new();
        }

        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                warn!(?e, path = %self.path.display(), "Could not read positions file");
                return HashMap::new();
            }
        };

        let raw: HashMap<String, OpenPosition> = match serde_json::from_str(&data) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(?e, path = %self.path.display(), "Unparsable positions file");
                return HashMap::new();
            }
        };

        let mut positions = HashMap::with_capacity(raw.len());
        for (key, position) in raw {
            match PositionKey::parse(&key) {
                Some(parsed) => {
                    positions.insert(parsed, position);
                }
                None => warn!(key = %key, "Skipping position with malformed key"),
            }
        }

        info!(positions = positions.len(), path = %self.path.display(), "Loaded active positions");
        positions
    }

    /// Persist the whole map as one pretty-printed document.
    pub fn save(&self, positions: &HashMap<PositionKey, OpenPosition>) -> PersistenceResult<()> {
        let raw: HashMap<String, &OpenPosition> = positions
            .iter()
            .map(|(key, position)| (key.document_key(), position))
            .collect();

        let data = serde_json::to_string_pretty(&raw)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}
