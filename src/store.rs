//! Durable state: the monitored-user registry and the per-user content
//! fingerprints used for change detection. Both live as flat JSON objects
//! (`users.json`, `previous_data.json`) that are human-editable and are
//! rewritten wholesale on mutation. All file access goes through
//! [`DataManager`]; nothing else touches these files.

use crate::error::Result;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

const USERS_FILE: &str = "users.json";
const PREVIOUS_DATA_FILE: &str = "previous_data.json";

/// One monitored calendar owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredUser {
    /// Numeric string; the `mem{id}` path segment of the public page.
    pub id: String,
    pub name: String,
}

/// Owns both state files. Load failures degrade to empty maps and write
/// failures are logged rather than propagated: losing a fingerprint only
/// means one spurious re-notification after restart.
pub struct DataManager {
    users_file: PathBuf,
    data_file: PathBuf,
    previous_hashes: HashMap<String, String>,
    // Vec keeps registry listing in insertion order
    monitored_users: Vec<MonitoredUser>,
}

impl DataManager {
    pub fn load(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let users_file = data_dir.join(USERS_FILE);
        let data_file = data_dir.join(PREVIOUS_DATA_FILE);

        let previous_hashes = load_string_map(&data_file).into_iter().collect();
        let monitored_users = load_string_map(&users_file)
            .into_iter()
            .map(|(id, name)| MonitoredUser { id, name })
            .collect();

        Ok(Self {
            users_file,
            data_file,
            previous_hashes,
            monitored_users,
        })
    }

    /// Compares `current` against the stored fingerprint for `user_id`.
    /// On any difference (including "never seen before") the stored
    /// fingerprint is replaced and true is returned. Callers rely on
    /// checked == updated, so the mutation stays fused to the query.
    pub fn has_changed(&mut self, user_id: &str, current: &str) -> bool {
        let current_hash = fingerprint(current);
        if self.previous_hashes.get(user_id) != Some(&current_hash) {
            self.previous_hashes.insert(user_id.to_string(), current_hash);
            return true;
        }
        false
    }

    pub fn add_user(&mut self, user_id: &str, name: &str) {
        if let Some(existing) = self.monitored_users.iter_mut().find(|u| u.id == user_id) {
            existing.name = name.to_string();
        } else {
            self.monitored_users.push(MonitoredUser {
                id: user_id.to_string(),
                name: name.to_string(),
            });
        }
        self.save_users();
    }

    pub fn remove_user(&mut self, user_id: &str) -> Option<String> {
        let idx = self.monitored_users.iter().position(|u| u.id == user_id)?;
        let removed = self.monitored_users.remove(idx);
        self.save_users();
        Some(removed.name)
    }

    /// Exact id match first, then first case-insensitive substring match
    /// against display names.
    pub fn find_user(&self, target: &str) -> Option<&MonitoredUser> {
        if let Some(user) = self.monitored_users.iter().find(|u| u.id == target) {
            return Some(user);
        }
        let target_lower = target.to_lowercase();
        self.monitored_users
            .iter()
            .find(|u| u.name.to_lowercase().contains(&target_lower))
    }

    /// Registry listing in insertion order.
    pub fn users(&self) -> &[MonitoredUser] {
        &self.monitored_users
    }

    pub fn user_count(&self) -> usize {
        self.monitored_users.len()
    }

    /// Persists both files; called at the end of each batch check and on
    /// shutdown.
    pub fn save_all(&self) {
        self.save_hashes();
        self.save_users();
    }

    fn save_users(&self) {
        let map: serde_json::Map<String, Value> = self
            .monitored_users
            .iter()
            .map(|u| (u.id.clone(), Value::String(u.name.clone())))
            .collect();
        save_json(&self.users_file, &Value::Object(map));
    }

    fn save_hashes(&self) {
        let map: serde_json::Map<String, Value> = self
            .previous_hashes
            .iter()
            .map(|(id, hash)| (id.clone(), Value::String(hash.clone())))
            .collect();
        save_json(&self.data_file, &Value::Object(map));
    }
}

/// Hex SHA-256 of the serialized event-list text.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn load_string_map(path: &Path) -> Vec<(String, String)> {
    if !path.exists() {
        return Vec::new();
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read state file; starting empty");
            return Vec::new();
        }
    };
    // preserve_order keeps the file's key order, which is insertion order
    match serde_json::from_str::<serde_json::Map<String, Value>>(&content) {
        Ok(map) => map
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file is corrupt; starting empty");
            Vec::new()
        }
    }
}

fn save_json(path: &Path, value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                error!(path = %path.display(), error = %e, "failed to write state file");
            } else {
                debug!(path = %path.display(), "state file written");
            }
        }
        Err(e) => error!(path = %path.display(), error = %e, "failed to serialize state"),
    }
}
