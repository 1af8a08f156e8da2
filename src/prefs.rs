//! Durable key→value preference cache.
//!
//! Remembers small bits of operator state between runs, chiefly the
//! last-used source configuration so `drydock next` can offer it as the
//! default. Values are arbitrary JSON; writers only touch the keys they
//! own, so unrelated keys survive.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::EngineError;
use crate::task::Policy;

pub const LAST_POLICY_KEY: &str = "lastPolicy";

pub struct PreferenceCache {
    path: PathBuf,
}

impl PreferenceCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, EngineError> {
        Ok(self.read_map()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), EngineError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    /// The policy used by the previous run, if any and still parseable.
    /// A stale entry written by an older version is ignored, not an error.
    pub fn last_policy(&self) -> Result<Option<Policy>, EngineError> {
        Ok(self
            .get(LAST_POLICY_KEY)?
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    pub fn remember_policy(&self, policy: &Policy) -> Result<(), EngineError> {
        let value = serde_json::to_value(policy)
            .map_err(|e| anyhow::anyhow!("failed to serialize policy: {e}"))?;
        self.set(LAST_POLICY_KEY, value)
    }

    fn read_map(&self) -> Result<serde_json::Map<String, Value>, EngineError> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| EngineError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| EngineError::CorruptState {
            path: self.path.clone(),
            reason: format!("invalid preference JSON: {e}"),
        })
    }

    fn write_map(&self, map: &serde_json::Map<String, Value>) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| anyhow::anyhow!("failed to serialize preferences: {e}"))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|source| EngineError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| EngineError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
