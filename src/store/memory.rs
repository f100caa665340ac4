//! In-memory storage with an optional JSON snapshot.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::Store;
use crate::{ReadkeyError, Result};

/// A stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
enum Value {
    Str(String),
    List(Vec<String>),
    Set(BTreeSet<String>),
}

fn wrong_type(key: &str, expected: &str) -> ReadkeyError {
    ReadkeyError::Storage(format!("key {key} does not hold a {expected}"))
}

/// Thread-safe in-memory [`Store`].
///
/// Every operation takes the single lock, so compound operations such as
/// [`Store::push_capped`] are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store that is never written to disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot.
    ///
    /// A missing snapshot file starts an empty store; the file is created on
    /// the first [`flush`](Self::flush).
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<HashMap<String, Value>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), keys = data.len(), "Opened store snapshot");
        Ok(Self {
            data: RwLock::new(data),
            snapshot: Some(path),
        })
    }

    /// Write the snapshot, if this store has one.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let bytes = {
            let data = self.data.read().await;
            serde_json::to_vec(&*data)?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Flushed store snapshot");
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.data.read().await.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key, "value")),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().await;
        if matches!(data.get(key), Some(Value::List(_) | Value::Set(_))) {
            return Err(wrong_type(key, "value"));
        }
        data.insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    async fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.data.read().await.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.clone()),
            Some(_) => Err(wrong_type(key, "list")),
        }
    }

    async fn append_to_list(&self, key: &str, item: &str) -> Result<()> {
        let mut data = self.data.write().await;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()))
        {
            Value::List(list) => {
                list.push(item.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key, "list")),
        }
    }

    async fn remove_from_list(&self, key: &str, item: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        match data.get_mut(key) {
            None => Ok(false),
            Some(Value::List(list)) => match list.iter().position(|v| v == item) {
                Some(pos) => {
                    list.remove(pos);
                    Ok(true)
                }
                None => Ok(false),
            },
            Some(_) => Err(wrong_type(key, "list")),
        }
    }

    async fn push_capped(&self, key: &str, item: &str, capacity: usize) -> Result<()> {
        let mut data = self.data.write().await;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()))
        {
            Value::List(list) => {
                list.insert(0, item.to_string());
                list.truncate(capacity);
                Ok(())
            }
            _ => Err(wrong_type(key, "list")),
        }
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()))
        {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key, "set")),
        }
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        match data.get_mut(key) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.remove(member)),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        match self.data.read().await.get(key) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        match self.data.read().await.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }
}
