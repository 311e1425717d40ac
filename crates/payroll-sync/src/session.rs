//! Session-scoped key/value storage that bridges the two halves of an interactive run.

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// String keys to string values, scoped to one user.
pub trait SessionStore {
    fn get(&self, key: &str) -> crate::Result<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> crate::Result<()>;
    fn delete(&mut self, key: &str) -> crate::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: BTreeMap<String, String>,
}

impl MemorySessionStore {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> crate::Result<()> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> crate::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, one file per user. The file is removed once the last key is.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSessionStore { path: path.into() }
    }

    /// `<dir>/session-<user>.json`, with the user taken from `$USER` / `$USERNAME`.
    pub fn for_current_user(dir: impl AsRef<Path>) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "default".to_string());
        Self::new(dir.as_ref().join(format!("session-{user}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> crate::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))
    }

    fn store(&self, values: &BTreeMap<String, String>) -> crate::Result<()> {
        if values.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).with_context(|| {
                    format!("Failed to remove session file: {}", self.path.display())
                })?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: String) -> crate::Result<()> {
        let mut values = self.load()?;
        values.insert(key.to_owned(), value);
        self.store(&values)
    }

    fn delete(&mut self, key: &str) -> crate::Result<()> {
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.store(&values)?;
        }
        Ok(())
    }
}

/// Typed, namespaced access to an injected [`SessionStore`].
pub struct Session<'s> {
    store: &'s mut dyn SessionStore,
    namespace: String,
}

impl<'s> Session<'s> {
    pub fn new(store: &'s mut dyn SessionStore, namespace: impl Into<String>) -> Self {
        Session {
            store,
            namespace: namespace.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}/{key}", self.namespace)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> crate::Result<Option<T>> {
        let Some(value) = self.store.get(&self.key(key))? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&value)
            .with_context(|| format!("Session value '{}' is corrupt", self.key(key)))?;
        Ok(Some(value))
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> crate::Result<()> {
        let value = serde_json::to_string(value)?;
        let key = self.key(key);
        self.store.set(&key, value)
    }

    pub fn delete(&mut self, key: &str) -> crate::Result<()> {
        let key = self.key(key);
        self.store.delete(&key)
    }

    /// Delete `keys` when the returned guard is dropped, whatever happens in between.
    pub fn scoped<'g>(&'g mut self, keys: &'static [&'static str]) -> SessionGuard<'g, 's> {
        SessionGuard {
            session: self,
            keys,
        }
    }
}

pub struct SessionGuard<'g, 's> {
    session: &'g mut Session<'s>,
    keys: &'static [&'static str],
}

impl<'s> Deref for SessionGuard<'_, 's> {
    type Target = Session<'s>;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl Drop for SessionGuard<'_, '_> {
    fn drop(&mut self) {
        for key in self.keys {
            if let Err(e) = self.session.delete(key) {
                tracing::error!("Failed to clear session key {key}: {e:#}");
            }
        }
        tracing::debug!("Cleared session '{}'", self.session.namespace);
    }
}
