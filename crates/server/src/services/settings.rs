//! Runtime-editable item rules.
//!
//! The admin panel edits [`ItemRules`] while the server runs. The current
//! rules live behind a `RwLock`; when a settings path is configured every
//! accepted update is written to a temporary file next to it and renamed
//! into place.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use stockbot_core::ItemRules;
use stockbot_core::rules::RulesError;

/// Errors loading or saving item rules.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings: {0}")]
    Invalid(#[from] RulesError),

    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Holds the live item rules.
#[derive(Debug)]
pub struct SettingsStore {
    rules: RwLock<ItemRules>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Store without persistence.
    #[must_use]
    pub fn in_memory(rules: ItemRules) -> Self {
        Self {
            rules: RwLock::new(rules),
            path: None,
        }
    }

    /// Load rules from `path` if the file exists, otherwise start from `defaults`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the file exists but cannot be read, parsed,
    /// or holds incoherent rules.
    pub async fn load(path: PathBuf, defaults: ItemRules) -> Result<Self, SettingsError> {
        let rules = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let rules = serde_json::from_slice::<ItemRules>(&bytes)?.normalized();
                rules.validate()?;
                info!(path = %path.display(), "Loaded item rules");
                rules
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => defaults,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            rules: RwLock::new(rules),
            path: Some(path),
        })
    }

    /// Snapshot of the current rules.
    pub async fn current(&self) -> ItemRules {
        self.rules.read().await.clone()
    }

    /// Validate, persist, then swap in new rules.
    ///
    /// The in-memory rules are left untouched if validation or the write fails.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` for incoherent rules, or an I/O error
    /// if persisting fails.
    #[instrument(skip(self, rules))]
    pub async fn update(&self, rules: ItemRules) -> Result<ItemRules, SettingsError> {
        let rules = rules.normalized();
        rules.validate()?;

        let mut guard = self.rules.write().await;
        if let Some(path) = &self.path {
            write_atomically(path, &rules).await?;
        }
        guard.clone_from(&rules);
        drop(guard);

        info!("Item rules updated");
        Ok(rules)
    }
}

async fn write_atomically(path: &Path, rules: &ItemRules) -> Result<(), SettingsError> {
    let json = serde_json::to_vec_pretty(rules)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn custom_rules() -> ItemRules {
        ItemRules {
            allowed_types: vec![" tool ".to_owned(), "part".to_owned()],
            max_item_amount: 10,
            ..ItemRules::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("rules.json"), ItemRules::default())
            .await
            .unwrap();
        assert_eq!(store.current().await, ItemRules::default());
    }

    #[tokio::test]
    async fn test_update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");

        let store = SettingsStore::load(path.clone(), ItemRules::default())
            .await
            .unwrap();
        let saved = store.update(custom_rules()).await.unwrap();
        assert_eq!(saved.allowed_types, vec!["tool", "part"]);
        assert!(!dir.path().join("rules.json.tmp").exists());

        let reloaded = SettingsStore::load(path, ItemRules::default())
            .await
            .unwrap();
        assert_eq!(reloaded.current().await, saved);
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_previous_rules() {
        let store = SettingsStore::in_memory(ItemRules::default());
        let bad = ItemRules {
            allowed_types: vec![],
            ..ItemRules::default()
        };
        assert!(matches!(
            store.update(bad).await,
            Err(SettingsError::Invalid(RulesError::NoAllowedTypes))
        ));
        assert_eq!(store.current().await, ItemRules::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            SettingsStore::load(path, ItemRules::default()).await,
            Err(SettingsError::Json(_))
        ));
    }
}
