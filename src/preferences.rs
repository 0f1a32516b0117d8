// ABOUTME: Durable per-user preference store for credentials and backend selection
// ABOUTME: Single JSON document rewritten in full on every mutation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assistant-core contributors

//! # User Preference Store
//!
//! Durable per-user mapping of provider credentials and free-form
//! preferences, persisted as one JSON document keyed by user id string with
//! nested `api_keys` and `preferences` sections. Every mutation rewrites and
//! persists the full document before returning (write-through), so a crash
//! immediately after a call never loses that call's effect.
//!
//! No cross-writer locking is provided: concurrent writes for the same user
//! interleave at field granularity, last write wins per field.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Preference keys with dedicated accessors
const PREF_PROVIDER: &str = "provider";
const PREF_MODEL: &str = "model";

/// One user's section of the document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserRecord {
    /// Provider name → credential; one credential per provider, overwritten
    /// on update
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    api_keys: BTreeMap<String, String>,
    /// Free-form preference key → value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    preferences: BTreeMap<String, Value>,
}

/// Durable preference store backed by a single JSON file
#[derive(Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    records: Arc<RwLock<BTreeMap<String, UserRecord>>>,
}

impl PreferenceStore {
    /// Open the store, loading the existing document if present
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing document cannot be read. A corrupt document is replaced with
    /// an empty one rather than failing startup.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::internal(format!(
                        "Failed to create preference directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Preference document is corrupt, starting empty: {e}");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Persist the full document; called under the write guard so mutations
    /// serialize against each other within this process
    async fn persist(&self, records: &BTreeMap<String, UserRecord>) -> AppResult<()> {
        let payload = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, payload).await.map_err(|e| {
            AppError::internal(format!(
                "Failed to write preference document {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Store a credential for one provider, overwriting any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    pub async fn set_credential(
        &self,
        user_id: i64,
        provider: &str,
        credential: impl Into<String>,
    ) -> AppResult<()> {
        let mut records = self.records.write().await;
        records
            .entry(user_id.to_string())
            .or_default()
            .api_keys
            .insert(provider.to_owned(), credential.into());
        self.persist(&records).await?;
        info!(user_id, provider, "credential stored");
        Ok(())
    }

    /// Remove a provider credential; no-op if absent
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    pub async fn remove_credential(&self, user_id: i64, provider: &str) -> AppResult<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&user_id.to_string()) {
            record.api_keys.remove(provider);
            self.persist(&records).await?;
            info!(user_id, provider, "credential removed");
        }
        Ok(())
    }

    /// All credentials for a user, provider → credential
    pub async fn get_credentials(&self, user_id: i64) -> BTreeMap<String, String> {
        self.records
            .read()
            .await
            .get(&user_id.to_string())
            .map(|record| record.api_keys.clone())
            .unwrap_or_default()
    }

    /// Credential for one provider
    pub async fn credential(&self, user_id: i64, provider: &str) -> Option<String> {
        self.records
            .read()
            .await
            .get(&user_id.to_string())
            .and_then(|record| record.api_keys.get(provider).cloned())
    }

    /// Whether a non-empty credential is stored for the provider
    pub async fn has_credential(&self, user_id: i64, provider: &str) -> bool {
        self.credential(user_id, provider)
            .await
            .is_some_and(|credential| !credential.is_empty())
    }

    /// Set a free-form preference value
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    pub async fn set_preference(
        &self,
        user_id: i64,
        key: &str,
        value: impl Into<Value>,
    ) -> AppResult<()> {
        let mut records = self.records.write().await;
        records
            .entry(user_id.to_string())
            .or_default()
            .preferences
            .insert(key.to_owned(), value.into());
        self.persist(&records).await?;
        Ok(())
    }

    /// All preferences for a user, key → value
    pub async fn get_preferences(&self, user_id: i64) -> BTreeMap<String, Value> {
        self.records
            .read()
            .await
            .get(&user_id.to_string())
            .map(|record| record.preferences.clone())
            .unwrap_or_default()
    }

    /// The user's selected backend, if any
    pub async fn selected_provider(&self, user_id: i64) -> Option<String> {
        self.preference_string(user_id, PREF_PROVIDER).await
    }

    /// The user's selected model, if any
    pub async fn selected_model(&self, user_id: i64) -> Option<String> {
        self.preference_string(user_id, PREF_MODEL).await
    }

    /// Select a backend for the user
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    pub async fn set_selected_provider(&self, user_id: i64, provider: &str) -> AppResult<()> {
        self.set_preference(user_id, PREF_PROVIDER, provider).await
    }

    /// Select a model for the user
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    pub async fn set_selected_model(&self, user_id: i64, model: &str) -> AppResult<()> {
        self.set_preference(user_id, PREF_MODEL, model).await
    }

    async fn preference_string(&self, user_id: i64, key: &str) -> Option<String> {
        self.records
            .read()
            .await
            .get(&user_id.to_string())
            .and_then(|record| record.preferences.get(key))
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    }

    /// Delete everything stored for the user (account-deletion request)
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    pub async fn delete_user(&self, user_id: i64) -> AppResult<()> {
        let mut records = self.records.write().await;
        if records.remove(&user_id.to_string()).is_some() {
            self.persist(&records).await?;
            info!(user_id, "all preference data deleted");
        }
        Ok(())
    }

    /// Ids of every user with stored data
    pub async fn user_ids(&self) -> Vec<i64> {
        self.records
            .read()
            .await
            .keys()
            .filter_map(|key| key.parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_credential_round_trip() {
        let dir = tempdir().unwrap();
        let store = PreferenceStore::open(dir.path().join("settings.json"))
            .await
            .unwrap();

        store.set_credential(7, "openai", "sk-abc").await.unwrap();
        assert_eq!(
            store.get_credentials(7).await.get("openai").map(String::as_str),
            Some("sk-abc")
        );

        store.remove_credential(7, "openai").await.unwrap();
        assert!(!store.get_credentials(7).await.contains_key("openai"));
    }

    #[tokio::test]
    async fn test_selected_provider_helpers() {
        let dir = tempdir().unwrap();
        let store = PreferenceStore::open(dir.path().join("settings.json"))
            .await
            .unwrap();

        assert!(store.selected_provider(7).await.is_none());
        store.set_selected_provider(7, "claude").await.unwrap();
        assert_eq!(store.selected_provider(7).await.as_deref(), Some("claude"));
    }
}
