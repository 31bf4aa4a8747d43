//! Operator adapter registry with an explicit initialize / reload / shutdown lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use ferry_core::{OperatorAdapter, OperatorConfig};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::adapters::{build_adapter, TransportSettings};

struct RegistryEntry {
    /// `None` for adapters registered directly rather than built from config.
    config: Option<OperatorConfig>,
    adapter: Arc<dyn OperatorAdapter>,
}

/// What a hot reload changed.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

pub struct AdapterRegistry {
    settings: TransportSettings,
    entries: RwLock<BTreeMap<String, RegistryEntry>>,
}

impl AdapterRegistry {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build one adapter per active config. A misconfigured operator is logged
    /// and left out; it never fails the registry as a whole.
    pub fn initialize(configs: &[OperatorConfig], settings: TransportSettings) -> Self {
        let mut entries = BTreeMap::new();

        for config in configs {
            if !config.is_dispatchable() {
                info!(operator = %config.code, "Skipping inactive operator");
                continue;
            }
            if entries.contains_key(&config.code) {
                warn!(operator = %config.code, "Duplicate operator config ignored");
                continue;
            }

            match build_adapter(config, &settings) {
                Ok(adapter) => {
                    entries.insert(
                        config.code.clone(),
                        RegistryEntry {
                            config: Some(config.clone()),
                            adapter,
                        },
                    );
                }
                Err(e) => error!(operator = %config.code, error = %e, "Failed to initialize operator adapter"),
            }
        }

        info!(operators = entries.len(), "Adapter registry initialized");

        Self {
            settings,
            entries: RwLock::new(entries),
        }
    }

    /// Register a prebuilt adapter, replacing any adapter with the same code.
    pub async fn register(&self, adapter: Arc<dyn OperatorAdapter>) {
        let code = adapter.operator_code().to_string();
        let previous = self
            .entries
            .write()
            .await
            .insert(code, RegistryEntry { config: None, adapter });

        if let Some(previous) = previous {
            previous.adapter.shutdown().await;
        }
    }

    pub async fn get(&self, operator_code: &str) -> Option<Arc<dyn OperatorAdapter>> {
        self.entries
            .read()
            .await
            .get(operator_code)
            .map(|entry| Arc::clone(&entry.adapter))
    }

    /// Snapshot of every registered adapter, ordered by operator code.
    pub async fn all(&self) -> Vec<Arc<dyn OperatorAdapter>> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| Arc::clone(&entry.adapter))
            .collect()
    }

    pub async fn operator_codes(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove an operator and release its connection pool.
    pub async fn remove(&self, operator_code: &str) -> bool {
        let removed = self.entries.write().await.remove(operator_code);
        match removed {
            Some(entry) => {
                entry.adapter.shutdown().await;
                info!(operator = %operator_code, "Operator removed from registry");
                true
            }
            None => false,
        }
    }

    /// Reconcile the registry with a fresh config list. Unchanged operators keep
    /// their adapter; changed ones are rebuilt; anything no longer active is
    /// removed. Replaced adapters are shut down once the swap is visible.
    pub async fn apply(&self, configs: &[OperatorConfig]) -> ReloadSummary {
        let mut summary = ReloadSummary::default();
        let mut retired: Vec<Arc<dyn OperatorAdapter>> = Vec::new();

        let mut desired: BTreeMap<&str, &OperatorConfig> = BTreeMap::new();
        for config in configs.iter().filter(|c| c.is_dispatchable()) {
            desired.entry(config.code.as_str()).or_insert(config);
        }

        {
            let mut entries = self.entries.write().await;

            let stale: Vec<String> = entries
                .keys()
                .filter(|code| !desired.contains_key(code.as_str()))
                .cloned()
                .collect();
            for code in stale {
                if let Some(entry) = entries.remove(&code) {
                    retired.push(entry.adapter);
                    summary.removed.push(code);
                }
            }

            for (code, config) in desired {
                let existing = entries.get(code);
                if existing.and_then(|e| e.config.as_ref()) == Some(config) {
                    continue;
                }
                let is_update = existing.is_some();

                match build_adapter(config, &self.settings) {
                    Ok(adapter) => {
                        let previous = entries.insert(
                            code.to_string(),
                            RegistryEntry {
                                config: Some(config.clone()),
                                adapter,
                            },
                        );
                        if let Some(previous) = previous {
                            retired.push(previous.adapter);
                        }
                        if is_update {
                            summary.updated.push(code.to_string());
                        } else {
                            summary.added.push(code.to_string());
                        }
                    }
                    Err(e) => {
                        error!(operator = %code, error = %e, "Failed to rebuild operator adapter");
                        if let Some(previous) = entries.remove(code) {
                            retired.push(previous.adapter);
                        }
                        summary.failed.push(code.to_string());
                    }
                }
            }
        }

        join_all(retired.iter().map(|adapter| adapter.shutdown())).await;

        info!(
            added = summary.added.len(),
            updated = summary.updated.len(),
            removed = summary.removed.len(),
            failed = summary.failed.len(),
            "Operator configuration applied"
        );
        summary
    }

    /// Release every adapter's network resources and empty the registry.
    pub async fn shutdown(&self) {
        let drained: Vec<RegistryEntry> = {
            let mut entries = self.entries.write().await;
            std::mem::take(&mut *entries).into_values().collect()
        };

        join_all(drained.iter().map(|entry| entry.adapter.shutdown())).await;
        info!(operators = drained.len(), "Adapter registry shut down");
    }
}
