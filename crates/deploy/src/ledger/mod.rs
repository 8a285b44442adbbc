//! Deployment ledger: the persisted record of what has been deployed on a chain.
//!
//! A [`Ledger`] holds one [`LedgerDocument`] in memory and rewrites it through a
//! [`LedgerStore`] on [`Ledger::persist`]. Addresses are opaque: the ledger only stores,
//! compares and hands them back.

mod store;

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use store::{FileLedgerStore, LedgerLock, LedgerStore, MemoryLedgerStore};

/// Errors raised by the ledger and its backing stores.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no deployment ledger exists for chain {chain_id}")]
    NotFound { chain_id: u64 },
    #[error("`{name}` is not recorded in the deployment ledger")]
    Absent { name: String },
    #[error("ledger {} is locked by another process", .path.display())]
    Locked { path: std::path::PathBuf },
    #[error("failed to access ledger {}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger {} is not a valid document", .path.display())]
    Json {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A sub-resource created by a component after it was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredEntity {
    /// Unique name, e.g. `Pool:ETH`.
    pub name: String,
    /// Ledger name of the component that created it.
    pub owner: String,
    /// Asset the entity belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// The persisted ledger document for one chain.
///
/// Top-level fields this crate does not know about are kept in `extra` and written back
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    #[serde(default)]
    pub deployments: BTreeMap<String, Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_bytecode_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registered_entities: Vec<RegisteredEntity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// In-memory view of a chain's ledger bound to its store.
#[derive(Debug)]
pub struct Ledger<S> {
    chain_id: u64,
    document: LedgerDocument,
    store: S,
}

impl<S: LedgerStore> Ledger<S> {
    /// Load the ledger of a chain that is expected to have one.
    pub fn load(store: S, chain_id: u64) -> Result<Self, LedgerError> {
        let document = store
            .read(chain_id)?
            .ok_or(LedgerError::NotFound { chain_id })?;

        tracing::debug!(
            chain_id,
            deployments = document.deployments.len(),
            "Deployment ledger loaded"
        );

        Ok(Self {
            chain_id,
            document,
            store,
        })
    }

    /// Load the ledger of a chain, starting from an empty document on a fresh network.
    pub fn load_or_default(store: S, chain_id: u64) -> Result<Self, LedgerError> {
        let document = match store.read(chain_id)? {
            Some(document) => document,
            None => {
                tracing::info!(chain_id, "No deployment ledger yet, starting a new one");
                LedgerDocument::default()
            }
        };

        Ok(Self {
            chain_id,
            document,
            store,
        })
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Rewrite the backing store with the current document.
    pub fn persist(&mut self) -> Result<(), LedgerError> {
        self.store.write(self.chain_id, &self.document)?;
        tracing::debug!(chain_id = self.chain_id, "Deployment ledger persisted");
        Ok(())
    }
}

impl<S> Ledger<S> {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn document(&self) -> &LedgerDocument {
        &self.document
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Address recorded under `name`.
    pub fn get(&self, name: &str) -> Result<Address, LedgerError> {
        self.find(name).ok_or_else(|| LedgerError::Absent {
            name: name.to_string(),
        })
    }

    pub fn find(&self, name: &str) -> Option<Address> {
        self.document.deployments.get(name).copied()
    }

    /// Record `address` under `name`, returning the address it replaces.
    ///
    /// Overwriting is an upgrade and is logged as such.
    pub fn set(&mut self, name: impl Into<String>, address: Address) -> Option<Address> {
        let name = name.into();
        let previous = self.document.deployments.insert(name.clone(), address);
        if let Some(previous) = previous.filter(|previous| *previous != address) {
            tracing::info!(
                component = %name,
                %previous,
                %address,
                "Ledger entry replaced"
            );
        }
        previous
    }

    pub fn deployments(&self) -> &BTreeMap<String, Address> {
        &self.document.deployments
    }

    pub fn pool_bytecode_hash(&self) -> Option<B256> {
        self.document.pool_bytecode_hash
    }

    pub fn set_pool_bytecode_hash(&mut self, hash: B256) {
        self.document.pool_bytecode_hash = Some(hash);
    }

    pub fn entity(&self, name: &str) -> Option<&RegisteredEntity> {
        self.document
            .registered_entities
            .iter()
            .find(|entity| entity.name == name)
    }

    pub fn entities(&self) -> &[RegisteredEntity] {
        &self.document.registered_entities
    }

    /// Add an entity, replacing any entity registered under the same name.
    pub fn register(&mut self, entity: RegisteredEntity) {
        let entities = &mut self.document.registered_entities;
        match entities.iter_mut().find(|known| known.name == entity.name) {
            Some(known) => *known = entity,
            None => entities.push(entity),
        }
    }
}
