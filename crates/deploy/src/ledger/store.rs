//! Backing stores for ledger documents.

use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
};

use fs2::FileExt;

use super::{LedgerDocument, LedgerError};
use crate::fs::FsHandler;

/// Storage for ledger documents, keyed by chain id.
pub trait LedgerStore {
    /// Read the document of a chain, `None` if the chain has never been deployed to.
    fn read(&self, chain_id: u64) -> Result<Option<LedgerDocument>, LedgerError>;

    /// Replace the document of a chain. Must be all-or-nothing.
    fn write(&mut self, chain_id: u64, document: &LedgerDocument) -> Result<(), LedgerError>;
}

/// One pretty-printed `<chain_id>.json` file per chain inside a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLedgerStore {
    dir: PathBuf,
}

impl FileLedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn document_path(&self, chain_id: u64) -> PathBuf {
        self.dir.join(format!("{chain_id}.json"))
    }

    fn lock_path(&self, chain_id: u64) -> PathBuf {
        self.dir.join(format!("{chain_id}.lock"))
    }

    /// Take the per-chain orchestration lock.
    ///
    /// Only one process may orchestrate a chain at a time; a second caller gets
    /// [`LedgerError::Locked`] instead of waiting.
    pub fn lock(&self, chain_id: u64) -> Result<LedgerLock, LedgerError> {
        let path = self.lock_path(chain_id);
        let file = FsHandler::try_lock_exclusive(&path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;

        match file {
            Some(file) => {
                tracing::debug!(path = %path.display(), "Ledger lock acquired");
                Ok(LedgerLock { file, path })
            }
            None => Err(LedgerError::Locked { path }),
        }
    }
}

impl LedgerStore for FileLedgerStore {
    fn read(&self, chain_id: u64) -> Result<Option<LedgerDocument>, LedgerError> {
        let path = self.document_path(chain_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| LedgerError::Json { path, source })
    }

    fn write(&mut self, chain_id: u64, document: &LedgerDocument) -> Result<(), LedgerError> {
        let path = self.document_path(chain_id);
        let mut content = serde_json::to_string_pretty(document).map_err(|source| {
            LedgerError::Json {
                path: path.clone(),
                source,
            }
        })?;
        content.push('\n');

        FsHandler::write_atomic(&path, content.as_bytes())
            .map_err(|source| LedgerError::Io { path, source })
    }
}

/// Held orchestration lock; released on drop.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %err, "Failed to release ledger lock");
        }
    }
}

/// In-memory store, counting how many times documents were written.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    documents: HashMap<u64, LedgerDocument>,
    writes: usize,
}

impl MemoryLedgerStore {
    /// A store already holding a document for `chain_id`.
    pub fn with_document(chain_id: u64, document: LedgerDocument) -> Self {
        Self {
            documents: HashMap::from([(chain_id, document)]),
            writes: 0,
        }
    }

    pub fn document(&self, chain_id: u64) -> Option<&LedgerDocument> {
        self.documents.get(&chain_id)
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn read(&self, chain_id: u64) -> Result<Option<LedgerDocument>, LedgerError> {
        Ok(self.documents.get(&chain_id).cloned())
    }

    fn write(&mut self, chain_id: u64, document: &LedgerDocument) -> Result<(), LedgerError> {
        self.documents.insert(chain_id, document.clone());
        self.writes += 1;
        Ok(())
    }
}
