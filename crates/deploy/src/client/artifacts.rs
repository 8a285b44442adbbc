//! Compiled contract artifacts.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{B256, Bytes, keccak256};
use serde::Deserialize;

use super::RemoteCallError;

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    bytecode: Bytecode,
}

/// Hardhat stores the creation code as a string, Foundry nests it under `object`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Bytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

/// Directory of `<Contract>.json` build artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creation bytecode of `contract`.
    pub fn bytecode(&self, contract: &str) -> Result<Bytes, RemoteCallError> {
        let fail = |reason: String| RemoteCallError::Artifact {
            contract: contract.to_string(),
            reason,
        };

        let path = self.dir.join(format!("{contract}.json"));
        let content = std::fs::read_to_string(&path)
            .map_err(|err| fail(format!("cannot read {}: {err}", path.display())))?;
        let artifact: ArtifactFile = serde_json::from_str(&content)
            .map_err(|err| fail(format!("cannot parse {}: {err}", path.display())))?;

        let bytecode = match artifact.bytecode {
            Bytecode::Hex(bytes) | Bytecode::Object { object: bytes } => bytes,
        };
        if bytecode.is_empty() {
            return Err(fail("artifact has no creation bytecode".to_string()));
        }
        Ok(bytecode)
    }

    /// Keccak hash of the creation bytecode, the fingerprint deterministic deployment
    /// addresses are derived from.
    pub fn code_fingerprint(&self, contract: &str) -> Result<B256, RemoteCallError> {
        Ok(keccak256(self.bytecode(contract)?))
    }
}
