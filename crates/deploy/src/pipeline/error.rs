use alloy_core::primitives::Address;

use super::step::StepViolation;
use crate::{client::RemoteCallError, ledger::LedgerError, predictor::ConfigurationError};

/// A single failed item of a batch step.
#[derive(Debug, thiserror::Error)]
#[error("item {index} (`{item}`): {source}")]
pub struct ItemFailure {
    pub index: usize,
    pub item: String,
    #[source]
    pub source: RemoteCallError,
}

/// Why a step could not complete.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("step `{step}` requires `{name}`, which is not in the ledger")]
    MissingDependency { step: String, name: String },
    #[error("wiring call {index} `{signature}` on {target} failed")]
    Wiring {
        step: String,
        index: usize,
        signature: String,
        target: Address,
        #[source]
        source: RemoteCallError,
    },
    #[error("deploying `{component}` failed")]
    RemoteCall {
        step: String,
        component: String,
        #[source]
        source: RemoteCallError,
    },
    #[error("{} of {total} items failed: {}", .failures.len(), summarize(.failures))]
    Batch {
        step: String,
        total: usize,
        failures: Vec<ItemFailure>,
    },
    #[error("ledger belongs to chain {ledger} but network targets chain {network}")]
    ChainMismatch { ledger: u64, network: u64 },
    #[error("step `{step}` is malformed")]
    InvalidStep {
        step: String,
        #[source]
        reason: StepViolation,
    },
    #[error("no step of the plan deploys `{0}`")]
    NotInPlan(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl PipelineError {
    /// Indices of the failed items when this is a batch failure.
    pub fn failed_indices(&self) -> Vec<usize> {
        match self {
            Self::Batch { failures, .. } => failures.iter().map(|failure| failure.index).collect(),
            _ => Vec::new(),
        }
    }
}

fn summarize(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("#{} {}", failure.index, failure.item))
        .collect::<Vec<_>>()
        .join(", ")
}

/// An aborted run, identifying the chain and the step that failed.
#[derive(Debug, thiserror::Error)]
#[error("chain {chain_id}: step `{step}` failed")]
pub struct RunError {
    pub chain_id: u64,
    pub step: String,
    #[source]
    pub cause: PipelineError,
}

/// Step name reported when a run is rejected before its first step.
pub const PREFLIGHT: &str = "preflight";
