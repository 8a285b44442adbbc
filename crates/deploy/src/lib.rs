//! weaver-deploy - Deployment orchestration library for the perpetual pool protocol.
//!
//! This crate deploys and wires the protocol's components on a network, recording each
//! deployed address in a per-chain ledger so that an interrupted run can be resumed.

pub mod client;
pub mod component;
mod fs;
pub mod ledger;
pub mod pipeline;
pub mod plan;
pub mod predictor;
pub mod rate;
pub mod registry;
pub mod verify;

pub use client::{
    ArtifactStore, CallRequest, ChainClient, DeployRequest, Receipt, RemoteCallError,
    RpcChainClient,
};
pub use component::Component;
pub use ledger::{
    FileLedgerStore, Ledger, LedgerDocument, LedgerError, LedgerLock, LedgerStore,
    MemoryLedgerStore, RegisteredEntity,
};
pub use pipeline::{
    PipelineError, RunError, RunReport, Step, StepReport, StepRunner,
};
pub use plan::{pool_salt_inputs, standard_plan};
pub use predictor::{ConfigurationError, SaltEncoding, predict_address};
pub use rate::{FormatError, RATE_ONE, RATE_SCALE, format_rate, parse_rate};
pub use registry::{NetworkConfig, Registry, RegistryError};
pub use verify::constructor_arguments;
