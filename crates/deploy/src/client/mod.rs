//! Boundary to the remote execution environment.
//!
//! The orchestrator issues exactly two kinds of requests: deploy a component, and invoke
//! a method on a deployed component. Both are slow, may fail, and are never retried
//! here since neither is safe to repeat blindly.

mod artifacts;
mod rpc;

use std::future::Future;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, U256, keccak256},
};

pub use artifacts::ArtifactStore;
pub use rpc::{RpcChainClient, json_rpc_call};

/// Errors surfaced by the remote execution environment.
#[derive(Debug, thiserror::Error)]
pub enum RemoteCallError {
    #[error("invalid RPC url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{method} failed: {message}")]
    Rpc { method: String, message: String },
    #[error("malformed {method} response")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("transaction {0} reverted")]
    Reverted(B256),
    #[error("deployment transaction {0} reported no contract address")]
    MissingContractAddress(B256),
    #[error("timed out waiting for transaction {0} to be mined")]
    Timeout(B256),
    #[error("artifact `{contract}`: {reason}")]
    Artifact { contract: String, reason: String },
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Deploy `contract` with the given constructor arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub contract: String,
    pub args: Vec<DynSolValue>,
}

/// Invoke `signature` (e.g. `grantRole(bytes32,address)`) on `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub target: Address,
    pub signature: String,
    pub args: Vec<DynSolValue>,
}

impl CallRequest {
    /// Full calldata: selector followed by the encoded arguments.
    pub fn calldata(&self) -> Bytes {
        let mut data = selector(&self.signature).to_vec();
        data.extend(encode_arguments(&self.args));
        data.into()
    }
}

/// Proof that a call was mined successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
}

/// The remote execution environment.
pub trait ChainClient {
    /// Deploy a component and return its address.
    fn deploy(
        &mut self,
        request: &DeployRequest,
    ) -> impl Future<Output = Result<Address, RemoteCallError>> + Send;

    /// Invoke a method on a deployed component.
    fn call(
        &mut self,
        request: &CallRequest,
    ) -> impl Future<Output = Result<Receipt, RemoteCallError>> + Send;
}

/// First four bytes of the keccak hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// ABI-encode a list of arguments as a parameter list.
pub fn encode_arguments(args: &[DynSolValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.to_vec()).abi_encode_params()
}

/// A `uint256` value.
pub fn uint(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;

    #[test]
    fn test_selector() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("grantRole(bytes32,address)"), [0x2f, 0x2f, 0xf1, 0x5d]);
    }

    #[test]
    fn test_calldata_layout() {
        let request = CallRequest {
            target: Address::ZERO,
            signature: "transfer(address,uint256)".to_string(),
            args: vec![
                DynSolValue::Address(address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")),
                uint(U256::from(1u64)),
            ],
        };

        let data = request.calldata();
        assert_eq!(data.len(), 4 + 2 * 32);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(
            hex::encode(&data[4..36]),
            "00000000000000000000000070997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
        assert_eq!(data[67], 1);
    }

    #[test]
    fn test_encode_no_arguments() {
        assert!(encode_arguments(&[]).is_empty());
    }
}
