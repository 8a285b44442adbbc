//! Deterministic address prediction for components created through a factory.
//!
//! `address = keccak256(0xff ++ factory ++ salt ++ code_fingerprint)[12..]`, with the salt
//! itself the keccak hash of the encoded salt inputs.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, keccak256},
};

use crate::client::encode_arguments;

/// The predictor was asked for an address it cannot derive correctly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no code fingerprint recorded; set poolBytecodeHash before predicting addresses")]
    MissingFingerprint,
}

/// How salt inputs are serialized before hashing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaltEncoding {
    /// `abi.encode(inputs...)`
    #[default]
    Standard,
    /// `abi.encodePacked(inputs...)`
    Packed,
}

/// Hash salt inputs into a 32-byte salt.
pub fn salt(inputs: &[DynSolValue], encoding: SaltEncoding) -> B256 {
    match encoding {
        SaltEncoding::Standard => keccak256(encode_arguments(inputs)),
        SaltEncoding::Packed => keccak256(DynSolValue::Tuple(inputs.to_vec()).abi_encode_packed()),
    }
}

/// `CREATE2` address of code with hash `code_hash` deployed by `factory` with `salt`.
pub fn create2_address(factory: Address, salt: B256, code_hash: B256) -> Address {
    factory.create2(salt, code_hash)
}

/// Predict the address of a component the factory will create for `salt_inputs`.
///
/// Fails when no fingerprint has been recorded, rather than guessing.
pub fn predict_address(
    factory: Address,
    salt_inputs: &[DynSolValue],
    fingerprint: Option<B256>,
) -> Result<Address, ConfigurationError> {
    predict_address_with(factory, salt_inputs, SaltEncoding::Standard, fingerprint)
}

/// [`predict_address`] with an explicit salt encoding.
pub fn predict_address_with(
    factory: Address,
    salt_inputs: &[DynSolValue],
    encoding: SaltEncoding,
    fingerprint: Option<B256>,
) -> Result<Address, ConfigurationError> {
    let fingerprint = fingerprint.ok_or(ConfigurationError::MissingFingerprint)?;
    Ok(create2_address(factory, salt(salt_inputs, encoding), fingerprint))
}
