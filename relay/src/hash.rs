//! Hashing primitives shared with the remote verifier.
//!
//! Every preimage layout in this module is part of the cross-ledger wire
//! format and must stay bit-exact with the counterpart gateway: the remote
//! side recomputes leaf hashes, message hashes, and the batch digest from
//! the same bytes and must reach identical values.
//!
//! ## Preimage Layouts
//!
//! ```text
//! leaf_hash    = keccak256( nonce (8, BE) | sender (32) | payload (N) )
//! message_hash = keccak256( nonce (8, BE) | sender (32) | kind (1) | payload (N) )
//! batch_digest = keccak256( message_hash_0 (32) | message_hash_1 (32) | ... )
//! node merge   = keccak256( left (32) | right (32) )        // position-ordered
//! ```
//!
//! The gas limit of an inbound message is deliberately excluded from
//! `message_hash` so a failed message can be retried with a larger limit
//! without changing its identity.

use cosmwasm_std::{Addr, Api, Binary, StdError, StdResult};
use tiny_keccak::{Hasher, Keccak};

use crate::error::ContractError;

/// Compute keccak256 hash of input data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Merge two accumulator nodes into their parent.
///
/// Position-ordered: `left` is the earlier node, never value-sorted; the
/// remote verifier applies the same rule.
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 64];
    data[0..32].copy_from_slice(left);
    data[32..64].copy_from_slice(right);
    keccak256(&data)
}

/// Compute the leaf hash of an outbound message.
///
/// Layout: `nonce (8 bytes, big-endian) | sender (32 bytes) | payload`
pub fn leaf_hash(nonce: u64, sender: &[u8; 32], payload: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(8 + 32 + payload.len());
    data.extend_from_slice(&nonce.to_be_bytes());
    data.extend_from_slice(sender);
    data.extend_from_slice(payload);
    keccak256(&data)
}

/// Compute the canonical hash of an inbound message.
///
/// Layout: `nonce (8 bytes, big-endian) | sender (32 bytes) | kind (1 byte) | payload`
///
/// The gas limit is excluded: retrying with a larger limit keeps the same
/// message identity.
pub fn message_hash(nonce: u64, sender: &[u8; 32], kind: u8, payload: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(8 + 32 + 1 + payload.len());
    data.extend_from_slice(&nonce.to_be_bytes());
    data.extend_from_slice(sender);
    data.push(kind);
    data.extend_from_slice(payload);
    keccak256(&data)
}

/// Compute the digest a signature batch authorizes: the keccak256 of all
/// message hashes concatenated in batch order. One digest covers the whole
/// relay call, so one signature set admits the entire batch.
pub fn batch_digest(hashes: &[[u8; 32]]) -> [u8; 32] {
    let mut data = Vec::with_capacity(hashes.len() * 32);
    for h in hashes {
        data.extend_from_slice(h);
    }
    keccak256(&data)
}

/// Widen a local account address to the universal 32-byte form used in
/// leaf preimages: the canonical address bytes, left-padded with zeros.
pub fn encode_account(api: &dyn Api, addr: &Addr) -> StdResult<[u8; 32]> {
    let canonical = api.addr_canonicalize(addr.as_str())?;
    if canonical.len() > 32 {
        return Err(StdError::generic_err(format!(
            "canonical address too long: {} bytes",
            canonical.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - canonical.len()..].copy_from_slice(canonical.as_slice());
    Ok(out)
}

/// Derive the 32-byte universal token id of a local token (native denom or
/// CW20 contract address). Token identifiers are variable-width strings, so
/// the universal form is their keccak256; the receiving side resolves it
/// through its token-pair registry.
pub fn encode_token(token: &str) -> [u8; 32] {
    keccak256(token.as_bytes())
}

/// Convert a 32-byte value to a 0x-prefixed hex string
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Convert a 20-byte signer address to a 0x-prefixed hex string
pub fn bytes20_to_hex(bytes: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a 0x-prefixed (or bare) hex string into 32 bytes
pub fn hex_to_bytes32(s: &str) -> Result<[u8; 32], ContractError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|_| ContractError::InvalidHashLength {
        got: stripped.len() / 2,
    })?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ContractError::InvalidHashLength { got: bytes.len() })
}

/// Parse a 0x-prefixed (or bare) hex string into a 20-byte signer address
pub fn hex_to_bytes20(s: &str) -> Result<[u8; 20], ContractError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|_| ContractError::InvalidValidatorAddress {
        address: s.to_string(),
    })?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ContractError::InvalidValidatorAddress {
            address: s.to_string(),
        })
}

/// Parse a message-level `Binary` into a fixed 32-byte value
pub fn to_bytes32(bin: &Binary) -> Result<[u8; 32], ContractError> {
    bin.as_slice()
        .try_into()
        .map_err(|_| ContractError::InvalidHashLength { got: bin.len() })
}
