//! Dual-Quorum Threshold Signature Verification
//!
//! A relay batch is authorized by one signature set over the batch digest.
//! Signatures are fixed-size 65-byte recoverable secp256k1 blobs
//! (`r | s | v`, `v` accepted as 0/1 or 27/28) concatenated back to back.
//!
//! Signers must be strictly ascending by recovered 20-byte address. That
//! single ordering rule rejects duplicate signers and keeps validation one
//! linear pass with no set or map. Every recovered signer is classified
//! once: primary-set member, partner-set member, or unrecognized (ignored,
//! not an error). The batch is authorized only when both independent
//! tallies reach their thresholds.

use cosmwasm_std::Deps;

use crate::error::ContractError;
use crate::hash::keccak256;
use crate::state::{Config, PARTNER_VALIDATORS, PRIMARY_VALIDATORS};

/// Size of one recoverable signature: r (32) | s (32) | v (1)
pub const SIGNATURE_SIZE: usize = 65;

/// Verify a signature blob against both quorums over the batch digest.
///
/// Errors instead of returning false: callers must not be able to mistake
/// a rejected batch for an empty verdict.
pub fn verify_batch(
    deps: Deps,
    config: &Config,
    digest: &[u8; 32],
    blob: &[u8],
) -> Result<(), ContractError> {
    if blob.len() % SIGNATURE_SIZE != 0 {
        return Err(ContractError::InvalidSignatureLength { got: blob.len() });
    }

    let mut last_signer: Option<[u8; 20]> = None;
    let mut primary_count = 0u32;
    let mut partner_count = 0u32;

    for sig in blob.chunks_exact(SIGNATURE_SIZE) {
        let signer = recover_signer(deps, digest, sig)?;

        if let Some(last) = last_signer {
            if signer <= last {
                return Err(ContractError::SignersNotAscending);
            }
        }
        last_signer = Some(signer);

        if PRIMARY_VALIDATORS.has(deps.storage, &signer) {
            primary_count += 1;
        } else if PARTNER_VALIDATORS.has(deps.storage, &signer) {
            partner_count += 1;
        }
        // unrecognized signers are skipped, not rejected
    }

    if primary_count < config.primary_threshold || partner_count < config.partner_threshold {
        return Err(ContractError::ThresholdNotMet {
            primary_count,
            primary_required: config.primary_threshold,
            partner_count,
            partner_required: config.partner_threshold,
        });
    }

    Ok(())
}

/// Recover the 20-byte signer address from one 65-byte signature.
///
/// The address is the last 20 bytes of keccak256 over the uncompressed
/// public key coordinates (the 0x04 prefix byte stripped).
fn recover_signer(deps: Deps, digest: &[u8; 32], sig: &[u8]) -> Result<[u8; 20], ContractError> {
    let v = sig[64];
    let recovery = if v >= 27 { v - 27 } else { v };
    let pubkey = deps
        .api
        .secp256k1_recover_pubkey(digest, &sig[..64], recovery)
        .map_err(|e| ContractError::InvalidSignature {
            reason: e.to_string(),
        })?;

    let hash = keccak256(&pubkey[1..]);
    let mut signer = [0u8; 20];
    signer.copy_from_slice(&hash[12..32]);
    Ok(signer)
}
