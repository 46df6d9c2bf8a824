//! Error types for the ledger relay contract.
//!
//! Execution-outcome failures (callee revert, gas shortfall) are not listed
//! here: they are recorded as failed relay records and exposed for
//! permissionless retry instead of surfacing as errors. Everything below
//! aborts the calling transaction.

use cosmwasm_std::StdError;
use cw_utils::{ParseReplyError, PaymentError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Payment(#[from] PaymentError),

    #[error("{0}")]
    ParseReply(#[from] ParseReplyError),

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    #[error("Unauthorized: only admin can perform this action")]
    Unauthorized,

    #[error("Unauthorized: only pending admin can accept")]
    UnauthorizedPendingAdmin,

    #[error("Unauthorized: reserved for the contract itself")]
    UnauthorizedInternal,

    // ========================================================================
    // Admin Errors
    // ========================================================================

    #[error("No pending admin change")]
    NoPendingAdmin,

    #[error("Timelock not expired: {remaining_seconds} seconds remaining")]
    TimelockNotExpired { remaining_seconds: u64 },

    // ========================================================================
    // Relay State Errors
    // ========================================================================

    #[error("Relay is paused")]
    RelayPaused,

    #[error("Empty message batch")]
    EmptyBatch,

    #[error("A relay is already in progress")]
    RelayInProgress,

    #[error("No relay in progress")]
    NoActiveRelay,

    #[error("Unknown reply id: {id}")]
    UnknownReplyId { id: u64 },

    #[error("Nonce not incremental: expected {expected}, got {got}")]
    NonceNotIncremental { expected: u64, got: u64 },

    #[error("Message already succeeded: {hash}")]
    AlreadySucceeded { hash: String },

    #[error("Message already failed, use the retry path: {hash}")]
    AlreadyFailed { hash: String },

    #[error("Message not previously failed, retry refused: {hash}")]
    NotPreviouslyFailed { hash: String },

    #[error("Gas estimation probe for {hash}: {reason}")]
    GasEstimationFailed { hash: String, reason: String },

    // ========================================================================
    // Signature Verification Errors
    // ========================================================================

    #[error("Invalid signature blob length: {got} is not a multiple of 65")]
    InvalidSignatureLength { got: usize },

    #[error("Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    #[error("Signers not in strictly ascending order")]
    SignersNotAscending,

    #[error(
        "Threshold not met: primary {primary_count}/{primary_required}, \
         partner {partner_count}/{partner_required}"
    )]
    ThresholdNotMet {
        primary_count: u32,
        primary_required: u32,
        partner_count: u32,
        partner_required: u32,
    },

    // ========================================================================
    // Accumulator Errors
    // ========================================================================

    #[error("Accumulator is empty")]
    EmptyAccumulator {},

    #[error("Leaf index out of bounds: {leaf_index} >= {leaf_count}")]
    LeafIndexOutOfBounds { leaf_index: u64, leaf_count: u64 },

    #[error("Invalid node index: {index} >= {node_count}")]
    InvalidNodeIndex { index: u64, node_count: u64 },

    // ========================================================================
    // Validator Set Errors
    // ========================================================================

    #[error("Invalid validator address: {address}")]
    InvalidValidatorAddress { address: String },

    #[error("Validator already registered: {address}")]
    DuplicateValidator { address: String },

    #[error("Validator not registered: {address}")]
    ValidatorNotFound { address: String },

    #[error("Validator sets must be disjoint: {address}")]
    ValidatorSetOverlap { address: String },

    #[error("Threshold {threshold} exceeds validator count {validators}")]
    ThresholdExceedsValidators { threshold: u32, validators: u32 },

    #[error("Zero threshold only allowed while paused")]
    ZeroThreshold,

    // ========================================================================
    // Validation Errors
    // ========================================================================

    #[error("Invalid hash length: expected 32 bytes, got {got}")]
    InvalidHashLength { got: usize },
}
