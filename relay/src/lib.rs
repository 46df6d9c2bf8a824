//! Ledger Relay Contract - Cross-Ledger Message Relay Core
//!
//! This contract is one half of a two-sided message relay between this
//! ledger and a remote counterpart running the same protocol.
//!
//! # Outbound Flow
//! 1. A local account calls `SendMessage` / `SendTokens` (or the CW20 hook)
//! 2. The message is hashed into a leaf and appended to an append-only
//!    Merkle Mountain Range; the emitted event carries nonce, payload,
//!    leaf hash, and the new root
//! 3. Relayers mirror the event to the remote ledger, which verifies a
//!    membership proof against a root snapshot
//!
//! # Inbound Flow
//! 1. Relayers submit `RelayBatch` with reconstructed messages and one
//!    signature blob over the batch digest
//! 2. Two independent validator quorums (primary and partner) must both
//!    reach their thresholds; signers must be strictly ascending
//! 3. Messages are admitted in strict nonce order and executed one
//!    submessage at a time through per-sender twin contracts
//! 4. Execution failures are recorded, halt the batch, and stay open for
//!    permissionless `RetryFailed`
//!
//! # Security
//! - Every message is identified by a deterministic hash and admitted at
//!   most once
//! - Dual-quorum threshold signatures over the whole batch
//! - Transaction-scoped relay guard against re-entrant admission
//! - Gas reservation so the relay entry point never starves itself
//! - Emergency pause and timelocked admin transfer

pub mod contract;
pub mod error;
mod execute;
pub mod hash;
pub mod mmr;
pub mod msg;
mod query;
pub mod quorum;
pub mod state;

pub use crate::error::ContractError;
pub use crate::hash::{keccak256, leaf_hash, message_hash};
