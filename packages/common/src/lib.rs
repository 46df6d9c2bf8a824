//! Common - Shared Interface Types for the Ledger Relay Contracts
//!
//! This package defines the wire payload structs carried inside relay
//! messages and the interfaces of the two contracts the relay core talks
//! to: the per-sender twin (execution proxy) and the token vault.

pub mod payload;
pub mod twin;
pub mod vault;

pub use payload::{TokenPairRegistration, TransferAndCallPayload, TransferPayload};
pub use twin::{TwinExecuteMsg, TwinInstantiateMsg, TwinOp};
pub use vault::VaultExecuteMsg;
