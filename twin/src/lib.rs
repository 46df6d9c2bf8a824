//! Twin Contract - Per-Sender Execution Proxy
//!
//! The relay instantiates one twin per remote sender, salted with the
//! sender's 32-byte id so the address is deterministic. The twin is the
//! local identity of that remote sender: whatever it executes, it
//! executes as itself, so remote accounts can hold funds and contracts on
//! this ledger without the relay ever acting in its own name.
//!
//! # Security
//! - Only the relay (the twin's owner) or the twin itself may `Forward`
//! - Callee failures propagate opaquely to the relay, which records the
//!   message failed without inspecting why

pub mod contract;
pub mod error;
pub mod msg;
pub mod state;

pub use crate::error::ContractError;
