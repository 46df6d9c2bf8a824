//! Interface of the twin contract (per-sender execution proxy).
//!
//! The relay instantiates one twin per remote sender and forwards decoded
//! call payloads to it. Only the relay (the twin's owner) or the twin
//! itself may invoke `Forward`.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Binary, Coin};

#[cw_serde]
pub struct TwinInstantiateMsg {
    /// 32-byte remote sender this twin acts for
    pub remote_sender: Binary,
}

#[cw_serde]
pub enum TwinExecuteMsg {
    /// Execute a list of operations on behalf of the remote sender.
    /// `ops` decodes to a JSON `Vec<TwinOp>`.
    ///
    /// Authorization: owner (the relay) or the twin itself
    Forward { ops: Binary },
}

/// One operation inside a forwarded call payload.
#[cw_serde]
pub enum TwinOp {
    /// Plain value transfer
    Send { to: String, amount: Vec<Coin> },
    /// Value-bearing contract call
    Execute {
        contract: String,
        msg: Binary,
        funds: Vec<Coin>,
    },
    /// Contract creation
    Instantiate {
        code_id: u64,
        msg: Binary,
        funds: Vec<Coin>,
        label: String,
    },
    /// Salted contract creation (deterministic address)
    Instantiate2 {
        code_id: u64,
        msg: Binary,
        funds: Vec<Coin>,
        label: String,
        salt: Binary,
    },
}
