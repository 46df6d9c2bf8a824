//! Wire payload structs carried inside relay message envelopes.
//!
//! The message envelope itself (nonce, sender, kind, payload bytes) is
//! hashed bit-exactly on both ledgers; the payload bytes are opaque to the
//! envelope and decode per message kind. Both endpoints of this deployment
//! are CosmWasm contracts, so payloads are JSON-encoded `cw_serde` structs.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Binary, Uint128};

/// Payload of a `Transfer` message.
///
/// `token` is the 32-byte universal token id assigned by the sending side
/// (see `relay::hash::encode_token`); the receiving side maps it through its
/// token-pair registry. `recipient` is the UTF-8 bytes of the receiving-side
/// account address.
#[cw_serde]
pub struct TransferPayload {
    /// 32-byte universal token id on the sending side
    pub token: Binary,
    /// Recipient account on the receiving side (UTF-8 address bytes)
    pub recipient: Binary,
    /// Amount in the token's smallest unit
    pub amount: Uint128,
}

/// Payload of a `TransferAndCall` message.
///
/// Tokens are released to the sender's twin, then the twin is invoked with
/// `ops` inside the same sub-transaction.
#[cw_serde]
pub struct TransferAndCallPayload {
    /// 32-byte universal token id on the sending side
    pub token: Binary,
    /// Amount released to the twin before the call
    pub amount: Uint128,
    /// Operation list forwarded to the twin (JSON `Vec<TwinOp>`)
    pub ops: Binary,
}

/// Payload of a registration message sent by the remote gateway itself.
///
/// Maps a remote 32-byte token id to a local token identifier (native denom
/// or CW20 contract address).
#[cw_serde]
pub struct TokenPairRegistration {
    /// 32-byte universal token id as it appears in inbound transfer payloads
    pub remote_token: Binary,
    /// Local token: native denom or CW20 contract address
    pub local_token: String,
}
