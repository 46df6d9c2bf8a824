//! Interface of the token vault collaborator.
//!
//! The vault custodies bridged funds. The relay never holds balances: it
//! forwards outbound deposits to the vault and instructs releases for
//! inbound transfers. For transfer-and-call messages the relay wraps the
//! release and the twin call in one sub-transaction of its own, so the
//! vault interface stays a single operation.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::Uint128;

#[cw_serde]
pub enum VaultExecuteMsg {
    /// Release tokens to a recipient.
    ///
    /// Authorization: relay only
    Release {
        /// Local token: native denom or CW20 contract address
        token: String,
        recipient: String,
        amount: Uint128,
    },
}
