//! Message types for the twin contract.
//!
//! The instantiate and execute surfaces are shared interface types from
//! `common`, since the relay constructs them; only the queries are local.

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Binary};

pub use common::{TwinExecuteMsg as ExecuteMsg, TwinInstantiateMsg as InstantiateMsg, TwinOp};

/// Query messages
#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    /// Returns the relay that owns this twin
    #[returns(OwnerResponse)]
    Owner {},

    /// Returns the 32-byte remote sender this twin acts for
    #[returns(RemoteSenderResponse)]
    RemoteSender {},
}

#[cw_serde]
pub struct OwnerResponse {
    pub owner: Addr,
}

#[cw_serde]
pub struct RemoteSenderResponse {
    pub remote_sender: Binary,
}
