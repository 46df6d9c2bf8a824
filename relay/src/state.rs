//! State layout for the ledger relay contract.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, Timestamp};
use cw_storage_plus::{Item, Map};

use crate::msg::InboundMessage;

// ============================================================================
// Constants
// ============================================================================

pub const CONTRACT_NAME: &str = "crates.io:ledger-relay";
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gas reserved for dispatching one execution submessage
pub const CALL_OVERHEAD_GAS: u64 = 50_000;

/// Gas reserved for the relay entry point itself
pub const ENTRYPOINT_BUFFER_GAS: u64 = 100_000;

/// Admin transfer timelock (7 days)
pub const ADMIN_TIMELOCK_DURATION: u64 = 604_800;

/// Reply id: twin instantiation (reply on success only)
pub const TWIN_CREATED_REPLY_ID: u64 = 1;

/// Reply id: execution submessage outcome (reply always)
pub const EXEC_OUTCOME_REPLY_ID: u64 = 2;

// ============================================================================
// Types
// ============================================================================

/// Contract configuration
#[cw_serde]
pub struct Config {
    /// Admin address for validator and configuration management
    pub admin: Addr,
    /// Token vault holding bridged funds
    pub vault: Addr,
    /// Code id used for lazy twin instantiation
    pub twin_code_id: u64,
    /// Reserved 32-byte sender id of the remote gateway; messages from it
    /// carry token-pair registrations instead of generic operations
    pub remote_gateway: Binary,
    /// Sentinel sender that switches a relay call into gas-estimation mode.
    /// Production relayers never send from this address.
    pub gas_estimator: Addr,
    /// Signatures required from the primary validator set
    pub primary_threshold: u32,
    /// Signatures required from the partner validator set
    pub partner_threshold: u32,
    /// Emergency pause flag
    pub paused: bool,
}

/// Pending admin change (timelocked)
#[cw_serde]
pub struct PendingAdmin {
    pub new_admin: Addr,
    pub execute_after: Timestamp,
}

/// The in-flight relay batch. Present only while a relay transaction is
/// executing, which makes it double as the re-entrancy guard: both relay
/// entry points refuse to start while this record exists.
#[cw_serde]
pub struct RelayJob {
    /// Messages not yet admitted, in batch order
    pub queue: Vec<InboundMessage>,
    /// Message whose execution submessage is in flight
    pub current: Option<CurrentMessage>,
    /// Trusted path (signature-verified, nonce-sequenced)
    pub trusted: bool,
    /// Gas-estimation mode: execution failures abort distinguishably
    pub estimating: bool,
}

/// The message currently awaiting its submessage outcome
#[cw_serde]
pub struct CurrentMessage {
    pub message: InboundMessage,
    /// Canonical message hash (32 bytes)
    pub hash: Binary,
}

// ============================================================================
// Storage
// ============================================================================

pub const CONFIG: Item<Config> = Item::new("config");

pub const PENDING_ADMIN: Item<PendingAdmin> = Item::new("pending_admin");

/// Number of leaves committed to the accumulator (doubles as next nonce)
pub const LEAF_COUNT: Item<u64> = Item::new("leaf_count");

/// Total number of accumulator nodes (leaves + merge parents)
pub const NODE_COUNT: Item<u64> = Item::new("node_count");

/// flat node position => 32-byte node hash
pub const MMR_NODES: Map<u64, [u8; 32]> = Map::new("mmr_nodes");

/// Highest inbound nonce admitted on the trusted path (0 = none yet)
pub const LAST_INCOMING_NONCE: Item<u64> = Item::new("last_incoming_nonce");

/// message hash (32 bytes) => admitted successfully
pub const SUCCEEDED: Map<&[u8], bool> = Map::new("succeeded");

/// message hash (32 bytes) => recorded failed, open for permissionless retry
pub const FAILED: Map<&[u8], bool> = Map::new("failed");

/// primary validator signer address (20 bytes) => active
pub const PRIMARY_VALIDATORS: Map<&[u8], bool> = Map::new("primary_validators");

/// partner validator signer address (20 bytes) => active
pub const PARTNER_VALIDATORS: Map<&[u8], bool> = Map::new("partner_validators");

pub const PRIMARY_VALIDATOR_COUNT: Item<u32> = Item::new("primary_validator_count");

pub const PARTNER_VALIDATOR_COUNT: Item<u32> = Item::new("partner_validator_count");

/// remote sender id (32 bytes) => twin contract address, never evicted
pub const TWINS: Map<&[u8], Addr> = Map::new("twins");

/// remote token id (32 bytes) => local token (denom or CW20 address)
pub const TOKEN_PAIRS: Map<&[u8], String> = Map::new("token_pairs");

/// Transient: the in-flight relay batch (see [`RelayJob`])
pub const RELAY_JOB: Item<RelayJob> = Item::new("relay_job");
