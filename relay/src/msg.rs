//! Message types for the ledger relay contract.

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Binary, Timestamp, Uint128};

// ============================================================================
// Instantiate & Migrate
// ============================================================================

/// Migrate message
#[cw_serde]
pub struct MigrateMsg {}

/// Instantiate message
#[cw_serde]
pub struct InstantiateMsg {
    /// Admin address for validator and configuration management
    pub admin: String,
    /// Token vault address (holds all bridged funds)
    pub vault: String,
    /// Code id for lazy twin instantiation
    pub twin_code_id: u64,
    /// Reserved 32-byte sender id of the remote gateway
    pub remote_gateway: Binary,
    /// Sentinel sender address activating gas-estimation mode
    pub gas_estimator: String,
    /// Initial primary validator signer addresses (0x-prefixed 20-byte hex)
    pub primary_validators: Vec<String>,
    /// Signatures required from the primary set
    pub primary_threshold: u32,
    /// Initial partner validator signer addresses (0x-prefixed 20-byte hex)
    pub partner_validators: Vec<String>,
    /// Signatures required from the partner set
    pub partner_threshold: u32,
}

// ============================================================================
// Inbound Messages
// ============================================================================

/// Kind of an inbound message, dispatched by a single match
#[cw_serde]
pub enum MessageKind {
    /// Forward the payload to the sender's twin
    Call,
    /// Release tokens through the vault
    Transfer,
    /// Release tokens to the sender's twin, then invoke it
    TransferAndCall,
}

impl MessageKind {
    /// Tag byte used in the canonical message hash preimage
    pub fn tag(&self) -> u8 {
        match self {
            MessageKind::Call => 0,
            MessageKind::Transfer => 1,
            MessageKind::TransferAndCall => 2,
        }
    }
}

/// An inbound message as reconstructed by the relayer from remote events.
/// Not stored on-chain except as a relay record keyed by its hash.
#[cw_serde]
pub struct InboundMessage {
    /// Remote outbound nonce (trusted path: must advance by exactly 1)
    pub nonce: u64,
    /// 32-byte remote sender id
    pub sender: Binary,
    /// Gas budget for execution; excluded from the message hash so retries
    /// can raise it without changing the message identity
    pub gas_limit: u64,
    pub kind: MessageKind,
    /// Opaque payload, interpreted per kind
    pub payload: Binary,
}

// ============================================================================
// Execute Messages
// ============================================================================

/// Execute messages
#[cw_serde]
pub enum ExecuteMsg {
    // ========================================================================
    // Outbound Gateway
    // ========================================================================
    /// Commit an outbound message to the accumulator.
    ///
    /// Authorization: anyone
    SendMessage {
        /// Opaque payload delivered to the sender's twin on the remote side
        payload: Binary,
    },

    /// Commit an outbound token transfer; exactly one native coin must be
    /// attached and is forwarded to the vault.
    ///
    /// Authorization: anyone
    SendTokens {
        /// Recipient account on the remote side (opaque bytes)
        remote_recipient: Binary,
    },

    /// CW20 deposit hook (see [`ReceiveMsg`])
    Receive(cw20::Cw20ReceiveMsg),

    // ========================================================================
    // Inbound Relay
    // ========================================================================
    /// Admit a batch of inbound messages on the trusted path: the signature
    /// blob must meet both validator quorums over the batch digest, and
    /// nonces must advance strictly by 1.
    ///
    /// Authorization: anyone with a valid signature batch
    RelayBatch {
        messages: Vec<InboundMessage>,
        /// Concatenated 65-byte recoverable signatures, signers strictly
        /// ascending
        signatures: Binary,
    },

    /// Re-attempt messages already recorded failed. No signatures and no
    /// nonce sequencing: the messages were authorized once already.
    ///
    /// Authorization: anyone
    RetryFailed { messages: Vec<InboundMessage> },

    /// Internal composite for transfer-and-call: release tokens from the
    /// vault to a twin, then forward the call to it, inside one
    /// sub-transaction so both commit or revert together.
    ///
    /// Authorization: the contract itself (dispatched as its own
    /// submessage)
    ReleaseAndForward {
        /// Local token: native denom or CW20 contract address
        token: String,
        /// Twin receiving the funds and the call
        twin: String,
        amount: Uint128,
        /// Operation list forwarded to the twin (JSON `Vec<TwinOp>`)
        ops: Binary,
    },

    // ========================================================================
    // Validator Management
    // ========================================================================
    /// Add a primary validator (0x-prefixed 20-byte hex signer address)
    ///
    /// Authorization: Admin only
    AddPrimaryValidator { address: String },

    /// Remove a primary validator; refused if the set would drop below the
    /// primary threshold
    ///
    /// Authorization: Admin only
    RemovePrimaryValidator { address: String },

    /// Add a partner validator
    ///
    /// Authorization: Admin only
    AddPartnerValidator { address: String },

    /// Remove a partner validator; refused if the set would drop below the
    /// partner threshold
    ///
    /// Authorization: Admin only
    RemovePartnerValidator { address: String },

    /// Update both quorum thresholds. A zero primary threshold is only
    /// accepted while paused (deliberate disablement); a zero partner
    /// threshold is a valid steady state for deployments without a
    /// partner set.
    ///
    /// Authorization: Admin only
    SetThresholds { primary: u32, partner: u32 },

    // ========================================================================
    // Configuration
    // ========================================================================
    /// Update the code id used for future twin instantiations
    ///
    /// Authorization: Admin only
    SetTwinCodeId { code_id: u64 },

    /// Pause outbound commits and inbound relays (admin only)
    Pause {},

    /// Unpause (admin only)
    Unpause {},

    /// Initiate 7-day timelock for admin transfer
    ProposeAdmin { new_admin: String },

    /// Complete admin transfer after timelock
    AcceptAdmin {},

    /// Cancel pending admin change
    CancelAdminProposal {},
}

/// CW20 receive hook message
#[cw_serde]
pub enum ReceiveMsg {
    /// Commit an outbound transfer of the received CW20 tokens; the tokens
    /// are forwarded to the vault
    SendTokens {
        /// Recipient account on the remote side (opaque bytes)
        remote_recipient: Binary,
    },
}

// ============================================================================
// Query Messages
// ============================================================================

/// Query messages
#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    /// Returns contract configuration
    #[returns(ConfigResponse)]
    Config {},

    /// Returns relay status counters
    #[returns(StatusResponse)]
    Status {},

    // ========================================================================
    // Accumulator Queries
    // ========================================================================
    /// Returns the current accumulator root
    #[returns(RootResponse)]
    Root {},

    /// Returns the number of committed leaves
    #[returns(LeafCountResponse)]
    LeafCount {},

    /// Returns a raw accumulator node by flat-array position
    #[returns(NodeResponse)]
    Node { index: u64 },

    /// Generates a membership proof for a leaf, bound to the current
    /// leaf count
    #[returns(ProofResponse)]
    Proof { leaf_index: u64 },

    /// Recomputes a proof against a leaf-count snapshot and expected root
    #[returns(VerifyProofResponse)]
    VerifyProof {
        /// 32-byte leaf hash
        leaf: Binary,
        leaf_index: u64,
        leaf_count: u64,
        proof: Vec<Binary>,
        /// 32-byte expected root
        root: Binary,
    },

    // ========================================================================
    // Relay Queries
    // ========================================================================
    /// Returns the relay record of a message hash
    #[returns(MessageStatusResponse)]
    MessageStatus {
        /// 32-byte canonical message hash
        hash: Binary,
    },

    /// Returns the highest nonce admitted on the trusted path
    #[returns(NonceResponse)]
    LastIncomingNonce {},

    /// Computes the canonical hash of an inbound message (gas limit
    /// excluded)
    #[returns(HashResponse)]
    MessageHash { message: InboundMessage },

    /// Computes the digest a signature batch must cover
    #[returns(HashResponse)]
    BatchDigest { messages: Vec<InboundMessage> },

    /// Returns the twin address cached for a remote sender, if any
    #[returns(TwinResponse)]
    Twin {
        /// 32-byte remote sender id
        remote_sender: Binary,
    },

    // ========================================================================
    // Registry Queries
    // ========================================================================
    /// Returns the local token mapped to a remote token id, if registered
    #[returns(TokenPairResponse)]
    TokenPair {
        /// 32-byte remote token id
        remote_token: Binary,
    },

    /// Lists registered token pairs with cursor-based pagination
    #[returns(TokenPairsResponse)]
    TokenPairs {
        /// Cursor: the remote token id of the last item from the previous
        /// page
        start_after: Option<Binary>,
        /// Max entries to return (default 10, max 30)
        limit: Option<u32>,
    },

    // ========================================================================
    // Validator Queries
    // ========================================================================
    /// Returns both validator sets and thresholds
    #[returns(ValidatorsResponse)]
    Validators {},

    /// Returns pending admin proposal details
    #[returns(Option<PendingAdminResponse>)]
    PendingAdmin {},
}

// ============================================================================
// Response Types
// ============================================================================

#[cw_serde]
pub struct ConfigResponse {
    pub admin: Addr,
    pub vault: Addr,
    pub twin_code_id: u64,
    pub remote_gateway: Binary,
    pub gas_estimator: Addr,
    pub primary_threshold: u32,
    pub partner_threshold: u32,
    pub paused: bool,
}

#[cw_serde]
pub struct StatusResponse {
    pub paused: bool,
    pub leaf_count: u64,
    pub node_count: u64,
    pub last_incoming_nonce: u64,
    pub primary_validators: u32,
    pub partner_validators: u32,
}

#[cw_serde]
pub struct RootResponse {
    /// 32-byte accumulator root (all zeros while empty)
    pub root: Binary,
}

#[cw_serde]
pub struct LeafCountResponse {
    pub leaf_count: u64,
}

#[cw_serde]
pub struct NodeResponse {
    /// 32-byte node hash
    pub node: Binary,
}

#[cw_serde]
pub struct ProofResponse {
    /// Proof elements, consumed in order by the verifier
    pub proof: Vec<Binary>,
    /// Leaf count the proof is bound to
    pub leaf_count: u64,
}

#[cw_serde]
pub struct VerifyProofResponse {
    pub valid: bool,
}

#[cw_serde]
pub struct MessageStatusResponse {
    pub succeeded: bool,
    pub failed: bool,
}

#[cw_serde]
pub struct NonceResponse {
    pub nonce: u64,
}

#[cw_serde]
pub struct HashResponse {
    /// 32-byte hash
    pub hash: Binary,
}

#[cw_serde]
pub struct TwinResponse {
    pub twin: Option<Addr>,
}

#[cw_serde]
pub struct TokenPairResponse {
    pub remote_token: Binary,
    pub local_token: Option<String>,
}

#[cw_serde]
pub struct TokenPairEntry {
    pub remote_token: Binary,
    pub local_token: String,
}

#[cw_serde]
pub struct TokenPairsResponse {
    pub pairs: Vec<TokenPairEntry>,
}

#[cw_serde]
pub struct ValidatorsResponse {
    /// Primary signer addresses as 0x-prefixed hex
    pub primary: Vec<String>,
    /// Partner signer addresses as 0x-prefixed hex
    pub partner: Vec<String>,
    pub primary_threshold: u32,
    pub partner_threshold: u32,
}

#[cw_serde]
pub struct PendingAdminResponse {
    pub new_admin: Addr,
    pub execute_after: Timestamp,
}
