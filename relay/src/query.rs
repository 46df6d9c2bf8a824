//! Query handlers for the ledger relay contract.

use cosmwasm_std::{Binary, Deps, Order, StdError, StdResult};
use cw_storage_plus::Bound;

use crate::hash::{batch_digest, bytes20_to_hex, message_hash, to_bytes32};
use crate::mmr;
use crate::msg::{
    ConfigResponse, HashResponse, InboundMessage, LeafCountResponse, MessageStatusResponse,
    NodeResponse, NonceResponse, PendingAdminResponse, ProofResponse, RootResponse,
    StatusResponse, TokenPairEntry, TokenPairResponse, TokenPairsResponse, TwinResponse,
    ValidatorsResponse, VerifyProofResponse,
};
use crate::state::{
    CONFIG, FAILED, LAST_INCOMING_NONCE, LEAF_COUNT, NODE_COUNT, PARTNER_VALIDATORS,
    PARTNER_VALIDATOR_COUNT, PENDING_ADMIN, PRIMARY_VALIDATORS, PRIMARY_VALIDATOR_COUNT,
    SUCCEEDED, TOKEN_PAIRS, TWINS,
};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 30;

// ============================================================================
// Core Queries
// ============================================================================

/// Query contract configuration.
pub fn query_config(deps: Deps) -> StdResult<ConfigResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(ConfigResponse {
        admin: config.admin,
        vault: config.vault,
        twin_code_id: config.twin_code_id,
        remote_gateway: config.remote_gateway,
        gas_estimator: config.gas_estimator,
        primary_threshold: config.primary_threshold,
        partner_threshold: config.partner_threshold,
        paused: config.paused,
    })
}

/// Query relay status counters.
pub fn query_status(deps: Deps) -> StdResult<StatusResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(StatusResponse {
        paused: config.paused,
        leaf_count: LEAF_COUNT.may_load(deps.storage)?.unwrap_or(0),
        node_count: NODE_COUNT.may_load(deps.storage)?.unwrap_or(0),
        last_incoming_nonce: LAST_INCOMING_NONCE.may_load(deps.storage)?.unwrap_or(0),
        primary_validators: PRIMARY_VALIDATOR_COUNT.may_load(deps.storage)?.unwrap_or(0),
        partner_validators: PARTNER_VALIDATOR_COUNT.may_load(deps.storage)?.unwrap_or(0),
    })
}

// ============================================================================
// Accumulator Queries
// ============================================================================

/// Query the current accumulator root.
pub fn query_root(deps: Deps) -> StdResult<RootResponse> {
    let root = mmr::root(deps.storage)?;
    Ok(RootResponse {
        root: Binary::from(root),
    })
}

/// Query the number of committed leaves.
pub fn query_leaf_count(deps: Deps) -> StdResult<LeafCountResponse> {
    Ok(LeafCountResponse {
        leaf_count: LEAF_COUNT.may_load(deps.storage)?.unwrap_or(0),
    })
}

/// Query a raw accumulator node by flat-array position.
pub fn query_node(deps: Deps, index: u64) -> StdResult<NodeResponse> {
    let node =
        mmr::get_node(deps.storage, index).map_err(|e| StdError::generic_err(e.to_string()))?;
    Ok(NodeResponse {
        node: Binary::from(node),
    })
}

/// Generate a membership proof for a leaf, bound to the current leaf
/// count.
pub fn query_proof(deps: Deps, leaf_index: u64) -> StdResult<ProofResponse> {
    let (proof, leaf_count) = mmr::generate_proof(deps.storage, leaf_index)
        .map_err(|e| StdError::generic_err(e.to_string()))?;
    Ok(ProofResponse {
        proof: proof.into_iter().map(Binary::from).collect(),
        leaf_count,
    })
}

/// Recompute a proof against a leaf-count snapshot and expected root.
/// Pure computation; reads no state.
pub fn query_verify_proof(
    leaf: Binary,
    leaf_index: u64,
    leaf_count: u64,
    proof: Vec<Binary>,
    root: Binary,
) -> StdResult<VerifyProofResponse> {
    let leaf = to_bytes32(&leaf).map_err(|e| StdError::generic_err(e.to_string()))?;
    let root = to_bytes32(&root).map_err(|e| StdError::generic_err(e.to_string()))?;
    let mut elements = Vec::with_capacity(proof.len());
    for item in &proof {
        elements.push(to_bytes32(item).map_err(|e| StdError::generic_err(e.to_string()))?);
    }
    Ok(VerifyProofResponse {
        valid: mmr::verify_proof(&leaf, leaf_index, leaf_count, &elements, &root),
    })
}

// ============================================================================
// Relay Queries
// ============================================================================

/// Query the relay record of a message hash.
pub fn query_message_status(deps: Deps, hash: Binary) -> StdResult<MessageStatusResponse> {
    let hash = to_bytes32(&hash).map_err(|e| StdError::generic_err(e.to_string()))?;
    Ok(MessageStatusResponse {
        succeeded: SUCCEEDED.has(deps.storage, &hash),
        failed: FAILED.has(deps.storage, &hash),
    })
}

/// Query the highest nonce admitted on the trusted path.
pub fn query_last_incoming_nonce(deps: Deps) -> StdResult<NonceResponse> {
    Ok(NonceResponse {
        nonce: LAST_INCOMING_NONCE.may_load(deps.storage)?.unwrap_or(0),
    })
}

/// Compute the canonical hash of an inbound message.
pub fn query_message_hash(message: InboundMessage) -> StdResult<HashResponse> {
    let sender = to_bytes32(&message.sender).map_err(|e| StdError::generic_err(e.to_string()))?;
    let hash = message_hash(message.nonce, &sender, message.kind.tag(), &message.payload);
    Ok(HashResponse {
        hash: Binary::from(hash),
    })
}

/// Compute the digest a signature batch must cover.
pub fn query_batch_digest(messages: Vec<InboundMessage>) -> StdResult<HashResponse> {
    let mut hashes = Vec::with_capacity(messages.len());
    for message in &messages {
        let sender =
            to_bytes32(&message.sender).map_err(|e| StdError::generic_err(e.to_string()))?;
        hashes.push(message_hash(
            message.nonce,
            &sender,
            message.kind.tag(),
            &message.payload,
        ));
    }
    Ok(HashResponse {
        hash: Binary::from(batch_digest(&hashes)),
    })
}

/// Query the twin address cached for a remote sender.
pub fn query_twin(deps: Deps, remote_sender: Binary) -> StdResult<TwinResponse> {
    Ok(TwinResponse {
        twin: TWINS.may_load(deps.storage, remote_sender.as_slice())?,
    })
}

// ============================================================================
// Registry Queries
// ============================================================================

/// Query the local token mapped to a remote token id.
pub fn query_token_pair(deps: Deps, remote_token: Binary) -> StdResult<TokenPairResponse> {
    let local_token = TOKEN_PAIRS.may_load(deps.storage, remote_token.as_slice())?;
    Ok(TokenPairResponse {
        remote_token,
        local_token,
    })
}

/// List registered token pairs with cursor-based pagination.
pub fn query_token_pairs(
    deps: Deps,
    start_after: Option<Binary>,
    limit: Option<u32>,
) -> StdResult<TokenPairsResponse> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start = start_after.as_ref().map(|b| Bound::exclusive(b.as_slice()));

    let pairs = TOKEN_PAIRS
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|item| {
            let (remote_token, local_token) = item?;
            Ok(TokenPairEntry {
                remote_token: Binary::from(remote_token),
                local_token,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;

    Ok(TokenPairsResponse { pairs })
}

// ============================================================================
// Validator Queries
// ============================================================================

/// Query both validator sets and thresholds.
pub fn query_validators(deps: Deps) -> StdResult<ValidatorsResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(ValidatorsResponse {
        primary: collect_signers(deps, &PRIMARY_VALIDATORS)?,
        partner: collect_signers(deps, &PARTNER_VALIDATORS)?,
        primary_threshold: config.primary_threshold,
        partner_threshold: config.partner_threshold,
    })
}

fn collect_signers(
    deps: Deps,
    validators: &cw_storage_plus::Map<&[u8], bool>,
) -> StdResult<Vec<String>> {
    validators
        .keys(deps.storage, None, None, Order::Ascending)
        .map(|key| {
            let signer: [u8; 20] = key?
                .as_slice()
                .try_into()
                .map_err(|_| StdError::generic_err("malformed validator key"))?;
            Ok(bytes20_to_hex(&signer))
        })
        .collect()
}

/// Query pending admin proposal details.
pub fn query_pending_admin(deps: Deps) -> StdResult<Option<PendingAdminResponse>> {
    Ok(PENDING_ADMIN
        .may_load(deps.storage)?
        .map(|pending| PendingAdminResponse {
            new_admin: pending.new_admin,
            execute_after: pending.execute_after,
        }))
}
