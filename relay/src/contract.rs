//! Ledger Relay Contract - Entry Points
//!
//! One half of a two-sided message relay: an append-only accumulator
//! commits outbound messages for the remote verifier, and a dual-quorum
//! state machine admits inbound batches. The implementation is
//! modularized into:
//! - `execute/` - Execute message handlers
//! - `query` - Query message handlers
//! - `mmr` / `quorum` / `hash` - the accumulator, signature, and hashing
//!   cores

use cosmwasm_std::{
    entry_point, to_json_binary, Binary, Deps, DepsMut, Env, MessageInfo, Reply, Response,
    StdResult,
};
use cw2::set_contract_version;

use crate::error::ContractError;
use crate::execute::{
    execute_accept_admin, execute_add_partner_validator, execute_add_primary_validator,
    execute_cancel_admin_proposal, execute_pause, execute_propose_admin, execute_receive,
    execute_relay_batch, execute_release_and_forward, execute_remove_partner_validator,
    execute_remove_primary_validator, execute_retry_failed, execute_send_message,
    execute_send_tokens, execute_set_thresholds, execute_set_twin_code_id, execute_unpause,
    handle_exec_outcome, handle_twin_created,
};
use crate::hash::{hex_to_bytes20, to_bytes32};
use crate::msg::{ExecuteMsg, InstantiateMsg, MigrateMsg, QueryMsg};
use crate::query::{
    query_batch_digest, query_config, query_last_incoming_nonce, query_leaf_count,
    query_message_hash, query_message_status, query_node, query_pending_admin, query_proof,
    query_root, query_status, query_token_pair, query_token_pairs, query_twin, query_validators,
    query_verify_proof,
};
use crate::state::{
    Config, CONFIG, CONTRACT_NAME, CONTRACT_VERSION, EXEC_OUTCOME_REPLY_ID, LAST_INCOMING_NONCE,
    LEAF_COUNT, NODE_COUNT, PARTNER_VALIDATORS, PARTNER_VALIDATOR_COUNT, PRIMARY_VALIDATORS,
    PRIMARY_VALIDATOR_COUNT, TWIN_CREATED_REPLY_ID,
};

// ============================================================================
// Instantiate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    // Validate addresses
    let admin = deps.api.addr_validate(&msg.admin)?;
    let vault = deps.api.addr_validate(&msg.vault)?;
    let gas_estimator = deps.api.addr_validate(&msg.gas_estimator)?;

    // The remote gateway id must be a full 32-byte sender id
    to_bytes32(&msg.remote_gateway)?;

    // The primary quorum must be real from the start; the partner set is
    // optional (threshold 0 makes its clause vacuous)
    if msg.primary_threshold == 0 {
        return Err(ContractError::ZeroThreshold);
    }
    if msg.primary_threshold > msg.primary_validators.len() as u32 {
        return Err(ContractError::ThresholdExceedsValidators {
            threshold: msg.primary_threshold,
            validators: msg.primary_validators.len() as u32,
        });
    }
    if msg.partner_threshold > msg.partner_validators.len() as u32 {
        return Err(ContractError::ThresholdExceedsValidators {
            threshold: msg.partner_threshold,
            validators: msg.partner_validators.len() as u32,
        });
    }

    // Seed validator sets
    let mut primary_count = 0u32;
    for address in &msg.primary_validators {
        let signer = hex_to_bytes20(address)?;
        if PRIMARY_VALIDATORS.has(deps.storage, &signer) {
            return Err(ContractError::DuplicateValidator {
                address: address.clone(),
            });
        }
        PRIMARY_VALIDATORS.save(deps.storage, &signer, &true)?;
        primary_count += 1;
    }
    PRIMARY_VALIDATOR_COUNT.save(deps.storage, &primary_count)?;

    let mut partner_count = 0u32;
    for address in &msg.partner_validators {
        let signer = hex_to_bytes20(address)?;
        if PRIMARY_VALIDATORS.has(deps.storage, &signer) {
            return Err(ContractError::ValidatorSetOverlap {
                address: address.clone(),
            });
        }
        if PARTNER_VALIDATORS.has(deps.storage, &signer) {
            return Err(ContractError::DuplicateValidator {
                address: address.clone(),
            });
        }
        PARTNER_VALIDATORS.save(deps.storage, &signer, &true)?;
        partner_count += 1;
    }
    PARTNER_VALIDATOR_COUNT.save(deps.storage, &partner_count)?;

    // Store config
    let config = Config {
        admin,
        vault,
        twin_code_id: msg.twin_code_id,
        remote_gateway: msg.remote_gateway,
        gas_estimator,
        primary_threshold: msg.primary_threshold,
        partner_threshold: msg.partner_threshold,
        paused: false,
    };
    CONFIG.save(deps.storage, &config)?;

    // Initialize counters
    LEAF_COUNT.save(deps.storage, &0u64)?;
    NODE_COUNT.save(deps.storage, &0u64)?;
    LAST_INCOMING_NONCE.save(deps.storage, &0u64)?;

    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("admin", config.admin)
        .add_attribute("vault", config.vault)
        .add_attribute("primary_validators", primary_count.to_string())
        .add_attribute("partner_validators", partner_count.to_string()))
}

// ============================================================================
// Execute
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        // Outbound gateway
        ExecuteMsg::SendMessage { payload } => execute_send_message(deps, env, info, payload),
        ExecuteMsg::SendTokens { remote_recipient } => {
            execute_send_tokens(deps, env, info, remote_recipient)
        }
        ExecuteMsg::Receive(cw20_msg) => execute_receive(deps, env, info, cw20_msg),

        // Inbound relay
        ExecuteMsg::RelayBatch {
            messages,
            signatures,
        } => execute_relay_batch(deps, env, info, messages, signatures),
        ExecuteMsg::RetryFailed { messages } => execute_retry_failed(deps, env, info, messages),
        ExecuteMsg::ReleaseAndForward {
            token,
            twin,
            amount,
            ops,
        } => execute_release_and_forward(deps, env, info, token, twin, amount, ops),

        // Validator management
        ExecuteMsg::AddPrimaryValidator { address } => {
            execute_add_primary_validator(deps, info, address)
        }
        ExecuteMsg::RemovePrimaryValidator { address } => {
            execute_remove_primary_validator(deps, info, address)
        }
        ExecuteMsg::AddPartnerValidator { address } => {
            execute_add_partner_validator(deps, info, address)
        }
        ExecuteMsg::RemovePartnerValidator { address } => {
            execute_remove_partner_validator(deps, info, address)
        }
        ExecuteMsg::SetThresholds { primary, partner } => {
            execute_set_thresholds(deps, info, primary, partner)
        }

        // Configuration
        ExecuteMsg::SetTwinCodeId { code_id } => execute_set_twin_code_id(deps, info, code_id),
        ExecuteMsg::Pause {} => execute_pause(deps, info),
        ExecuteMsg::Unpause {} => execute_unpause(deps, info),
        ExecuteMsg::ProposeAdmin { new_admin } => execute_propose_admin(deps, env, info, new_admin),
        ExecuteMsg::AcceptAdmin {} => execute_accept_admin(deps, env, info),
        ExecuteMsg::CancelAdminProposal {} => execute_cancel_admin_proposal(deps, info),
    }
}

// ============================================================================
// Reply
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn reply(deps: DepsMut, env: Env, msg: Reply) -> Result<Response, ContractError> {
    match msg.id {
        TWIN_CREATED_REPLY_ID => handle_twin_created(deps, env, msg),
        EXEC_OUTCOME_REPLY_ID => handle_exec_outcome(deps, env, msg),
        id => Err(ContractError::UnknownReplyId { id }),
    }
}

// ============================================================================
// Query
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => to_json_binary(&query_config(deps)?),
        QueryMsg::Status {} => to_json_binary(&query_status(deps)?),
        QueryMsg::Root {} => to_json_binary(&query_root(deps)?),
        QueryMsg::LeafCount {} => to_json_binary(&query_leaf_count(deps)?),
        QueryMsg::Node { index } => to_json_binary(&query_node(deps, index)?),
        QueryMsg::Proof { leaf_index } => to_json_binary(&query_proof(deps, leaf_index)?),
        QueryMsg::VerifyProof {
            leaf,
            leaf_index,
            leaf_count,
            proof,
            root,
        } => to_json_binary(&query_verify_proof(leaf, leaf_index, leaf_count, proof, root)?),
        QueryMsg::MessageStatus { hash } => to_json_binary(&query_message_status(deps, hash)?),
        QueryMsg::LastIncomingNonce {} => to_json_binary(&query_last_incoming_nonce(deps)?),
        QueryMsg::MessageHash { message } => to_json_binary(&query_message_hash(message)?),
        QueryMsg::BatchDigest { messages } => to_json_binary(&query_batch_digest(messages)?),
        QueryMsg::Twin { remote_sender } => to_json_binary(&query_twin(deps, remote_sender)?),
        QueryMsg::TokenPair { remote_token } => {
            to_json_binary(&query_token_pair(deps, remote_token)?)
        }
        QueryMsg::TokenPairs { start_after, limit } => {
            to_json_binary(&query_token_pairs(deps, start_after, limit)?)
        }
        QueryMsg::Validators {} => to_json_binary(&query_validators(deps)?),
        QueryMsg::PendingAdmin {} => to_json_binary(&query_pending_admin(deps)?),
    }
}

// ============================================================================
// Migrate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn migrate(deps: DepsMut, _env: Env, _msg: MigrateMsg) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    Ok(Response::new().add_attribute("method", "migrate"))
}
