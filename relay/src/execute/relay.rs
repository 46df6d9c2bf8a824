//! Inbound relay handlers: trusted batch admission, permissionless
//! retries, and the reply handlers that drive a batch forward.
//!
//! A batch is processed one message at a time. Admission checks run
//! synchronously; the execution of each admitted message is dispatched as
//! a gas-capped submessage with `reply_always`, so a callee failure (or
//! gas exhaustion) rolls back only that sub-transaction while the relay's
//! bookkeeping survives. The queue of not-yet-admitted messages lives in
//! [`RELAY_JOB`] between submessage boundaries, which also makes that
//! record the re-entrancy guard: both entry points refuse to start while
//! it exists, so a malicious callee re-entering mid-batch fails its own
//! sub-transaction and ends up recorded as failed, never double-credited.
//!
//! Error discipline: sequencing violations (wrong nonce, stale
//! resubmission) abort the whole transaction; execution outcomes (callee
//! revert, gas shortfall) are recorded as failed and the batch halts with
//! a normal return so preceding admissions commit.

use cosmwasm_std::{
    from_json, to_json_binary, Binary, Deps, DepsMut, Env, MessageInfo, Reply, Response, StdError,
    Storage, SubMsg, SubMsgResult, Uint128, WasmMsg,
};
use cw_utils::parse_reply_instantiate_data;

use common::{
    TokenPairRegistration, TransferAndCallPayload, TransferPayload, TwinExecuteMsg,
    TwinInstantiateMsg, VaultExecuteMsg,
};

use crate::error::ContractError;
use crate::hash::{batch_digest, bytes32_to_hex, message_hash, to_bytes32};
use crate::msg::{ExecuteMsg, InboundMessage, MessageKind};
use crate::quorum;
use crate::state::{
    Config, CurrentMessage, RelayJob, CALL_OVERHEAD_GAS, CONFIG, ENTRYPOINT_BUFFER_GAS,
    EXEC_OUTCOME_REPLY_ID, FAILED, LAST_INCOMING_NONCE, RELAY_JOB, SUCCEEDED, TOKEN_PAIRS,
    TWINS, TWIN_CREATED_REPLY_ID,
};

/// Gas withheld from every message budget before dispatch
const RESERVED_GAS: u64 = CALL_OVERHEAD_GAS + ENTRYPOINT_BUFFER_GAS;

/// How one admitted message gets executed
enum Dispatch {
    /// Execution submessage is ready
    Ready(WasmMsg),
    /// The sender's twin must be instantiated first
    MissingTwin,
}

// ============================================================================
// Entry Points
// ============================================================================

/// Execute handler for the trusted relay path: verify the signature blob
/// over the batch digest, then admit messages in order under strict nonce
/// sequencing.
pub fn execute_relay_batch(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    messages: Vec<InboundMessage>,
    signatures: Binary,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if config.paused {
        return Err(ContractError::RelayPaused);
    }
    if RELAY_JOB.may_load(deps.storage)?.is_some() {
        return Err(ContractError::RelayInProgress);
    }
    if messages.is_empty() {
        return Err(ContractError::EmptyBatch);
    }

    // one digest over all canonical message hashes, in batch order, so a
    // single signature set authorizes the whole call
    let mut hashes = Vec::with_capacity(messages.len());
    for message in &messages {
        let sender = to_bytes32(&message.sender)?;
        hashes.push(message_hash(
            message.nonce,
            &sender,
            message.kind.tag(),
            &message.payload,
        ));
    }
    let digest = batch_digest(&hashes);
    quorum::verify_batch(deps.as_ref(), &config, &digest, signatures.as_slice())?;

    let job = RelayJob {
        queue: messages,
        current: None,
        trusted: true,
        estimating: info.sender == config.gas_estimator,
    };

    let response = Response::new()
        .add_attribute("method", "relay_batch")
        .add_attribute("messages", job.queue.len().to_string())
        .add_attribute("digest", bytes32_to_hex(&digest));
    process_queue(deps, &env, job, response)
}

/// Execute handler for the permissionless retry path. No signatures and
/// no nonce sequencing: every message must already be recorded failed,
/// which proves it was authorized once.
pub fn execute_retry_failed(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    messages: Vec<InboundMessage>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if config.paused {
        return Err(ContractError::RelayPaused);
    }
    if RELAY_JOB.may_load(deps.storage)?.is_some() {
        return Err(ContractError::RelayInProgress);
    }
    if messages.is_empty() {
        return Err(ContractError::EmptyBatch);
    }

    let job = RelayJob {
        queue: messages,
        current: None,
        trusted: false,
        estimating: info.sender == config.gas_estimator,
    };

    let response = Response::new()
        .add_attribute("method", "retry_failed")
        .add_attribute("messages", job.queue.len().to_string());
    process_queue(deps, &env, job, response)
}

/// Execute handler for the internal transfer-and-call composite: release
/// tokens from the vault to the twin, then forward the call, as two
/// messages inside the one sub-transaction this handler runs in. Either
/// both commit or both revert.
pub fn execute_release_and_forward(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    token: String,
    twin: String,
    amount: Uint128,
    ops: Binary,
) -> Result<Response, ContractError> {
    if info.sender != env.contract.address {
        return Err(ContractError::UnauthorizedInternal);
    }
    let config = CONFIG.load(deps.storage)?;

    let release = WasmMsg::Execute {
        contract_addr: config.vault.to_string(),
        msg: to_json_binary(&VaultExecuteMsg::Release {
            token,
            recipient: twin.clone(),
            amount,
        })?,
        funds: vec![],
    };
    let forward = WasmMsg::Execute {
        contract_addr: twin,
        msg: to_json_binary(&TwinExecuteMsg::Forward { ops })?,
        funds: vec![],
    };

    Ok(Response::new()
        .add_message(release)
        .add_message(forward)
        .add_attribute("method", "release_and_forward"))
}

// ============================================================================
// Reply Handlers
// ============================================================================

/// Reply handler for twin instantiation (reply on success only: a failed
/// instantiation is a configuration fault and reverts the transaction).
/// Caches the new address, then dispatches the execution that was waiting
/// on it.
pub fn handle_twin_created(
    deps: DepsMut,
    env: Env,
    reply: Reply,
) -> Result<Response, ContractError> {
    let job = RELAY_JOB
        .may_load(deps.storage)?
        .ok_or(ContractError::NoActiveRelay)?;
    let current = job
        .current
        .clone()
        .ok_or_else(|| StdError::generic_err("twin reply with no message in flight"))?;

    let created = parse_reply_instantiate_data(reply)?;
    let twin = deps.api.addr_validate(&created.contract_address)?;
    TWINS.save(deps.storage, current.message.sender.as_slice(), &twin)?;

    let hash = to_bytes32(&current.hash)?;
    let hash_hex = bytes32_to_hex(&hash);
    let response = Response::new()
        .add_attribute("action", "twin_created")
        .add_attribute("twin", twin)
        .add_attribute("remote_sender", current.message.sender.to_base64());

    let config = CONFIG.load(deps.storage)?;
    match plan_execution(deps.as_ref(), &env, &config, &current.message) {
        Err(reason) => finish_failed(deps.storage, job.estimating, &hash, reason, response),
        Ok(Dispatch::MissingTwin) => {
            Err(StdError::generic_err("twin missing after instantiation").into())
        }
        Ok(Dispatch::Ready(msg)) => {
            let gas = current.message.gas_limit - RESERVED_GAS;
            let submsg = SubMsg::reply_always(msg, EXEC_OUTCOME_REPLY_ID).with_gas_limit(gas);
            Ok(response
                .add_attribute("message_hash", hash_hex)
                .add_submessage(submsg))
        }
    }
}

/// Reply handler for one execution outcome. Success records the message
/// and continues the batch; failure records it and halts so nonce order
/// is preserved for whatever follows.
pub fn handle_exec_outcome(
    deps: DepsMut,
    env: Env,
    reply: Reply,
) -> Result<Response, ContractError> {
    let mut job = RELAY_JOB
        .may_load(deps.storage)?
        .ok_or(ContractError::NoActiveRelay)?;
    let current = job
        .current
        .take()
        .ok_or_else(|| StdError::generic_err("execution reply with no message in flight"))?;
    let hash = to_bytes32(&current.hash)?;

    match reply.result {
        SubMsgResult::Ok(_) => {
            SUCCEEDED.save(deps.storage, &hash, &true)?;
            FAILED.remove(deps.storage, &hash);
            let response = Response::new()
                .add_attribute("action", "message_succeeded")
                .add_attribute("message_hash", bytes32_to_hex(&hash));
            process_queue(deps, &env, job, response)
        }
        SubMsgResult::Err(err) => {
            finish_failed(deps.storage, job.estimating, &hash, err, Response::new())
        }
    }
}

// ============================================================================
// Batch Processing
// ============================================================================

/// Admit queued messages until one needs a submessage (then stop and wait
/// for its reply) or the queue drains. Registration messages complete
/// inline. Consumes the queue front to back; order is significant.
fn process_queue(
    deps: DepsMut,
    env: &Env,
    mut job: RelayJob,
    mut response: Response,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;

    while !job.queue.is_empty() {
        let message = job.queue.remove(0);
        let sender = to_bytes32(&message.sender)?;
        let hash = message_hash(message.nonce, &sender, message.kind.tag(), &message.payload);
        let hash_hex = bytes32_to_hex(&hash);

        // a message that already went through never goes through again
        if SUCCEEDED.has(deps.storage, &hash) {
            return Err(ContractError::AlreadySucceeded { hash: hash_hex });
        }

        if job.trusted {
            let last = LAST_INCOMING_NONCE.may_load(deps.storage)?.unwrap_or(0);
            if message.nonce != last + 1 {
                return Err(ContractError::NonceNotIncremental {
                    expected: last + 1,
                    got: message.nonce,
                });
            }
            // the trusted path never retries; failed messages must come
            // back through RetryFailed
            if FAILED.has(deps.storage, &hash) {
                return Err(ContractError::AlreadyFailed { hash: hash_hex });
            }
            LAST_INCOMING_NONCE.save(deps.storage, &message.nonce)?;
        } else if !FAILED.has(deps.storage, &hash) {
            return Err(ContractError::NotPreviouslyFailed { hash: hash_hex });
        }

        // messages from the remote gateway itself carry token-pair
        // registrations and complete inline, no twin and no gas budget
        if message.sender == config.remote_gateway {
            match register_token_pair(deps.storage, &message.payload) {
                Ok((remote_token, local_token)) => {
                    SUCCEEDED.save(deps.storage, &hash, &true)?;
                    FAILED.remove(deps.storage, &hash);
                    response = response
                        .add_attribute("action", "pair_registered")
                        .add_attribute("message_hash", hash_hex)
                        .add_attribute("remote_token", remote_token)
                        .add_attribute("local_token", local_token);
                    continue;
                }
                Err(reason) => {
                    return finish_failed(deps.storage, job.estimating, &hash, reason, response);
                }
            }
        }

        // the budget must cover dispatch overhead plus the entry point
        // itself before any execution is attempted
        if message.gas_limit < RESERVED_GAS {
            let reason = format!(
                "insufficient gas: limit {} below reserved {}",
                message.gas_limit, RESERVED_GAS
            );
            return finish_failed(deps.storage, job.estimating, &hash, reason, response);
        }

        match plan_execution(deps.as_ref(), env, &config, &message) {
            Err(reason) => {
                return finish_failed(deps.storage, job.estimating, &hash, reason, response);
            }
            Ok(Dispatch::MissingTwin) => {
                let submsg = instantiate_twin_submsg(env, &config, &message)?;
                response = response
                    .add_attribute("action", "twin_instantiating")
                    .add_attribute("remote_sender", message.sender.to_base64());
                job.current = Some(CurrentMessage {
                    message,
                    hash: Binary::from(hash),
                });
                RELAY_JOB.save(deps.storage, &job)?;
                return Ok(response.add_submessage(submsg));
            }
            Ok(Dispatch::Ready(msg)) => {
                let gas = message.gas_limit - RESERVED_GAS;
                let submsg = SubMsg::reply_always(msg, EXEC_OUTCOME_REPLY_ID).with_gas_limit(gas);
                job.current = Some(CurrentMessage {
                    message,
                    hash: Binary::from(hash),
                });
                RELAY_JOB.save(deps.storage, &job)?;
                return Ok(response
                    .add_attribute("action", "message_dispatched")
                    .add_attribute("message_hash", hash_hex)
                    .add_submessage(submsg));
            }
        }
    }

    // queue drained: the batch is complete and the guard comes down
    RELAY_JOB.remove(deps.storage);
    Ok(response.add_attribute("action", "batch_complete"))
}

/// Record an execution failure and halt the batch. The failed marker
/// opens the message for permissionless retry. In gas-estimation mode the
/// failure is converted into an error instead, so the estimator can
/// distinguish "executed" from "needs more gas" by transaction outcome.
fn finish_failed(
    storage: &mut dyn Storage,
    estimating: bool,
    hash: &[u8; 32],
    reason: String,
    response: Response,
) -> Result<Response, ContractError> {
    FAILED.save(storage, hash, &true)?;
    let hash_hex = bytes32_to_hex(hash);
    if estimating {
        return Err(ContractError::GasEstimationFailed {
            hash: hash_hex,
            reason,
        });
    }
    RELAY_JOB.remove(storage);
    Ok(response
        .add_attribute("action", "message_failed")
        .add_attribute("message_hash", hash_hex)
        .add_attribute("reason", reason))
}

// ============================================================================
// Execution Planning
// ============================================================================

/// Build the execution submessage for one admitted message, or report
/// that the sender's twin is still missing. Every error here is an
/// execution-class failure (recorded, retryable), not a batch abort.
fn plan_execution(
    deps: Deps,
    env: &Env,
    config: &Config,
    message: &InboundMessage,
) -> Result<Dispatch, String> {
    match message.kind {
        MessageKind::Call => {
            let twin = TWINS
                .may_load(deps.storage, message.sender.as_slice())
                .map_err(|e| e.to_string())?;
            match twin {
                None => Ok(Dispatch::MissingTwin),
                Some(twin) => {
                    // the payload is the twin's op list, passed through opaquely
                    let msg = WasmMsg::Execute {
                        contract_addr: twin.into_string(),
                        msg: to_json_binary(&TwinExecuteMsg::Forward {
                            ops: message.payload.clone(),
                        })
                        .map_err(|e| e.to_string())?,
                        funds: vec![],
                    };
                    Ok(Dispatch::Ready(msg))
                }
            }
        }
        MessageKind::Transfer => {
            let payload: TransferPayload =
                from_json(&message.payload).map_err(|e| e.to_string())?;
            let token = resolve_token(deps, &payload.token)?;
            let recipient = decode_recipient(deps, &payload.recipient)?;
            let msg = WasmMsg::Execute {
                contract_addr: config.vault.to_string(),
                msg: to_json_binary(&VaultExecuteMsg::Release {
                    token,
                    recipient,
                    amount: payload.amount,
                })
                .map_err(|e| e.to_string())?,
                funds: vec![],
            };
            Ok(Dispatch::Ready(msg))
        }
        MessageKind::TransferAndCall => {
            let payload: TransferAndCallPayload =
                from_json(&message.payload).map_err(|e| e.to_string())?;
            let token = resolve_token(deps, &payload.token)?;
            let twin = TWINS
                .may_load(deps.storage, message.sender.as_slice())
                .map_err(|e| e.to_string())?;
            match twin {
                None => Ok(Dispatch::MissingTwin),
                Some(twin) => {
                    // self-call wrapper keeps release and call atomic
                    let msg = WasmMsg::Execute {
                        contract_addr: env.contract.address.to_string(),
                        msg: to_json_binary(&ExecuteMsg::ReleaseAndForward {
                            token,
                            twin: twin.into_string(),
                            amount: payload.amount,
                            ops: payload.ops,
                        })
                        .map_err(|e| e.to_string())?,
                        funds: vec![],
                    };
                    Ok(Dispatch::Ready(msg))
                }
            }
        }
    }
}

/// Deterministic twin instantiation: the 32-byte sender id is the salt,
/// so the twin address is a pure function of sender and code id. The
/// actual address is captured from the reply.
fn instantiate_twin_submsg(
    env: &Env,
    config: &Config,
    message: &InboundMessage,
) -> Result<SubMsg, ContractError> {
    let sender = to_bytes32(&message.sender)?;
    let msg = WasmMsg::Instantiate2 {
        admin: Some(env.contract.address.to_string()),
        code_id: config.twin_code_id,
        label: format!("relay twin {}", bytes32_to_hex(&sender)),
        msg: to_json_binary(&TwinInstantiateMsg {
            remote_sender: message.sender.clone(),
        })?,
        funds: vec![],
        salt: message.sender.clone(),
    };
    Ok(SubMsg::reply_on_success(msg, TWIN_CREATED_REPLY_ID))
}

fn register_token_pair(
    storage: &mut dyn Storage,
    payload: &Binary,
) -> Result<(String, String), String> {
    let reg: TokenPairRegistration = from_json(payload).map_err(|e| e.to_string())?;
    let remote: [u8; 32] = reg
        .remote_token
        .as_slice()
        .try_into()
        .map_err(|_| format!("invalid token id length: {}", reg.remote_token.len()))?;
    // the local side may be a native denom, so no address validation here;
    // a bad registration surfaces at release time and stays retryable
    TOKEN_PAIRS
        .save(storage, &remote, &reg.local_token)
        .map_err(|e| e.to_string())?;
    Ok((bytes32_to_hex(&remote), reg.local_token))
}

fn resolve_token(deps: Deps, remote_token: &Binary) -> Result<String, String> {
    let key: [u8; 32] = remote_token
        .as_slice()
        .try_into()
        .map_err(|_| format!("invalid token id length: {}", remote_token.len()))?;
    TOKEN_PAIRS
        .may_load(deps.storage, &key)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("token not registered: {}", bytes32_to_hex(&key)))
}

fn decode_recipient(deps: Deps, recipient: &Binary) -> Result<String, String> {
    let s = String::from_utf8(recipient.to_vec()).map_err(|_| "recipient not utf-8".to_string())?;
    let addr = deps.api.addr_validate(&s).map_err(|e| e.to_string())?;
    Ok(addr.into_string())
}
