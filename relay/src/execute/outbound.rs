//! Outbound gateway handlers (SendMessage, SendTokens, Receive).
//!
//! Every outbound operation reduces to one accumulator append: compute the
//! leaf hash over (nonce, sender id, payload), commit it, and emit the
//! attributes relayers mirror to the remote ledger. Token deposits
//! additionally forward the funds to the vault; the relay itself never
//! holds balances.

use cosmwasm_std::{
    from_json, to_json_binary, BankMsg, Binary, CosmosMsg, DepsMut, Env, MessageInfo, Response,
    WasmMsg,
};
use cw20::{Cw20ExecuteMsg, Cw20ReceiveMsg};
use cw_utils::{nonpayable, one_coin};

use common::TransferPayload;

use crate::error::ContractError;
use crate::hash::{bytes32_to_hex, encode_account, encode_token, leaf_hash};
use crate::mmr;
use crate::msg::ReceiveMsg;
use crate::state::{CONFIG, LEAF_COUNT};

/// Execute handler for committing a plain outbound message
pub fn execute_send_message(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    payload: Binary,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if config.paused {
        return Err(ContractError::RelayPaused);
    }
    nonpayable(&info)?;

    let sender_id = encode_account(deps.api, &info.sender)?;
    let sender = info.sender.to_string();
    commit_leaf(deps, &sender, sender_id, payload, Vec::new(), "send_message")
}

/// Execute handler for committing an outbound native-token transfer.
/// Exactly one coin must be attached; it is forwarded to the vault.
pub fn execute_send_tokens(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    remote_recipient: Binary,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if config.paused {
        return Err(ContractError::RelayPaused);
    }
    let coin = one_coin(&info)?;

    let payload = to_json_binary(&TransferPayload {
        token: Binary::from(encode_token(&coin.denom)),
        recipient: remote_recipient,
        amount: coin.amount,
    })?;

    // custody moves to the vault in the same transaction as the commit
    let forward = CosmosMsg::Bank(BankMsg::Send {
        to_address: config.vault.to_string(),
        amount: vec![coin.clone()],
    });

    let sender_id = encode_account(deps.api, &info.sender)?;
    let sender = info.sender.to_string();
    let response = commit_leaf(deps, &sender, sender_id, payload, vec![forward], "send_tokens")?;
    Ok(response
        .add_attribute("token", coin.denom)
        .add_attribute("amount", coin.amount.to_string()))
}

/// Execute handler for the CW20 deposit hook. `info.sender` is the CW20
/// contract that invoked the hook; the depositor is inside the wrapper.
pub fn execute_receive(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    cw20_msg: Cw20ReceiveMsg,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if config.paused {
        return Err(ContractError::RelayPaused);
    }

    let token = info.sender;
    let depositor = deps.api.addr_validate(&cw20_msg.sender)?;

    match from_json(&cw20_msg.msg)? {
        ReceiveMsg::SendTokens { remote_recipient } => {
            let payload = to_json_binary(&TransferPayload {
                token: Binary::from(encode_token(token.as_str())),
                recipient: remote_recipient,
                amount: cw20_msg.amount,
            })?;

            let forward = CosmosMsg::Wasm(WasmMsg::Execute {
                contract_addr: token.to_string(),
                msg: to_json_binary(&Cw20ExecuteMsg::Transfer {
                    recipient: config.vault.to_string(),
                    amount: cw20_msg.amount,
                })?,
                funds: vec![],
            });

            let sender_id = encode_account(deps.api, &depositor)?;
            let sender = depositor.to_string();
            let response =
                commit_leaf(deps, &sender, sender_id, payload, vec![forward], "send_tokens")?;
            Ok(response
                .add_attribute("token", token)
                .add_attribute("amount", cw20_msg.amount.to_string()))
        }
    }
}

/// Append one leaf and emit the attributes relayers need to reconstruct
/// it: nonce, sender id, payload, leaf hash, and the new root.
fn commit_leaf(
    deps: DepsMut,
    sender: &str,
    sender_id: [u8; 32],
    payload: Binary,
    messages: Vec<CosmosMsg>,
    method: &str,
) -> Result<Response, ContractError> {
    // the next leaf index doubles as the outbound nonce
    let nonce = LEAF_COUNT.may_load(deps.storage)?.unwrap_or(0);
    let leaf = leaf_hash(nonce, &sender_id, payload.as_slice());
    let (_, root) = mmr::append(deps.storage, leaf)?;

    Ok(Response::new()
        .add_messages(messages)
        .add_attribute("method", method)
        .add_attribute("nonce", nonce.to_string())
        .add_attribute("sender", sender.to_string())
        .add_attribute("sender_id", bytes32_to_hex(&sender_id))
        .add_attribute("payload", payload.to_base64())
        .add_attribute("leaf_hash", bytes32_to_hex(&leaf))
        .add_attribute("root", bytes32_to_hex(&root)))
}
