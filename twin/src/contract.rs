use cosmwasm_std::{
    entry_point, from_json, to_json_binary, BankMsg, Binary, CosmosMsg, Deps, DepsMut, Env,
    MessageInfo, Response, StdResult, WasmMsg,
};
use cw2::set_contract_version;

use common::{TwinExecuteMsg, TwinInstantiateMsg, TwinOp};

use crate::error::ContractError;
use crate::msg::{OwnerResponse, QueryMsg, RemoteSenderResponse};
use crate::state::{CONTRACT_NAME, CONTRACT_VERSION, OWNER, REMOTE_SENDER};

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    msg: TwinInstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    // the instantiator is the relay; only it may forward operations
    OWNER.save(deps.storage, &info.sender)?;
    REMOTE_SENDER.save(deps.storage, &msg.remote_sender)?;

    Ok(Response::new()
        .add_attribute("action", "instantiate")
        .add_attribute("owner", info.sender)
        .add_attribute("remote_sender", msg.remote_sender.to_base64()))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: TwinExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        TwinExecuteMsg::Forward { ops } => execute_forward(deps, env, info, ops),
    }
}

fn execute_forward(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    ops: Binary,
) -> Result<Response, ContractError> {
    let owner = OWNER.load(deps.storage)?;
    if info.sender != owner && info.sender != env.contract.address {
        return Err(ContractError::Unauthorized);
    }

    let ops: Vec<TwinOp> = from_json(&ops)?;
    let messages: Vec<CosmosMsg> = ops.into_iter().map(into_cosmos_msg).collect();

    Ok(Response::new()
        .add_messages(messages)
        .add_attribute("action", "forward"))
}

/// Each op maps to one native message; any failure inside reverts the
/// whole forward and surfaces as the submessage error the relay records.
fn into_cosmos_msg(op: TwinOp) -> CosmosMsg {
    match op {
        TwinOp::Send { to, amount } => CosmosMsg::Bank(BankMsg::Send {
            to_address: to,
            amount,
        }),
        TwinOp::Execute {
            contract,
            msg,
            funds,
        } => CosmosMsg::Wasm(WasmMsg::Execute {
            contract_addr: contract,
            msg,
            funds,
        }),
        TwinOp::Instantiate {
            code_id,
            msg,
            funds,
            label,
        } => CosmosMsg::Wasm(WasmMsg::Instantiate {
            admin: None,
            code_id,
            msg,
            funds,
            label,
        }),
        TwinOp::Instantiate2 {
            code_id,
            msg,
            funds,
            label,
            salt,
        } => CosmosMsg::Wasm(WasmMsg::Instantiate2 {
            admin: None,
            code_id,
            msg,
            funds,
            label,
            salt,
        }),
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Owner {} => to_json_binary(&OwnerResponse {
            owner: OWNER.load(deps.storage)?,
        }),
        QueryMsg::RemoteSender {} => to_json_binary(&RemoteSenderResponse {
            remote_sender: REMOTE_SENDER.load(deps.storage)?,
        }),
    }
}
