//! Admin operations handlers.
//!
//! This module handles:
//! - Pause/unpause
//! - Admin transfer (propose/accept/cancel, 7-day timelock)
//! - Validator set management for both quorums
//! - Threshold and twin code id updates

use cosmwasm_std::{DepsMut, Env, MessageInfo, Response};

use crate::error::ContractError;
use crate::hash::{bytes20_to_hex, hex_to_bytes20};
use crate::state::{
    PendingAdmin, ADMIN_TIMELOCK_DURATION, CONFIG, PARTNER_VALIDATORS, PARTNER_VALIDATOR_COUNT,
    PENDING_ADMIN, PRIMARY_VALIDATORS, PRIMARY_VALIDATOR_COUNT,
};

// ============================================================================
// Pause/Unpause
// ============================================================================

/// Pause the relay (stops outbound commits and inbound admission).
pub fn execute_pause(deps: DepsMut, info: MessageInfo) -> Result<Response, ContractError> {
    let mut config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    config.paused = true;
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::new().add_attribute("method", "pause"))
}

/// Unpause the relay.
pub fn execute_unpause(deps: DepsMut, info: MessageInfo) -> Result<Response, ContractError> {
    let mut config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    config.paused = false;
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::new().add_attribute("method", "unpause"))
}

// ============================================================================
// Admin Transfer
// ============================================================================

/// Propose a new admin (starts timelock).
pub fn execute_propose_admin(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    new_admin: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    let new_admin_addr = deps.api.addr_validate(&new_admin)?;
    let pending = PendingAdmin {
        new_admin: new_admin_addr.clone(),
        execute_after: env.block.time.plus_seconds(ADMIN_TIMELOCK_DURATION),
    };
    PENDING_ADMIN.save(deps.storage, &pending)?;

    Ok(Response::new()
        .add_attribute("method", "propose_admin")
        .add_attribute("new_admin", new_admin_addr.to_string())
        .add_attribute("execute_after", pending.execute_after.seconds().to_string()))
}

/// Accept pending admin role (after timelock).
pub fn execute_accept_admin(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    let pending = PENDING_ADMIN
        .may_load(deps.storage)?
        .ok_or(ContractError::NoPendingAdmin)?;

    if info.sender != pending.new_admin {
        return Err(ContractError::UnauthorizedPendingAdmin);
    }

    if env.block.time < pending.execute_after {
        let remaining = pending.execute_after.seconds() - env.block.time.seconds();
        return Err(ContractError::TimelockNotExpired {
            remaining_seconds: remaining,
        });
    }

    let mut config = CONFIG.load(deps.storage)?;
    config.admin = pending.new_admin.clone();
    CONFIG.save(deps.storage, &config)?;
    PENDING_ADMIN.remove(deps.storage);

    Ok(Response::new()
        .add_attribute("method", "accept_admin")
        .add_attribute("new_admin", pending.new_admin.to_string()))
}

/// Cancel pending admin proposal.
pub fn execute_cancel_admin_proposal(
    deps: DepsMut,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    PENDING_ADMIN.remove(deps.storage);

    Ok(Response::new().add_attribute("method", "cancel_admin_proposal"))
}

// ============================================================================
// Validator Management
// ============================================================================

/// Add a signer to the primary validator set.
pub fn execute_add_primary_validator(
    deps: DepsMut,
    info: MessageInfo,
    address: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    let signer = hex_to_bytes20(&address)?;
    if PRIMARY_VALIDATORS.has(deps.storage, &signer) {
        return Err(ContractError::DuplicateValidator { address });
    }
    if PARTNER_VALIDATORS.has(deps.storage, &signer) {
        return Err(ContractError::ValidatorSetOverlap { address });
    }

    PRIMARY_VALIDATORS.save(deps.storage, &signer, &true)?;
    let count = PRIMARY_VALIDATOR_COUNT.may_load(deps.storage)?.unwrap_or(0) + 1;
    PRIMARY_VALIDATOR_COUNT.save(deps.storage, &count)?;

    Ok(Response::new()
        .add_attribute("method", "add_primary_validator")
        .add_attribute("validator", bytes20_to_hex(&signer)))
}

/// Remove a signer from the primary validator set. Refused if the set
/// would drop below the primary threshold.
pub fn execute_remove_primary_validator(
    deps: DepsMut,
    info: MessageInfo,
    address: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    let signer = hex_to_bytes20(&address)?;
    if !PRIMARY_VALIDATORS.has(deps.storage, &signer) {
        return Err(ContractError::ValidatorNotFound { address });
    }

    let count = PRIMARY_VALIDATOR_COUNT
        .may_load(deps.storage)?
        .unwrap_or(0)
        .saturating_sub(1);
    if count < config.primary_threshold {
        return Err(ContractError::ThresholdExceedsValidators {
            threshold: config.primary_threshold,
            validators: count,
        });
    }

    PRIMARY_VALIDATORS.remove(deps.storage, &signer);
    PRIMARY_VALIDATOR_COUNT.save(deps.storage, &count)?;

    Ok(Response::new()
        .add_attribute("method", "remove_primary_validator")
        .add_attribute("validator", bytes20_to_hex(&signer)))
}

/// Add a signer to the partner validator set.
pub fn execute_add_partner_validator(
    deps: DepsMut,
    info: MessageInfo,
    address: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    let signer = hex_to_bytes20(&address)?;
    if PARTNER_VALIDATORS.has(deps.storage, &signer) {
        return Err(ContractError::DuplicateValidator { address });
    }
    if PRIMARY_VALIDATORS.has(deps.storage, &signer) {
        return Err(ContractError::ValidatorSetOverlap { address });
    }

    PARTNER_VALIDATORS.save(deps.storage, &signer, &true)?;
    let count = PARTNER_VALIDATOR_COUNT.may_load(deps.storage)?.unwrap_or(0) + 1;
    PARTNER_VALIDATOR_COUNT.save(deps.storage, &count)?;

    Ok(Response::new()
        .add_attribute("method", "add_partner_validator")
        .add_attribute("validator", bytes20_to_hex(&signer)))
}

/// Remove a signer from the partner validator set. Refused if the set
/// would drop below the partner threshold.
pub fn execute_remove_partner_validator(
    deps: DepsMut,
    info: MessageInfo,
    address: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    let signer = hex_to_bytes20(&address)?;
    if !PARTNER_VALIDATORS.has(deps.storage, &signer) {
        return Err(ContractError::ValidatorNotFound { address });
    }

    let count = PARTNER_VALIDATOR_COUNT
        .may_load(deps.storage)?
        .unwrap_or(0)
        .saturating_sub(1);
    if count < config.partner_threshold {
        return Err(ContractError::ThresholdExceedsValidators {
            threshold: config.partner_threshold,
            validators: count,
        });
    }

    PARTNER_VALIDATORS.remove(deps.storage, &signer);
    PARTNER_VALIDATOR_COUNT.save(deps.storage, &count)?;

    Ok(Response::new()
        .add_attribute("method", "remove_partner_validator")
        .add_attribute("validator", bytes20_to_hex(&signer)))
}

/// Update both quorum thresholds. A zero primary threshold disables
/// signature protection entirely, so it is only accepted while paused.
pub fn execute_set_thresholds(
    deps: DepsMut,
    info: MessageInfo,
    primary: u32,
    partner: u32,
) -> Result<Response, ContractError> {
    let mut config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    if primary == 0 && !config.paused {
        return Err(ContractError::ZeroThreshold);
    }

    let primary_validators = PRIMARY_VALIDATOR_COUNT.may_load(deps.storage)?.unwrap_or(0);
    if primary > primary_validators {
        return Err(ContractError::ThresholdExceedsValidators {
            threshold: primary,
            validators: primary_validators,
        });
    }

    let partner_validators = PARTNER_VALIDATOR_COUNT.may_load(deps.storage)?.unwrap_or(0);
    if partner > partner_validators {
        return Err(ContractError::ThresholdExceedsValidators {
            threshold: partner,
            validators: partner_validators,
        });
    }

    config.primary_threshold = primary;
    config.partner_threshold = partner;
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::new()
        .add_attribute("method", "set_thresholds")
        .add_attribute("primary", primary.to_string())
        .add_attribute("partner", partner.to_string()))
}

// ============================================================================
// Configuration
// ============================================================================

/// Update the code id used for future twin instantiations. Already
/// instantiated twins keep their code.
pub fn execute_set_twin_code_id(
    deps: DepsMut,
    info: MessageInfo,
    code_id: u64,
) -> Result<Response, ContractError> {
    let mut config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }

    config.twin_code_id = code_id;
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::new()
        .add_attribute("method", "set_twin_code_id")
        .add_attribute("code_id", code_id.to_string()))
}
