//! Inbound relay integration tests using cw-multi-test.
//!
//! Drives the full batch machine through real submessage dispatch:
//! - trusted admission with dual-quorum signatures and strict nonces
//! - lazy twin instantiation at deterministic addresses
//! - gas reservation, recorded failures, and permissionless retries
//! - gas-estimation mode aborting distinguishably
//! - token-pair registration from the remote gateway
//! - vault releases and the transfer-and-call composite
//! - the re-entrancy guard
//!
//! Twin creation uses `WasmMsg::Instantiate2`, so the app is built with
//! the bech32 api and the predictable address generator instead of the
//! plain mock api (which cannot humanize salted addresses).

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    coins, to_json_binary, Addr, BankMsg, Binary, DepsMut, Empty, Env, MessageInfo, Response,
    StdError, StdResult, Uint128,
};
use cw_multi_test::{
    App, AppBuilder, AppResponse, BankKeeper, ContractWrapper, Executor, MockAddressGenerator,
    MockApiBech32, WasmKeeper,
};
use cw_storage_plus::Item;
use k256::ecdsa::SigningKey;

use common::{
    TokenPairRegistration, TransferAndCallPayload, TransferPayload, TwinOp, VaultExecuteMsg,
};
use relay::hash::{batch_digest, bytes20_to_hex, bytes32_to_hex, keccak256, message_hash};
use relay::msg::{
    ExecuteMsg, InboundMessage, InstantiateMsg, LeafCountResponse, MessageKind,
    MessageStatusResponse, NonceResponse, QueryMsg, TokenPairResponse, TokenPairsResponse,
    TwinResponse,
};
use twin::msg::{OwnerResponse, QueryMsg as TwinQueryMsg, RemoteSenderResponse};

type TestApp = App<BankKeeper, MockApiBech32>;

/// Comfortable budget well above the reserved overhead
const GAS_OK: u64 = 1_000_000;
/// Below the 150k reservation, so admission records a failure
const GAS_LOW: u64 = 100_000;

// ============================================================================
// Signing Helpers
// ============================================================================

fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32].into()).unwrap()
}

fn signer_address(key: &SigningKey) -> [u8; 20] {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    addr
}

fn signer_hex(key: &SigningKey) -> String {
    bytes20_to_hex(&signer_address(key))
}

fn sign(key: &SigningKey, digest: &[u8; 32]) -> [u8; 65] {
    let (sig, recid) = key.sign_prehash_recoverable(digest).unwrap();
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = recid.to_byte() + 27;
    out
}

/// Concatenate signatures with signers in ascending address order
fn sign_batch(keys: &[&SigningKey], digest: &[u8; 32]) -> Binary {
    let mut ordered: Vec<&SigningKey> = keys.to_vec();
    ordered.sort_by_key(|k| signer_address(k));
    let mut blob = Vec::with_capacity(ordered.len() * 65);
    for key in ordered {
        blob.extend_from_slice(&sign(key, digest));
    }
    Binary::from(blob)
}

fn primary_keys() -> Vec<SigningKey> {
    vec![signing_key(1), signing_key(2), signing_key(3)]
}

fn partner_keys() -> Vec<SigningKey> {
    vec![signing_key(8), signing_key(9)]
}

fn msg_hash(message: &InboundMessage) -> [u8; 32] {
    let sender: [u8; 32] = message.sender.as_slice().try_into().unwrap();
    message_hash(message.nonce, &sender, message.kind.tag(), &message.payload)
}

fn digest_of(messages: &[InboundMessage]) -> [u8; 32] {
    let hashes: Vec<[u8; 32]> = messages.iter().map(msg_hash).collect();
    batch_digest(&hashes)
}

/// A batch signed by two primary validators and one partner (meets the
/// 2-of-3 / 1-of-2 setup thresholds)
fn signed_batch(messages: Vec<InboundMessage>) -> ExecuteMsg {
    let primary = primary_keys();
    let partner = partner_keys();
    let digest = digest_of(&messages);
    let signatures = sign_batch(&[&primary[0], &primary[1], &partner[0]], &digest);
    ExecuteMsg::RelayBatch {
        messages,
        signatures,
    }
}

// ============================================================================
// Mock Collaborators
// ============================================================================

// Vault mock: releases native denoms from its own balance. Enough for
// relay tests; custody rules live in the real vault.
fn vault_execute(
    _deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: VaultExecuteMsg,
) -> StdResult<Response> {
    match msg {
        VaultExecuteMsg::Release {
            token,
            recipient,
            amount,
        } => Ok(Response::new()
            .add_message(BankMsg::Send {
                to_address: recipient,
                amount: coins(amount.u128(), token),
            })
            .add_attribute("action", "release")),
    }
}

fn vault_instantiate(
    _deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    _msg: Empty,
) -> StdResult<Response> {
    Ok(Response::new())
}

fn vault_query(_deps: cosmwasm_std::Deps, _env: Env, _msg: Empty) -> StdResult<Binary> {
    to_json_binary(&Empty {})
}

fn contract_vault() -> Box<dyn cw_multi_test::Contract<Empty>> {
    Box::new(ContractWrapper::new(
        vault_execute,
        vault_instantiate,
        vault_query,
    ))
}

// Target mock: a callee with a counter, an unconditional failure, and a
// gate that makes failures transient.
#[cw_serde]
enum TargetExecuteMsg {
    Ping {},
    Fail {},
    Open {},
    Hit {},
}

#[cw_serde]
enum TargetQueryMsg {
    Count {},
}

#[cw_serde]
struct CountResponse {
    count: u64,
}

const COUNT: Item<u64> = Item::new("count");
const GATE: Item<bool> = Item::new("gate");

fn target_instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    _msg: Empty,
) -> StdResult<Response> {
    COUNT.save(deps.storage, &0)?;
    GATE.save(deps.storage, &false)?;
    Ok(Response::new())
}

fn target_execute(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: TargetExecuteMsg,
) -> StdResult<Response> {
    match msg {
        TargetExecuteMsg::Ping {} => {
            let count = COUNT.load(deps.storage)? + 1;
            COUNT.save(deps.storage, &count)?;
            Ok(Response::new())
        }
        TargetExecuteMsg::Fail {} => Err(StdError::generic_err("target says no")),
        TargetExecuteMsg::Open {} => {
            GATE.save(deps.storage, &true)?;
            Ok(Response::new())
        }
        TargetExecuteMsg::Hit {} => {
            if !GATE.load(deps.storage)? {
                return Err(StdError::generic_err("gate closed"));
            }
            let count = COUNT.load(deps.storage)? + 1;
            COUNT.save(deps.storage, &count)?;
            Ok(Response::new())
        }
    }
}

fn target_query(deps: cosmwasm_std::Deps, _env: Env, msg: TargetQueryMsg) -> StdResult<Binary> {
    match msg {
        TargetQueryMsg::Count {} => to_json_binary(&CountResponse {
            count: COUNT.load(deps.storage)?,
        }),
    }
}

fn contract_target() -> Box<dyn cw_multi_test::Contract<Empty>> {
    Box::new(ContractWrapper::new(
        target_execute,
        target_instantiate,
        target_query,
    ))
}

fn contract_relay() -> Box<dyn cw_multi_test::Contract<Empty>> {
    let contract = ContractWrapper::new(
        relay::contract::execute,
        relay::contract::instantiate,
        relay::contract::query,
    )
    .with_reply(relay::contract::reply);
    Box::new(contract)
}

fn contract_twin() -> Box<dyn cw_multi_test::Contract<Empty>> {
    Box::new(ContractWrapper::new(
        twin::contract::execute,
        twin::contract::instantiate,
        twin::contract::query,
    ))
}

// ============================================================================
// Test Setup
// ============================================================================

struct TestEnv {
    app: TestApp,
    relay: Addr,
    vault: Addr,
    target: Addr,
    admin: Addr,
    user: Addr,
    estimator: Addr,
    alice: Addr,
    remote_gateway: Binary,
}

fn setup() -> TestEnv {
    let api = MockApiBech32::new("terra");
    let admin = api.addr_make("admin");
    let user = api.addr_make("user");
    let estimator = api.addr_make("estimator");
    let alice = api.addr_make("alice");

    let mut app = AppBuilder::default()
        .with_api(api)
        .with_wasm(WasmKeeper::new().with_address_generator(MockAddressGenerator))
        .build(|_, _, _| {});

    app.init_modules(|router, _, storage| {
        router
            .bank
            .init_balance(storage, &user, coins(10_000_000_000, "uluna"))
            .unwrap();
    });

    let relay_code = app.store_code(contract_relay());
    let twin_code = app.store_code(contract_twin());
    let vault_code = app.store_code(contract_vault());
    let target_code = app.store_code(contract_target());

    let vault = app
        .instantiate_contract(vault_code, admin.clone(), &Empty {}, &[], "vault", None)
        .unwrap();
    let target = app
        .instantiate_contract(target_code, admin.clone(), &Empty {}, &[], "target", None)
        .unwrap();

    let remote_gateway = Binary::from([0xEE; 32]);
    let relay = app
        .instantiate_contract(
            relay_code,
            admin.clone(),
            &InstantiateMsg {
                admin: admin.to_string(),
                vault: vault.to_string(),
                twin_code_id: twin_code,
                remote_gateway: remote_gateway.clone(),
                gas_estimator: estimator.to_string(),
                primary_validators: primary_keys().iter().map(signer_hex).collect(),
                primary_threshold: 2,
                partner_validators: partner_keys().iter().map(signer_hex).collect(),
                partner_threshold: 1,
            },
            &[],
            "ledger-relay",
            Some(admin.to_string()),
        )
        .unwrap();

    // inbound releases draw from the vault's liquidity
    app.init_modules(|router, _, storage| {
        router
            .bank
            .init_balance(storage, &vault, coins(1_000_000_000, "uluna"))
            .unwrap();
    });

    TestEnv {
        app,
        relay,
        vault,
        target,
        admin,
        user,
        estimator,
        alice,
        remote_gateway,
    }
}

// ============================================================================
// Message Builders
// ============================================================================

fn ping_ops(env: &TestEnv) -> Binary {
    to_json_binary(&vec![TwinOp::Execute {
        contract: env.target.to_string(),
        msg: to_json_binary(&TargetExecuteMsg::Ping {}).unwrap(),
        funds: vec![],
    }])
    .unwrap()
}

fn call_message(nonce: u64, sender: [u8; 32], gas_limit: u64, ops: Binary) -> InboundMessage {
    InboundMessage {
        nonce,
        sender: Binary::from(sender),
        gas_limit,
        kind: MessageKind::Call,
        payload: ops,
    }
}

fn registration_message(env: &TestEnv, nonce: u64, remote_token: [u8; 32]) -> InboundMessage {
    InboundMessage {
        nonce,
        sender: env.remote_gateway.clone(),
        // the registration path never dispatches execution, so no budget
        gas_limit: 0,
        kind: MessageKind::Call,
        payload: to_json_binary(&TokenPairRegistration {
            remote_token: Binary::from(remote_token),
            local_token: "uluna".to_string(),
        })
        .unwrap(),
    }
}

fn relay_signed(env: &mut TestEnv, messages: Vec<InboundMessage>) -> AppResponse {
    let msg = signed_batch(messages);
    env.app
        .execute_contract(env.user.clone(), env.relay.clone(), &msg, &[])
        .unwrap()
}

fn try_relay_signed(env: &mut TestEnv, messages: Vec<InboundMessage>) -> String {
    let msg = signed_batch(messages);
    env.app
        .execute_contract(env.user.clone(), env.relay.clone(), &msg, &[])
        .unwrap_err()
        .root_cause()
        .to_string()
}

fn retry(env: &mut TestEnv, messages: Vec<InboundMessage>) -> AppResponse {
    env.app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RetryFailed { messages },
            &[],
        )
        .unwrap()
}

// ============================================================================
// Query Helpers
// ============================================================================

fn attr(res: &AppResponse, key: &str) -> String {
    res.events
        .iter()
        .flat_map(|e| &e.attributes)
        .find(|a| a.key == key)
        .map(|a| a.value.clone())
        .unwrap_or_else(|| panic!("attribute {} not found", key))
}

fn attr_all(res: &AppResponse, key: &str) -> Vec<String> {
    res.events
        .iter()
        .flat_map(|e| &e.attributes)
        .filter(|a| a.key == key)
        .map(|a| a.value.clone())
        .collect()
}

fn message_status(env: &TestEnv, hash: &[u8; 32]) -> MessageStatusResponse {
    env.app
        .wrap()
        .query_wasm_smart(
            &env.relay,
            &QueryMsg::MessageStatus {
                hash: Binary::from(hash.to_vec()),
            },
        )
        .unwrap()
}

fn last_nonce(env: &TestEnv) -> u64 {
    let res: NonceResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.relay, &QueryMsg::LastIncomingNonce {})
        .unwrap();
    res.nonce
}

fn twin_of(env: &TestEnv, sender: &[u8; 32]) -> Option<Addr> {
    let res: TwinResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.relay,
            &QueryMsg::Twin {
                remote_sender: Binary::from(sender.to_vec()),
            },
        )
        .unwrap();
    res.twin
}

fn target_count(env: &TestEnv) -> u64 {
    let res: CountResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.target, &TargetQueryMsg::Count {})
        .unwrap();
    res.count
}

fn balance(env: &TestEnv, addr: &Addr) -> u128 {
    env.app
        .wrap()
        .query_balance(addr.clone(), "uluna")
        .unwrap()
        .amount
        .u128()
}

// ============================================================================
// Trusted Path
// ============================================================================

#[test]
fn test_trusted_call_creates_twin_and_executes() {
    let mut env = setup();
    let sender = [1u8; 32];
    let message = call_message(1, sender, GAS_OK, ping_ops(&env));
    let hash = msg_hash(&message);

    let res = relay_signed(&mut env, vec![message]);

    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"twin_instantiating".to_string()));
    assert!(actions.contains(&"twin_created".to_string()));
    assert!(actions.contains(&"message_succeeded".to_string()));
    assert!(actions.contains(&"batch_complete".to_string()));

    // the cached twin is the instantiated contract
    let twin = twin_of(&env, &sender).expect("twin must be cached");
    assert_eq!(attr(&res, "twin"), twin.to_string());

    let owner: OwnerResponse = env
        .app
        .wrap()
        .query_wasm_smart(&twin, &TwinQueryMsg::Owner {})
        .unwrap();
    assert_eq!(owner.owner, env.relay);
    let remote: RemoteSenderResponse = env
        .app
        .wrap()
        .query_wasm_smart(&twin, &TwinQueryMsg::RemoteSender {})
        .unwrap();
    assert_eq!(remote.remote_sender, Binary::from(sender));

    assert_eq!(target_count(&env), 1);
    assert_eq!(last_nonce(&env), 1);
    let status = message_status(&env, &hash);
    assert!(status.succeeded);
    assert!(!status.failed);
}

#[test]
fn test_twin_created_once_then_reused() {
    let mut env = setup();
    let sender = [1u8; 32];

    let first = call_message(1, sender, GAS_OK, ping_ops(&env));
    relay_signed(&mut env, vec![first]);
    let twin = twin_of(&env, &sender).unwrap();

    let second = call_message(2, sender, GAS_OK, ping_ops(&env));
    let res = relay_signed(&mut env, vec![second]);
    let actions = attr_all(&res, "action");
    assert!(!actions.contains(&"twin_instantiating".to_string()));
    assert!(actions.contains(&"message_dispatched".to_string()));
    assert!(actions.contains(&"message_succeeded".to_string()));

    assert_eq!(twin_of(&env, &sender).unwrap(), twin);
    assert_eq!(target_count(&env), 2);
    assert_eq!(last_nonce(&env), 2);
}

#[test]
fn test_nonce_must_increment_by_one() {
    let mut env = setup();
    let sender = [1u8; 32];

    // a fresh relay expects nonce 1, not 0
    let zeroth = call_message(0, sender, GAS_OK, ping_ops(&env));
    let err = try_relay_signed(&mut env, vec![zeroth]);
    assert!(err.contains("expected 1, got 0"));

    let skipped = call_message(2, sender, GAS_OK, ping_ops(&env));
    let err = try_relay_signed(&mut env, vec![skipped]);
    assert!(err.contains("expected 1, got 2"));

    let first = call_message(1, sender, GAS_OK, ping_ops(&env));
    relay_signed(&mut env, vec![first]);

    // no skipping after that either
    let skipped = call_message(3, sender, GAS_OK, ping_ops(&env));
    let err = try_relay_signed(&mut env, vec![skipped]);
    assert!(err.contains("expected 2, got 3"));
    assert_eq!(last_nonce(&env), 1);
}

#[test]
fn test_replay_of_succeeded_message_aborts_batch() {
    let mut env = setup();
    let sender = [1u8; 32];
    let first = call_message(1, sender, GAS_OK, ping_ops(&env));

    relay_signed(&mut env, vec![first.clone()]);
    assert_eq!(target_count(&env), 1);

    let err = try_relay_signed(&mut env, vec![first.clone()]);
    assert!(err.contains("already succeeded"));

    // even buried in an otherwise valid batch, the replay aborts all of it
    let second = call_message(2, sender, GAS_OK, ping_ops(&env));
    let err = try_relay_signed(&mut env, vec![second.clone(), first]);
    assert!(err.contains("already succeeded"));

    // nothing from the aborted batch persists
    assert_eq!(target_count(&env), 1);
    assert_eq!(last_nonce(&env), 1);
    let status = message_status(&env, &msg_hash(&second));
    assert!(!status.succeeded);
    assert!(!status.failed);
}

// ============================================================================
// Signature Verification
// ============================================================================

#[test]
fn test_rejects_malformed_signature_blob() {
    let mut env = setup();
    let messages = vec![call_message(1, [1u8; 32], GAS_OK, ping_ops(&env))];

    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages: messages.clone(),
                signatures: Binary::from(vec![0u8; 64]),
            },
            &[],
        )
        .unwrap_err();
    assert!(err
        .root_cause()
        .to_string()
        .contains("not a multiple of 65"));

    // 65 zero bytes parse as one signature that cannot recover
    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages,
                signatures: Binary::from(vec![0u8; 65]),
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("Invalid signature"));
}

#[test]
fn test_rejects_unordered_and_duplicate_signers() {
    let mut env = setup();
    let messages = vec![call_message(1, [1u8; 32], GAS_OK, ping_ops(&env))];
    let digest = digest_of(&messages);
    let primary = primary_keys();
    let partner = partner_keys();

    // descending order
    let mut ordered: Vec<&SigningKey> = vec![&primary[0], &primary[1], &partner[0]];
    ordered.sort_by_key(|k| signer_address(k));
    ordered.reverse();
    let mut blob = Vec::new();
    for key in &ordered {
        blob.extend_from_slice(&sign(key, &digest));
    }
    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages: messages.clone(),
                signatures: Binary::from(blob),
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("ascending"));

    // a duplicated signer is never ascending
    let one = sign(&primary[0], &digest);
    let mut blob = one.to_vec();
    blob.extend_from_slice(&one);
    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages,
                signatures: Binary::from(blob),
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("ascending"));
}

#[test]
fn test_both_quorums_required() {
    let mut env = setup();
    let messages = vec![call_message(1, [1u8; 32], GAS_OK, ping_ops(&env))];
    let digest = digest_of(&messages);
    let primary = primary_keys();
    let partner = partner_keys();

    // one primary short
    let blob = sign_batch(&[&primary[0], &partner[0]], &digest);
    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages: messages.clone(),
                signatures: blob,
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("Threshold not met"));

    // full primary quorum but no partner voice
    let blob = sign_batch(&[&primary[0], &primary[1], &primary[2]], &digest);
    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages,
                signatures: blob,
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("Threshold not met"));
}

#[test]
fn test_unrecognized_signers_are_ignored() {
    let mut env = setup();
    let messages = vec![call_message(1, [1u8; 32], GAS_OK, ping_ops(&env))];
    let digest = digest_of(&messages);
    let primary = primary_keys();
    let partner = partner_keys();
    let stranger = signing_key(5);

    // a stranger alongside a full quorum set changes nothing
    let blob = sign_batch(
        &[&primary[0], &primary[1], &partner[0], &stranger],
        &digest,
    );
    env.app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages: messages.clone(),
                signatures: blob,
            },
            &[],
        )
        .unwrap();
    assert_eq!(target_count(&env), 1);

    // strangers alone never authorize anything
    let strangers = [signing_key(5), signing_key(6), signing_key(7)];
    let messages = vec![call_message(2, [1u8; 32], GAS_OK, ping_ops(&env))];
    let digest = digest_of(&messages);
    let blob = sign_batch(&[&strangers[0], &strangers[1], &strangers[2]], &digest);
    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RelayBatch {
                messages,
                signatures: blob,
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("Threshold not met"));
}

#[test]
fn test_digest_queries_match_local_computation() {
    let env = setup();
    let messages = vec![
        call_message(1, [1u8; 32], GAS_OK, Binary::from(b"p1".to_vec())),
        call_message(2, [2u8; 32], GAS_OK, Binary::from(b"p2".to_vec())),
    ];

    let res: relay::msg::HashResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.relay,
            &QueryMsg::MessageHash {
                message: messages[0].clone(),
            },
        )
        .unwrap();
    assert_eq!(res.hash.as_slice(), &msg_hash(&messages[0]));

    let res: relay::msg::HashResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.relay,
            &QueryMsg::BatchDigest {
                messages: messages.clone(),
            },
        )
        .unwrap();
    assert_eq!(res.hash.as_slice(), &digest_of(&messages));

    // the gas limit is deliberately outside the message identity
    let mut higher = messages[0].clone();
    higher.gas_limit = GAS_OK * 10;
    assert_eq!(msg_hash(&messages[0]), msg_hash(&higher));
}

// ============================================================================
// Gas Reservation & Retry
// ============================================================================

#[test]
fn test_gas_shortfall_records_failure_and_retry_succeeds() {
    let mut env = setup();
    let sender = [1u8; 32];
    let starved = call_message(1, sender, GAS_LOW, ping_ops(&env));
    let hash = msg_hash(&starved);

    let res = relay_signed(&mut env, vec![starved.clone()]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_failed".to_string()));
    assert!(attr(&res, "reason").contains("insufficient gas"));
    assert_eq!(attr(&res, "message_hash"), bytes32_to_hex(&hash));

    // the nonce is consumed even though execution never ran
    assert_eq!(last_nonce(&env), 1);
    let status = message_status(&env, &hash);
    assert!(status.failed);
    assert!(!status.succeeded);
    // no twin was created for a message that never reached planning
    assert!(twin_of(&env, &sender).is_none());

    // a raised budget reuses the same identity, so the failed record opens
    // the retry path
    let mut funded = starved;
    funded.gas_limit = GAS_OK;
    assert_eq!(msg_hash(&funded), hash);

    let res = retry(&mut env, vec![funded]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"twin_instantiating".to_string()));
    assert!(actions.contains(&"message_succeeded".to_string()));
    assert_eq!(target_count(&env), 1);

    let status = message_status(&env, &hash);
    assert!(status.succeeded);
    assert!(!status.failed);
}

#[test]
fn test_retry_requires_prior_failure() {
    let mut env = setup();
    let sender = [1u8; 32];
    let fresh = call_message(1, sender, GAS_OK, ping_ops(&env));

    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RetryFailed {
                messages: vec![fresh.clone()],
            },
            &[],
        )
        .unwrap_err();
    assert!(err
        .root_cause()
        .to_string()
        .contains("not previously failed"));

    // a succeeded message is refused with the stronger verdict
    relay_signed(&mut env, vec![fresh.clone()]);
    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RetryFailed {
                messages: vec![fresh],
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("already succeeded"));
}

#[test]
fn test_execution_failure_halts_batch() {
    let mut env = setup();
    let sender = [1u8; 32];
    let fail_ops = to_json_binary(&vec![TwinOp::Execute {
        contract: env.target.to_string(),
        msg: to_json_binary(&TargetExecuteMsg::Fail {}).unwrap(),
        funds: vec![],
    }])
    .unwrap();

    let first = call_message(1, sender, GAS_OK, ping_ops(&env));
    let second = call_message(2, sender, GAS_OK, fail_ops);
    let third = call_message(3, sender, GAS_OK, ping_ops(&env));

    let res = relay_signed(&mut env, vec![first.clone(), second.clone(), third.clone()]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_succeeded".to_string()));
    assert!(actions.contains(&"message_failed".to_string()));
    // the batch halted before the third message
    assert!(!actions.contains(&"batch_complete".to_string()));

    assert!(message_status(&env, &msg_hash(&first)).succeeded);
    assert!(message_status(&env, &msg_hash(&second)).failed);
    let untouched = message_status(&env, &msg_hash(&third));
    assert!(!untouched.succeeded && !untouched.failed);

    // the second message consumed its nonce; the third did not
    assert_eq!(last_nonce(&env), 2);
    assert_eq!(target_count(&env), 1);

    // the tail is deliverable in a later batch
    relay_signed(&mut env, vec![third]);
    assert_eq!(target_count(&env), 2);
    assert_eq!(last_nonce(&env), 3);
}

#[test]
fn test_transient_failure_retries_after_unblocking() {
    let mut env = setup();
    let sender = [3u8; 32];
    let hit_ops = to_json_binary(&vec![TwinOp::Execute {
        contract: env.target.to_string(),
        msg: to_json_binary(&TargetExecuteMsg::Hit {}).unwrap(),
        funds: vec![],
    }])
    .unwrap();
    let message = call_message(1, sender, GAS_OK, hit_ops);
    let hash = msg_hash(&message);

    relay_signed(&mut env, vec![message.clone()]);
    assert!(message_status(&env, &hash).failed);
    // the twin outlives the failed execution attempt
    assert!(twin_of(&env, &sender).is_some());
    assert_eq!(target_count(&env), 0);

    // anyone unblocks the callee, then anyone retries
    env.app
        .execute_contract(
            env.admin.clone(),
            env.target.clone(),
            &TargetExecuteMsg::Open {},
            &[],
        )
        .unwrap();
    let res = retry(&mut env, vec![message]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_succeeded".to_string()));
    assert_eq!(target_count(&env), 1);
    assert!(message_status(&env, &hash).succeeded);
}

// ============================================================================
// Gas Estimation Mode
// ============================================================================

#[test]
fn test_estimation_mode_aborts_distinguishably() {
    let mut env = setup();
    let sender = [1u8; 32];
    let starved = call_message(1, sender, GAS_LOW, ping_ops(&env));
    let hash = msg_hash(&starved);

    let msg = signed_batch(vec![starved]);
    let err = env
        .app
        .execute_contract(env.estimator.clone(), env.relay.clone(), &msg, &[])
        .unwrap_err();
    let text = err.root_cause().to_string();
    assert!(text.contains("Gas estimation probe"));
    assert!(text.contains("insufficient gas"));

    // the probe reverted: no failure record, no consumed nonce
    let status = message_status(&env, &hash);
    assert!(!status.failed && !status.succeeded);
    assert_eq!(last_nonce(&env), 0);
}

#[test]
fn test_estimation_mode_passes_executable_messages() {
    let mut env = setup();
    let sender = [1u8; 32];
    let message = call_message(1, sender, GAS_OK, ping_ops(&env));
    let hash = msg_hash(&message);

    let msg = signed_batch(vec![message]);
    env.app
        .execute_contract(env.estimator.clone(), env.relay.clone(), &msg, &[])
        .unwrap();
    assert!(message_status(&env, &hash).succeeded);
    assert_eq!(target_count(&env), 1);
}

// ============================================================================
// Token-Pair Registration
// ============================================================================

#[test]
fn test_gateway_message_registers_token_pair() {
    let mut env = setup();
    let remote_token = [0x77u8; 32];
    let message = registration_message(&env, 1, remote_token);
    let hash = msg_hash(&message);

    let res = relay_signed(&mut env, vec![message]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"pair_registered".to_string()));
    assert!(actions.contains(&"batch_complete".to_string()));
    assert_eq!(attr(&res, "local_token"), "uluna");

    let pair: TokenPairResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.relay,
            &QueryMsg::TokenPair {
                remote_token: Binary::from(remote_token),
            },
        )
        .unwrap();
    assert_eq!(pair.local_token, Some("uluna".to_string()));

    let listed: TokenPairsResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.relay,
            &QueryMsg::TokenPairs {
                start_after: None,
                limit: None,
            },
        )
        .unwrap();
    assert_eq!(listed.pairs.len(), 1);
    assert_eq!(listed.pairs[0].remote_token, Binary::from(remote_token));

    assert!(message_status(&env, &hash).succeeded);
    assert_eq!(last_nonce(&env), 1);
    // the gateway never gets a twin
    assert!(twin_of(&env, &env.remote_gateway.as_slice().try_into().unwrap()).is_none());
}

#[test]
fn test_malformed_registration_records_failure() {
    let mut env = setup();
    let message = InboundMessage {
        nonce: 1,
        sender: env.remote_gateway.clone(),
        gas_limit: 0,
        kind: MessageKind::Call,
        payload: Binary::from(b"not a registration".to_vec()),
    };
    let hash = msg_hash(&message);

    let res = relay_signed(&mut env, vec![message]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_failed".to_string()));
    assert!(message_status(&env, &hash).failed);
    assert_eq!(last_nonce(&env), 1);
}

// ============================================================================
// Inbound Transfers
// ============================================================================

const REMOTE_TOKEN: [u8; 32] = [0x77u8; 32];

fn transfer_message(
    env: &TestEnv,
    nonce: u64,
    token: [u8; 32],
    recipient: &Addr,
    amount: u128,
) -> InboundMessage {
    InboundMessage {
        nonce,
        sender: Binary::from([4u8; 32]),
        gas_limit: GAS_OK,
        kind: MessageKind::Transfer,
        payload: to_json_binary(&TransferPayload {
            token: Binary::from(token),
            recipient: Binary::from(recipient.to_string().into_bytes()),
            amount: Uint128::new(amount),
        })
        .unwrap(),
    }
}

fn register(env: &mut TestEnv, nonce: u64, remote_token: [u8; 32]) {
    let message = registration_message(env, nonce, remote_token);
    relay_signed(env, vec![message]);
}

#[test]
fn test_transfer_releases_from_vault() {
    let mut env = setup();
    let vault_before = balance(&env, &env.vault);

    register(&mut env, 1, REMOTE_TOKEN);
    let message = transfer_message(&env, 2, REMOTE_TOKEN, &env.alice, 500_000);
    let res = relay_signed(&mut env, vec![message.clone()]);

    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_succeeded".to_string()));
    assert_eq!(balance(&env, &env.alice), 500_000);
    assert_eq!(balance(&env, &env.vault), vault_before - 500_000);
    assert!(message_status(&env, &msg_hash(&message)).succeeded);
}

#[test]
fn test_transfer_of_unregistered_token_fails_then_retries() {
    let mut env = setup();
    let message = transfer_message(&env, 1, REMOTE_TOKEN, &env.alice, 500_000);
    let hash = msg_hash(&message);

    let res = relay_signed(&mut env, vec![message.clone()]);
    assert!(attr(&res, "reason").contains("not registered"));
    assert!(message_status(&env, &hash).failed);
    assert_eq!(balance(&env, &env.alice), 0);

    // registration arrives late on the trusted path, then anyone retries
    register(&mut env, 2, REMOTE_TOKEN);
    retry(&mut env, vec![message]);

    assert!(message_status(&env, &hash).succeeded);
    assert_eq!(balance(&env, &env.alice), 500_000);
}

#[test]
fn test_transfer_with_invalid_recipient_records_failure() {
    let mut env = setup();
    register(&mut env, 1, REMOTE_TOKEN);

    let message = InboundMessage {
        nonce: 2,
        sender: Binary::from([4u8; 32]),
        gas_limit: GAS_OK,
        kind: MessageKind::Transfer,
        payload: to_json_binary(&TransferPayload {
            token: Binary::from(REMOTE_TOKEN),
            recipient: Binary::from(b"not an address".to_vec()),
            amount: Uint128::new(100),
        })
        .unwrap(),
    };
    let hash = msg_hash(&message);

    let res = relay_signed(&mut env, vec![message]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_failed".to_string()));
    assert!(message_status(&env, &hash).failed);
}

// ============================================================================
// Transfer-And-Call
// ============================================================================

#[test]
fn test_transfer_and_call_composite() {
    let mut env = setup();
    register(&mut env, 1, REMOTE_TOKEN);

    let sender = [5u8; 32];
    let ops = to_json_binary(&vec![TwinOp::Send {
        to: env.alice.to_string(),
        amount: coins(200_000, "uluna"),
    }])
    .unwrap();
    let message = InboundMessage {
        nonce: 2,
        sender: Binary::from(sender),
        gas_limit: GAS_OK,
        kind: MessageKind::TransferAndCall,
        payload: to_json_binary(&TransferAndCallPayload {
            token: Binary::from(REMOTE_TOKEN),
            amount: Uint128::new(500_000),
            ops,
        })
        .unwrap(),
    };

    let res = relay_signed(&mut env, vec![message.clone()]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"twin_instantiating".to_string()));
    assert!(actions.contains(&"message_succeeded".to_string()));

    // released to the twin, then partially forwarded by the ops
    let twin = twin_of(&env, &sender).unwrap();
    assert_eq!(balance(&env, &twin), 300_000);
    assert_eq!(balance(&env, &env.alice), 200_000);
    assert!(message_status(&env, &msg_hash(&message)).succeeded);
}

#[test]
fn test_transfer_and_call_is_atomic() {
    let mut env = setup();
    register(&mut env, 1, REMOTE_TOKEN);
    let vault_before = balance(&env, &env.vault);

    // the ops overspend what the transfer releases, so the whole composite
    // must roll back: no release, no partial send
    let sender = [5u8; 32];
    let ops = to_json_binary(&vec![TwinOp::Send {
        to: env.alice.to_string(),
        amount: coins(600_000, "uluna"),
    }])
    .unwrap();
    let message = InboundMessage {
        nonce: 2,
        sender: Binary::from(sender),
        gas_limit: GAS_OK,
        kind: MessageKind::TransferAndCall,
        payload: to_json_binary(&TransferAndCallPayload {
            token: Binary::from(REMOTE_TOKEN),
            amount: Uint128::new(500_000),
            ops,
        })
        .unwrap(),
    };
    let hash = msg_hash(&message);

    let res = relay_signed(&mut env, vec![message]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_failed".to_string()));

    assert!(message_status(&env, &hash).failed);
    assert_eq!(balance(&env, &env.vault), vault_before);
    assert_eq!(balance(&env, &env.alice), 0);
    let twin = twin_of(&env, &sender).unwrap();
    assert_eq!(balance(&env, &twin), 0);
}

#[test]
fn test_release_and_forward_reserved_for_self() {
    let mut env = setup();

    let msg = ExecuteMsg::ReleaseAndForward {
        token: "uluna".to_string(),
        twin: env.alice.to_string(),
        amount: Uint128::new(1),
        ops: Binary::from(b"[]".to_vec()),
    };
    for sender in [env.user.clone(), env.admin.clone()] {
        let err = env
            .app
            .execute_contract(sender, env.relay.clone(), &msg, &[])
            .unwrap_err();
        assert!(err
            .root_cause()
            .to_string()
            .contains("reserved for the contract itself"));
    }
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[test]
fn test_reentrant_relay_call_recorded_failed() {
    let mut env = setup();
    let sender = [6u8; 32];

    // the payload tries to re-enter the relay mid-batch
    let ops = to_json_binary(&vec![TwinOp::Execute {
        contract: env.relay.to_string(),
        msg: to_json_binary(&ExecuteMsg::RetryFailed { messages: vec![] }).unwrap(),
        funds: vec![],
    }])
    .unwrap();
    let message = call_message(1, sender, GAS_OK, ops);
    let hash = msg_hash(&message);

    let res = relay_signed(&mut env, vec![message.clone()]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_failed".to_string()));

    // recorded failed, nonce consumed, and retrying hits the same wall
    assert!(message_status(&env, &hash).failed);
    assert_eq!(last_nonce(&env), 1);
    let res = retry(&mut env, vec![message]);
    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"message_failed".to_string()));
    assert!(message_status(&env, &hash).failed);
}

#[test]
fn test_inbound_call_may_commit_outbound_messages() {
    let mut env = setup();
    let sender = [6u8; 32];

    // outbound commits are not relay re-entry: a callee may answer back
    let ops = to_json_binary(&vec![TwinOp::Execute {
        contract: env.relay.to_string(),
        msg: to_json_binary(&ExecuteMsg::SendMessage {
            payload: Binary::from(b"pong".to_vec()),
        })
        .unwrap(),
        funds: vec![],
    }])
    .unwrap();
    let message = call_message(1, sender, GAS_OK, ops);

    relay_signed(&mut env, vec![message.clone()]);
    assert!(message_status(&env, &msg_hash(&message)).succeeded);

    let count: LeafCountResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.relay, &QueryMsg::LeafCount {})
        .unwrap();
    assert_eq!(count.leaf_count, 1);
}

// ============================================================================
// Mixed Batches & Gating
// ============================================================================

#[test]
fn test_mixed_batch_processes_in_order() {
    let mut env = setup();
    let sender = [1u8; 32];

    let batch = vec![
        call_message(1, sender, GAS_OK, ping_ops(&env)),
        registration_message(&env, 2, REMOTE_TOKEN),
        call_message(3, sender, GAS_OK, ping_ops(&env)),
    ];
    let res = relay_signed(&mut env, batch);

    let actions = attr_all(&res, "action");
    assert!(actions.contains(&"pair_registered".to_string()));
    assert!(actions.contains(&"batch_complete".to_string()));
    assert_eq!(
        actions
            .iter()
            .filter(|a| a.as_str() == "message_succeeded")
            .count(),
        2
    );

    assert_eq!(target_count(&env), 2);
    assert_eq!(last_nonce(&env), 3);
    let pair: TokenPairResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.relay,
            &QueryMsg::TokenPair {
                remote_token: Binary::from(REMOTE_TOKEN),
            },
        )
        .unwrap();
    assert_eq!(pair.local_token, Some("uluna".to_string()));
}

#[test]
fn test_empty_batch_rejected() {
    let mut env = setup();
    let err = try_relay_signed(&mut env, vec![]);
    assert!(err.contains("Empty message batch"));
}

#[test]
fn test_paused_blocks_relay_paths() {
    let mut env = setup();
    env.app
        .execute_contract(
            env.admin.clone(),
            env.relay.clone(),
            &ExecuteMsg::Pause {},
            &[],
        )
        .unwrap();

    let message = call_message(1, [1u8; 32], GAS_OK, ping_ops(&env));
    let err = try_relay_signed(&mut env, vec![message]);
    assert!(err.contains("paused"));

    let err = env
        .app
        .execute_contract(
            env.user.clone(),
            env.relay.clone(),
            &ExecuteMsg::RetryFailed { messages: vec![] },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("paused"));
}
