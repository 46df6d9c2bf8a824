use cosmwasm_std::{Addr, Binary};
use cw_storage_plus::Item;

pub const CONTRACT_NAME: &str = "crates.io:ledger-relay-twin";
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The relay that instantiated this twin
pub const OWNER: Item<Addr> = Item::new("owner");

/// 32-byte remote sender this twin acts for
pub const REMOTE_SENDER: Item<Binary> = Item::new("remote_sender");
