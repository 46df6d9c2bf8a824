//! Execute handlers for the ledger relay contract.
//!
//! This module contains all execute message handlers, organized by category:
//! - `outbound` - SendMessage, SendTokens, and the CW20 deposit hook
//! - `relay` - trusted batch admission, permissionless retries, and the
//!   reply handlers that drive a batch across submessage boundaries
//! - `admin` - pause, admin transfer, validator and configuration management

mod admin;
mod outbound;
mod relay;

pub use admin::*;
pub use outbound::*;
pub use relay::*;
