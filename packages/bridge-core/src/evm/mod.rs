//! EVM-side adaptors: contract bindings, decoded events, and the RPC client.

pub mod client;
pub mod contracts;
pub mod events;

pub use client::{BlockInfo, ChainClient, SubmitClient, WithdrawArgs};
pub use events::{BridgeLog, DepositEvent, WithdrawEvent};
