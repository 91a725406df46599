//! Off-chain signature collection for multisig wallets.
//!
//! Owners sign a wallet contract's canonical transaction hash independently.
//! The relay stores proposals with the signatures gathered so far, keeps each
//! signature list deduplicated and ordered the way the contract expects, and
//! submits a proposal once enough current owners have signed it.

pub mod aggregator;
pub mod bindings;
pub mod calldata;
pub mod client;
pub mod gate;
pub mod hasher;
pub mod jsonrpc;
pub mod proposal;
pub mod recoverer;
pub mod relay;
pub mod serialization;
pub mod store;
pub mod types;
pub mod verifier;
