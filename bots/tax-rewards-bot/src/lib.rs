//! Token-tax collection and reward-distribution bot for an SPL-Token-2022
//! mint with the transfer-fee extension.
//!
//! Withheld transfer fees are withdrawn into the distributor wallet on one
//! cadence, swapped into the rewards token through the Jupiter aggregator,
//! and pro-rata distributed to taxed-token holders on another cadence. All
//! state is rebuilt from chain and indexer reads on every scheduled run.

pub mod config;
pub mod constants;
pub mod errors;
pub mod ops;
pub mod scheduler;
pub mod states;

pub use errors::DistributorError;
pub use states::*;
