use std::collections::BTreeMap;

use solana_sdk::pubkey::Pubkey;

/// Reward entry for one qualifying holder, rebuilt from indexer state on
/// every distribution cycle and never persisted between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct HolderRecord {
    /// Holdings in ui units (raw amount scaled by the taxed mint decimals)
    pub current_holdings: f64,
    /// Share of the raw total supply, in [0, 1)
    pub percentage: f64,
    /// Reward in raw rewards-token units for this cycle
    pub reward: u64,
    /// Explicit destination token account; derived from the owner when absent
    pub token_account: Option<Pubkey>,
}

/// Holder map keyed by wallet address. Ordered, so batch construction is
/// reproducible for a given scan result.
pub type HolderMap = BTreeMap<Pubkey, HolderRecord>;
