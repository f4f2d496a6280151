use std::future::Future;
use std::str::FromStr;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;

use crate::config::AppContext;
use crate::constants::{HOLDER_PAGE_SIZE, MIN_HOLDER_SHARE_DENOMINATOR, MIN_REWARD_AMOUNT};
use crate::errors::DistributorError;
use crate::states::{HolderMap, HolderRecord};

/// One record of the indexer's `getTokenAccounts` response.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexedTokenAccount {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
struct TokenAccountsResult {
    #[serde(default)]
    token_accounts: Vec<IndexedTokenAccount>,
}

#[derive(Debug, Deserialize)]
struct TokenAccountsResponse {
    result: Option<TokenAccountsResult>,
    error: Option<serde_json::Value>,
}

/// Inputs the apportionment needs besides the page data itself.
#[derive(Debug, Clone)]
pub struct ScanParams {
    pub total_reward_pool: u64,
    pub total_supply_raw: u128,
    pub decimals: u8,
    /// Raw-unit holding a wallet must strictly exceed to qualify
    pub min_holdings: u64,
    pub liquidity_pool: Option<String>,
}

/// Exact pro-rata reward: floor(pool * raw / supply), computed in u128 so the
/// ratio is never rounded early.
pub fn compute_reward(raw_amount: u64, total_supply_raw: u128, reward_pool: u64) -> u64 {
    if total_supply_raw == 0 {
        return 0;
    }
    ((reward_pool as u128 * raw_amount as u128) / total_supply_raw) as u64
}

/// A share below 1e-6 of the supply is dust regardless of the pool size.
pub fn is_dust_share(raw_amount: u64, total_supply_raw: u128) -> bool {
    (raw_amount as u128) * MIN_HOLDER_SHARE_DENOMINATOR < total_supply_raw
}

/// Folds one indexer page into the holder map, applying every admission rule:
/// complete record, not the liquidity pool, above the holding minimum, above
/// the dust share, and a reward at or above the floor.
pub fn apportion_page(accounts: &[IndexedTokenAccount], params: &ScanParams, holders: &mut HolderMap) {
    for account in accounts {
        let (Some(owner), Some(address)) = (&account.owner, &account.address) else {
            continue;
        };
        if account.amount == 0 {
            continue;
        }
        if let Some(pool) = &params.liquidity_pool {
            if owner == pool || address == pool {
                debug!("skipping liquidity pool allocation {address}");
                continue;
            }
        }
        if account.amount <= params.min_holdings {
            continue;
        }
        if is_dust_share(account.amount, params.total_supply_raw) {
            continue;
        }
        let reward = compute_reward(account.amount, params.total_supply_raw, params.total_reward_pool);
        if reward < MIN_REWARD_AMOUNT {
            debug!("holder {owner} reward {reward} is below the minimum, skipping");
            continue;
        }
        let Ok(owner) = Pubkey::from_str(owner) else {
            warn!("holder owner {owner} is not a valid address");
            continue;
        };
        holders.insert(
            owner,
            HolderRecord {
                current_holdings: account.amount as f64 / 10f64.powi(params.decimals as i32),
                percentage: account.amount as f64 / params.total_supply_raw as f64,
                reward,
                token_account: None,
            },
        );
    }
}

/// Drives the page loop until a page comes back short of the page size.
/// Generic over the fetcher so termination is testable without the indexer;
/// a page failure aborts the scan rather than returning a truncated set.
pub(crate) async fn collect_holders<F, Fut>(
    mut fetch_page: F,
    params: &ScanParams,
) -> Result<HolderMap, DistributorError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Vec<IndexedTokenAccount>, DistributorError>>,
{
    if params.total_reward_pool == 0 {
        return Err(DistributorError::EmptyRewardPool);
    }
    let mut holders = HolderMap::new();
    let mut page = 1u64;
    loop {
        debug!("fetching holder page {page}");
        let accounts = fetch_page(page).await?;
        let was_last_page = accounts.len() < HOLDER_PAGE_SIZE;
        apportion_page(&accounts, params, &mut holders);
        if was_last_page {
            break;
        }
        page += 1;
    }
    Ok(holders)
}

/// Scans every holder of the taxed token and apportions `total_reward_pool`
/// across the ones above the admission thresholds.
pub async fn scan_holders(
    ctx: &AppContext,
    total_reward_pool: u64,
) -> Result<HolderMap, DistributorError> {
    info!(
        "scanning holders of {} against a pool of {total_reward_pool} raw units",
        ctx.taxed_mint.address
    );
    let params = ScanParams {
        total_reward_pool,
        total_supply_raw: ctx.taxed_mint.supply as u128,
        decimals: ctx.taxed_mint.decimals,
        min_holdings: ctx.settings.min_holdings,
        liquidity_pool: ctx.settings.liquidity_pool.map(|pool| pool.to_string()),
    };
    let holders = collect_holders(|page| fetch_holder_page(ctx, page), &params).await?;
    info!("{} holders qualify for rewards", holders.len());
    Ok(holders)
}

async fn fetch_holder_page(
    ctx: &AppContext,
    page: u64,
) -> Result<Vec<IndexedTokenAccount>, DistributorError> {
    let payload = json!({
        "jsonrpc": "2.0",
        "id": "tax-rewards-bot",
        "method": "getTokenAccounts",
        "params": {
            "mint": ctx.taxed_mint.address.to_string(),
            "limit": HOLDER_PAGE_SIZE,
            "page": page,
        },
    });
    let response = ctx
        .http
        .post(&ctx.settings.indexer_url)
        .json(&payload)
        .send()
        .await
        .map_err(|err| DistributorError::HolderPage {
            page,
            reason: err.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(DistributorError::HolderPage {
            page,
            reason: format!("http status {}", response.status()),
        });
    }
    let body: TokenAccountsResponse =
        response
            .json()
            .await
            .map_err(|err| DistributorError::HolderPage {
                page,
                reason: err.to_string(),
            })?;
    if let Some(error) = body.error {
        return Err(DistributorError::HolderPage {
            page,
            reason: error.to_string(),
        });
    }
    let result = body.result.ok_or_else(|| DistributorError::HolderPage {
        page,
        reason: "missing result".to_string(),
    })?;
    debug!(
        "page {page} returned {} token accounts",
        result.token_accounts.len()
    );
    Ok(result.token_accounts)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;

    const SUPPLY_RAW: u128 = 1_000_000_000_000_000; // 1B tokens at 6 decimals

    fn account(owner: &str, address: &str, amount: u64) -> IndexedTokenAccount {
        IndexedTokenAccount {
            address: Some(address.to_string()),
            owner: Some(owner.to_string()),
            amount,
        }
    }

    fn params(pool: u64) -> ScanParams {
        ScanParams {
            total_reward_pool: pool,
            total_supply_raw: SUPPLY_RAW,
            decimals: 6,
            min_holdings: 1_000,
            liquidity_pool: Some("LPool11111111111111111111111111111111111111".to_string()),
        }
    }

    #[test]
    fn reward_matches_the_exact_ratio() {
        // Holder with ~1.529% of a 1e15 raw supply against a 10_000 pool.
        let reward = compute_reward(15_293_927_308_000, SUPPLY_RAW, 10_000);
        assert_eq!(reward, 152);
        // Same inputs always produce the same output.
        assert_eq!(compute_reward(15_293_927_308_000, SUPPLY_RAW, 10_000), reward);
    }

    #[test]
    fn shares_below_one_millionth_are_dust() {
        // Exactly 1e-6 of the supply is kept, one unit less is dust.
        assert!(!is_dust_share(1_000_000_000, SUPPLY_RAW));
        assert!(is_dust_share(999_999_999, SUPPLY_RAW));
    }

    #[test]
    fn holders_at_or_below_the_minimum_are_excluded() {
        let owner = Pubkey::new_unique();
        let mut holders = HolderMap::new();
        let page = vec![
            account(&owner.to_string(), &Pubkey::new_unique().to_string(), 1_000),
        ];
        apportion_page(&page, &params(u64::MAX), &mut holders);
        assert!(holders.is_empty());
    }

    #[test]
    fn rewards_below_the_floor_are_excluded() {
        let owner = Pubkey::new_unique();
        let mut holders = HolderMap::new();
        // 0.2% of supply against a tiny pool computes a sub-floor reward.
        let page = vec![account(
            &owner.to_string(),
            &Pubkey::new_unique().to_string(),
            2_000_000_000_000,
        )];
        apportion_page(&page, &params(10_000), &mut holders);
        assert!(holders.is_empty());

        // The same holder against a large pool is admitted.
        apportion_page(&page, &params(100_000_000_000), &mut holders);
        let record = holders.get(&owner).expect("holder admitted");
        assert_eq!(record.reward, 200_000_000);
    }

    #[test]
    fn the_liquidity_pool_never_receives_rewards() {
        let pool_address = "LPool11111111111111111111111111111111111111";
        let mut holders = HolderMap::new();
        let page = vec![
            // Pool as the owning wallet
            account(pool_address, &Pubkey::new_unique().to_string(), u64::MAX / 2),
            // Pool as the token account address
            account(&Pubkey::new_unique().to_string(), pool_address, u64::MAX / 2),
        ];
        apportion_page(&page, &params(u64::MAX), &mut holders);
        assert!(holders.is_empty());
    }

    #[test]
    fn incomplete_records_are_skipped() {
        let mut holders = HolderMap::new();
        let page = vec![
            IndexedTokenAccount {
                address: None,
                owner: Some(Pubkey::new_unique().to_string()),
                amount: 2_000_000_000_000,
            },
            IndexedTokenAccount {
                address: Some(Pubkey::new_unique().to_string()),
                owner: None,
                amount: 2_000_000_000_000,
            },
            IndexedTokenAccount {
                address: Some(Pubkey::new_unique().to_string()),
                owner: Some(Pubkey::new_unique().to_string()),
                amount: 0,
            },
        ];
        apportion_page(&page, &params(u64::MAX), &mut holders);
        assert!(holders.is_empty());
    }

    #[tokio::test]
    async fn pagination_stops_after_the_first_short_page() {
        // Filler records are complete but hold too little to qualify.
        let filler = account(
            &Pubkey::new_unique().to_string(),
            &Pubkey::new_unique().to_string(),
            1,
        );
        let pages = vec![
            vec![filler.clone(); 100],
            vec![filler.clone(); 100],
            vec![filler.clone(); 37],
        ];
        let calls = Arc::new(AtomicU64::new(0));
        let fetch = {
            let calls = calls.clone();
            move |page: u64| {
                calls.fetch_add(1, Ordering::SeqCst);
                let data = pages[(page - 1) as usize].clone();
                async move { Ok(data) }
            }
        };
        let holders = collect_holders(fetch, &params(10_000)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(holders.is_empty());
    }

    #[tokio::test]
    async fn an_empty_pool_is_reported_without_scanning() {
        let calls = Arc::new(AtomicU64::new(0));
        let fetch = {
            let calls = calls.clone();
            move |_page: u64| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(Vec::new()) }
            }
        };
        let err = collect_holders(fetch, &params(0)).await.unwrap_err();
        assert!(matches!(err, DistributorError::EmptyRewardPool));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn a_failing_page_aborts_the_scan() {
        let fetch = |page: u64| async move {
            if page == 1 {
                Ok(vec![
                    IndexedTokenAccount {
                        address: Some(Pubkey::new_unique().to_string()),
                        owner: Some(Pubkey::new_unique().to_string()),
                        amount: 1,
                    };
                    100
                ])
            } else {
                Err(DistributorError::HolderPage {
                    page,
                    reason: "connection reset".to_string(),
                })
            }
        };
        let err = collect_holders(fetch, &params(10_000)).await.unwrap_err();
        assert!(matches!(err, DistributorError::HolderPage { page: 2, .. }));
    }
}
