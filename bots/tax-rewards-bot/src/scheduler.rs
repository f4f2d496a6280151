use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::instruction::create_associated_token_account;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{AppContext, MintInfo};
use crate::constants::{
    DEFAULT_SLIPPAGE_BPS, DISTRIBUTE_INTERVAL_SECS, MIN_DISTRIBUTION_BALANCE_TOKENS,
    REWARD_POOL_SHARE_BPS, SWAP_PERCENTAGE, WITHDRAW_SWAP_INTERVAL_SECS,
};
use crate::errors::DistributorError;
use crate::ops::{balance, holders, swap, transfer, withdraw};
use crate::states::WithdrawalStatus;

/// Runs both periodic cycles until ctrl-c. The cycles share one lock keyed to
/// the distributor wallet, so a distribution can never read the rewards
/// balance while a swap into the same wallet is still in flight.
pub async fn run(ctx: Arc<AppContext>) {
    let wallet_lock = Arc::new(Mutex::new(()));

    let withdraw_ctx = ctx.clone();
    let withdraw_lock = wallet_lock.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(WITHDRAW_SWAP_INTERVAL_SECS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _guard = withdraw_lock.lock().await;
            info!("running scheduled withdraw and swap");
            if let Err(err) = withdraw_and_swap(&withdraw_ctx).await {
                error!("withdraw and swap cycle failed: {err}");
            }
        }
    });

    let distribute_ctx = ctx.clone();
    let distribute_lock = wallet_lock.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(DISTRIBUTE_INTERVAL_SECS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _guard = distribute_lock.lock().await;
            info!("running scheduled distribution");
            if let Err(err) = distribute_rewards(&distribute_ctx).await {
                error!("distribution cycle failed: {err}");
            }
        }
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for the shutdown signal: {err}");
    }
    info!("shutdown signal received, exiting");
}

/// Withdraw-then-swap cycle: collect withheld fees into the distributor's
/// taxed-token account, then swap the whole taxed balance into the rewards
/// token.
pub async fn withdraw_and_swap(ctx: &AppContext) -> Result<(), DistributorError> {
    ensure_token_account(ctx, &ctx.distributor_taxed_account, &ctx.taxed_mint).await?;

    let outcome = withdraw::withdraw_withheld_fees(ctx, &ctx.distributor_taxed_account).await?;
    match outcome.status {
        WithdrawalStatus::NoAccounts | WithdrawalStatus::Skipped => return Ok(()),
        WithdrawalStatus::Success => info!(
            "withdrawal confirmed across {} batches ({} failed)",
            outcome.signatures.len(),
            outcome.failed_batches
        ),
    }

    match swap::swap_percentage_of_tokens(ctx, SWAP_PERCENTAGE, DEFAULT_SLIPPAGE_BPS).await? {
        Some(outcome) => info!(
            "swap {} confirmed for an estimated {} reward units",
            outcome.signature, outcome.estimated_out
        ),
        None => info!("swap skipped, nothing to trade"),
    }
    Ok(())
}

/// Distribution cycle: size the pool from the actual on-chain rewards
/// balance, scan holders, and batch-transfer their rewards.
pub async fn distribute_rewards(ctx: &AppContext) -> Result<(), DistributorError> {
    let balance = balance::token_account_balance(
        &ctx.rpc,
        &ctx.distributor_rewards_account,
        &ctx.rewards_mint.program_id,
    )
    .await?;
    let min_balance = MIN_DISTRIBUTION_BALANCE_TOKENS
        .saturating_mul(10u64.saturating_pow(ctx.rewards_mint.decimals as u32));
    if balance < min_balance {
        info!(
            "rewards balance {balance} is below the {min_balance} distribution minimum, waiting for more fees"
        );
        return Ok(());
    }

    let reward_pool = ((balance as u128 * REWARD_POOL_SHARE_BPS as u128) / 10_000) as u64;
    info!("distributing a pool of {reward_pool} raw units out of a {balance} balance");

    let holders = match holders::scan_holders(ctx, reward_pool).await {
        Ok(holders) => holders,
        Err(DistributorError::EmptyRewardPool) => {
            warn!("reward pool is empty, nothing to distribute");
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    if holders.is_empty() {
        info!("no holders qualify this cycle");
        return Ok(());
    }

    let summary = transfer::batch_transfer_tokens(ctx, &holders, reward_pool).await?;
    info!(
        "distribution complete: {}/{} batches confirmed, {} signatures collected",
        summary.successful_batches,
        summary.total_batches,
        summary.signatures.len()
    );
    Ok(())
}

/// Creates the distributor's associated token account when it is missing, so
/// withdrawals always have a live destination.
async fn ensure_token_account(
    ctx: &AppContext,
    account: &Pubkey,
    mint: &MintInfo,
) -> Result<(), DistributorError> {
    let exists = ctx
        .rpc
        .get_account_with_commitment(account, CommitmentConfig::confirmed())
        .await?
        .value
        .is_some();
    if exists {
        return Ok(());
    }
    info!("creating distributor token account {account} for mint {}", mint.address);
    let instruction = create_associated_token_account(
        &ctx.distributor_wallet.pubkey(),
        &ctx.distributor_wallet.pubkey(),
        &mint.address,
        &mint.program_id,
    );
    let blockhash = ctx.rpc.get_latest_blockhash().await?;
    let transaction = Transaction::new_signed_with_payer(
        &[instruction],
        Some(&ctx.distributor_wallet.pubkey()),
        &[&ctx.distributor_wallet],
        blockhash,
    );
    let signature = ctx.rpc.send_and_confirm_transaction(&transaction).await?;
    info!("token account {account} created: {signature}");
    Ok(())
}
