use std::future::Future;
use std::time::Duration;

use log::{error, info, warn};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account;
use tokio::time::sleep;

use crate::config::AppContext;
use crate::constants::{INTER_BATCH_DELAY_MS, MAX_INSTRUCTIONS_PER_BATCH, MIN_TRANSFER_AMOUNT};
use crate::errors::DistributorError;
use crate::states::{
    BatchResult, HolderMap, SkipReason, SkippedRecipient, TransferBatch, TransferSummary,
};

/// Partitions the holder map into size-bounded batches against one shared
/// balance budget. The budget spans the whole call, not a single batch:
/// over-budget and sub-minimum rewards are skipped outright, never deferred,
/// and the input map is left untouched.
pub fn build_batches(
    recipients: &HolderMap,
    total_balance: u64,
    max_per_batch: usize,
) -> (Vec<TransferBatch>, Vec<SkippedRecipient>) {
    let mut batches = Vec::new();
    let mut skipped = Vec::new();
    let mut current = TransferBatch::default();
    let mut remaining_budget = total_balance;

    for (owner, record) in recipients {
        if record.reward < MIN_TRANSFER_AMOUNT {
            skipped.push(SkippedRecipient {
                owner: *owner,
                reward: record.reward,
                reason: SkipReason::BelowMinimum,
            });
            continue;
        }
        if record.reward > remaining_budget {
            warn!(
                "insufficient budget for {owner}: reward {} exceeds remaining {remaining_budget}",
                record.reward
            );
            skipped.push(SkippedRecipient {
                owner: *owner,
                reward: record.reward,
                reason: SkipReason::OverBudget,
            });
            continue;
        }
        remaining_budget -= record.reward;
        current.amount += record.reward;
        current.entries.push((*owner, record.clone()));
        if current.entries.len() == max_per_batch {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.entries.is_empty() {
        batches.push(current);
    }
    (batches, skipped)
}

/// Runs every batch through `send`, isolating failures so one bad batch never
/// blocks the rest of the distribution. A short pause between submissions
/// keeps the RPC endpoint from rate limiting the run.
pub(crate) async fn execute_batches<F, Fut>(batches: Vec<TransferBatch>, mut send: F) -> TransferSummary
where
    F: FnMut(usize, TransferBatch) -> Fut,
    Fut: Future<Output = Result<Option<Signature>, DistributorError>>,
{
    let total_batches = batches.len();
    let mut summary = TransferSummary {
        total_batches,
        ..TransferSummary::default()
    };
    for (index, batch) in batches.into_iter().enumerate() {
        let size = batch.entries.len();
        let amount = batch.amount;
        info!(
            "submitting batch {}/{total_batches} with {size} transfers ({amount} raw units)",
            index + 1
        );
        let outcome = match send(index, batch).await {
            Ok(Some(signature)) => {
                info!("batch {} confirmed: {signature}", index + 1);
                summary.successful_batches += 1;
                summary.signatures.push(signature);
                Ok(Some(signature))
            }
            Ok(None) => {
                info!("batch {} had no qualifying transfers, nothing sent", index + 1);
                Ok(None)
            }
            Err(err) => {
                error!("batch {} failed: {err}", index + 1);
                Err(err.to_string())
            }
        };
        summary.batches.push(BatchResult {
            index,
            size,
            amount,
            outcome,
        });
        if index + 1 < total_batches {
            sleep(Duration::from_millis(INTER_BATCH_DELAY_MS)).await;
        }
    }
    summary
}

/// Transfers each holder's reward out of the distributor's rewards account,
/// packed into size-bounded transactions with missing destination accounts
/// created on the fly.
pub async fn batch_transfer_tokens(
    ctx: &AppContext,
    recipients: &HolderMap,
    total_balance: u64,
) -> Result<TransferSummary, DistributorError> {
    info!(
        "batch transfer: {} recipients against a budget of {total_balance} raw units",
        recipients.len()
    );
    let (batches, skipped) = build_batches(recipients, total_balance, MAX_INSTRUCTIONS_PER_BATCH);
    let mut summary = execute_batches(batches, |_, batch| send_batch(ctx, batch)).await;
    summary.skipped = skipped;
    info!(
        "batch transfer complete: {}/{} batches confirmed, {} recipients skipped",
        summary.successful_batches,
        summary.total_batches,
        summary.skipped.len()
    );
    Ok(summary)
}

/// Builds and submits one batch transaction: a create-account instruction for
/// every recipient whose rewards account is missing on chain, then one
/// transfer per recipient. Returns None when the batch carries nothing.
async fn send_batch(
    ctx: &AppContext,
    batch: TransferBatch,
) -> Result<Option<Signature>, DistributorError> {
    if batch.entries.is_empty() {
        return Ok(None);
    }
    let mut instructions: Vec<Instruction> = Vec::with_capacity(batch.entries.len() * 2);
    for (owner, record) in &batch.entries {
        let destination = match record.token_account {
            Some(account) => account,
            None => get_associated_token_address_with_program_id(
                owner,
                &ctx.rewards_mint.address,
                &ctx.rewards_mint.program_id,
            ),
        };
        if !account_exists(&ctx.rpc, &destination).await? {
            info!("creating rewards account {destination} for {owner}");
            instructions.push(create_associated_token_account(
                &ctx.distributor_wallet.pubkey(),
                owner,
                &ctx.rewards_mint.address,
                &ctx.rewards_mint.program_id,
            ));
        }
        instructions.push(spl_token_2022::instruction::transfer_checked(
            &ctx.rewards_mint.program_id,
            &ctx.distributor_rewards_account,
            &ctx.rewards_mint.address,
            &destination,
            &ctx.distributor_wallet.pubkey(),
            &[],
            record.reward,
            ctx.rewards_mint.decimals,
        )?);
    }

    let blockhash = ctx.rpc.get_latest_blockhash().await?;
    let transaction = Transaction::new_signed_with_payer(
        &instructions,
        Some(&ctx.distributor_wallet.pubkey()),
        &[&ctx.distributor_wallet],
        blockhash,
    );
    let signature = ctx.rpc.send_and_confirm_transaction(&transaction).await?;
    Ok(Some(signature))
}

async fn account_exists(rpc: &RpcClient, account: &Pubkey) -> Result<bool, DistributorError> {
    Ok(rpc
        .get_account_with_commitment(account, CommitmentConfig::confirmed())
        .await?
        .value
        .is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::HolderRecord;

    fn record(reward: u64) -> HolderRecord {
        HolderRecord {
            current_holdings: 0.0,
            percentage: 0.0,
            reward,
            token_account: None,
        }
    }

    /// Keys ordered by their first byte so map iteration order is known.
    fn ordered_key(index: u8) -> Pubkey {
        Pubkey::new_from_array([index; 32])
    }

    #[test]
    fn batches_cover_every_recipient_exactly_once() {
        let mut recipients = HolderMap::new();
        for index in 1..=47u8 {
            recipients.insert(ordered_key(index), record(10));
        }
        let (batches, skipped) = build_batches(&recipients, u64::MAX, 10);

        assert!(skipped.is_empty());
        assert_eq!(batches.len(), 5);
        let mut seen: Vec<Pubkey> = batches
            .iter()
            .inspect(|batch| assert!(batch.entries.len() <= 10))
            .flat_map(|batch| batch.entries.iter().map(|(owner, _)| *owner))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 47);
    }

    #[test]
    fn the_budget_spans_the_whole_run() {
        let mut recipients = HolderMap::new();
        recipients.insert(ordered_key(1), record(60));
        recipients.insert(ordered_key(2), record(50));
        recipients.insert(ordered_key(3), record(30));
        let (batches, skipped) = build_batches(&recipients, 100, 2);

        // 60 is admitted, 50 exceeds the remaining 40 and is skipped for
        // good, 30 still fits afterwards.
        let admitted: u64 = batches.iter().map(|batch| batch.amount).sum();
        assert_eq!(admitted, 90);
        assert!(admitted <= 100);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].owner, ordered_key(2));
        assert_eq!(skipped[0].reason, SkipReason::OverBudget);
        for batch in &batches {
            assert!(batch.entries.iter().all(|(owner, _)| *owner != ordered_key(2)));
        }
    }

    #[test]
    fn sub_minimum_rewards_are_skipped() {
        let mut recipients = HolderMap::new();
        recipients.insert(ordered_key(1), record(0));
        recipients.insert(ordered_key(2), record(5));
        let (batches, skipped) = build_batches(&recipients, 100, 10);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].entries.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].reason, SkipReason::BelowMinimum);
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_batch_does_not_block_the_rest() {
        let mut recipients = HolderMap::new();
        for index in 1..=8u8 {
            recipients.insert(ordered_key(index), record(1));
        }
        let (batches, _) = build_batches(&recipients, u64::MAX, 2);
        assert_eq!(batches.len(), 4);

        let summary = execute_batches(batches, |index, _batch| async move {
            if index == 1 {
                Err(DistributorError::TransactionDecode("simulated".to_string()))
            } else {
                Ok(Some(Signature::default()))
            }
        })
        .await;

        assert_eq!(summary.total_batches, 4);
        assert_eq!(summary.successful_batches, 3);
        assert_eq!(summary.signatures.len(), 3);
        assert!(summary.batches[1].outcome.is_err());
        assert!(summary.batches[0].outcome.is_ok());
        assert!(summary.batches[2].outcome.is_ok());
        assert!(summary.batches[3].outcome.is_ok());
    }
}
