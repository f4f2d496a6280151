use std::str::FromStr;

use futures::future::join_all;
use log::{debug, error, info, warn};
use solana_account_decoder::UiAccountEncoding;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcTransactionConfig,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::UiTransactionEncoding;
use spl_token_2022::extension::transfer_fee::instruction::{
    withdraw_withheld_tokens_from_accounts, withdraw_withheld_tokens_from_mint,
};
use spl_token_2022::extension::transfer_fee::TransferFeeAmount;
use spl_token_2022::extension::{BaseStateWithExtensions, StateWithExtensions};
use spl_token_2022::state::Account;

use crate::config::AppContext;
use crate::constants::{
    MIN_ACCOUNTS_FOR_WITHDRAWAL, MIN_SOL_FOR_FEES, WITHDRAW_ACCOUNTS_PER_BATCH,
};
use crate::errors::DistributorError;
use crate::states::{
    WithdrawalOutcome, WithdrawalPlan, WithdrawalRecord, WithdrawalStatus, WithheldFeeAccount,
};

/// Withdraws withheld transfer fees from the mint and from every qualifying
/// holder account into `destination`.
///
/// The mint accrues withheld fees separately from the per-account amounts, so
/// it is drained first; a failure there never blocks the account batches, and
/// a failing account batch never blocks the ones after it.
pub async fn withdraw_withheld_fees(
    ctx: &AppContext,
    destination: &Pubkey,
) -> Result<WithdrawalOutcome, DistributorError> {
    let payer = ctx.withdraw_authority.pubkey();
    let balance = ctx.rpc.get_balance(&payer).await?;
    if balance < MIN_SOL_FOR_FEES {
        return Err(DistributorError::InsufficientSolBalance {
            payer,
            have: balance,
            need: MIN_SOL_FOR_FEES,
        });
    }

    let accounts = scan_withheld_accounts(ctx).await?;
    let batches = match WithdrawalPlan::build(
        accounts,
        MIN_ACCOUNTS_FOR_WITHDRAWAL,
        WITHDRAW_ACCOUNTS_PER_BATCH,
    ) {
        WithdrawalPlan::NoAccounts => {
            info!("no accounts hold withheld fees, nothing to withdraw");
            return Ok(WithdrawalOutcome::empty(WithdrawalStatus::NoAccounts));
        }
        WithdrawalPlan::Skipped { qualifying } => {
            info!(
                "only {qualifying} accounts hold withheld fees (minimum {MIN_ACCOUNTS_FOR_WITHDRAWAL}), skipping withdrawal"
            );
            return Ok(WithdrawalOutcome::empty(WithdrawalStatus::Skipped));
        }
        WithdrawalPlan::Proceed { batches } => batches,
    };

    let mint_signature = match withdraw_from_mint(ctx, destination).await {
        Ok(signature) => {
            info!("mint-level withdrawal confirmed: {signature}");
            Some(signature)
        }
        Err(err) => {
            warn!("mint-level withdrawal failed: {err}");
            None
        }
    };

    let total = batches.len();
    let mut signatures = Vec::with_capacity(total);
    let mut failed_batches = 0usize;
    for (index, batch) in batches.iter().enumerate() {
        info!(
            "withdrawing from {} accounts (batch {}/{total})",
            batch.len(),
            index + 1
        );
        match withdraw_from_accounts(ctx, destination, batch).await {
            Ok(signature) => {
                info!("withdrawal batch {} confirmed: {signature}", index + 1);
                signatures.push(signature);
            }
            Err(err) => {
                error!("withdrawal batch {} failed: {err}", index + 1);
                failed_batches += 1;
            }
        }
    }

    Ok(WithdrawalOutcome {
        status: WithdrawalStatus::Success,
        mint_signature,
        signatures,
        failed_batches,
    })
}

/// Full program-account scan for the taxed mint (memcmp on the mint field at
/// offset 0), keeping accounts whose transfer-fee extension holds a nonzero
/// withheld amount. Accounts that fail to unpack are logged and skipped.
pub async fn scan_withheld_accounts(
    ctx: &AppContext,
) -> Result<Vec<WithheldFeeAccount>, DistributorError> {
    let config = RpcProgramAccountsConfig {
        filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
            0,
            &ctx.taxed_mint.address.to_bytes(),
        ))]),
        account_config: RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            ..RpcAccountInfoConfig::default()
        },
        ..RpcProgramAccountsConfig::default()
    };
    let all_accounts = ctx
        .rpc
        .get_program_accounts_with_config(&ctx.taxed_mint.program_id, config)
        .await?;
    info!(
        "{} token accounts found for mint {}",
        all_accounts.len(),
        ctx.taxed_mint.address
    );

    let mut qualifying = Vec::new();
    for (pubkey, account) in &all_accounts {
        let state = match StateWithExtensions::<Account>::unpack(&account.data) {
            Ok(state) => state,
            Err(err) => {
                warn!("skipping account {pubkey}: {err}");
                continue;
            }
        };
        let Ok(fee_state) = state.get_extension::<TransferFeeAmount>() else {
            continue;
        };
        let withheld: u64 = fee_state.withheld_amount.into();
        if withheld > 0 {
            debug!("account {pubkey} holds {withheld} withheld raw units");
            qualifying.push(WithheldFeeAccount {
                pubkey: *pubkey,
                withheld_amount: withheld,
            });
        }
    }
    info!("{} accounts hold withheld fees", qualifying.len());
    Ok(qualifying)
}

async fn withdraw_from_mint(
    ctx: &AppContext,
    destination: &Pubkey,
) -> Result<Signature, DistributorError> {
    let instruction = withdraw_withheld_tokens_from_mint(
        &ctx.taxed_mint.program_id,
        &ctx.taxed_mint.address,
        destination,
        &ctx.withdraw_authority.pubkey(),
        &[],
    )?;
    send_as_authority(ctx, instruction).await
}

async fn withdraw_from_accounts(
    ctx: &AppContext,
    destination: &Pubkey,
    batch: &[WithheldFeeAccount],
) -> Result<Signature, DistributorError> {
    let sources: Vec<&Pubkey> = batch.iter().map(|account| &account.pubkey).collect();
    let instruction = withdraw_withheld_tokens_from_accounts(
        &ctx.taxed_mint.program_id,
        &ctx.taxed_mint.address,
        destination,
        &ctx.withdraw_authority.pubkey(),
        &[],
        &sources,
    )?;
    send_as_authority(ctx, instruction).await
}

async fn send_as_authority(
    ctx: &AppContext,
    instruction: Instruction,
) -> Result<Signature, DistributorError> {
    let blockhash = ctx.rpc.get_latest_blockhash().await?;
    let transaction = Transaction::new_signed_with_payer(
        &[instruction],
        Some(&ctx.withdraw_authority.pubkey()),
        &[&ctx.withdraw_authority],
        blockhash,
    );
    Ok(ctx.rpc.send_and_confirm_transaction(&transaction).await?)
}

/// Recent transactions of the withdraw authority with their landed status.
pub async fn withdrawal_history(
    ctx: &AppContext,
    limit: usize,
) -> Result<Vec<WithdrawalRecord>, DistributorError> {
    info!("fetching the last {limit} withdraw authority transactions");
    let config = GetConfirmedSignaturesForAddress2Config {
        limit: Some(limit),
        ..GetConfirmedSignaturesForAddress2Config::default()
    };
    let statuses = ctx
        .rpc
        .get_signatures_for_address_with_config(&ctx.withdraw_authority.pubkey(), config)
        .await?;

    let lookups = statuses.iter().map(|status| async move {
        let succeeded = match Signature::from_str(&status.signature) {
            Ok(signature) => {
                let config = RpcTransactionConfig {
                    encoding: Some(UiTransactionEncoding::Json),
                    commitment: Some(CommitmentConfig::confirmed()),
                    max_supported_transaction_version: Some(0),
                };
                match ctx.rpc.get_transaction_with_config(&signature, config).await {
                    Ok(confirmed) => confirmed
                        .transaction
                        .meta
                        .map_or(status.err.is_none(), |meta| meta.err.is_none()),
                    Err(_) => status.err.is_none(),
                }
            }
            Err(_) => status.err.is_none(),
        };
        WithdrawalRecord {
            signature: status.signature.clone(),
            block_time: status.block_time,
            succeeded,
        }
    });
    Ok(join_all(lookups).await)
}
