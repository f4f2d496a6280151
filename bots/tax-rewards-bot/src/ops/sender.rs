use std::time::Duration;

use log::{debug, warn};
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::UiTransactionEncoding;
use tokio::time::sleep;

use crate::config::AppContext;
use crate::constants::{TRANSACTION_LOOKUP_DELAY_MS, TRANSACTION_LOOKUP_RETRIES};
use crate::errors::DistributorError;

/// Submits a signed versioned transaction with preflight disabled, waits for
/// confirmation, then looks the transaction up to check the landed status.
/// An error recorded in the transaction meta counts as failure even though
/// the submission itself succeeded.
pub async fn send_and_confirm_versioned(
    ctx: &AppContext,
    transaction: &VersionedTransaction,
) -> Result<Signature, DistributorError> {
    let send_config = RpcSendTransactionConfig {
        skip_preflight: true,
        ..RpcSendTransactionConfig::default()
    };
    let signature = ctx
        .rpc
        .send_transaction_with_config(transaction, send_config)
        .await?;
    debug!("transaction {signature} submitted, awaiting confirmation");

    let blockhash = *transaction.message.recent_blockhash();
    ctx.rpc
        .confirm_transaction_with_spinner(&signature, &blockhash, CommitmentConfig::confirmed())
        .await?;

    // The RPC node may lag behind its own confirmation, so the lookup gets a
    // bounded number of retries with fixed backoff.
    for attempt in 1..=TRANSACTION_LOOKUP_RETRIES {
        let lookup_config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        match ctx
            .rpc
            .get_transaction_with_config(&signature, lookup_config)
            .await
        {
            Ok(confirmed) => {
                if let Some(meta) = confirmed.transaction.meta {
                    if let Some(err) = meta.err {
                        return Err(DistributorError::TransactionFailed(
                            signature,
                            err.to_string(),
                        ));
                    }
                }
                return Ok(signature);
            }
            Err(err) => {
                warn!(
                    "transaction {signature} not queryable yet (attempt {attempt}/{TRANSACTION_LOOKUP_RETRIES}): {err}"
                );
                sleep(Duration::from_millis(TRANSACTION_LOOKUP_DELAY_MS)).await;
            }
        }
    }
    Err(DistributorError::TransactionNotFound(signature))
}
