use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine as _;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

use crate::config::AppContext;
use crate::constants::{
    JUPITER_QUOTE_URL, JUPITER_SWAP_URL, MAX_PRIORITY_FEE_LAMPORTS, MAX_SLIPPAGE_BPS,
};
use crate::errors::DistributorError;
use crate::ops::balance::token_account_balance;
use crate::ops::sender::send_and_confirm_versioned;
use crate::states::SwapOutcome;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    /// Base64-encoded serialized transaction to sign and submit
    swap_transaction: String,
}

/// floor(balance * percentage / 100)
pub fn swap_amount(balance: u64, percentage: u8) -> u64 {
    ((balance as u128 * percentage as u128) / 100) as u64
}

/// Swaps a percentage of the distributor's taxed-token balance into the
/// rewards token through the aggregator. Returns None when there is nothing
/// to swap or no route; `estimated_out` is the quote's estimate, not a
/// verified post-swap balance delta.
pub async fn swap_percentage_of_tokens(
    ctx: &AppContext,
    percentage: u8,
    slippage_bps: u16,
) -> Result<Option<SwapOutcome>, DistributorError> {
    if percentage == 0 || percentage > 100 {
        warn!("swap percentage {percentage} is out of range");
        return Ok(None);
    }
    if slippage_bps > MAX_SLIPPAGE_BPS {
        warn!("slippage {slippage_bps} bps is above the {MAX_SLIPPAGE_BPS} cap");
        return Ok(None);
    }

    let balance = token_account_balance(
        &ctx.rpc,
        &ctx.distributor_taxed_account,
        &ctx.taxed_mint.program_id,
    )
    .await?;
    if balance == 0 {
        info!(
            "no taxed-token balance in {}, skipping swap",
            ctx.distributor_taxed_account
        );
        return Ok(None);
    }
    let amount_to_swap = swap_amount(balance, percentage);
    if amount_to_swap == 0 {
        return Ok(None);
    }
    info!("swapping {amount_to_swap} of {balance} raw taxed units");

    let Some(quote) = get_quote(ctx, amount_to_swap, slippage_bps).await? else {
        return Ok(None);
    };
    let estimated_out = quote
        .get("outAmount")
        .and_then(|value| value.as_str())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);
    info!("quote received: {amount_to_swap} in, an estimated {estimated_out} out");

    let swap_response = get_swap_transaction(ctx, &quote).await?;
    let raw = BASE64_ENGINE
        .decode(&swap_response.swap_transaction)
        .map_err(|err| DistributorError::TransactionDecode(err.to_string()))?;
    let unsigned: VersionedTransaction = bincode::deserialize(&raw)
        .map_err(|err| DistributorError::TransactionDecode(err.to_string()))?;
    let transaction = VersionedTransaction::try_new(unsigned.message, &[&ctx.distributor_wallet])?;

    let signature = send_and_confirm_versioned(ctx, &transaction).await?;
    info!("swap confirmed: {signature}");
    Ok(Some(SwapOutcome {
        signature,
        estimated_out,
    }))
}

/// Fetches a quote for swapping `amount` of the taxed token. The raw quote
/// JSON is kept verbatim so it can be passed back on the swap request.
async fn get_quote(
    ctx: &AppContext,
    amount: u64,
    slippage_bps: u16,
) -> Result<Option<Value>, DistributorError> {
    info!(
        "requesting quote: {} -> {} for {amount} raw units at {slippage_bps} bps slippage",
        ctx.taxed_mint.address, ctx.rewards_mint.address
    );
    let response = ctx
        .http
        .get(JUPITER_QUOTE_URL)
        .query(&[
            ("inputMint", ctx.taxed_mint.address.to_string()),
            ("outputMint", ctx.rewards_mint.address.to_string()),
            ("amount", amount.to_string()),
            ("slippageBps", slippage_bps.to_string()),
        ])
        .send()
        .await?;
    if !response.status().is_success() {
        warn!("quote request failed with status {}", response.status());
        return Ok(None);
    }
    let quote: Value = response.json().await?;
    if quote.get("error").is_some() {
        warn!("aggregator rejected the quote request: {quote}");
        return Ok(None);
    }
    Ok(Some(quote))
}

async fn get_swap_transaction(
    ctx: &AppContext,
    quote: &Value,
) -> Result<SwapResponse, DistributorError> {
    let request = json!({
        "quoteResponse": quote,
        "userPublicKey": ctx.distributor_wallet.pubkey().to_string(),
        "dynamicComputeUnitLimit": true,
        "dynamicSlippage": true,
        "prioritizationFeeLamports": {
            "priorityLevelWithMaxLamports": {
                "maxLamports": MAX_PRIORITY_FEE_LAMPORTS,
                "priorityLevel": "veryHigh",
            },
        },
    });
    Ok(ctx
        .http
        .post(JUPITER_SWAP_URL)
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_amount_floors_the_percentage() {
        assert_eq!(swap_amount(1_001, 25), 250);
        assert_eq!(swap_amount(999, 100), 999);
        assert_eq!(swap_amount(3, 50), 1);
        assert_eq!(swap_amount(0, 100), 0);
        // No overflow at the top of the range
        assert_eq!(swap_amount(u64::MAX, 100), u64::MAX);
    }

    #[test]
    fn swap_response_decodes_the_aggregator_payload() {
        let body = r#"{
            "swapTransaction": "AQIDBA==",
            "lastValidBlockHeight": 279632475,
            "prioritizationFeeLamports": 9999
        }"#;
        let response: SwapResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.swap_transaction, "AQIDBA==");
    }
}
