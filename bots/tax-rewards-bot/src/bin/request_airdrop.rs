//! One-shot helper that airdrops 1 SOL to the distributor wallet on test
//! networks. Exits 0 on success, 1 on any failure.

use std::time::Duration;

use log::{error, info};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::signer::Signer;
use tax_rewards_bot::config::AppContext;

const CONFIRMATION_ATTEMPTS: usize = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let ctx = AppContext::initialize().await?;
    let wallet = ctx.distributor_wallet.pubkey();
    info!("requesting airdrop for wallet {wallet}");

    let signature = ctx.rpc.request_airdrop(&wallet, LAMPORTS_PER_SOL).await?;
    info!("confirming transaction {signature}");
    for _ in 0..CONFIRMATION_ATTEMPTS {
        if ctx.rpc.confirm_transaction(&signature).await? {
            info!("airdrop successful");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    error!("airdrop {signature} was not confirmed");
    std::process::exit(1);
}
