use std::sync::Arc;

use tax_rewards_bot::config::AppContext;
use tax_rewards_bot::scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let ctx = AppContext::initialize().await?;
    scheduler::run(Arc::new(ctx)).await;
    Ok(())
}
