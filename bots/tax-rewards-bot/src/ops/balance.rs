use log::warn;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use spl_token_2022::extension::StateWithExtensions;
use spl_token_2022::state::Account;

use crate::errors::DistributorError;

/// Raw-unit balance of a token account under either token program.
///
/// A missing account, an account owned by the wrong program, or data that
/// does not unpack reads as zero; transport failures propagate so the caller
/// can retry the cycle.
pub async fn token_account_balance(
    rpc: &RpcClient,
    account: &Pubkey,
    program_id: &Pubkey,
) -> Result<u64, DistributorError> {
    let Some(info) = rpc
        .get_account_with_commitment(account, CommitmentConfig::confirmed())
        .await?
        .value
    else {
        warn!("token account {account} does not exist");
        return Ok(0);
    };
    if info.owner != *program_id {
        warn!(
            "token account {account} is owned by {}, expected {program_id}",
            info.owner
        );
        return Ok(0);
    }
    match StateWithExtensions::<Account>::unpack(&info.data) {
        Ok(state) => Ok(state.base.amount),
        Err(err) => {
            warn!("token account {account} failed to unpack: {err}");
            Ok(0)
        }
    }
}
