use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_token_2022::extension::StateWithExtensions;
use spl_token_2022::state::Mint;

use crate::constants::{DEFAULT_MIN_HOLDINGS, DEVNET_RPC_URL, MAINNET_RPC_URL, TESTNET_RPC_URL};
use crate::errors::DistributorError;

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Environment-derived settings, read once at startup. Missing required
/// entries abort the process before any scheduled work begins.
#[derive(Debug, Clone)]
pub struct Settings {
    pub network: String,
    pub rpc_url: String,
    /// Premium endpoint used for the paginated `getTokenAccounts` holder scan
    pub indexer_url: String,
    pub taxed_mint: Pubkey,
    pub rewards_mint: Pubkey,
    /// Liquidity pool allocation that must never receive rewards
    pub liquidity_pool: Option<Pubkey>,
    /// Raw-unit holding a wallet must exceed to qualify for rewards
    pub min_holdings: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self, DistributorError> {
        let network = env::var("SOLANA_NETWORK").unwrap_or_else(|_| "devnet".to_string());
        let rpc_url = select_rpc_url(
            &network,
            optional_env("HELIUS_RPC_URL").as_deref(),
            optional_env("HELIUS_DEVNET_RPC_URL").as_deref(),
            optional_env("QUICKNODE_RPC_URL").as_deref(),
        );
        let indexer_url = select_indexer_url(
            &network,
            optional_env("HELIUS_RPC_URL"),
            optional_env("HELIUS_DEVNET_RPC_URL"),
        )?;

        let taxed_mint = parse_pubkey("TAXED_TOKEN_MINT", &require_env("TAXED_TOKEN_MINT")?)?;
        let rewards_mint = parse_pubkey("REWARDS_TOKEN_MINT", &require_env("REWARDS_TOKEN_MINT")?)?;
        let liquidity_pool = match optional_env("LIQUIDITY_POOL_ADDRESS") {
            Some(value) => Some(parse_pubkey("LIQUIDITY_POOL_ADDRESS", &value)?),
            None => None,
        };
        let min_holdings = match optional_env("MIN_HOLDINGS_FOR_REWARDS") {
            Some(value) => value.parse().map_err(|_| DistributorError::InvalidValue {
                name: "MIN_HOLDINGS_FOR_REWARDS",
                value,
            })?,
            None => DEFAULT_MIN_HOLDINGS,
        };

        Ok(Self {
            network,
            rpc_url,
            indexer_url,
            taxed_mint,
            rewards_mint,
            liquidity_pool,
            min_holdings,
        })
    }
}

/// RPC endpoint priority: premium mainnet endpoint, premium non-mainnet
/// endpoint, generic fallback, then the public endpoint for the network.
fn select_rpc_url(
    network: &str,
    helius: Option<&str>,
    helius_devnet: Option<&str>,
    quicknode: Option<&str>,
) -> String {
    if network == "mainnet-beta" {
        if let Some(url) = helius {
            return url.to_string();
        }
    } else if let Some(url) = helius_devnet {
        return url.to_string();
    }
    if let Some(url) = quicknode {
        return url.to_string();
    }
    match network {
        "mainnet-beta" => MAINNET_RPC_URL,
        "testnet" => TESTNET_RPC_URL,
        _ => DEVNET_RPC_URL,
    }
    .to_string()
}

/// The holder index requires a premium endpoint; there is no public fallback.
fn select_indexer_url(
    network: &str,
    helius: Option<String>,
    helius_devnet: Option<String>,
) -> Result<String, DistributorError> {
    let (preferred, other) = if network == "mainnet-beta" {
        (helius, helius_devnet)
    } else {
        (helius_devnet, helius)
    };
    preferred
        .or(other)
        .ok_or(DistributorError::MissingEnv("HELIUS_RPC_URL"))
}

fn require_env(name: &'static str) -> Result<String, DistributorError> {
    optional_env(name).ok_or(DistributorError::MissingEnv(name))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_pubkey(name: &'static str, value: &str) -> Result<Pubkey, DistributorError> {
    Pubkey::from_str(value).map_err(|_| DistributorError::InvalidAddress {
        name,
        value: value.to_string(),
    })
}

fn load_keypair(name: &'static str) -> Result<Keypair, DistributorError> {
    let encoded = require_env(name)?;
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|_| DistributorError::InvalidKey(name))?;
    Keypair::from_bytes(&bytes).map_err(|_| DistributorError::InvalidKey(name))
}

/// On-chain facts about a mint, resolved once at startup: the owning token
/// program, the decimals and the raw supply.
#[derive(Debug, Clone, Copy)]
pub struct MintInfo {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub decimals: u8,
    /// Total supply in raw units
    pub supply: u64,
}

impl MintInfo {
    pub async fn load(rpc: &RpcClient, address: Pubkey) -> Result<Self, DistributorError> {
        let account = rpc
            .get_account_with_commitment(&address, CommitmentConfig::confirmed())
            .await?
            .value
            .ok_or(DistributorError::MintNotFound(address))?;
        let mint = StateWithExtensions::<Mint>::unpack(&account.data)
            .map_err(|_| DistributorError::InvalidMint(address))?;
        Ok(Self {
            address,
            program_id: account.owner,
            decimals: mint.base.decimals,
            supply: mint.base.supply,
        })
    }
}

/// Process-wide context: one RPC connection, one HTTP client, the signing
/// wallets and the resolved token facts. Built once in main and passed by
/// reference into every operation.
pub struct AppContext {
    pub rpc: Arc<RpcClient>,
    pub http: reqwest::Client,
    pub settings: Settings,
    pub distributor_wallet: Keypair,
    pub withdraw_authority: Keypair,
    pub taxed_mint: MintInfo,
    pub rewards_mint: MintInfo,
    /// Distributor's associated account for the taxed token
    pub distributor_taxed_account: Pubkey,
    /// Distributor's associated account for the rewards token
    pub distributor_rewards_account: Pubkey,
}

impl AppContext {
    pub async fn initialize() -> Result<Self, DistributorError> {
        let settings = Settings::from_env()?;
        let distributor_wallet = load_keypair("DISTRIBUTOR_WALLET_PRIVATE_KEY")?;
        let withdraw_authority = load_keypair("WITHDRAW_AUTHORITY_PRIVATE_KEY")?;
        info!(
            "wallet initialized, public key: {}",
            distributor_wallet.pubkey()
        );

        let rpc = Arc::new(RpcClient::new_with_commitment(
            settings.rpc_url.clone(),
            CommitmentConfig::confirmed(),
        ));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        let taxed_mint = MintInfo::load(&rpc, settings.taxed_mint).await?;
        let rewards_mint = MintInfo::load(&rpc, settings.rewards_mint).await?;
        info!(
            "taxed mint {} (program {}, {} decimals, supply {})",
            taxed_mint.address, taxed_mint.program_id, taxed_mint.decimals, taxed_mint.supply
        );
        info!(
            "rewards mint {} (program {}, {} decimals)",
            rewards_mint.address, rewards_mint.program_id, rewards_mint.decimals
        );

        let distributor_taxed_account = get_associated_token_address_with_program_id(
            &distributor_wallet.pubkey(),
            &taxed_mint.address,
            &taxed_mint.program_id,
        );
        let distributor_rewards_account = get_associated_token_address_with_program_id(
            &distributor_wallet.pubkey(),
            &rewards_mint.address,
            &rewards_mint.program_id,
        );
        info!("distributor taxed token account: {distributor_taxed_account}");
        info!("distributor rewards token account: {distributor_rewards_account}");

        Ok(Self {
            rpc,
            http,
            settings,
            distributor_wallet,
            withdraw_authority,
            taxed_mint,
            rewards_mint,
            distributor_taxed_account,
            distributor_rewards_account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_endpoint_wins_on_mainnet() {
        let url = select_rpc_url("mainnet-beta", Some("https://helius"), None, Some("https://quick"));
        assert_eq!(url, "https://helius");
    }

    #[test]
    fn devnet_prefers_the_devnet_premium_endpoint() {
        let url = select_rpc_url("devnet", Some("https://helius"), Some("https://helius-dev"), None);
        assert_eq!(url, "https://helius-dev");
    }

    #[test]
    fn generic_fallback_before_public_endpoints() {
        let url = select_rpc_url("mainnet-beta", None, None, Some("https://quick"));
        assert_eq!(url, "https://quick");
    }

    #[test]
    fn public_endpoint_is_keyed_by_network() {
        assert_eq!(select_rpc_url("mainnet-beta", None, None, None), MAINNET_RPC_URL);
        assert_eq!(select_rpc_url("testnet", None, None, None), TESTNET_RPC_URL);
        assert_eq!(select_rpc_url("devnet", None, None, None), DEVNET_RPC_URL);
    }

    #[test]
    fn indexer_requires_a_premium_endpoint() {
        assert!(select_indexer_url("mainnet-beta", None, None).is_err());
        let url = select_indexer_url("devnet", Some("https://helius".into()), None).unwrap();
        assert_eq!(url, "https://helius");
    }
}
