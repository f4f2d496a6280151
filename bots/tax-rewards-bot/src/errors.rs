use solana_sdk::program_error::ProgramError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::SignerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributorError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("environment variable {0} does not hold a valid base58 private key")]
    InvalidKey(&'static str),
    #[error("invalid address in {name}: {value}")]
    InvalidAddress { name: &'static str, value: String },
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("mint account {0} not found on chain")]
    MintNotFound(Pubkey),
    #[error("account {0} does not hold valid mint state")]
    InvalidMint(Pubkey),
    #[error("reward pool is empty - nothing to distribute")]
    EmptyRewardPool,
    #[error("holder page {page} could not be fetched: {reason}")]
    HolderPage { page: u64, reason: String },
    #[error("not enough SOL in fee payer {payer}: have {have} lamports, need {need}")]
    InsufficientSolBalance { payer: Pubkey, have: u64, need: u64 },
    #[error("transaction {0} landed with an error: {1}")]
    TransactionFailed(Signature, String),
    #[error("transaction {0} was not found after confirmation")]
    TransactionNotFound(Signature),
    #[error("failed to decode swap transaction: {0}")]
    TransactionDecode(String),
    #[error(transparent)]
    Instruction(#[from] ProgramError),
    #[error(transparent)]
    Signing(#[from] SignerError),
    #[error(transparent)]
    Rpc(#[from] solana_client::client_error::ClientError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
