use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::states::holder::HolderRecord;

/// One size-bounded group of pending transfers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferBatch {
    pub entries: Vec<(Pubkey, HolderRecord)>,
    /// Raw units committed by this batch's entries
    pub amount: u64,
}

/// Why a recipient was left out of every batch. Skipped recipients are never
/// revisited within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Reward exceeds what is left of the shared balance budget
    OverBudget,
    /// Reward below the smallest transferable amount
    BelowMinimum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecipient {
    pub owner: Pubkey,
    pub reward: u64,
    pub reason: SkipReason,
}

/// Outcome of one batch submission. `Ok(None)` marks a batch that carried no
/// instructions and was never sent.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub index: usize,
    pub size: usize,
    pub amount: u64,
    pub outcome: Result<Option<Signature>, String>,
}

/// Aggregate of one batch-transfer run. Failures are recorded per batch,
/// never thrown out of the batch loop.
#[derive(Debug, Clone, Default)]
pub struct TransferSummary {
    pub total_batches: usize,
    pub successful_batches: usize,
    pub signatures: Vec<Signature>,
    pub batches: Vec<BatchResult>,
    pub skipped: Vec<SkippedRecipient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStatus {
    Success,
    /// Too few qualifying accounts; no withdrawal was attempted
    Skipped,
    /// No account held withheld fees
    NoAccounts,
}

/// Result of one withheld-fee withdrawal cycle.
#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub status: WithdrawalStatus,
    /// Signature of the mint-level withdrawal, when it landed
    pub mint_signature: Option<Signature>,
    /// Per-batch account withdrawal signatures
    pub signatures: Vec<Signature>,
    pub failed_batches: usize,
}

impl WithdrawalOutcome {
    pub fn empty(status: WithdrawalStatus) -> Self {
        Self {
            status,
            mint_signature: None,
            signatures: Vec::new(),
            failed_batches: 0,
        }
    }
}

/// Result of one executed swap. `estimated_out` is the aggregator's quote,
/// not a verified post-swap balance delta; pool sizing reads the actual
/// balance instead.
#[derive(Debug, Clone, Copy)]
pub struct SwapOutcome {
    pub signature: Signature,
    pub estimated_out: u64,
}

/// One entry of the withdraw-authority transaction history.
#[derive(Debug, Clone)]
pub struct WithdrawalRecord {
    pub signature: String,
    pub block_time: Option<i64>,
    pub succeeded: bool,
}
