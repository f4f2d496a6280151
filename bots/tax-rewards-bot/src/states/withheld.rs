use solana_sdk::pubkey::Pubkey;

/// A taxed-token account carrying a nonzero withheld transfer fee. Membership
/// is transient: fees withheld after the scan wait for the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithheldFeeAccount {
    pub pubkey: Pubkey,
    pub withheld_amount: u64,
}

/// Admission decision for one withdrawal cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalPlan {
    /// No account holds withheld fees; nothing to withdraw.
    NoAccounts,
    /// Too few qualifying accounts to be worth the transaction fees.
    Skipped { qualifying: usize },
    /// Qualifying accounts grouped into per-transaction batches.
    Proceed { batches: Vec<Vec<WithheldFeeAccount>> },
}

impl WithdrawalPlan {
    pub fn build(
        accounts: Vec<WithheldFeeAccount>,
        min_accounts: usize,
        batch_size: usize,
    ) -> Self {
        if accounts.is_empty() {
            return Self::NoAccounts;
        }
        if accounts.len() < min_accounts {
            return Self::Skipped {
                qualifying: accounts.len(),
            };
        }
        let batches = accounts
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        Self::Proceed { batches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts(count: usize) -> Vec<WithheldFeeAccount> {
        (0..count)
            .map(|_| WithheldFeeAccount {
                pubkey: Pubkey::new_unique(),
                withheld_amount: 1,
            })
            .collect()
    }

    #[test]
    fn empty_scan_means_no_accounts() {
        assert_eq!(WithdrawalPlan::build(Vec::new(), 5, 10), WithdrawalPlan::NoAccounts);
    }

    #[test]
    fn below_the_minimum_is_skipped() {
        let plan = WithdrawalPlan::build(accounts(3), 5, 10);
        assert_eq!(plan, WithdrawalPlan::Skipped { qualifying: 3 });
    }

    #[test]
    fn qualifying_accounts_are_batched() {
        let plan = WithdrawalPlan::build(accounts(25), 5, 10);
        let WithdrawalPlan::Proceed { batches } = plan else {
            panic!("expected a proceed plan");
        };
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(batches[1].len(), 10);
        assert_eq!(batches[2].len(), 5);
    }
}
