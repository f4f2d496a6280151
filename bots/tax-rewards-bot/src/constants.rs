// Scheduler cadence
pub const WITHDRAW_SWAP_INTERVAL_SECS: u64 = 60;
pub const DISTRIBUTE_INTERVAL_SECS: u64 = 600; // 10 minutes

// Holder scan policy
pub const HOLDER_PAGE_SIZE: usize = 100;
pub const DEFAULT_MIN_HOLDINGS: u64 = 1_000; // raw units, holders must be strictly above
pub const MIN_HOLDER_SHARE_DENOMINATOR: u128 = 1_000_000; // shares below 1e-6 are dust
pub const MIN_REWARD_AMOUNT: u64 = 100_000; // raw reward floor per holder

// Distribution policy
pub const REWARD_POOL_SHARE_BPS: u64 = 2_500; // 25% of the rewards balance per cycle
pub const MIN_DISTRIBUTION_BALANCE_TOKENS: u64 = 1_000; // whole tokens
pub const MAX_INSTRUCTIONS_PER_BATCH: usize = 20; // stays under the 1232-byte transaction limit
pub const MIN_TRANSFER_AMOUNT: u64 = 1; // raw units
pub const INTER_BATCH_DELAY_MS: u64 = 1_000;

// Withdrawal policy
pub const WITHDRAW_ACCOUNTS_PER_BATCH: usize = 10;
pub const MIN_ACCOUNTS_FOR_WITHDRAWAL: usize = 5;
pub const MIN_SOL_FOR_FEES: u64 = 10_000_000; // 0.01 SOL

// Swap policy
pub const SWAP_PERCENTAGE: u8 = 100;
pub const DEFAULT_SLIPPAGE_BPS: u16 = 2_000;
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;
pub const MAX_PRIORITY_FEE_LAMPORTS: u64 = 10_000_000;
pub const JUPITER_QUOTE_URL: &str = "https://quote-api.jup.ag/v6/quote";
pub const JUPITER_SWAP_URL: &str = "https://quote-api.jup.ag/v6/swap";

// Post-confirmation transaction lookup
pub const TRANSACTION_LOOKUP_RETRIES: usize = 5;
pub const TRANSACTION_LOOKUP_DELAY_MS: u64 = 1_000;

// Public RPC endpoints by network
pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const TESTNET_RPC_URL: &str = "https://api.testnet.solana.com";
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
