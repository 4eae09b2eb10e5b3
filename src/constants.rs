// Audit actions
pub const GROUP_CONFIGURED: &str = "GROUP_CONFIGURED";
pub const ACCOUNT_CREATED: &str = "ACCOUNT_CREATED";
pub const BALANCE_ADJUSTED: &str = "BALANCE_ADJUSTED";
pub const MANUAL_ADJUSTMENT: &str = "MANUAL_ADJUSTMENT";
pub const REWARD_CREATED: &str = "REWARD_CREATED";
pub const REWARD_UPDATED: &str = "REWARD_UPDATED";
pub const REWARD_REDEEMED: &str = "REWARD_REDEEMED";
pub const THANKS_SENT: &str = "THANKS_SENT";
pub const LEVEL_CREATED: &str = "LEVEL_CREATED";
pub const LEVEL_ACHIEVED: &str = "LEVEL_ACHIEVED";
pub const RATINGS_RECOMPUTED: &str = "RATINGS_RECOMPUTED";

// Source entity types attached to transactions
pub const SOURCE_REWARD: &str = "reward";
pub const SOURCE_BONUS_ADJUSTMENT: &str = "bonus_adjustment";
pub const SOURCE_THANKS: &str = "thanks";

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
/// Upper bound on the magnitude of a single caller-supplied amount.
pub const MAX_AMOUNT: i64 = 1_000_000;
