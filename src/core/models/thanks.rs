use crate::core::models::{account::Account, transaction::Transaction};
use serde::{Deserialize, Serialize};

/// Both sides of a committed peer-to-peer transfer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ThanksReceipt {
    pub sender: Account,
    pub receiver: Account,
    pub sent: Transaction,
    pub received: Transaction,
}
