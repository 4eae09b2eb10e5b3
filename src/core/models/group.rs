use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How far below zero a group lets balances go.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "limit", rename_all = "UPPERCASE")]
pub enum DebtLimit {
    #[default]
    NoDebt,
    Limited(Decimal),
    Unlimited,
}

impl DebtLimit {
    pub fn permits(&self, balance: Decimal) -> bool {
        match self {
            DebtLimit::NoDebt => balance >= Decimal::ZERO,
            DebtLimit::Limited(limit) => balance >= -*limit,
            DebtLimit::Unlimited => true,
        }
    }
}

impl std::fmt::Display for DebtLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebtLimit::NoDebt => write!(f, "NO_DEBT"),
            DebtLimit::Limited(limit) => write!(f, "LIMITED({})", limit),
            DebtLimit::Unlimited => write!(f, "UNLIMITED"),
        }
    }
}

/// Group configuration owned by the group-management side.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GroupSettings {
    pub group_id: String,
    /// Code of the group's active bonus type; new accounts are denominated in it.
    pub currency_code: Option<String>,
    pub debt_limit: DebtLimit,
}

impl GroupSettings {
    pub fn new(group_id: &str, currency_code: &str) -> Self {
        GroupSettings {
            group_id: group_id.to_string(),
            currency_code: Some(currency_code.to_string()),
            debt_limit: DebtLimit::default(),
        }
    }

    pub fn with_debt_limit(mut self, debt_limit: DebtLimit) -> Self {
        self.debt_limit = debt_limit;
        self
    }
}
