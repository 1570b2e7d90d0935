use serde::{Deserialize, Serialize};

/// Payload pushed to the notification gateway after a wallet balance change.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEvent {
    pub new_balance: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calm_coins_earned: Option<u32>,
}

impl BalanceEvent {
    pub fn credited(new_balance: u32, calm_coins_earned: u32) -> Self {
        Self {
            new_balance,
            calm_coins_earned: Some(calm_coins_earned),
        }
    }

    pub fn balance_only(new_balance: u32) -> Self {
        Self {
            new_balance,
            calm_coins_earned: None,
        }
    }
}
