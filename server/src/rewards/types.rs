use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use shared::{PARENT_GAME_LEVELS, PARENT_GAME_TYPE};

use crate::db::types::TransactionRecord;

/// A finished game run as reported by the client, after wire defaults have
/// been applied.
#[derive(Debug, Clone)]
pub struct CompleteGame {
    pub game_id: String,
    pub game_type: String,
    pub game_index: Option<i64>,
    pub score: i32,
    pub total_levels: i32,
    pub total_coins: Option<u32>,
    pub is_replay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCompletion {
    pub calm_coins_earned: u32,
    pub new_balance: u32,
    pub fully_completed: bool,
    pub all_answers_correct: bool,
    pub replay_unlocked: bool,
    pub score: i32,
    pub total_levels: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayUnlock {
    pub new_balance: u32,
    pub replay_cost: u32,
}

#[derive(Debug, Clone)]
pub struct WalletView {
    pub balance: u32,
    pub last_updated: Option<DateTime<Utc>>,
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Error)]
pub enum RewardError {
    #[error("only parents can use the parent games reward service")]
    Forbidden,
    #[error("{message}")]
    Validation { message: String, received: Value },
    #[error("no progress recorded for this game yet")]
    NotFound,
    #[error("the game must be fully completed before a replay can be unlocked")]
    Precondition,
    #[error("not enough CalmCoins: the replay costs {required}, the wallet holds {current_balance}")]
    InsufficientFunds { required: u32, current_balance: u32 },
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl RewardError {
    pub fn wrong_total_levels(received: i32) -> Self {
        Self::Validation {
            message: format!(
                "totalLevels must be {PARENT_GAME_LEVELS} for parent games, received {received}"
            ),
            received: json!(received),
        }
    }

    pub fn foreign_game_type(received: &str) -> Self {
        Self::Validation {
            message: format!(
                "gameType must be {PARENT_GAME_TYPE} for parent games, received {received}"
            ),
            received: json!(received),
        }
    }

    pub fn oversized_total_coins(received: u32) -> Self {
        Self::Validation {
            message: format!("totalCoins must be at most {}, received {received}", i32::MAX),
            received: json!(received),
        }
    }
}
