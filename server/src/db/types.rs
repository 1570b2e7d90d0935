use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CoinType, TxKind, UserRole, PARENT_GAME_LEVELS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinAward {
    pub amount: u32,
    pub reason: String,
    pub earned_at: DateTime<Utc>,
}

impl CoinAward {
    pub fn full_completion(amount: u32, earned_at: DateTime<Utc>) -> Self {
        Self {
            amount,
            reason: "full-completion".to_string(),
            earned_at,
        }
    }
}

/// One row per (user, game, game type). Progress is overwritten on every
/// play, the coin history only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub game_id: String,
    pub game_type: String,
    pub user_role: UserRole,
    pub levels_completed: i32,
    pub total_levels: i32,
    pub fully_completed: bool,
    pub highest_score: i32,
    pub total_coins_earned: i32,
    pub coins_earned_history: Vec<CoinAward>,
    pub replay_unlocked: bool,
    pub replay_unlocked_at: Option<DateTime<Utc>>,
    pub first_completed_at: Option<DateTime<Utc>>,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn fresh(user_id: &str, game_id: &str, game_type: &str, user_role: UserRole) -> Self {
        Self {
            user_id: user_id.to_string(),
            game_id: game_id.to_string(),
            game_type: game_type.to_string(),
            user_role,
            levels_completed: 0,
            total_levels: PARENT_GAME_LEVELS,
            fully_completed: false,
            highest_score: 0,
            total_coins_earned: 0,
            coins_earned_history: vec![],
            replay_unlocked: false,
            replay_unlocked_at: None,
            first_completed_at: None,
            last_played_at: None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletRecord {
    pub user_id: String,
    pub balance: i32,
    pub last_updated: DateTime<Utc>,
}

impl WalletRecord {
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance: 0,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub user_id: String,
    pub kind: TxKind,
    pub amount: i32,
    pub description: String,
    pub coin_type: CoinType,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn credit(
        user_id: &str,
        amount: u32,
        description: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: TxKind::Credit,
            amount: amount as i32,
            description,
            coin_type: CoinType::CalmCoins,
            created_at,
        }
    }

    pub fn debit(
        user_id: &str,
        amount: u32,
        description: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: TxKind::Debit,
            amount: amount as i32,
            description,
            coin_type: CoinType::CalmCoins,
            created_at,
        }
    }
}

/// A wallet whose balance no longer matches the fold of its transaction log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletDrift {
    pub user_id: String,
    pub balance: i32,
    pub ledger_total: i64,
}
