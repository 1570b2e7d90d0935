use calmquest_server::db::types::{CoinAward, ProgressRecord, TransactionRecord};
use calmquest_server::rewards::{
    CompleteGame, GameCompletion, ReplayUnlock, RewardError, WalletView,
};
use chrono::{DateTime, Utc};
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use shared::PARENT_GAME_TYPE;
use utoipa::ToSchema;

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteGameRequest {
    pub game_id: String,
    #[serde(default)]
    pub game_type: Option<String>,
    #[serde(default)]
    pub game_index: Option<i64>,
    #[serde(default)]
    pub score: Option<i32>,
    pub total_levels: i32,
    #[serde(default)]
    pub total_coins: Option<u32>,
    #[serde(default)]
    pub is_replay: Option<bool>,
}

impl From<CompleteGameRequest> for CompleteGame {
    fn from(request: CompleteGameRequest) -> Self {
        Self {
            game_id: request.game_id,
            game_type: request
                .game_type
                .unwrap_or_else(|| PARENT_GAME_TYPE.to_string()),
            game_index: request.game_index,
            score: request.score.unwrap_or_default(),
            total_levels: request.total_levels,
            total_coins: request.total_coins,
            is_replay: request.is_replay.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameCompletionResponse {
    pub success: bool,
    pub calm_coins_earned: u32,
    pub new_balance: u32,
    pub fully_completed: bool,
    pub all_answers_correct: bool,
    pub replay_unlocked: bool,
    pub score: i32,
    pub total_levels: i32,
}

impl From<GameCompletion> for GameCompletionResponse {
    fn from(completion: GameCompletion) -> Self {
        Self {
            success: true,
            calm_coins_earned: completion.calm_coins_earned,
            new_balance: completion.new_balance,
            fully_completed: completion.fully_completed,
            all_answers_correct: completion.all_answers_correct,
            replay_unlocked: completion.replay_unlocked,
            score: completion.score,
            total_levels: completion.total_levels,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoinAwardResponse {
    pub amount: u32,
    pub reason: String,
    pub earned_at: DateTime<Utc>,
}

impl From<CoinAward> for CoinAwardResponse {
    fn from(award: CoinAward) -> Self {
        Self {
            amount: award.amount,
            reason: award.reason,
            earned_at: award.earned_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameProgressResponse {
    pub success: bool,
    pub game_id: String,
    pub game_type: String,
    pub levels_completed: i32,
    pub total_levels: i32,
    pub fully_completed: bool,
    pub highest_score: i32,
    pub total_coins_earned: i32,
    pub coins_earned_history: Vec<CoinAwardResponse>,
    pub replay_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_unlocked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played_at: Option<DateTime<Utc>>,
}

impl From<ProgressRecord> for GameProgressResponse {
    fn from(record: ProgressRecord) -> Self {
        Self {
            success: true,
            game_id: record.game_id,
            game_type: record.game_type,
            levels_completed: record.levels_completed,
            total_levels: record.total_levels,
            fully_completed: record.fully_completed,
            highest_score: record.highest_score,
            total_coins_earned: record.total_coins_earned,
            coins_earned_history: record
                .coins_earned_history
                .into_iter()
                .map(Into::into)
                .collect(),
            replay_unlocked: record.replay_unlocked,
            replay_unlocked_at: record.replay_unlocked_at,
            first_completed_at: record.first_completed_at,
            last_played_at: record.last_played_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplayUnlockResponse {
    pub success: bool,
    pub replay_unlocked: bool,
    pub new_balance: u32,
    pub replay_cost: u32,
}

impl From<ReplayUnlock> for ReplayUnlockResponse {
    fn from(unlock: ReplayUnlock) -> Self {
        Self {
            success: true,
            replay_unlocked: true,
            new_balance: unlock.new_balance,
            replay_cost: unlock.replay_cost,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub kind: String,
    pub amount: u32,
    pub description: String,
    pub coin_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            kind: record.kind.to_string(),
            amount: record.amount as u32,
            description: record.description,
            coin_type: record.coin_type.to_string(),
            created_at: record.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub success: bool,
    pub balance: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub transactions: Vec<TransactionResponse>,
}

impl From<WalletView> for WalletResponse {
    fn from(view: WalletView) -> Self {
        Self {
            success: true,
            balance: view.balance,
            last_updated: view.last_updated,
            transactions: view.transactions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Error envelope shared by handlers and catchers. Clients branch on the
/// `success` flag, not on the HTTP status alone.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    /// Echo of the rejected input value, a number or a string.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub received: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_balance: Option<u32>,
}

impl ErrorBody {
    pub fn new(error: String) -> Self {
        Self {
            success: false,
            error,
            received: None,
            required: None,
            current_balance: None,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: Status,
    body: ErrorBody,
}

impl From<RewardError> for ApiError {
    fn from(error: RewardError) -> Self {
        let status = match &error {
            RewardError::Forbidden => Status::Forbidden,
            RewardError::Validation { .. }
            | RewardError::Precondition
            | RewardError::InsufficientFunds { .. } => Status::BadRequest,
            RewardError::NotFound => Status::NotFound,
            RewardError::Internal(_) => Status::InternalServerError,
        };

        let mut body = ErrorBody::new(error.to_string());
        match &error {
            RewardError::Validation { received, .. } => body.received = Some(received.clone()),
            RewardError::InsufficientFunds {
                required,
                current_balance,
            } => {
                body.required = Some(*required);
                body.current_balance = Some(*current_balance);
            }
            // The cause stays in the server log, clients get the envelope only
            RewardError::Internal(source) => {
                rocket::error!("Reward operation failed: {source:#}");
            }
            _ => {}
        }

        Self { status, body }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let mut response = Json(self.body).respond_to(request)?;
        response.set_status(self.status);
        Ok(response)
    }
}
