use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocket::fairing::AdHoc;
use rocket::tokio::sync::{Mutex, OwnedMutexGuard};
use rocket::tokio::time::timeout;
use rocket_db_pools::Database;
use tracing::instrument;

use shared::{
    coins_for_game, game_index_from_id, replay_cost, BalanceEvent, UserRole, PARENT_GAME_LEVELS,
    PARENT_GAME_TYPE,
};

use crate::auth::Session;
use crate::db::types::{CoinAward, ProgressRecord, TransactionRecord, WalletRecord};
use crate::db::DB;
use crate::notify::Notifier;

pub mod mock;
mod types;


pub use types::*;

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_TRANSACTION_LIMIT: i64 = 20;
const MAX_TRANSACTION_LIMIT: i64 = 100;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_progress(
        &self,
        user_id: &str,
        game_id: &str,
        game_type: &str,
    ) -> anyhow::Result<Option<ProgressRecord>>;
    async fn save_progress(&self, record: &ProgressRecord) -> anyhow::Result<()>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn find_wallet(&self, user_id: &str) -> anyhow::Result<Option<WalletRecord>>;
    async fn save_wallet(&self, record: &WalletRecord) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, tx: &TransactionRecord) -> anyhow::Result<()>;
    async fn recent(&self, user_id: &str, limit: i64) -> anyhow::Result<Vec<TransactionRecord>>;
}

/// One asynchronous mutex per user. Requests for different users proceed in
/// parallel, requests for the same user queue up in arrival order. Idle
/// entries are evicted on the next acquire.
#[derive(Default)]
struct UserLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Entries only the map still references have no holder or waiter left
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Coordinates progress records, the CalmCoins wallet and the transaction
/// log for parent games. All mutating operations for one user run under
/// that user's lock.
pub struct RewardLedger {
    progress: Arc<dyn ProgressStore>,
    wallets: Arc<dyn WalletStore>,
    transactions: Arc<dyn TransactionStore>,
    notifier: Arc<dyn Notifier>,
    locks: UserLocks,
    storage_timeout: Duration,
}

impl RewardLedger {
    pub fn new(
        progress: Arc<dyn ProgressStore>,
        wallets: Arc<dyn WalletStore>,
        transactions: Arc<dyn TransactionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            progress,
            wallets,
            transactions,
            notifier,
            locks: UserLocks::default(),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn with_storage_timeout(mut self, storage_timeout: Duration) -> Self {
        self.storage_timeout = storage_timeout;
        self
    }

    /// Records a finished run, credits the tier reward on the first full
    /// completion and consumes a pending replay unlock.
    #[instrument(skip(self))]
    pub async fn complete_game(
        &self,
        session: &Session,
        input: CompleteGame,
    ) -> Result<GameCompletion, RewardError> {
        self.assert_parent(session)?;
        let _serialized = self.locks.acquire(&session.user_id).await;

        if input.total_levels != PARENT_GAME_LEVELS {
            return Err(RewardError::wrong_total_levels(input.total_levels));
        }
        if input.game_type != PARENT_GAME_TYPE {
            return Err(RewardError::foreign_game_type(&input.game_type));
        }
        // A zero override means "no override", the tier price applies
        let override_coins = match input.total_coins {
            // The wallet balance column is a signed 32 bit integer
            Some(amount) if amount > i32::MAX as u32 => {
                return Err(RewardError::oversized_total_coins(amount))
            }
            Some(amount) if amount > 0 => Some(amount),
            _ => None,
        };

        let mut record = self
            .guarded(
                "find progress",
                self.progress
                    .find_progress(&session.user_id, &input.game_id, &input.game_type),
            )
            .await?
            .unwrap_or_else(|| {
                ProgressRecord::fresh(
                    &session.user_id,
                    &input.game_id,
                    &input.game_type,
                    session.role,
                )
            });

        // Replay detection falls back to the stored flags so older clients
        // that never send isReplay still consume their unlock.
        let is_replay_attempt =
            input.is_replay || (record.fully_completed && record.replay_unlocked);
        let all_answers_correct =
            input.score == PARENT_GAME_LEVELS && input.total_levels == PARENT_GAME_LEVELS;
        let now = Utc::now();

        let mut calm_coins_earned = 0;
        let new_balance;
        if !is_replay_attempt && all_answers_correct && !record.fully_completed {
            let amount = override_coins.unwrap_or_else(|| coins_for_game(input.game_index));
            let total_earned = record
                .total_coins_earned
                .checked_add(amount as i32)
                .context("the cumulative coin counter overflowed")?;
            new_balance = self
                .credit(&session.user_id, amount, &input.game_id, now)
                .await?;
            calm_coins_earned = amount;
            record.total_coins_earned = total_earned;
            record
                .coins_earned_history
                .push(CoinAward::full_completion(amount, now));
        } else if is_replay_attempt {
            // The unlock is spent by playing, regardless of the result
            record.replay_unlocked = false;
            record.replay_unlocked_at = None;
            new_balance = self.balance(&session.user_id).await?;
        } else {
            new_balance = self.balance(&session.user_id).await?;
        }

        record.fully_completed = all_answers_correct;
        record.levels_completed = record.levels_completed.max(input.total_levels);
        record.highest_score = record.highest_score.max(input.score);
        record.last_played_at = Some(now);
        if all_answers_correct && record.first_completed_at.is_none() {
            record.first_completed_at = Some(now);
        }

        if let Err(e) = self
            .guarded("save progress", self.progress.save_progress(&record))
            .await
        {
            if calm_coins_earned > 0 {
                tracing::error!(
                    "Wallet for {} was credited but progress for {} failed to save: {e:?}",
                    session.user_id,
                    input.game_id
                );
            }
            return Err(e);
        }

        if calm_coins_earned > 0 {
            self.notifier.notify(
                &session.user_id,
                BalanceEvent::credited(new_balance, calm_coins_earned),
            );
        }

        Ok(GameCompletion {
            calm_coins_earned,
            new_balance,
            fully_completed: record.fully_completed,
            all_answers_correct,
            replay_unlocked: record.replay_unlocked,
            score: input.score,
            total_levels: input.total_levels,
        })
    }

    /// Stored progress for one game, or the defaults when the game was
    /// never played.
    #[instrument(skip(self))]
    pub async fn get_progress(
        &self,
        session: &Session,
        game_id: &str,
    ) -> Result<ProgressRecord, RewardError> {
        self.assert_parent(session)?;
        Ok(self
            .guarded(
                "find progress",
                self.progress
                    .find_progress(&session.user_id, game_id, PARENT_GAME_TYPE),
            )
            .await?
            .unwrap_or_else(|| {
                ProgressRecord::fresh(&session.user_id, game_id, PARENT_GAME_TYPE, session.role)
            }))
    }

    /// Spends CalmCoins to unlock one replay of a fully completed game.
    /// Unlocking an already unlocked game charges nothing.
    #[instrument(skip(self))]
    pub async fn unlock_replay(
        &self,
        session: &Session,
        game_id: &str,
        game_index: Option<i64>,
    ) -> Result<ReplayUnlock, RewardError> {
        self.assert_parent(session)?;
        let _serialized = self.locks.acquire(&session.user_id).await;

        let game_index = game_index.or_else(|| game_index_from_id(game_id));
        let cost = replay_cost(game_index);

        let mut record = self
            .guarded(
                "find progress",
                self.progress
                    .find_progress(&session.user_id, game_id, PARENT_GAME_TYPE),
            )
            .await?
            .ok_or(RewardError::NotFound)?;

        if !record.fully_completed {
            return Err(RewardError::Precondition);
        }
        if record.replay_unlocked {
            return Ok(ReplayUnlock {
                new_balance: self.balance(&session.user_id).await?,
                replay_cost: cost,
            });
        }

        let now = Utc::now();
        let mut wallet = self
            .guarded("find wallet", self.wallets.find_wallet(&session.user_id))
            .await?
            .unwrap_or_else(|| WalletRecord::empty(&session.user_id, now));
        let current_balance = wallet.balance as u32;
        if current_balance < cost {
            return Err(RewardError::InsufficientFunds {
                required: cost,
                current_balance,
            });
        }

        wallet.balance -= cost as i32;
        wallet.last_updated = now;
        self.guarded("save wallet", self.wallets.save_wallet(&wallet))
            .await?;

        let tx = TransactionRecord::debit(
            &session.user_id,
            cost,
            format!("Replay unlock for {game_id}"),
            now,
        );
        if let Err(e) = self
            .guarded("append transaction", self.transactions.append(&tx))
            .await
        {
            tracing::error!(
                "Wallet for {} was debited but the transaction log append failed: {e:?}",
                session.user_id
            );
            return Err(e);
        }

        record.replay_unlocked = true;
        record.replay_unlocked_at = Some(now);
        if let Err(e) = self
            .guarded("save progress", self.progress.save_progress(&record))
            .await
        {
            tracing::error!(
                "Wallet for {} was debited but the replay unlock on {} failed to save: {e:?}",
                session.user_id,
                game_id
            );
            return Err(e);
        }

        let new_balance = wallet.balance as u32;
        self.notifier
            .notify(&session.user_id, BalanceEvent::balance_only(new_balance));

        Ok(ReplayUnlock {
            new_balance,
            replay_cost: cost,
        })
    }

    /// Wallet balance together with the most recent transactions, newest
    /// first.
    #[instrument(skip(self))]
    pub async fn get_wallet(
        &self,
        session: &Session,
        limit: Option<i64>,
    ) -> Result<WalletView, RewardError> {
        self.assert_parent(session)?;

        let wallet = self
            .guarded("find wallet", self.wallets.find_wallet(&session.user_id))
            .await?;
        let limit = limit
            .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
            .clamp(1, MAX_TRANSACTION_LIMIT);
        let transactions = self
            .guarded(
                "list transactions",
                self.transactions.recent(&session.user_id, limit),
            )
            .await?;

        Ok(WalletView {
            balance: wallet.as_ref().map(|w| w.balance as u32).unwrap_or_default(),
            last_updated: wallet.map(|w| w.last_updated),
            transactions,
        })
    }

    fn assert_parent(&self, session: &Session) -> Result<(), RewardError> {
        if session.role != UserRole::Parent {
            return Err(RewardError::Forbidden);
        }
        Ok(())
    }

    async fn credit(
        &self,
        user_id: &str,
        amount: u32,
        game_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, RewardError> {
        let mut wallet = self
            .guarded("find wallet", self.wallets.find_wallet(user_id))
            .await?
            .unwrap_or_else(|| WalletRecord::empty(user_id, now));
        wallet.balance = wallet
            .balance
            .checked_add(amount as i32)
            .context("the wallet balance overflowed")?;
        wallet.last_updated = now;
        self.guarded("save wallet", self.wallets.save_wallet(&wallet))
            .await?;

        let tx = TransactionRecord::credit(
            user_id,
            amount,
            format!("Full completion reward for {game_id}"),
            now,
        );
        if let Err(e) = self
            .guarded("append transaction", self.transactions.append(&tx))
            .await
        {
            tracing::error!(
                "Wallet for {user_id} was credited but the transaction log append failed: {e:?}"
            );
            return Err(e);
        }

        Ok(wallet.balance as u32)
    }

    async fn balance(&self, user_id: &str) -> Result<u32, RewardError> {
        Ok(self
            .guarded("find wallet", self.wallets.find_wallet(user_id))
            .await?
            .map(|wallet| wallet.balance as u32)
            .unwrap_or_default())
    }

    /// Bounds every storage call so a stuck database surfaces as an error
    /// instead of a hung request.
    async fn guarded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = anyhow::Result<T>> + Send,
    ) -> Result<T, RewardError> {
        match timeout(self.storage_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RewardError::Internal(
                e.context(format!("storage call '{operation}' failed")),
            )),
            Err(_) => Err(RewardError::Internal(anyhow!(
                "storage call '{operation}' timed out after {:?}",
                self.storage_timeout
            ))),
        }
    }
}

pub fn stage(notifier: Arc<dyn Notifier>, storage_timeout: Duration) -> AdHoc {
    AdHoc::try_on_ignite("Reward ledger", move |rocket| async move {
        let Some(db) = DB::fetch(&rocket) else {
            rocket::error!("Failed to get DB connection for the reward ledger");
            return Err(rocket);
        };
        let db = db.clone();

        let ledger = RewardLedger::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(db),
            notifier,
        )
        .with_storage_timeout(storage_timeout);

        Ok(rocket.manage(ledger))
    })
}
