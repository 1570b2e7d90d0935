use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use rocket::{
    fairing::{self, AdHoc},
    Build, Rocket,
};
use rocket_db_pools::Database;
use sqlx::{postgres::PgRow, PgPool, Row};

use shared::{CoinType, TxKind, UserRole};

use crate::rewards::{ProgressStore, TransactionStore, WalletStore};

#[derive(Database, Clone, Debug)]
#[database("calmquest")]
pub struct DB(PgPool);

pub mod types;

use types::{ProgressRecord, TransactionRecord, WalletDrift, WalletRecord};

fn progress_from_row(row: PgRow) -> anyhow::Result<ProgressRecord> {
    let role: String = row.try_get("user_role")?;
    let history: serde_json::Value = row.try_get("coins_earned_history")?;
    Ok(ProgressRecord {
        user_id: row.try_get("user_id")?,
        game_id: row.try_get("game_id")?,
        game_type: row.try_get("game_type")?,
        user_role: UserRole::from_str(&role).with_context(|| format!("unknown user role {role}"))?,
        levels_completed: row.try_get("levels_completed")?,
        total_levels: row.try_get("total_levels")?,
        fully_completed: row.try_get("fully_completed")?,
        highest_score: row.try_get("highest_score")?,
        total_coins_earned: row.try_get("total_coins_earned")?,
        coins_earned_history: serde_json::from_value(history)
            .context("coins_earned_history is not a list of awards")?,
        replay_unlocked: row.try_get("replay_unlocked")?,
        replay_unlocked_at: row.try_get("replay_unlocked_at")?,
        first_completed_at: row.try_get("first_completed_at")?,
        last_played_at: row.try_get("last_played_at")?,
    })
}

fn transaction_from_row(row: PgRow) -> anyhow::Result<TransactionRecord> {
    let kind: String = row.try_get("kind")?;
    let coin_type: String = row.try_get("coin_type")?;
    Ok(TransactionRecord {
        user_id: row.try_get("user_id")?,
        kind: TxKind::from_str(&kind).with_context(|| format!("unknown transaction kind {kind}"))?,
        amount: row.try_get("amount")?,
        description: row.try_get("description")?,
        coin_type: CoinType::from_str(&coin_type)
            .with_context(|| format!("unknown coin type {coin_type}"))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ProgressStore for DB {
    async fn find_progress(
        &self,
        user_id: &str,
        game_id: &str,
        game_type: &str,
    ) -> anyhow::Result<Option<ProgressRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, game_id, game_type, user_role, levels_completed, total_levels,
                   fully_completed, highest_score, total_coins_earned, coins_earned_history,
                   replay_unlocked, replay_unlocked_at, first_completed_at, last_played_at
            FROM game_progress
            WHERE user_id = $1 AND game_id = $2 AND game_type = $3
            "#,
        )
        .bind(user_id)
        .bind(game_id)
        .bind(game_type)
        .fetch_optional(&self.0)
        .await?;

        row.map(progress_from_row).transpose()
    }

    async fn save_progress(&self, record: &ProgressRecord) -> anyhow::Result<()> {
        let history = serde_json::to_value(&record.coins_earned_history)?;

        // First try to update the existing row
        let updated = sqlx::query(
            r#"
            UPDATE game_progress
            SET user_role = $4, levels_completed = $5, total_levels = $6, fully_completed = $7,
                highest_score = $8, total_coins_earned = $9, coins_earned_history = $10,
                replay_unlocked = $11, replay_unlocked_at = $12, first_completed_at = $13,
                last_played_at = $14
            WHERE user_id = $1 AND game_id = $2 AND game_type = $3
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.game_id)
        .bind(&record.game_type)
        .bind(record.user_role.to_string())
        .bind(record.levels_completed)
        .bind(record.total_levels)
        .bind(record.fully_completed)
        .bind(record.highest_score)
        .bind(record.total_coins_earned)
        .bind(&history)
        .bind(record.replay_unlocked)
        .bind(record.replay_unlocked_at)
        .bind(record.first_completed_at)
        .bind(record.last_played_at)
        .execute(&self.0)
        .await?;

        // If the update did not find a matching row, insert the record
        if updated.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO game_progress (user_id, game_id, game_type, user_role,
                                           levels_completed, total_levels, fully_completed,
                                           highest_score, total_coins_earned, coins_earned_history,
                                           replay_unlocked, replay_unlocked_at, first_completed_at,
                                           last_played_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (user_id, game_id, game_type) DO NOTHING
                "#,
            )
            .bind(&record.user_id)
            .bind(&record.game_id)
            .bind(&record.game_type)
            .bind(record.user_role.to_string())
            .bind(record.levels_completed)
            .bind(record.total_levels)
            .bind(record.fully_completed)
            .bind(record.highest_score)
            .bind(record.total_coins_earned)
            .bind(&history)
            .bind(record.replay_unlocked)
            .bind(record.replay_unlocked_at)
            .bind(record.first_completed_at)
            .bind(record.last_played_at)
            .execute(&self.0)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl WalletStore for DB {
    async fn find_wallet(&self, user_id: &str) -> anyhow::Result<Option<WalletRecord>> {
        Ok(sqlx::query_as::<_, WalletRecord>(
            "SELECT user_id, balance, last_updated FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.0)
        .await?)
    }

    async fn save_wallet(&self, record: &WalletRecord) -> anyhow::Result<()> {
        let updated =
            sqlx::query("UPDATE wallets SET balance = $2, last_updated = $3 WHERE user_id = $1")
                .bind(&record.user_id)
                .bind(record.balance)
                .bind(record.last_updated)
                .execute(&self.0)
                .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO wallets (user_id, balance, last_updated)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(&record.user_id)
            .bind(record.balance)
            .bind(record.last_updated)
            .execute(&self.0)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl TransactionStore for DB {
    async fn append(&self, tx: &TransactionRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coin_transactions (user_id, kind, amount, description, coin_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&tx.user_id)
        .bind(tx.kind.to_string())
        .bind(tx.amount)
        .bind(&tx.description)
        .bind(tx.coin_type.to_string())
        .bind(tx.created_at)
        .execute(&self.0)
        .await?;

        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: i64) -> anyhow::Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, kind, amount, description, coin_type, created_at
            FROM coin_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.0)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }
}

impl DB {
    /// Wallets whose balance disagrees with the signed sum of their
    /// `calmcoins` transactions. An empty result means the ledger is
    /// consistent.
    pub async fn wallet_drift(&self) -> anyhow::Result<Vec<WalletDrift>> {
        Ok(sqlx::query_as::<_, WalletDrift>(
            r#"
            SELECT w.user_id, w.balance,
                   COALESCE(SUM(CASE WHEN t.kind = 'credit' THEN t.amount ELSE -t.amount END), 0)
                       AS ledger_total
            FROM wallets w
            LEFT JOIN coin_transactions t
                   ON t.user_id = w.user_id AND t.coin_type = 'calmcoins'
            GROUP BY w.user_id, w.balance
            HAVING w.balance <> COALESCE(SUM(CASE WHEN t.kind = 'credit' THEN t.amount ELSE -t.amount END), 0)
            "#,
        )
        .fetch_all(&self.0)
        .await?)
    }
}

async fn run_migrations(rocket: Rocket<Build>) -> fairing::Result {
    match DB::fetch(&rocket) {
        Some(db) => match sqlx::migrate!("./migrations").run(&**db).await {
            Ok(_) => Ok(rocket),
            Err(e) => {
                rocket::error!("Failed to initialize SQLx database: {}", e);
                Err(rocket)
            }
        },
        None => Err(rocket),
    }
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("SQLx Stage", |rocket| async {
        rocket
            .attach(DB::init())
            .attach(AdHoc::try_on_ignite("SQLx Migrations", run_migrations))
    })
}
