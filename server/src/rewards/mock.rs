use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use rocket::tokio::sync::RwLock;
use rocket::tokio::time::sleep;

use shared::BalanceEvent;

use crate::db::types::{ProgressRecord, TransactionRecord, WalletRecord};
use crate::notify::Notifier;

use super::{ProgressStore, TransactionStore, WalletStore};

/// In-memory stand-in for the Postgres stores. Failure injection and an
/// artificial delay make the error paths reachable without a database.
#[derive(Default)]
pub struct MemoryStore {
    progress: RwLock<HashMap<(String, String, String), ProgressRecord>>,
    wallets: RwLock<HashMap<String, WalletRecord>>,
    transactions: RwLock<Vec<TransactionRecord>>,
    delay: StdMutex<Option<Duration>>,
    fail_progress_saves: AtomicBool,
    fail_wallet_saves: AtomicBool,
    fail_transaction_appends: AtomicBool,
}

impl MemoryStore {
    pub fn fail_progress_saves(&self) {
        self.fail_progress_saves.store(true, Ordering::Relaxed);
    }

    pub fn fail_wallet_saves(&self) {
        self.fail_wallet_saves.store(true, Ordering::Relaxed);
    }

    pub fn fail_transaction_appends(&self) {
        self.fail_transaction_appends.store(true, Ordering::Relaxed);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub async fn stored_progress(
        &self,
        user_id: &str,
        game_id: &str,
        game_type: &str,
    ) -> Option<ProgressRecord> {
        self.progress
            .read()
            .await
            .get(&key(user_id, game_id, game_type))
            .cloned()
    }

    pub async fn stored_balance(&self, user_id: &str) -> Option<i32> {
        self.wallets
            .read()
            .await
            .get(user_id)
            .map(|wallet| wallet.balance)
    }

    pub async fn transaction_log(&self) -> Vec<TransactionRecord> {
        self.transactions.read().await.clone()
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
    }
}

fn key(user_id: &str, game_id: &str, game_type: &str) -> (String, String, String) {
    (
        user_id.to_string(),
        game_id.to_string(),
        game_type.to_string(),
    )
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_progress(
        &self,
        user_id: &str,
        game_id: &str,
        game_type: &str,
    ) -> anyhow::Result<Option<ProgressRecord>> {
        self.simulate_latency().await;
        Ok(self
            .progress
            .read()
            .await
            .get(&key(user_id, game_id, game_type))
            .cloned())
    }

    async fn save_progress(&self, record: &ProgressRecord) -> anyhow::Result<()> {
        self.simulate_latency().await;
        if self.fail_progress_saves.load(Ordering::Relaxed) {
            bail!("injected progress save failure");
        }
        self.progress.write().await.insert(
            key(&record.user_id, &record.game_id, &record.game_type),
            record.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn find_wallet(&self, user_id: &str) -> anyhow::Result<Option<WalletRecord>> {
        self.simulate_latency().await;
        Ok(self.wallets.read().await.get(user_id).cloned())
    }

    async fn save_wallet(&self, record: &WalletRecord) -> anyhow::Result<()> {
        self.simulate_latency().await;
        if self.fail_wallet_saves.load(Ordering::Relaxed) {
            bail!("injected wallet save failure");
        }
        self.wallets
            .write()
            .await
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn append(&self, tx: &TransactionRecord) -> anyhow::Result<()> {
        self.simulate_latency().await;
        if self.fail_transaction_appends.load(Ordering::Relaxed) {
            bail!("injected transaction append failure");
        }
        self.transactions.write().await.push(tx.clone());
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: i64) -> anyhow::Result<Vec<TransactionRecord>> {
        self.simulate_latency().await;
        let log = self.transactions.read().await;
        let mut transactions: Vec<TransactionRecord> = log
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        // The log is appended in chronological order
        transactions.reverse();
        transactions.truncate(limit as usize);
        Ok(transactions)
    }
}

/// Captures published events instead of delivering them.
#[derive(Default)]
pub struct RecordingNotifier {
    events: StdMutex<Vec<(String, BalanceEvent)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(String, BalanceEvent)> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user_id: &str, event: BalanceEvent) {
        self.events
            .lock()
            .unwrap()
            .push((user_id.to_string(), event));
    }
}
