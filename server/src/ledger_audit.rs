use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rocket::fairing::AdHoc;
use rocket_db_pools::Database;

use crate::db::DB;

/// Recomputes every wallet balance from the transaction log and logs a
/// warning per wallet that drifted. Read only, repairs stay manual.
pub async fn audit_wallets(db: &DB) -> anyhow::Result<()> {
    let drifted = db.wallet_drift().await?;
    for wallet in &drifted {
        tracing::warn!(
            "Wallet for {} holds {} CalmCoins but its transaction log sums to {}",
            wallet.user_id,
            wallet.balance,
            wallet.ledger_total
        );
    }

    if drifted.is_empty() {
        tracing::info!("Ledger audit passed, every wallet matches its transaction log");
    } else {
        tracing::info!("Ledger audit finished, {} wallets drifted", drifted.len());
    }

    Ok(())
}

pub fn stage(sleep_duration: Duration, atomic_bool: Arc<AtomicBool>) -> AdHoc {
    AdHoc::on_liftoff("Audit wallets against the transaction log", move |rocket| {
        Box::pin(async move {
            // Get an actual DB connection
            let db = DB::fetch(rocket)
                .expect("Failed to get DB connection")
                .clone();

            rocket::tokio::spawn(async move {
                let mut interval = rocket::tokio::time::interval(sleep_duration);
                while atomic_bool.load(Ordering::Relaxed) {
                    interval.tick().await;

                    if let Err(e) = audit_wallets(&db).await {
                        tracing::error!("Failed to audit wallets: {:#?}", e);
                    }
                }
            });
        })
    })
}
