#[macro_use]
extern crate rocket;

mod entrypoints;

use std::sync::Arc;
use std::time::Duration;

use rocket_prometheus::PrometheusMetrics;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use calmquest_server::notify::{Notifier, NoopNotifier, PushGateway};
use calmquest_server::{db, ledger_audit, rewards};

#[derive(Debug, serde::Deserialize)]
pub struct Env {
    push_gateway_url: Option<String>,
    push_gateway_token: Option<String>,
    storage_timeout_in_seconds: Option<u64>,
    audit_interval_in_minutes: Option<u32>,
}

#[launch]
async fn rocket() -> _ {
    dotenv::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().pretty());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let env = envy::from_env::<Env>().expect("Failed to load environment variables");
    let storage_timeout = env
        .storage_timeout_in_seconds
        .map(Duration::from_secs)
        .unwrap_or(rewards::DEFAULT_STORAGE_TIMEOUT);
    let audit_interval =
        Duration::from_secs(env.audit_interval_in_minutes.unwrap_or(60) as u64 * 60);
    let atomic_bool = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let atomic_bool_clone = atomic_bool.clone();

    let notifier: Arc<dyn Notifier> = match env.push_gateway_url {
        Some(url) => Arc::new(PushGateway::new(url, env.push_gateway_token)),
        None => {
            tracing::warn!("PUSH_GATEWAY_URL is not set, wallet notifications are disabled");
            Arc::new(NoopNotifier)
        }
    };

    let prometheus = PrometheusMetrics::new();
    let cors = rocket_cors::CorsOptions::default()
        .to_cors()
        .expect("Failed to build CORS fairing");

    let span = tracing::info_span!("Starting Rocket");
    let _enter = span.enter();

    let mut rocket = rocket::build()
        .attach(db::stage())
        .attach(rewards::stage(notifier, storage_timeout))
        .attach(prometheus.clone())
        .mount("/metrics", prometheus)
        .attach(cors)
        .attach(entrypoints::stage())
        .attach(rocket::fairing::AdHoc::on_shutdown(
            "Stop the ledger audit",
            |_| {
                Box::pin(async move {
                    atomic_bool_clone.store(false, std::sync::atomic::Ordering::Relaxed);
                })
            },
        ));

    // AUDIT_INTERVAL_IN_MINUTES=0 disables the periodic audit
    if env.audit_interval_in_minutes != Some(0) {
        rocket = rocket.attach(ledger_audit::stage(audit_interval, atomic_bool));
    }

    rocket
}
