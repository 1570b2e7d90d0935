use std::time::Duration;

use reqwest::Client;
use rocket::tokio::sync::mpsc;

use shared::BalanceEvent;

const PUSH_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Best effort delivery of wallet updates to the in-app notification
/// gateway. Publishing never blocks and never fails the calling request.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: &str, event: BalanceEvent);
}

#[derive(Clone)]
pub struct PushGateway {
    sender: mpsc::UnboundedSender<(String, BalanceEvent)>,
}

async fn sender_task(
    mut reader: mpsc::UnboundedReceiver<(String, BalanceEvent)>,
    client: Client,
    base_url: String,
    token: Option<String>,
) {
    while let Some((user_id, event)) = reader.recv().await {
        let url = format!("{base_url}/internal/users/{user_id}/wallet-events");
        let mut request = client.post(&url).timeout(PUSH_REQUEST_TIMEOUT).json(&event);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => tracing::warn!(
                "Push gateway returned HTTP {} for {user_id}",
                response.status()
            ),
            Err(e) => tracing::warn!("Failed to push the wallet update for {user_id}: {e}"),
        }
    }
}

impl PushGateway {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        rocket::tokio::spawn(sender_task(receiver, Client::new(), base_url, token));
        Self { sender }
    }
}

impl Notifier for PushGateway {
    fn notify(&self, user_id: &str, event: BalanceEvent) {
        let _ = self.sender.send((user_id.to_string(), event));
    }
}

/// Used when no gateway is configured, wallet events are dropped.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _user_id: &str, _event: BalanceEvent) {}
}
