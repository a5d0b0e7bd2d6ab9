use crate::constants::PEER_TIMEOUT_SECS;
use cryptochain_core::{Channel, LedgerError, Transport};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Publishes by POSTing each message to every peer's `/api/pubsub/{channel}`.
///
/// Requests run on the tokio runtime in the background, so `publish` returns
/// at once and a slow or dead peer cannot stall the caller.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    peers: Vec<String>,
    runtime: Handle,
}

impl HttpTransport {
    pub fn new(peers: Vec<String>, runtime: Handle) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PEER_TIMEOUT_SECS))
            .build()?;
        let peers = peers
            .into_iter()
            .map(|p| p.trim_end_matches('/').to_string())
            .collect();
        Ok(Self {
            client,
            peers,
            runtime,
        })
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }
}

impl Transport for HttpTransport {
    fn publish(&self, channel: Channel, message: String) -> Result<(), LedgerError> {
        for peer in &self.peers {
            let url = format!("{peer}/api/pubsub/{channel}");
            let request = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(message.clone());
            self.runtime.spawn(async move {
                match request.send().await {
                    Ok(res) if res.status().is_success() => debug!("published to {url}"),
                    Ok(res) => warn!("peer {url} answered {}", res.status()),
                    Err(e) => warn!("publish to {url} failed: {e}"),
                }
            });
        }
        Ok(())
    }
}
