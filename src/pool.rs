//! Client for the pool server's per-slot control routes.

use std::time::Duration;

use reqwest::Client;

use crate::config::ServerConfig;
use crate::error::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Addresses one pool slot: `<host>:<port>/<pool_id>`.
#[derive(Debug, Clone)]
pub struct PoolClient {
    client: Client,
    host: String,
    port: u16,
    pool_id: u32,
}

impl PoolClient {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            host: server.host.trim_end_matches('/').to_string(),
            port: server.port,
            pool_id: server.pool_id,
        })
    }

    pub fn slot_url(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.pool_id)
    }

    /// Ask the pool server to restart this slot's instance.
    pub async fn restart(&self) -> Result<()> {
        let url = format!("{}/restart", self.slot_url());
        log::info!("Requesting restart of pool slot {}", self.pool_id);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::network_with_url(&url, e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::network_with_url(&url, resp.status().to_string()));
        }
        Ok(())
    }
}
