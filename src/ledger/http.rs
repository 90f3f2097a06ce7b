use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use wallet::Address;

use super::types::{
    AdvanceRequest, AirdropRequest, BalanceResponse, RejectResponse, SubmitResponse, TimeResponse,
};
use super::{EscrowAccount, LedgerClient, TransactionStatus};
use crate::asset::AssetClass;
use crate::config::EscrowConfig;
use crate::error::LedgerError;
use crate::transaction::TransactionId;

/// JSON-over-HTTP ledger client
#[derive(Clone)]
pub struct HttpLedgerClient {
    base_url: String,
    /// reqwest::Client is internally Arc-based
    client: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &EscrowConfig) -> Result<Self, LedgerError> {
        Self::new(config.ledger_url.clone(), config.ledger_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Devnet faucet; returns the new balance
    pub async fn request_airdrop(
        &self,
        address: &Address,
        asset: &AssetClass,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        let request = AirdropRequest {
            address: *address,
            asset: *asset,
            amount,
        };
        let response = self
            .client
            .post(self.url("/devnet/airdrop"))
            .json(&request)
            .send()
            .await
            .map_err(read_error)?;
        let balance: BalanceResponse = decode(response).await?;
        Ok(balance.amount)
    }

    /// Devnet only: shift the ledger clock
    pub async fn advance_time(&self, by: Duration) -> Result<DateTime<Utc>, LedgerError> {
        let response = self
            .client
            .post(self.url("/devnet/advance"))
            .json(&AdvanceRequest {
                seconds: by.num_seconds(),
            })
            .send()
            .await
            .map_err(read_error)?;
        let time: TimeResponse = decode(response).await?;
        Ok(time.now)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, LedgerError> {
        let url = self.url(path);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send().await.map_err(read_error)?;
        decode(response).await
    }
}

/// Reads are idempotent, so every transport failure is simply "unavailable"
/// unless it was a timeout.
fn read_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Timeout(err.to_string())
    } else {
        LedgerError::Unavailable(err.to_string())
    }
}

/// For a submission only a refused connection proves nothing was delivered
fn submit_error(err: reqwest::Error) -> LedgerError {
    if err.is_connect() {
        LedgerError::Unavailable(err.to_string())
    } else {
        LedgerError::Timeout(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LedgerError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(if status.is_server_error() {
            LedgerError::Unavailable(format!("HTTP {}: {}", status, body))
        } else {
            LedgerError::InvalidResponse(format!("HTTP {}: {}", status, body))
        });
    }
    response
        .json()
        .await
        .map_err(|e| LedgerError::InvalidResponse(format!("Invalid JSON: {}", e)))
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_balance(&self, address: &Address, asset: &AssetClass) -> Result<u64, LedgerError> {
        let url = self.url(&format!("/balance/{}", address));
        let response = self
            .client
            .get(&url)
            .query(&[("asset", asset.to_string())])
            .send()
            .await
            .map_err(read_error)?;
        let balance: BalanceResponse = decode(response).await?;
        Ok(balance.amount)
    }

    async fn get_escrow(&self, address: &Address) -> Result<Option<EscrowAccount>, LedgerError> {
        let url = self.url(&format!("/escrow/{}", address));
        let response = self.client.get(&url).send().await.map_err(read_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    async fn submit_transaction(&self, signed_bytes: &[u8]) -> Result<TransactionId, LedgerError> {
        let url = self.url("/tx");
        log::debug!("POST {} ({} bytes)", url, signed_bytes.len());

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed_bytes.to_vec())
            .send()
            .await
            .map_err(submit_error)?;

        let status = response.status();
        if status.is_success() {
            let submitted: SubmitResponse = response.json().await.map_err(|e| {
                // delivered and accepted, but the id was lost on the way back
                LedgerError::Timeout(format!("unreadable submit response: {}", e))
            })?;
            return Ok(submitted.transaction_id);
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
            let rejected: RejectResponse = response
                .json()
                .await
                .map_err(|e| LedgerError::InvalidResponse(format!("Invalid JSON: {}", e)))?;
            return Err(LedgerError::Rejected(rejected.reason));
        }

        let body = response.text().await.unwrap_or_default();
        log::error!("Ledger answered HTTP {} to a submission: {}", status, body);
        Err(LedgerError::Timeout(format!("HTTP {}: {}", status, body)))
    }

    async fn get_transaction_status(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionStatus, LedgerError> {
        self.get_json(&format!("/tx/{}/status", id)).await
    }

    async fn current_time(&self) -> Result<DateTime<Utc>, LedgerError> {
        let time: TimeResponse = self.get_json("/time").await?;
        Ok(time.now)
    }
}
