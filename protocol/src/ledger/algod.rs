//! HTTP client for a ledger node's v2 REST API.
//!
//! Provides async access to:
//! - Program compilation
//! - Suggested transaction parameters
//! - Transaction submission and pending status
//! - Account balance and application local state
//! - Round status and waiting

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{LedgerClient, LocalState, PendingInfo};
use crate::account::Address;
use crate::config::NodeConfig;
use crate::error::{classify_node_message, LedgerError, Result};
use crate::program::CompiledProgram;
use crate::transaction::{encode_group, SignedTransaction, SuggestedParams};

const TOKEN_HEADER: &str = "X-Algo-API-Token";

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CompileResponse {
    hash: String,
    result: String,
}

#[derive(Debug, Deserialize)]
struct ParamsResponse {
    fee: u64,
    #[serde(rename = "min-fee")]
    min_fee: u64,
    #[serde(rename = "last-round")]
    last_round: u64,
    #[serde(rename = "genesis-id")]
    genesis_id: String,
    #[serde(rename = "genesis-hash")]
    genesis_hash: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    #[serde(rename = "confirmed-round", default)]
    confirmed_round: Option<u64>,
    #[serde(rename = "pool-error", default)]
    pool_error: String,
    #[serde(rename = "application-index", default)]
    application_index: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "last-round")]
    last_round: u64,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct AccountApplicationResponse {
    #[serde(rename = "app-local-state")]
    app_local_state: Option<AppLocalState>,
}

#[derive(Debug, Deserialize)]
struct AppLocalState {
    #[serde(rename = "key-value", default)]
    key_value: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    /// Base64 of the raw key bytes.
    key: String,
    value: TealValue,
}

#[derive(Debug, Deserialize)]
struct TealValue {
    #[serde(default)]
    uint: u64,
}

// ---------------------------------------------------------------------------
// AlgodClient
// ---------------------------------------------------------------------------

/// Async client for a ledger node.
pub struct AlgodClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl AlgodClient {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        if self.token.is_empty() {
            builder
        } else {
            builder.header(TOKEN_HEADER, &self.token)
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| LedgerError::ParseResponse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(reqwest::Method::GET, path)).await
    }
}

async fn error_from_response(response: reqwest::Response) -> LedgerError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);
    classify_node_message(status, &message)
}

fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(value)
        .map_err(|e| LedgerError::ParseResponse(format!("{}: {}", field, e)))
}

#[async_trait]
impl LedgerClient for AlgodClient {
    async fn compile(&self, source: &str) -> Result<CompiledProgram> {
        let builder = self
            .request(reqwest::Method::POST, "/v2/teal/compile")
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(source.to_string());
        let response: CompileResponse = self.send(builder).await?;

        let program = CompiledProgram::from_bytecode(decode_base64("result", &response.result)?);
        if program.address().to_string() != response.hash {
            return Err(LedgerError::ParseResponse(format!(
                "compile hash {} does not match bytecode address {}",
                response.hash,
                program.address()
            )));
        }
        tracing::debug!(address = %program.address(), len = program.bytecode().len(), "compiled program");
        Ok(program)
    }

    async fn suggested_params(&self) -> Result<SuggestedParams> {
        let response: ParamsResponse = self.get("/v2/transactions/params").await?;
        let hash = decode_base64("genesis-hash", &response.genesis_hash)?;
        let genesis_hash: [u8; 32] = hash.try_into().map_err(|_| {
            LedgerError::ParseResponse("genesis-hash is not 32 bytes".to_string())
        })?;

        Ok(SuggestedParams {
            fee_per_byte: response.fee,
            min_fee: response.min_fee,
            last_round: response.last_round,
            genesis_id: response.genesis_id,
            genesis_hash,
        })
    }

    async fn submit(&self, group: &[SignedTransaction]) -> Result<String> {
        if group.is_empty() {
            return Err(LedgerError::Construction("nothing to submit".to_string()));
        }
        let builder = self
            .request(reqwest::Method::POST, "/v2/transactions")
            .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
            .body(encode_group(group));
        let response: SubmitResponse = self.send(builder).await?;
        Ok(response.tx_id)
    }

    async fn pending_info(&self, tx_id: &str) -> Result<PendingInfo> {
        let response: PendingResponse = self
            .get(&format!("/v2/transactions/pending/{}", tx_id))
            .await?;
        Ok(PendingInfo {
            confirmed_round: response.confirmed_round.unwrap_or(0),
            pool_error: response.pool_error,
            application_index: response.application_index,
        })
    }

    async fn account_application_state(
        &self,
        address: &Address,
        app_id: u64,
    ) -> Result<Option<LocalState>> {
        let path = format!("/v2/accounts/{}/applications/{}", address, app_id);
        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: AccountApplicationResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::ParseResponse(e.to_string()))?;

        let Some(local) = body.app_local_state else {
            return Ok(None);
        };
        let mut pairs = Vec::with_capacity(local.key_value.len());
        for kv in &local.key_value {
            let key = decode_base64("key", &kv.key)?;
            pairs.push((String::from_utf8_lossy(&key).into_owned(), kv.value.uint));
        }
        Ok(Some(LocalState::from_pairs(
            pairs.iter().map(|(k, v)| (k.as_str(), *v)),
        )))
    }

    async fn current_round(&self) -> Result<u64> {
        let status: StatusResponse = self.get("/v2/status").await?;
        Ok(status.last_round)
    }

    async fn await_round(&self, round: u64) -> Result<u64> {
        let after = round.saturating_sub(1);
        let status: StatusResponse = self
            .get(&format!("/v2/status/wait-for-block-after/{}", after))
            .await?;
        Ok(status.last_round)
    }

    async fn account_balance(&self, address: &Address) -> Result<u64> {
        let account: AccountResponse = self.get(&format!("/v2/accounts/{}", address)).await?;
        Ok(account.amount)
    }
}
