//! JSON-RPC 2.0 client for a deployed ledger contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;

use mirror_types::{
    AccountEntity, Address, Batch, CurrencyType, Entity, FeeKey, FeeSchedule, Frontier,
    FutureParams, LedgerEntry, LedgerHash, SettlementType, Token, TokenTotals, TokenType,
};

use crate::error::RemoteError;
use crate::service::{ContractInfo, LedgerService};

/// Default timeout for a single remote call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-RPC error codes the service uses for "try again later".
const RETRYABLE_CODES: &[i64] = &[-32603, -32005, -32000];

/// JSON-RPC error code for a missing record.
const NOT_FOUND_CODE: i64 = -32001;

/// Client for one contract instance behind a JSON-RPC endpoint.
///
/// Every [`LedgerService`] operation becomes one `POST` carrying
/// `{"jsonrpc":"2.0","id":n,"method":...,"params":[contract, ...]}`.
pub struct RpcLedgerClient {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    endpoint_url: String,
    contract: Address,
    next_id: AtomicU64,
}

/// Raw JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcLedgerClient {
    /// Create a client with default timeout settings.
    pub fn new(endpoint_url: impl Into<String>, contract: Address) -> Self {
        Self::with_timeout(endpoint_url, contract, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom per-call timeout.
    pub fn with_timeout(
        endpoint_url: impl Into<String>,
        contract: Address,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            endpoint_url: endpoint_url.into(),
            contract,
            next_id: AtomicU64::new(1),
        }
    }

    /// The contract instance this client talks to.
    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T, RemoteError> {
        let result = self.call_raw(method, args).await?;
        serde_json::from_value(result)
            .map_err(|e| RemoteError::InvalidResponse(format!("{method}: {e}")))
    }

    async fn call_unit(&self, method: &str, args: Value) -> Result<(), RemoteError> {
        self.call_raw(method, args).await.map(|_| ())
    }

    async fn call_raw(&self, method: &str, args: Value) -> Result<Value, RemoteError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, self.contract, args);
        trace!(id, method, "rpc call");

        let response = self
            .http_client
            .post(&self.endpoint_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Transient(format!("{method}: request timed out: {e}"))
                } else if e.is_connect() {
                    RemoteError::Transient(format!("{method}: connection failed: {e}"))
                } else {
                    RemoteError::Transient(format!("{method}: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::Transient(format!("{method}: HTTP status {status}")));
        }
        if !status.is_success() {
            return Err(RemoteError::Rejected(format!("{method}: HTTP status {status}")));
        }

        let envelope: RpcResponse = response.json().await.map_err(|e| {
            RemoteError::InvalidResponse(format!("{method}: failed to parse response: {e}"))
        })?;
        decode_envelope(method, envelope)
    }
}

/// Build the JSON-RPC request body. The contract address is always the
/// first positional parameter.
fn request_body(id: u64, method: &str, contract: Address, args: Value) -> Value {
    let mut params = vec![json!(contract)];
    match args {
        Value::Array(items) => params.extend(items),
        Value::Null => {}
        other => params.push(other),
    }
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

fn decode_envelope(method: &str, envelope: RpcResponse) -> Result<Value, RemoteError> {
    if let Some(err) = envelope.error {
        let detail = format!("{method}: {} (code {})", err.message, err.code);
        return Err(if RETRYABLE_CODES.contains(&err.code) {
            RemoteError::Transient(detail)
        } else if err.code == NOT_FOUND_CODE {
            RemoteError::NotFound(detail)
        } else {
            RemoteError::Rejected(detail)
        });
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}

impl LedgerService for RpcLedgerClient {
    async fn contract_info(&self) -> Result<ContractInfo, RemoteError> {
        self.call("getContractInfo", Value::Null).await
    }

    async fn currency_types(&self) -> Result<Vec<CurrencyType>, RemoteError> {
        self.call("getCcyTypes", Value::Null).await
    }

    async fn token_types(&self) -> Result<Vec<TokenType>, RemoteError> {
        self.call("getSecTokenTypes", Value::Null).await
    }

    async fn fee(&self, key: FeeKey) -> Result<FeeSchedule, RemoteError> {
        self.call(
            "getFee",
            json!([key.subject, key.subject_id, key.owner.address()]),
        )
        .await
    }

    async fn whitelist(&self) -> Result<Vec<Address>, RemoteError> {
        self.call("getWhitelist", Value::Null).await
    }

    async fn ledger_owners(&self) -> Result<Vec<Address>, RemoteError> {
        self.call("getLedgerOwners", Value::Null).await
    }

    async fn ledger_entry(&self, owner: Address) -> Result<LedgerEntry, RemoteError> {
        self.call("getLedgerEntry", json!([owner])).await
    }

    async fn batch(&self, id: u64) -> Result<Batch, RemoteError> {
        self.call("getSecTokenBatch", json!([id])).await
    }

    async fn token(&self, st_id: u64) -> Result<Token, RemoteError> {
        self.call("getSecToken", json!([st_id])).await
    }

    async fn frontier(&self) -> Result<Frontier, RemoteError> {
        self.call("getFrontier", Value::Null).await
    }

    async fn entities(&self) -> Result<Vec<Entity>, RemoteError> {
        self.call("getEntities", Value::Null).await
    }

    async fn account_entities(&self) -> Result<Vec<AccountEntity>, RemoteError> {
        self.call("getAccountEntities", Value::Null).await
    }

    async fn totals(&self) -> Result<TokenTotals, RemoteError> {
        self.call("getSecToken_totals", Value::Null).await
    }

    async fn is_sealed(&self) -> Result<bool, RemoteError> {
        self.call("isSealed", Value::Null).await
    }

    async fn ledger_hashcode(
        &self,
        segment: u32,
        segments: u32,
    ) -> Result<LedgerHash, RemoteError> {
        self.call("getLedgerHashcode", json!([segment, segments])).await
    }

    async fn add_currency_type(
        &self,
        name: &str,
        unit: &str,
        decimals: u16,
    ) -> Result<u32, RemoteError> {
        self.call("addCcyType", json!([name, unit, decimals])).await
    }

    async fn add_token_type(
        &self,
        name: &str,
        settlement_type: SettlementType,
        future_params: &FutureParams,
        linked_contract: Address,
    ) -> Result<u32, RemoteError> {
        self.call(
            "addSecTokenType",
            json!([name, settlement_type, future_params, linked_contract]),
        )
        .await
    }

    async fn set_fee(&self, key: FeeKey, fee: &FeeSchedule) -> Result<(), RemoteError> {
        self.call_unit(
            "setFee",
            json!([key.subject, key.subject_id, key.owner.address(), fee]),
        )
        .await
    }

    async fn create_entity(&self, entity: &Entity) -> Result<(), RemoteError> {
        self.call_unit("createEntity", json!([entity])).await
    }

    async fn whitelist_many(&self, addresses: &[Address]) -> Result<(), RemoteError> {
        self.call_unit("whitelistMany", json!([addresses])).await
    }

    async fn set_account_entity(&self, mapping: &AccountEntity) -> Result<(), RemoteError> {
        self.call_unit("setAccountEntity", json!([mapping])).await
    }

    async fn create_ledger_entries(&self, entries: &[LedgerEntry]) -> Result<(), RemoteError> {
        let seeds: Vec<LedgerEntry> = entries.iter().map(LedgerEntry::seed).collect();
        self.call_unit("createLedgerEntries", json!([seeds])).await
    }

    async fn load_batches(&self, batches: &[Batch]) -> Result<(), RemoteError> {
        self.call_unit("loadSecTokenBatch", json!([batches])).await
    }

    async fn add_token(&self, owner: Option<Address>, token: &Token) -> Result<(), RemoteError> {
        self.call_unit(
            "addSecToken",
            json!([owner.unwrap_or(Address::ZERO), token]),
        )
        .await
    }

    async fn set_totals(&self, totals: &TokenTotals) -> Result<(), RemoteError> {
        self.call_unit("setTokenTotals", json!([totals])).await
    }

    async fn seal(&self) -> Result<(), RemoteError> {
        self.call_unit("seal", Value::Null).await
    }
}
