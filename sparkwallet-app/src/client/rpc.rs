use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    parse_transfers, BalanceResponse, ClientError, ClientResult, CreatedInvoice,
    InitializedWallet, InvoiceStatus, Network, Transfer, WalletConnector, WalletSession,
};

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResponse {
    session_id: String,
    #[serde(default)]
    mnemonic: Option<String>,
}

/// JSON-RPC transport to the process hosting the Spark SDK.
#[derive(Clone)]
struct RpcTransport {
    inner: Client,
    url: Url,
}

impl RpcTransport {
    fn new(endpoint: &str, timeout: Duration) -> ClientResult<Self> {
        let url = Url::parse(endpoint).map_err(|e| ClientError::InvalidEndpoint(e.to_string()))?;
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self { inner, url })
    }

    async fn request(&self, method: &str, params: Value) -> ClientResult<Value> {
        let payload = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params,
        };

        debug!("SDK call: {}", method);
        let response = self.inner.post(self.url.clone()).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::HttpStatus(response.status()));
        }

        let response: JsonRpcResponse = response.json().await?;
        if let Some(error) = response.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> ClientResult<R> {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Connects to an SDK bridge speaking JSON-RPC over HTTP.
pub struct HttpWalletConnector {
    transport: RpcTransport,
}

impl HttpWalletConnector {
    pub fn new(endpoint: &str, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            transport: RpcTransport::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl WalletConnector for HttpWalletConnector {
    async fn initialize(
        &self,
        mnemonic_or_seed: Option<&str>,
        network: Network,
    ) -> ClientResult<InitializedWallet> {
        let response: InitializeResponse = self
            .transport
            .call(
                "initialize",
                json!({
                    "mnemonicOrSeed": mnemonic_or_seed,
                    "options": { "network": network },
                }),
            )
            .await?;

        let session = HttpWalletSession {
            transport: self.transport.clone(),
            session_id: response.session_id,
        };

        Ok(InitializedWallet {
            session: Arc::new(session),
            mnemonic: response.mnemonic.filter(|m| !m.trim().is_empty()),
        })
    }
}

/// A wallet held by the SDK bridge, addressed by its session id.
pub struct HttpWalletSession {
    transport: RpcTransport,
    session_id: String,
}

impl HttpWalletSession {
    fn params(&self, mut extra: Value) -> Value {
        if let Value::Object(ref mut map) = extra {
            map.insert("sessionId".into(), Value::String(self.session_id.clone()));
            extra
        } else {
            json!({ "sessionId": self.session_id })
        }
    }
}

#[async_trait]
impl WalletSession for HttpWalletSession {
    async fn get_balance(&self) -> ClientResult<u64> {
        let response: BalanceResponse = self
            .transport
            .call("getBalance", self.params(json!({})))
            .await?;
        Ok(response.balance)
    }

    async fn transfer(&self, receiver_address: &str, amount_sats: u64) -> ClientResult<()> {
        self.transport
            .request(
                "transfer",
                self.params(json!({
                    "receiverSparkAddress": receiver_address,
                    "amountSats": amount_sats,
                })),
            )
            .await?;
        Ok(())
    }

    async fn pay_lightning_invoice(&self, invoice: &str, max_fee_sats: u64) -> ClientResult<()> {
        self.transport
            .request(
                "payLightningInvoice",
                self.params(json!({
                    "invoice": invoice,
                    "maxFeeSats": max_fee_sats,
                })),
            )
            .await?;
        Ok(())
    }

    async fn create_lightning_invoice(
        &self,
        amount_sats: u64,
        memo: &str,
    ) -> ClientResult<CreatedInvoice> {
        let value = self
            .transport
            .request(
                "createLightningInvoice",
                self.params(json!({
                    "amountSats": amount_sats,
                    "memo": memo,
                })),
            )
            .await?;
        CreatedInvoice::from_value(&value)
    }

    async fn get_lightning_receive_request(&self, id: &str) -> ClientResult<Option<InvoiceStatus>> {
        let value = self
            .transport
            .request("getLightningReceiveRequest", self.params(json!({ "id": id })))
            .await?;
        Ok(value
            .get("status")
            .and_then(Value::as_str)
            .map(InvoiceStatus::parse))
    }

    async fn get_single_use_deposit_address(&self) -> ClientResult<String> {
        self.transport
            .call("getSingleUseDepositAddress", self.params(json!({})))
            .await
    }

    async fn claim_deposit(&self, tx_id: &str) -> ClientResult<()> {
        let result = self
            .transport
            .request("claimDeposit", self.params(json!({ "txId": tx_id })))
            .await?;
        debug!("claimDeposit result: {}", result);
        Ok(())
    }

    async fn get_spark_address(&self) -> ClientResult<String> {
        self.transport
            .call("getSparkAddress", self.params(json!({})))
            .await
    }

    async fn get_transfers(&self, limit: usize, offset: usize) -> ClientResult<Vec<Transfer>> {
        let value = self
            .transport
            .request(
                "getTransfers",
                self.params(json!({ "limit": limit, "offset": offset })),
            )
            .await?;
        parse_transfers(value)
    }
}
