use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ClientError, ClientResult, DepositLookup};

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    #[serde(default)]
    vout: Vec<EsploraOutput>,
}

#[derive(Debug, Deserialize)]
struct EsploraOutput {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
}

/// Looks up deposits through an Esplora-compatible REST API.
pub struct EsploraDepositLookup {
    inner: Client,
    base_url: String,
}

impl EsploraDepositLookup {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidEndpoint(base_url));
        }
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self { inner, base_url })
    }
}

#[async_trait]
impl DepositLookup for EsploraDepositLookup {
    async fn latest_deposit_tx_id(&self, address: &str) -> ClientResult<Option<String>> {
        let url = format!("{}/address/{}/txs", self.base_url, address);
        let response = self.inner.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::HttpStatus(response.status()));
        }

        let txs: Vec<EsploraTx> = response.json().await?;
        debug!("{} transactions seen for deposit address", txs.len());
        Ok(latest_paying_tx(&txs, address))
    }
}

/// Esplora lists newest first; the first transaction with an output to
/// `address` is the latest deposit.
fn latest_paying_tx(txs: &[EsploraTx], address: &str) -> Option<String> {
    txs.iter()
        .find(|tx| {
            tx.vout
                .iter()
                .any(|out| out.scriptpubkey_address.as_deref() == Some(address))
        })
        .map(|tx| tx.txid.clone())
}
