//! Boundary to the external Spark wallet SDK.
//!
//! Everything cryptographic or network-facing lives behind these traits.
//! Responses are validated here so malformed payloads never reach
//! controller state.

mod deposit;
mod error;
mod rpc;
mod types;

use async_trait::async_trait;

pub use deposit::EsploraDepositLookup;
pub use error::ClientError;
pub use rpc::{HttpWalletConnector, HttpWalletSession};
pub use types::{
    parse_transfers, BalanceResponse, CreatedInvoice, InitializedWallet, InvoiceStatus, Network,
    Transfer,
};

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Creates or restores wallets.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Initializes a wallet. `None` generates a fresh wallet and returns its mnemonic.
    async fn initialize(
        &self,
        mnemonic_or_seed: Option<&str>,
        network: Network,
    ) -> ClientResult<InitializedWallet>;
}

/// Operations available on an initialized wallet.
#[async_trait]
pub trait WalletSession: Send + Sync {
    async fn get_balance(&self) -> ClientResult<u64>;

    async fn transfer(&self, receiver_address: &str, amount_sats: u64) -> ClientResult<()>;

    async fn pay_lightning_invoice(&self, invoice: &str, max_fee_sats: u64) -> ClientResult<()>;

    async fn create_lightning_invoice(
        &self,
        amount_sats: u64,
        memo: &str,
    ) -> ClientResult<CreatedInvoice>;

    /// Returns `None` when the SDK has no record of the request yet.
    async fn get_lightning_receive_request(&self, id: &str) -> ClientResult<Option<InvoiceStatus>>;

    async fn get_single_use_deposit_address(&self) -> ClientResult<String>;

    async fn claim_deposit(&self, tx_id: &str) -> ClientResult<()>;

    async fn get_spark_address(&self) -> ClientResult<String>;

    async fn get_transfers(&self, limit: usize, offset: usize) -> ClientResult<Vec<Transfer>>;
}

/// Finds on-chain transactions paying to a deposit address.
#[async_trait]
pub trait DepositLookup: Send + Sync {
    async fn latest_deposit_tx_id(&self, address: &str) -> ClientResult<Option<String>>;
}
