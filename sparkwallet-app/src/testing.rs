//! In-memory stand-ins for the wallet SDK, deposit lookup and clipboard.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{
    ClientError, ClientResult, CreatedInvoice, DepositLookup, InitializedWallet, InvoiceStatus,
    Network, Transfer, WalletConnector, WalletSession,
};
use crate::clipboard::ClipboardBackend;

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub struct FakeSession {
    balance: AtomicU64,
    balance_error: Mutex<Option<String>>,
    balance_calls: AtomicUsize,
    statuses: Mutex<VecDeque<ClientResult<Option<InvoiceStatus>>>>,
    status_queries: AtomicUsize,
    invoice_response: Mutex<Value>,
    invoice_calls: Mutex<Vec<(u64, String)>>,
    spark_transfers: Mutex<Vec<(String, u64)>>,
    lightning_payments: Mutex<Vec<(String, u64)>>,
    send_error: Mutex<Option<String>>,
    claims: Mutex<Vec<String>>,
    claim_error: Mutex<Option<String>>,
    deposit_addresses: AtomicUsize,
    history: Mutex<Vec<Transfer>>,
    history_error: Mutex<Option<String>>,
    history_calls: Mutex<Vec<(usize, usize)>>,
}

impl FakeSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            balance: AtomicU64::new(0),
            balance_error: Mutex::new(None),
            balance_calls: AtomicUsize::new(0),
            statuses: Mutex::new(VecDeque::new()),
            status_queries: AtomicUsize::new(0),
            invoice_response: Mutex::new(json!({
                "id": "inv-1",
                "invoice": { "encodedInvoice": "lnbc50u1pfakeinvoice" }
            })),
            invoice_calls: Mutex::new(Vec::new()),
            spark_transfers: Mutex::new(Vec::new()),
            lightning_payments: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            claims: Mutex::new(Vec::new()),
            claim_error: Mutex::new(None),
            deposit_addresses: AtomicUsize::new(0),
            history: Mutex::new(Vec::new()),
            history_error: Mutex::new(None),
            history_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_balance(&self, sats: u64) {
        self.balance.store(sats, Ordering::SeqCst);
    }

    pub fn fail_balance(&self, message: Option<&str>) {
        *self.balance_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn queue_statuses<'a>(&self, statuses: impl IntoIterator<Item = &'a str>) {
        let mut queue = self.statuses.lock().unwrap();
        for status in statuses {
            queue.push_back(Ok(Some(InvoiceStatus::parse(status))));
        }
    }

    pub fn queue_status_error(&self, message: &str) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Err(ClientError::rpc(message)));
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn set_invoice_response(&self, value: Value) {
        *self.invoice_response.lock().unwrap() = value;
    }

    pub fn invoice_calls(&self) -> Vec<(u64, String)> {
        self.invoice_calls.lock().unwrap().clone()
    }

    pub fn spark_transfers(&self) -> Vec<(String, u64)> {
        self.spark_transfers.lock().unwrap().clone()
    }

    pub fn lightning_payments(&self) -> Vec<(String, u64)> {
        self.lightning_payments.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, message: Option<&str>) {
        *self.send_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn claimed(&self) -> Vec<String> {
        self.claims.lock().unwrap().clone()
    }

    pub fn fail_claims(&self, message: &str) {
        *self.claim_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn deposit_addresses_issued(&self) -> usize {
        self.deposit_addresses.load(Ordering::SeqCst)
    }

    pub fn set_history(&self, count: usize) {
        *self.history.lock().unwrap() = (0..count)
            .map(|i| Transfer {
                id: format!("transfer-{}", i),
                status: "COMPLETED".into(),
                total_value: 1000 + i as u64,
                created_time: None,
                transfer_type: "TRANSFER".into(),
            })
            .collect();
    }

    pub fn fail_history(&self, message: Option<&str>) {
        *self.history_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn history_calls(&self) -> Vec<(usize, usize)> {
        self.history_calls.lock().unwrap().clone()
    }

    fn error_from(slot: &Mutex<Option<String>>) -> ClientResult<()> {
        match slot.lock().unwrap().as_deref() {
            Some(message) => Err(ClientError::rpc(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WalletSession for FakeSession {
    async fn get_balance(&self) -> ClientResult<u64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Self::error_from(&self.balance_error)?;
        Ok(self.balance.load(Ordering::SeqCst))
    }

    async fn transfer(&self, receiver_address: &str, amount_sats: u64) -> ClientResult<()> {
        Self::error_from(&self.send_error)?;
        self.spark_transfers
            .lock()
            .unwrap()
            .push((receiver_address.to_string(), amount_sats));
        Ok(())
    }

    async fn pay_lightning_invoice(&self, invoice: &str, max_fee_sats: u64) -> ClientResult<()> {
        Self::error_from(&self.send_error)?;
        self.lightning_payments
            .lock()
            .unwrap()
            .push((invoice.to_string(), max_fee_sats));
        Ok(())
    }

    async fn create_lightning_invoice(
        &self,
        amount_sats: u64,
        memo: &str,
    ) -> ClientResult<CreatedInvoice> {
        self.invoice_calls
            .lock()
            .unwrap()
            .push((amount_sats, memo.to_string()));
        let response = self.invoice_response.lock().unwrap().clone();
        CreatedInvoice::from_value(&response)
    }

    async fn get_lightning_receive_request(&self, _id: &str) -> ClientResult<Option<InvoiceStatus>> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn get_single_use_deposit_address(&self) -> ClientResult<String> {
        let n = self.deposit_addresses.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("bc1qdeposit{}", n))
    }

    async fn claim_deposit(&self, tx_id: &str) -> ClientResult<()> {
        Self::error_from(&self.claim_error)?;
        self.claims.lock().unwrap().push(tx_id.to_string());
        Ok(())
    }

    async fn get_spark_address(&self) -> ClientResult<String> {
        Ok("sp1qfakesparkaddress".to_string())
    }

    async fn get_transfers(&self, limit: usize, offset: usize) -> ClientResult<Vec<Transfer>> {
        self.history_calls.lock().unwrap().push((limit, offset));
        if let Some(message) = self.history_error.lock().unwrap().as_deref() {
            return Err(ClientError::InvalidResponse(message.to_string()));
        }
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

pub struct FakeConnector {
    session: Arc<FakeSession>,
    error: Mutex<Option<String>>,
    calls: Mutex<Vec<Option<String>>>,
}

impl FakeConnector {
    pub fn new(session: Arc<FakeSession>) -> Arc<Self> {
        Arc::new(Self {
            session,
            error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.error.lock().unwrap() = message.map(str::to_string);
    }

    /// Seeds passed to `initialize`, `None` for generated wallets.
    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletConnector for FakeConnector {
    async fn initialize(
        &self,
        mnemonic_or_seed: Option<&str>,
        _network: Network,
    ) -> ClientResult<InitializedWallet> {
        self.calls
            .lock()
            .unwrap()
            .push(mnemonic_or_seed.map(str::to_string));

        if let Some(message) = self.error.lock().unwrap().as_deref() {
            return Err(ClientError::rpc(message));
        }

        Ok(InitializedWallet {
            session: self.session.clone(),
            mnemonic: mnemonic_or_seed
                .is_none()
                .then(|| TEST_MNEMONIC.to_string()),
        })
    }
}

pub struct FakeLookup {
    latest: Mutex<Option<String>>,
    queries: AtomicUsize,
}

impl FakeLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            latest: Mutex::new(None),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn set_latest(&self, tx_id: Option<&str>) {
        *self.latest.lock().unwrap() = tx_id.map(str::to_string);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DepositLookup for FakeLookup {
    async fn latest_deposit_tx_id(&self, _address: &str) -> ClientResult<Option<String>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    fail: bool,
    written: Mutex<Vec<String>>,
}

impl FakeClipboard {
    pub fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            written: Mutex::new(Vec::new()),
        })
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClipboardBackend for FakeClipboard {
    fn name(&self) -> &str {
        "fake"
    }

    async fn write_text(&self, text: &str) -> Result<(), String> {
        if self.fail {
            return Err("clipboard unavailable".into());
        }
        self.written.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
