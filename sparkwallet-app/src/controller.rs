//! WalletController - the single owner and writer of application state.
//!
//! Every user action goes through a method here. The controller calls the
//! wallet SDK, updates its `AppState` and publishes a snapshot to observers
//! through a watch channel. Pollers run as separate tasks and report back
//! as `ControllerEvent`s, which the owner of the controller feeds into
//! `handle_event`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::client::{
    ClientError, DepositLookup, InvoiceStatus, WalletConnector, WalletSession,
};
use crate::clipboard::{ClipboardService, COPY_FAILURE, COPY_SUCCESS};
use crate::error::{Result, SparkWalletError};
use crate::navigation::{InitStage, Screen};
use crate::pollers::{
    spawn_copy_status_timer, spawn_deposit_sweep, spawn_invoice_poller, ControllerEvent, PollTask,
    TaskId,
};
use crate::state::{
    invoice_amount_sats, is_valid_seed_phrase, AppState, Confirmation, LightningInvoice,
    ReceiveKind, SendKind, MIN_INVOICE_BALANCE_SATS, SEED_WORD_COUNT, TRANSFERS_PER_PAGE,
};
use crate::storage::AppSettings;
use crate::vault::{is_valid_pin, CredentialVault, VaultStatus, PIN_LENGTH};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Maximum routing fee for a Lightning payment: 1% of the amount, rounded up.
pub fn max_fee_sats(amount_sats: u64) -> u64 {
    amount_sats.div_ceil(100)
}

/// Parse a user-entered amount. Must be a whole number of sats above zero.
pub fn parse_sats(input: &str) -> Result<u64> {
    match input.trim().parse::<u64>() {
        Ok(sats) if sats > 0 => Ok(sats),
        _ => Err(SparkWalletError::validation(
            "Please enter a valid amount greater than 0",
        )),
    }
}

fn is_current(task: &Option<PollTask>, id: TaskId) -> bool {
    task.as_ref().is_some_and(|t| t.id() == id)
}

pub struct WalletController {
    state: AppState,
    settings: AppSettings,
    connector: Arc<dyn WalletConnector>,
    deposits: Arc<dyn DepositLookup>,
    vault: CredentialVault,
    clipboard: ClipboardService,
    session: Option<Arc<dyn WalletSession>>,
    updates: watch::Sender<AppState>,
    events_tx: mpsc::Sender<ControllerEvent>,
    events_rx: mpsc::Receiver<ControllerEvent>,
    next_task_id: TaskId,
    invoice_poll: Option<PollTask>,
    deposit_sweep: Option<PollTask>,
    copy_timer: Option<PollTask>,
}

impl WalletController {
    pub fn new(
        settings: AppSettings,
        connector: Arc<dyn WalletConnector>,
        deposits: Arc<dyn DepositLookup>,
        vault: CredentialVault,
        clipboard: ClipboardService,
    ) -> Self {
        let state = AppState::new();
        let (updates, _) = watch::channel(state.clone());
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            state,
            settings,
            connector,
            deposits,
            vault,
            clipboard,
            session: None,
            updates,
            events_tx,
            events_rx,
            next_task_id: 0,
            invoice_poll: None,
            deposit_sweep: None,
            copy_timer: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Observe state snapshots. The receiver starts with the current state.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.state.clone());
    }

    fn record_error(&mut self, err: &SparkWalletError) {
        warn!("{}", err);
        self.state.error = Some(err.to_string());
    }

    /// Surface a failed action on the state, then publish.
    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.record_error(e);
        }
        self.publish();
        result
    }

    fn session(&self) -> Result<Arc<dyn WalletSession>> {
        self.session.clone().ok_or(SparkWalletError::NotInitialized)
    }

    fn next_task_id(&mut self) -> TaskId {
        self.next_task_id += 1;
        self.next_task_id
    }

    // =========================================================================
    // Startup and onboarding
    // =========================================================================

    /// Pick the first screen from what the vault holds.
    pub async fn startup(&mut self) -> Result<()> {
        let status = self.vault.status();
        info!("Saved wallet status: {}", status);

        self.state.reset();
        let result = match status {
            VaultStatus::Locked => {
                self.state.init_stage = InitStage::PinEntry;
                Ok(())
            }
            VaultStatus::Unprotected => self.restore_saved_wallet().await,
            VaultStatus::NotSetup => Ok(()),
        };
        self.finish(result)
    }

    async fn restore_saved_wallet(&mut self) -> Result<()> {
        let Some(mnemonic) = self.vault.load_mnemonic().map(Zeroizing::new) else {
            return Ok(());
        };

        info!("Found saved wallet, restoring...");
        match self
            .connector
            .initialize(Some(mnemonic.as_str()), self.settings.network)
            .await
        {
            Ok(wallet) => {
                info!("Wallet restored from local storage");
                self.enter_wallet(wallet.session).await;
                Ok(())
            }
            Err(e) => {
                // The saved phrase cannot be used; start over from the landing screen
                self.vault.clear();
                Err(e.into())
            }
        }
    }

    /// Generate a new wallet and show its mnemonic for backup.
    pub async fn create_wallet(&mut self) -> Result<()> {
        self.state.error = None;
        let result = self.try_create_wallet().await;
        self.finish(result)
    }

    async fn try_create_wallet(&mut self) -> Result<()> {
        info!("Initializing wallet with {} configuration...", self.settings.network);
        let wallet = self.connector.initialize(None, self.settings.network).await?;

        let mnemonic = wallet
            .mnemonic
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                ClientError::InvalidResponse("wallet initialization returned no mnemonic".into())
            })?;

        self.session = Some(wallet.session);
        self.state.pending_mnemonic = Some(mnemonic);
        self.state.screen = Screen::Init;
        self.state.init_stage = InitStage::ShowMnemonic;
        Ok(())
    }

    /// Leave the mnemonic backup screen for PIN setup.
    pub fn continue_to_wallet(&mut self) -> Result<()> {
        let result = if self.state.init_stage == InitStage::ShowMnemonic
            && self.state.pending_mnemonic.is_some()
        {
            self.state.clear_pin_inputs();
            self.state.init_stage = InitStage::PinSetup;
            Ok(())
        } else {
            Err(SparkWalletError::NotInitialized)
        };
        self.finish(result)
    }

    /// Protect the freshly created wallet with `pin` and open it.
    pub async fn set_pin(&mut self, pin: &str, confirmation: &str) -> Result<()> {
        self.state.error = None;
        let result = self.try_set_pin(pin, confirmation).await;
        self.finish(result)
    }

    async fn try_set_pin(&mut self, pin: &str, confirmation: &str) -> Result<()> {
        let session = self.session()?;
        let mnemonic = self
            .state
            .pending_mnemonic
            .clone()
            .map(Zeroizing::new)
            .ok_or(SparkWalletError::NotInitialized)?;

        if !is_valid_pin(pin) {
            return Err(SparkWalletError::validation(format!(
                "PIN must be exactly {} digits",
                PIN_LENGTH
            )));
        }
        if pin != confirmation {
            return Err(SparkWalletError::validation("PINs do not match"));
        }

        if !self.vault.save_with_pin(&mnemonic, pin) {
            return Err(SparkWalletError::Storage(
                "Failed to save wallet credentials".into(),
            ));
        }

        self.enter_wallet(session).await;
        Ok(())
    }

    /// Abandon the new wallet before a PIN was set.
    pub fn cancel_pin_setup(&mut self) {
        info!("Wallet setup cancelled");
        self.session = None;
        self.state.pending_mnemonic = None;
        self.state.clear_pin_inputs();
        self.state.wallet_ready = false;
        self.state.screen = Screen::Init;
        self.state.init_stage = InitStage::Landing;
        self.publish();
    }

    /// Open the PIN-protected saved wallet.
    pub async fn unlock(&mut self, pin: &str) -> Result<()> {
        self.state.error = None;
        let result = self.try_unlock(pin).await;
        self.finish(result)
    }

    async fn try_unlock(&mut self, pin: &str) -> Result<()> {
        if !self.vault.has_pin_protection() {
            self.state.init_stage = InitStage::Landing;
            return Err(SparkWalletError::Storage("No saved wallet found".into()));
        }

        self.state.pin_input.clear();
        if !self.vault.verify_pin(pin) {
            return Err(SparkWalletError::InvalidPin);
        }

        let mnemonic = self
            .vault
            .load_mnemonic()
            .map(Zeroizing::new)
            .ok_or_else(|| SparkWalletError::Storage("No saved wallet found".into()))?;

        let wallet = self
            .connector
            .initialize(Some(mnemonic.as_str()), self.settings.network)
            .await?;

        info!("Wallet unlocked");
        self.enter_wallet(wallet.session).await;
        Ok(())
    }

    /// Submit whatever PIN form the Init screen is showing.
    pub async fn submit_pin(&mut self) -> Result<()> {
        let pin = Zeroizing::new(self.state.pin_input.clone());
        match self.state.init_stage {
            InitStage::PinSetup => {
                let confirmation = Zeroizing::new(self.state.pin_confirmation.clone());
                self.set_pin(&pin, &confirmation).await
            }
            InitStage::PinEntry => self.unlock(&pin).await,
            _ => Ok(()),
        }
    }

    pub fn start_restore(&mut self) {
        self.state.seed_input.clear();
        self.state.init_stage = InitStage::Restoring;
        self.publish();
    }

    pub fn cancel_restore(&mut self) {
        self.state.seed_input.clear();
        self.state.init_stage = InitStage::Landing;
        self.publish();
    }

    /// Whether the restore action is enabled for the current seed input.
    pub fn can_restore(&self) -> bool {
        self.state.can_restore()
    }

    /// Restore a wallet from a 12-word phrase and save it without a PIN.
    pub async fn restore_wallet(&mut self, seed: &str) -> Result<()> {
        self.state.error = None;
        let result = self.try_restore_wallet(seed).await;
        self.finish(result)
    }

    async fn try_restore_wallet(&mut self, seed: &str) -> Result<()> {
        if !is_valid_seed_phrase(seed) {
            return Err(SparkWalletError::validation(format!(
                "Seed phrase must contain exactly {} words",
                SEED_WORD_COUNT
            )));
        }

        let seed = Zeroizing::new(seed.split_whitespace().collect::<Vec<_>>().join(" "));
        info!("Restoring wallet with {} configuration...", self.settings.network);
        let wallet = self
            .connector
            .initialize(Some(seed.as_str()), self.settings.network)
            .await?;

        if !self.vault.save_unprotected(&seed) {
            warn!("Restored wallet could not be saved; it will not survive a restart");
        }

        self.enter_wallet(wallet.session).await;
        Ok(())
    }

    pub async fn restore_from_input(&mut self) -> Result<()> {
        let seed = Zeroizing::new(self.state.seed_input.clone());
        self.restore_wallet(&seed).await
    }

    async fn enter_wallet(&mut self, session: Arc<dyn WalletSession>) {
        self.session = Some(session);
        self.state.wallet_ready = true;
        self.state.pending_mnemonic = None;
        self.state.seed_input.clear();
        self.state.clear_pin_inputs();
        self.state.init_stage = InitStage::Landing;
        self.state.transition(Screen::Home);
        self.on_session_ready().await;
    }

    /// Initial fetches once a wallet is open. Failures are shown but do not
    /// stop the remaining fetches.
    async fn on_session_ready(&mut self) {
        if let Err(e) = self.try_refresh_balance().await {
            self.record_error(&e);
        }
        if let Err(e) = self.try_refresh_deposit_address().await {
            self.record_error(&e);
        }
        if let Err(e) = self.try_refresh_spark_address().await {
            self.record_error(&e);
        }
    }

    // =========================================================================
    // Logout
    // =========================================================================

    pub fn request_logout(&mut self) {
        self.state.confirmation = Some(Confirmation::Logout);
        self.publish();
    }

    pub fn cancel_logout(&mut self) {
        self.state.confirmation = None;
        self.publish();
    }

    /// Run the logout the user was asked to confirm. No-op without a pending prompt.
    pub fn confirm_logout(&mut self) {
        if self.state.confirmation != Some(Confirmation::Logout) {
            return;
        }
        self.logout();
    }

    fn logout(&mut self) {
        self.invoice_poll = None;
        self.deposit_sweep = None;
        self.copy_timer = None;
        self.session = None;
        self.vault.clear();
        self.state.reset();
        info!("Logged out");
        self.publish();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Switch screens without side effects beyond discarding the old screen's state.
    pub fn transition(&mut self, target: Screen) {
        if self.state.screen == Screen::Receive && target != Screen::Receive {
            self.invoice_poll = None;
        }
        debug!("Screen {} -> {}", self.state.screen, target);
        self.state.transition(target);
        self.publish();
    }

    /// Switch screens and load what the target screen shows.
    pub async fn navigate(&mut self, target: Screen) -> Result<()> {
        if target.requires_session() && self.session.is_none() {
            return self.finish(Err(SparkWalletError::NotInitialized));
        }

        self.transition(target);
        match target {
            Screen::Transfers => self.load_transfers(0, false).await,
            Screen::Receive
                if self.state.receive_kind == ReceiveKind::Spark
                    && self.state.spark_address.is_none() =>
            {
                self.refresh_spark_address().await
            }
            Screen::Deposit if self.state.deposit_address.is_none() => {
                self.refresh_deposit_address().await
            }
            _ => Ok(()),
        }
    }

    pub fn back(&mut self) {
        if let Some(target) = self.state.screen.back_target() {
            self.transition(target);
        }
    }

    pub fn cancel_send(&mut self) {
        self.state.clear_send_inputs();
        self.transition(Screen::Home);
    }

    // =========================================================================
    // Balance and addresses
    // =========================================================================

    pub async fn refresh_balance(&mut self) -> Result<()> {
        let result = self.try_refresh_balance().await;
        self.finish(result)
    }

    async fn try_refresh_balance(&mut self) -> Result<()> {
        let session = self.session()?;
        let balance = session.get_balance().await?;
        debug!("Current balance: {} sats", balance);
        self.state.balance = balance;
        Ok(())
    }

    /// Fetch a new single-use deposit address and watch it for deposits.
    pub async fn refresh_deposit_address(&mut self) -> Result<()> {
        let result = self.try_refresh_deposit_address().await;
        self.finish(result)
    }

    async fn try_refresh_deposit_address(&mut self) -> Result<()> {
        let session = self.session()?;
        let address = session.get_single_use_deposit_address().await?;
        info!("Generated deposit address: {}", address);

        let id = self.next_task_id();
        self.deposit_sweep = Some(spawn_deposit_sweep(
            id,
            session,
            self.deposits.clone(),
            address.clone(),
            self.settings.deposit_poll_interval(),
            self.events_tx.clone(),
        ));
        self.state.deposit_address = Some(address);
        Ok(())
    }

    pub async fn refresh_spark_address(&mut self) -> Result<()> {
        let result = self.try_refresh_spark_address().await;
        self.finish(result)
    }

    async fn try_refresh_spark_address(&mut self) -> Result<()> {
        let session = self.session()?;
        let address = session.get_spark_address().await?;
        debug!("Spark address: {}", address);
        self.state.spark_address = Some(address);
        Ok(())
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send `amount` sats to a Spark address, or pay a Lightning invoice.
    pub async fn send(&mut self, kind: SendKind, amount: &str, destination: &str) -> Result<()> {
        self.state.error = None;
        let result = self.try_send(kind, amount, destination).await;
        self.finish(result)
    }

    async fn try_send(&mut self, kind: SendKind, amount: &str, destination: &str) -> Result<()> {
        let session = self.session()?;
        let destination = destination.trim();

        match kind {
            SendKind::Spark => {
                if amount.trim().is_empty() || destination.is_empty() {
                    return Err(SparkWalletError::validation(
                        "Enter an amount and a recipient address",
                    ));
                }
                let sats = parse_sats(amount)?;
                session.transfer(destination, sats).await?;
                info!("Sent {} sats over Spark", sats);
            }
            SendKind::Lightning => {
                if destination.is_empty() {
                    return Err(SparkWalletError::validation("Paste a Lightning invoice"));
                }
                let sats = parse_sats(amount)?;
                let max_fee = max_fee_sats(sats);
                session.pay_lightning_invoice(destination, max_fee).await?;
                info!("Paid Lightning invoice of {} sats (max fee {})", sats, max_fee);
            }
        }

        if let Err(e) = self.try_refresh_balance().await {
            self.record_error(&e);
        }
        self.state.clear_send_inputs();
        self.state.transition(Screen::Home);
        Ok(())
    }

    /// Send using the Send screen's inputs.
    pub async fn submit_send(&mut self) -> Result<()> {
        let kind = self.state.send_kind;
        let amount = self.state.send_amount.clone();
        let destination = match kind {
            SendKind::Spark => self.state.recipient_address.clone(),
            SendKind::Lightning => self.state.lightning_invoice.clone(),
        };
        self.send(kind, &amount, &destination).await
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Create a Lightning invoice for `amount` sats and start watching it.
    pub async fn request_invoice(&mut self, amount: &str, memo: Option<&str>) -> Result<()> {
        self.state.error = None;
        let result = self.try_request_invoice(amount, memo).await;
        self.finish(result)
    }

    async fn try_request_invoice(&mut self, amount: &str, memo: Option<&str>) -> Result<()> {
        let session = self.session()?;
        let sats = parse_sats(amount)?;

        let balance = session.get_balance().await?;
        self.state.balance = balance;
        if balance < MIN_INVOICE_BALANCE_SATS {
            return Err(SparkWalletError::InsufficientBalance);
        }

        let memo = memo
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Receive {} sats", sats));

        info!("Creating invoice for {} sats", sats);
        let created = session
            .create_lightning_invoice(sats, &memo)
            .await
            .map_err(|e| match e {
                ClientError::InvalidResponse(_) => SparkWalletError::InvalidInvoiceResponse,
                other => SparkWalletError::InvoiceCreation(other),
            })?;

        let id = self.next_task_id();
        self.invoice_poll = Some(spawn_invoice_poller(
            id,
            session,
            created.id.clone(),
            self.settings.invoice_poll_interval(),
            self.events_tx.clone(),
        ));
        self.state.invoice = Some(LightningInvoice {
            id: created.id,
            payment_request: created.encoded_invoice,
            status: created.status.unwrap_or(InvoiceStatus::Pending),
        });
        Ok(())
    }

    /// Request an invoice for the Receive screen's amount.
    pub async fn submit_invoice_request(&mut self) -> Result<()> {
        let amount = self.state.receive_amount.clone();
        self.request_invoice(&amount, None).await
    }

    // =========================================================================
    // Transfer history
    // =========================================================================

    /// Load one page of history. Errors land on the transfers view.
    pub async fn load_transfers(&mut self, page: usize, append: bool) -> Result<()> {
        let session = match self.session() {
            Ok(session) => session,
            Err(e) => return self.finish(Err(e)),
        };

        self.state.transfers.loading = true;
        self.state.transfers.error = None;
        self.publish();

        let offset = page * TRANSFERS_PER_PAGE;
        debug!("Loading transfers with limit {} offset {}", TRANSFERS_PER_PAGE, offset);
        let result = session.get_transfers(TRANSFERS_PER_PAGE, offset).await;

        let view = &mut self.state.transfers;
        view.loading = false;
        let outcome = match result {
            Ok(items) => {
                view.has_more = items.len() == TRANSFERS_PER_PAGE;
                if append {
                    view.items.extend(items);
                } else {
                    view.items = items;
                }
                view.page = page;
                Ok(())
            }
            Err(e) => {
                warn!("Error loading transfers: {}", e);
                view.error = Some(e.to_string());
                if !append {
                    view.items.clear();
                }
                Err(e.into())
            }
        };

        self.publish();
        outcome
    }

    /// Append the next page unless a load is running or nothing is left.
    pub async fn load_more_transfers(&mut self) -> Result<()> {
        let view = &self.state.transfers;
        if view.loading || !view.has_more {
            return Ok(());
        }
        let next = view.page + 1;
        self.load_transfers(next, true).await
    }

    // =========================================================================
    // Clipboard
    // =========================================================================

    /// Copy `text` and show a transient status.
    pub async fn copy_to_clipboard(&mut self, text: &str) -> bool {
        let copied = self.clipboard.copy(text).await;
        if !copied {
            warn!("Copy failed");
        }

        let status = if copied { COPY_SUCCESS } else { COPY_FAILURE };
        self.state.copy_status = Some(status.to_string());

        let id = self.next_task_id();
        self.copy_timer = Some(spawn_copy_status_timer(
            id,
            self.settings.copy_status_duration(),
            self.events_tx.clone(),
        ));
        self.publish();
        copied
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    pub fn set_seed_input(&mut self, value: &str) {
        self.state.seed_input = value.to_string();
        self.publish();
    }

    pub fn set_pin_input(&mut self, value: &str) {
        self.state.pin_input = value.to_string();
        self.publish();
    }

    pub fn set_pin_confirmation(&mut self, value: &str) {
        self.state.pin_confirmation = value.to_string();
        self.publish();
    }

    pub fn set_send_kind(&mut self, kind: SendKind) {
        self.state.send_kind = kind;
        self.publish();
    }

    pub fn set_send_amount(&mut self, value: &str) {
        self.state.send_amount = value.to_string();
        self.publish();
    }

    pub fn set_recipient_address(&mut self, value: &str) {
        self.state.recipient_address = value.to_string();
        self.publish();
    }

    /// An invoice that carries an amount also sets the send amount to it.
    /// Amountless invoices keep whatever amount was typed.
    pub fn set_lightning_invoice(&mut self, value: &str) {
        if let Some(sats) = invoice_amount_sats(value) {
            self.state.send_amount = sats.to_string();
        }
        self.state.lightning_invoice = value.to_string();
        self.publish();
    }

    pub async fn set_receive_kind(&mut self, kind: ReceiveKind) -> Result<()> {
        self.state.receive_kind = kind;
        if kind == ReceiveKind::Spark && self.state.spark_address.is_none() && self.has_session() {
            return self.refresh_spark_address().await;
        }
        self.publish();
        Ok(())
    }

    pub fn set_receive_amount(&mut self, value: &str) {
        self.state.receive_amount = value.to_string();
        self.publish();
    }

    pub fn dismiss_error(&mut self) {
        self.state.error = None;
        self.publish();
    }

    // =========================================================================
    // Poller events
    // =========================================================================

    /// Wait for the next poller event.
    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        self.events_rx.recv().await
    }

    /// Apply a poller event. Returns `false` for events from replaced or
    /// cancelled tasks, which are dropped.
    pub async fn handle_event(&mut self, event: ControllerEvent) -> bool {
        let task = event.task();
        match event {
            ControllerEvent::InvoiceStatus {
                invoice_id, status, ..
            } => {
                if !is_current(&self.invoice_poll, task) {
                    debug!("Ignoring status from stale invoice poller {}", task);
                    return false;
                }
                let Some(invoice) = self
                    .state
                    .invoice
                    .as_mut()
                    .filter(|invoice| invoice.id == invoice_id)
                else {
                    return false;
                };

                invoice.status = status.clone();
                if status.is_terminal() {
                    self.invoice_poll = None;
                }
                if status == InvoiceStatus::Paid {
                    info!("Invoice {} paid", invoice_id);
                    if let Err(e) = self.try_refresh_balance().await {
                        self.record_error(&e);
                    }
                }
            }
            ControllerEvent::DepositClaimed { tx_id, .. } => {
                if !is_current(&self.deposit_sweep, task) {
                    return false;
                }
                info!("Deposit claimed: {}", tx_id);
                self.state.error = None;
                if let Err(e) = self.try_refresh_balance().await {
                    self.record_error(&e);
                }
            }
            ControllerEvent::DepositClaimFailed { message, .. } => {
                if !is_current(&self.deposit_sweep, task) {
                    return false;
                }
                self.record_error(&SparkWalletError::ClaimDeposit(message));
            }
            ControllerEvent::CopyStatusExpired { .. } => {
                if !is_current(&self.copy_timer, task) {
                    return false;
                }
                self.copy_timer = None;
                self.state.copy_status = None;
            }
        }

        self.publish();
        true
    }

    /// Stop every poller. The session and saved credentials are kept.
    pub fn shutdown(&mut self) {
        self.invoice_poll = None;
        self.deposit_sweep = None;
        self.copy_timer = None;
        info!("Controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardBackend;
    use crate::testing::{FakeClipboard, FakeConnector, FakeLookup, FakeSession, TEST_MNEMONIC};
    use crate::vault::{KeyValueStore, MemoryStore};
    use std::time::Duration;

    struct Harness {
        controller: WalletController,
        session: Arc<FakeSession>,
        connector: Arc<FakeConnector>,
        lookup: Arc<FakeLookup>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn vault(&self) -> CredentialVault {
            CredentialVault::new(self.store.clone())
        }

        /// Feed poller events until `done` holds for the state.
        async fn pump_until(&mut self, done: impl Fn(&AppState) -> bool) {
            while !done(self.controller.state()) {
                let event = self.controller.next_event().await.unwrap();
                self.controller.handle_event(event).await;
            }
        }
    }

    fn harness_with_clipboard(clipboard: Arc<dyn ClipboardBackend>) -> Harness {
        let session = FakeSession::new();
        let connector = FakeConnector::new(session.clone());
        let lookup = FakeLookup::new();
        let store = Arc::new(MemoryStore::new());

        let controller = WalletController::new(
            AppSettings::default(),
            connector.clone(),
            lookup.clone(),
            CredentialVault::new(store.clone()),
            ClipboardService::new(Some(clipboard), None),
        );

        Harness {
            controller,
            session,
            connector,
            lookup,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with_clipboard(FakeClipboard::working())
    }

    async fn open_wallet(h: &mut Harness) {
        h.controller.restore_wallet(TEST_MNEMONIC).await.unwrap();
        assert_eq!(h.controller.state().screen, Screen::Home);
    }

    #[test]
    fn test_max_fee_is_one_percent_rounded_up() {
        assert_eq!(max_fee_sats(1000), 10);
        assert_eq!(max_fee_sats(1001), 11);
        assert_eq!(max_fee_sats(50), 1);
        assert_eq!(max_fee_sats(1), 1);
    }

    #[test]
    fn test_parse_sats() {
        assert_eq!(parse_sats(" 2500 ").unwrap(), 2500);
        for bad in ["", "0", "-5", "1.5", "abc"] {
            assert!(parse_sats(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_wallet_then_set_pin() {
        let mut h = harness();
        h.controller.startup().await.unwrap();
        assert_eq!(h.controller.state().init_stage, InitStage::Landing);

        h.controller.create_wallet().await.unwrap();
        let state = h.controller.state();
        assert_eq!(state.screen, Screen::Init);
        assert_eq!(state.init_stage, InitStage::ShowMnemonic);
        assert_eq!(state.pending_mnemonic.as_deref(), Some(TEST_MNEMONIC));
        assert_eq!(h.connector.calls(), vec![None]);

        h.controller.continue_to_wallet().unwrap();
        assert_eq!(h.controller.state().init_stage, InitStage::PinSetup);
        assert_eq!(h.controller.state().screen, Screen::Init);

        h.controller.set_pin("1234", "1234").await.unwrap();
        let state = h.controller.state();
        assert_eq!(state.screen, Screen::Home);
        assert!(state.pending_mnemonic.is_none());
        assert!(state.wallet_ready);

        let vault = h.vault();
        assert!(vault.has_pin_protection());
        assert!(vault.verify_pin("1234"));
        assert_eq!(vault.load_mnemonic().as_deref(), Some(TEST_MNEMONIC));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_pin_rejects_bad_input() {
        let mut h = harness();
        h.controller.create_wallet().await.unwrap();
        h.controller.continue_to_wallet().unwrap();

        assert!(h.controller.set_pin("12", "12").await.is_err());
        assert!(h.controller.set_pin("1234", "4321").await.is_err());
        assert_eq!(h.controller.state().error.as_deref(), Some("PINs do not match"));
        assert_eq!(h.controller.state().init_stage, InitStage::PinSetup);
        assert!(!h.vault().has_pin_protection());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pin_setup_discards_new_wallet() {
        let mut h = harness();
        h.controller.create_wallet().await.unwrap();
        h.controller.continue_to_wallet().unwrap();
        h.controller.cancel_pin_setup();

        let state = h.controller.state();
        assert_eq!(state.init_stage, InitStage::Landing);
        assert!(state.pending_mnemonic.is_none());
        assert!(!h.controller.has_session());
        assert_eq!(h.vault().status(), VaultStatus::NotSetup);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_wallet_failure_keeps_landing() {
        let mut h = harness();
        h.connector.fail_with(Some("bridge offline"));

        let err = h.controller.create_wallet().await.unwrap_err();
        assert_eq!(err.to_string(), "bridge offline");
        let state = h.controller.state();
        assert_eq!(state.error.as_deref(), Some("bridge offline"));
        assert_eq!(state.init_stage, InitStage::Landing);
        assert!(!h.controller.has_session());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_pin_stays_on_pin_entry() {
        let mut h = harness();
        h.vault().save_with_pin(TEST_MNEMONIC, "1234");

        h.controller.startup().await.unwrap();
        assert_eq!(h.controller.state().init_stage, InitStage::PinEntry);

        let err = h.controller.unlock("0000").await.unwrap_err();
        assert!(matches!(err, SparkWalletError::InvalidPin));
        let state = h.controller.state();
        assert_eq!(state.screen, Screen::Init);
        assert_eq!(state.init_stage, InitStage::PinEntry);
        assert_eq!(state.error.as_deref(), Some("Incorrect PIN"));
        assert!(h.connector.calls().is_empty());

        h.controller.unlock("1234").await.unwrap();
        assert_eq!(h.controller.state().screen, Screen::Home);
        assert!(h.controller.state().error.is_none());
        assert_eq!(h.connector.calls(), vec![Some(TEST_MNEMONIC.to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_pin_uses_inputs() {
        let mut h = harness();
        h.vault().save_with_pin(TEST_MNEMONIC, "2468");
        h.controller.startup().await.unwrap();

        h.controller.set_pin_input("2468");
        h.controller.submit_pin().await.unwrap();
        assert_eq!(h.controller.state().screen, Screen::Home);
        assert!(h.controller.state().pin_input.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_restores_unprotected_wallet() {
        let mut h = harness();
        h.session.set_balance(4200);
        h.store.set(crate::vault::LEGACY_MNEMONIC_KEY, TEST_MNEMONIC).unwrap();

        h.controller.startup().await.unwrap();
        let state = h.controller.state();
        assert_eq!(state.screen, Screen::Home);
        assert_eq!(state.balance, 4200);
        assert_eq!(state.deposit_address.as_deref(), Some("bc1qdeposit1"));
        assert_eq!(state.spark_address.as_deref(), Some("sp1qfakesparkaddress"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_clears_unusable_saved_wallet() {
        let mut h = harness();
        h.vault().save_unprotected(TEST_MNEMONIC);
        h.connector.fail_with(Some("invalid mnemonic"));

        assert!(h.controller.startup().await.is_err());
        let state = h.controller.state();
        assert_eq!(state.screen, Screen::Init);
        assert_eq!(state.init_stage, InitStage::Landing);
        assert_eq!(h.vault().status(), VaultStatus::NotSetup);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_requires_twelve_words() {
        let mut h = harness();
        h.controller.start_restore();

        h.controller.set_seed_input("abandon abandon about");
        assert!(!h.controller.can_restore());
        assert!(h.controller.restore_from_input().await.is_err());
        assert!(h.connector.calls().is_empty());
        assert_eq!(h.controller.state().init_stage, InitStage::Restoring);

        h.controller.set_seed_input(TEST_MNEMONIC);
        assert!(h.controller.can_restore());
        h.controller.restore_from_input().await.unwrap();
        assert_eq!(h.controller.state().screen, Screen::Home);
        assert_eq!(h.vault().status(), VaultStatus::Unprotected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_failure_changes_nothing() {
        let mut h = harness();
        h.controller.start_restore();
        h.connector.fail_with(Some("unknown wallet"));

        assert!(h.controller.restore_wallet(TEST_MNEMONIC).await.is_err());
        let state = h.controller.state();
        assert_eq!(state.init_stage, InitStage::Restoring);
        assert_eq!(state.error.as_deref(), Some("unknown wallet"));
        assert_eq!(h.vault().status(), VaultStatus::NotSetup);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lightning_send_uses_one_percent_fee() {
        let mut h = harness();
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Send).await.unwrap();
        h.controller.set_send_kind(SendKind::Lightning);
        h.controller.set_send_amount("7");
        h.controller.set_lightning_invoice("lnbc2500u1pfakeinvoice");
        assert_eq!(h.controller.state().send_amount, "250000");

        h.controller.submit_send().await.unwrap();
        assert_eq!(
            h.session.lightning_payments(),
            vec![("lnbc2500u1pfakeinvoice".to_string(), 2500)]
        );
        let state = h.controller.state();
        assert_eq!(state.screen, Screen::Home);
        assert!(state.lightning_invoice.is_empty());
        assert!(state.send_amount.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_amountless_invoice_keeps_typed_amount() {
        let mut h = harness();
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Send).await.unwrap();
        h.controller.set_send_kind(SendKind::Lightning);
        h.controller.set_send_amount("1500");
        h.controller.set_lightning_invoice("lnbc1pfakeinvoice");
        assert_eq!(h.controller.state().send_amount, "1500");

        h.controller.submit_send().await.unwrap();
        assert_eq!(
            h.session.lightning_payments(),
            vec![("lnbc1pfakeinvoice".to_string(), 15)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spark_send_failure_stays_on_send() {
        let mut h = harness();
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Send).await.unwrap();

        assert!(h.controller.send(SendKind::Spark, "", "sp1qabc").await.is_err());
        assert!(h.session.spark_transfers().is_empty());

        h.session.fail_sends(Some("insufficient funds"));
        h.controller.set_send_amount("500");
        h.controller.set_recipient_address("sp1qabc");
        assert!(h.controller.submit_send().await.is_err());

        let state = h.controller.state();
        assert_eq!(state.screen, Screen::Send);
        assert_eq!(state.error.as_deref(), Some("insufficient funds"));
        assert_eq!(state.send_amount, "500");

        h.session.fail_sends(None);
        h.controller.submit_send().await.unwrap();
        assert_eq!(h.session.spark_transfers(), vec![("sp1qabc".to_string(), 500)]);
        assert_eq!(h.controller.state().screen, Screen::Home);
    }

    #[tokio::test(start_paused = true)]
    async fn test_balance_failure_keeps_previous_value() {
        let mut h = harness();
        h.session.set_balance(7000);
        open_wallet(&mut h).await;

        h.session.set_balance(9000);
        h.session.fail_balance(Some("timeout"));
        assert!(h.controller.refresh_balance().await.is_err());
        assert_eq!(h.controller.state().balance, 7000);
        assert_eq!(h.controller.state().error.as_deref(), Some("timeout"));

        h.session.fail_balance(None);
        h.controller.refresh_balance().await.unwrap();
        assert_eq!(h.controller.state().balance, 9000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoice_requires_minimum_balance() {
        let mut h = harness();
        h.session.set_balance(999);
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Receive).await.unwrap();

        let err = h.controller.request_invoice("500", None).await.unwrap_err();
        assert!(matches!(err, SparkWalletError::InsufficientBalance));
        assert!(h.session.invoice_calls().is_empty());
        assert_eq!(
            h.controller.state().error.as_deref(),
            Some("Insufficient balance to create invoice. Please add some funds first.")
        );
        assert!(h.controller.state().invoice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoice_rejects_bad_amount_without_calls() {
        let mut h = harness();
        h.session.set_balance(50_000);
        open_wallet(&mut h).await;
        let balance_calls = h.session.balance_calls();

        assert!(h.controller.request_invoice("0", None).await.is_err());
        assert!(h.controller.request_invoice("ten", None).await.is_err());
        assert_eq!(h.session.balance_calls(), balance_calls);
        assert!(h.session.invoice_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_invoice_response_is_rejected() {
        let mut h = harness();
        h.session.set_balance(50_000);
        h.session
            .set_invoice_response(serde_json::json!({ "id": 17, "invoice": "lnbc" }));
        open_wallet(&mut h).await;

        let err = h.controller.request_invoice("2000", None).await.unwrap_err();
        assert!(matches!(err, SparkWalletError::InvalidInvoiceResponse));
        assert!(h.controller.state().invoice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paid_invoice_refreshes_balance_once() {
        let mut h = harness();
        h.session.set_balance(50_000);
        h.session.queue_statuses(["PENDING", "PENDING", "PAID"]);
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Receive).await.unwrap();

        h.controller.request_invoice("2000", None).await.unwrap();
        assert_eq!(h.session.invoice_calls(), vec![(2000, "Receive 2000 sats".to_string())]);
        let invoice = h.controller.state().invoice.clone().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.payment_request, "lnbc50u1pfakeinvoice");

        let before = h.session.balance_calls();
        h.pump_until(|s| s.invoice.as_ref().is_some_and(|i| i.status == InvoiceStatus::Paid))
            .await;
        assert_eq!(h.session.balance_calls(), before + 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.session.status_queries(), 3);
        assert_eq!(h.session.balance_calls(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_receive_stops_invoice_polling() {
        let mut h = harness();
        h.session.set_balance(50_000);
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Receive).await.unwrap();
        h.controller.request_invoice("2000", Some("coffee")).await.unwrap();
        assert_eq!(h.session.invoice_calls(), vec![(2000, "coffee".to_string())]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        h.controller.back();
        assert_eq!(h.controller.state().screen, Screen::Home);
        assert!(h.controller.state().invoice.is_none());

        let queries = h.session.status_queries();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(h.session.status_queries(), queries);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deposit_is_claimed_once_and_refreshes_balance() {
        let mut h = harness();
        open_wallet(&mut h).await;
        h.lookup.set_latest(Some("deposit-tx"));
        let before = h.session.balance_calls();

        let event = h.controller.next_event().await.unwrap();
        assert!(matches!(event, ControllerEvent::DepositClaimed { .. }));
        assert!(h.controller.handle_event(event).await);
        assert_eq!(h.session.balance_calls(), before + 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.session.claimed(), vec!["deposit-tx".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_claim_surfaces_message() {
        let mut h = harness();
        open_wallet(&mut h).await;
        h.session.fail_claims("dust amount");
        h.lookup.set_latest(Some("deposit-tx"));

        h.pump_until(|s| s.error.is_some()).await;
        assert_eq!(
            h.controller.state().error.as_deref(),
            Some("Failed to claim deposit: dust amount")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_deposit_address_replaces_sweep() {
        let mut h = harness();
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Deposit).await.unwrap();
        assert_eq!(h.session.deposit_addresses_issued(), 1);

        h.controller.refresh_deposit_address().await.unwrap();
        assert_eq!(h.controller.state().deposit_address.as_deref(), Some("bc1qdeposit2"));

        let stale = ControllerEvent::DepositClaimed {
            task: 1,
            tx_id: "old".into(),
        };
        assert!(!h.controller.handle_event(stale).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_requires_confirmation() {
        let mut h = harness();
        open_wallet(&mut h).await;

        h.controller.confirm_logout();
        assert_eq!(h.controller.state().screen, Screen::Home);

        h.controller.request_logout();
        assert_eq!(h.controller.state().confirmation, Some(Confirmation::Logout));
        h.controller.cancel_logout();
        assert!(h.controller.state().confirmation.is_none());
        assert_eq!(h.vault().status(), VaultStatus::Unprotected);

        h.controller.request_logout();
        h.controller.confirm_logout();
        let state = h.controller.state();
        assert_eq!(state, &AppState::default());
        assert!(!h.controller.has_session());
        assert_eq!(h.vault().status(), VaultStatus::NotSetup);

        let queries = h.lookup.queries();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.lookup.queries(), queries);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfers_pagination() {
        let mut h = harness();
        h.session.set_history(25);
        open_wallet(&mut h).await;

        h.controller.navigate(Screen::Settings).await.unwrap();
        h.controller.navigate(Screen::Transfers).await.unwrap();
        let view = &h.controller.state().transfers;
        assert_eq!(view.items.len(), 10);
        assert!(view.has_more);
        assert!(!view.loading);

        h.controller.load_more_transfers().await.unwrap();
        h.controller.load_more_transfers().await.unwrap();
        let view = &h.controller.state().transfers;
        assert_eq!(view.items.len(), 25);
        assert_eq!(view.page, 2);
        assert!(!view.has_more);
        assert_eq!(view.items[24].id, "transfer-24");
        assert_eq!(view.items[0].display_status(), "Completed");

        h.controller.load_more_transfers().await.unwrap();
        assert_eq!(h.session.history_calls(), vec![(10, 0), (10, 10), (10, 20)]);

        h.controller.back();
        assert_eq!(h.controller.state().screen, Screen::Settings);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfers_error_lands_on_view() {
        let mut h = harness();
        h.session.fail_history(Some("Unexpected response format from transfers API"));
        open_wallet(&mut h).await;
        h.controller.navigate(Screen::Settings).await.unwrap();

        assert!(h.controller.navigate(Screen::Transfers).await.is_err());
        let state = h.controller.state();
        assert_eq!(
            state.transfers.error.as_deref(),
            Some("Unexpected response format from transfers API")
        );
        assert!(state.error.is_none());
        assert!(state.transfers.items.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_status_clears_after_delay() {
        let mut h = harness();
        assert!(h.controller.copy_to_clipboard("sp1qfakesparkaddress").await);
        assert_eq!(h.controller.state().copy_status.as_deref(), Some(COPY_SUCCESS));

        h.pump_until(|s| s.copy_status.is_none()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_failure_status() {
        let mut h = harness_with_clipboard(FakeClipboard::broken());
        assert!(!h.controller.copy_to_clipboard("x").await);
        assert_eq!(h.controller.state().copy_status.as_deref(), Some(COPY_FAILURE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_requires_session() {
        let mut h = harness();
        assert!(h.controller.navigate(Screen::Home).await.is_err());
        assert_eq!(h.controller.state().screen, Screen::Init);
        assert_eq!(h.controller.state().error.as_deref(), Some("Wallet not initialized"));

        h.controller.dismiss_error();
        assert!(h.controller.state().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_see_updates() {
        let mut h = harness();
        let mut updates = h.controller.subscribe();

        h.controller.set_seed_input("abandon");
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().seed_input, "abandon");
    }
}
