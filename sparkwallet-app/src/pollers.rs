//! Background timers owned by the controller.
//!
//! Each poller runs as its own tokio task, awaits its call before sleeping
//! again and reports back through the controller's event channel. Events
//! carry the id of the task that produced them so the controller can drop
//! anything sent by a task it has already replaced.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{DepositLookup, InvoiceStatus, WalletSession};

pub type TaskId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Latest status of the invoice being watched.
    InvoiceStatus {
        task: TaskId,
        invoice_id: String,
        status: InvoiceStatus,
    },
    DepositClaimed {
        task: TaskId,
        tx_id: String,
    },
    DepositClaimFailed {
        task: TaskId,
        tx_id: String,
        message: String,
    },
    CopyStatusExpired {
        task: TaskId,
    },
}

impl ControllerEvent {
    pub fn task(&self) -> TaskId {
        match self {
            Self::InvoiceStatus { task, .. }
            | Self::DepositClaimed { task, .. }
            | Self::DepositClaimFailed { task, .. }
            | Self::CopyStatusExpired { task } => *task,
        }
    }
}

/// Handle to a running poller. Dropping it aborts the task.
#[derive(Debug)]
pub struct PollTask {
    id: TaskId,
    handle: JoinHandle<()>,
}

impl PollTask {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Query the invoice status right away, then every `interval` until it is
/// terminal. Query errors and unknown requests are skipped.
pub fn spawn_invoice_poller(
    id: TaskId,
    session: Arc<dyn WalletSession>,
    invoice_id: String,
    interval: Duration,
    events: mpsc::Sender<ControllerEvent>,
) -> PollTask {
    let handle = tokio::spawn(async move {
        loop {
            match session.get_lightning_receive_request(&invoice_id).await {
                Ok(Some(status)) => {
                    debug!("Invoice {} status: {}", invoice_id, status);
                    let terminal = status.is_terminal();
                    let event = ControllerEvent::InvoiceStatus {
                        task: id,
                        invoice_id: invoice_id.clone(),
                        status,
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                    if terminal {
                        info!("Invoice {} reached a final status", invoice_id);
                        break;
                    }
                }
                Ok(None) => debug!("Invoice {} not known yet", invoice_id),
                Err(e) => debug!("Error checking payment status: {}", e),
            }

            tokio::time::sleep(interval).await;
        }
    });

    PollTask { id, handle }
}

/// Every `interval`, look for a transaction paying `address` and claim it.
///
/// A transaction is claimed at most once per sweep; failed claims are retried
/// on the next tick. Lookup errors are skipped.
pub fn spawn_deposit_sweep(
    id: TaskId,
    session: Arc<dyn WalletSession>,
    lookup: Arc<dyn DepositLookup>,
    address: String,
    interval: Duration,
    events: mpsc::Sender<ControllerEvent>,
) -> PollTask {
    let handle = tokio::spawn(async move {
        let mut claimed: HashSet<String> = HashSet::new();

        loop {
            tokio::time::sleep(interval).await;

            debug!("Checking for deposits to: {}", address);
            let tx_id = match lookup.latest_deposit_tx_id(&address).await {
                Ok(Some(tx_id)) => tx_id,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Error checking deposit: {}", e);
                    continue;
                }
            };

            if claimed.contains(&tx_id) {
                continue;
            }

            info!("Found deposit transaction: {}", tx_id);
            let event = match session.claim_deposit(&tx_id).await {
                Ok(()) => {
                    claimed.insert(tx_id.clone());
                    ControllerEvent::DepositClaimed { task: id, tx_id }
                }
                Err(e) => {
                    warn!("Error claiming deposit {}: {}", tx_id, e);
                    ControllerEvent::DepositClaimFailed {
                        task: id,
                        tx_id,
                        message: e.to_string(),
                    }
                }
            };

            if events.send(event).await.is_err() {
                break;
            }
        }
    });

    PollTask { id, handle }
}

/// Fire a single `CopyStatusExpired` after `delay`.
pub fn spawn_copy_status_timer(
    id: TaskId,
    delay: Duration,
    events: mpsc::Sender<ControllerEvent>,
) -> PollTask {
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events.send(ControllerEvent::CopyStatusExpired { task: id }).await;
    });

    PollTask { id, handle }
}
