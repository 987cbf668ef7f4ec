use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::client::{InvoiceStatus, Transfer};
use crate::navigation::{InitStage, Screen};

/// Minimum balance (sats) required before an invoice may be requested.
pub const MIN_INVOICE_BALANCE_SATS: u64 = 1000;

/// Page size of the transfer history.
pub const TRANSFERS_PER_PAGE: usize = 10;

/// Number of words in a restorable seed phrase.
pub const SEED_WORD_COUNT: usize = 12;

pub const LOGOUT_CONFIRMATION: &str =
    "Are you sure you want to logout? You will need your seed phrase to restore your wallet.";

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendKind {
    #[default]
    Spark,
    Lightning,
}

/// Receive tabs share the same two rails as sending.
pub type ReceiveKind = SendKind;

impl FromStr for SendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spark" => Ok(Self::Spark),
            "lightning" | "ln" => Ok(Self::Lightning),
            other => Err(format!("Unknown payment type: {}", other)),
        }
    }
}

impl fmt::Display for SendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spark => write!(f, "spark"),
            Self::Lightning => write!(f, "lightning"),
        }
    }
}

/// The invoice shown on the Receive screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightningInvoice {
    pub id: String,
    pub payment_request: String,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransfersView {
    pub items: Vec<Transfer>,
    pub page: usize,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
}

/// Actions that wait for an explicit yes/no.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confirmation {
    Logout,
}

impl Confirmation {
    pub fn message(self) -> &'static str {
        match self {
            Self::Logout => LOGOUT_CONFIRMATION,
        }
    }
}

/// Snapshot of everything a view needs to render.
///
/// Only the controller mutates this; observers receive clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub screen: Screen,
    pub init_stage: InitStage,
    pub wallet_ready: bool,

    /// Mnemonic of a freshly created wallet, kept until its PIN is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_mnemonic: Option<String>,
    pub seed_input: String,
    pub pin_input: String,
    pub pin_confirmation: String,

    pub balance: u64,

    pub send_kind: SendKind,
    pub send_amount: String,
    pub recipient_address: String,
    pub lightning_invoice: String,

    pub receive_kind: ReceiveKind,
    pub receive_amount: String,
    pub invoice: Option<LightningInvoice>,

    pub spark_address: Option<String>,
    pub deposit_address: Option<String>,

    pub copy_status: Option<String>,
    pub transfers: TransfersView,
    pub confirmation: Option<Confirmation>,
    pub error: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `target`, discarding state owned by the screen being left.
    pub fn transition(&mut self, target: Screen) {
        if self.screen == Screen::Receive && target != Screen::Receive {
            self.invoice = None;
            self.receive_amount.clear();
        }
        if self.screen == Screen::Transfers && target != Screen::Transfers {
            self.transfers = TransfersView::default();
        }
        self.screen = target;
    }

    pub fn clear_send_inputs(&mut self) {
        self.send_amount.clear();
        self.recipient_address.clear();
        self.lightning_invoice.clear();
    }

    pub fn clear_pin_inputs(&mut self) {
        self.pin_input.clear();
        self.pin_confirmation.clear();
    }

    /// Back to a fresh Init/Landing state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn can_restore(&self) -> bool {
        is_valid_seed_phrase(&self.seed_input)
    }

    pub fn can_send(&self) -> bool {
        match self.send_kind {
            SendKind::Spark => {
                !self.send_amount.trim().is_empty() && !self.recipient_address.trim().is_empty()
            }
            SendKind::Lightning => !self.lightning_invoice.trim().is_empty(),
        }
    }
}

/// Exactly twelve whitespace-separated words.
pub fn is_valid_seed_phrase(input: &str) -> bool {
    input.split_whitespace().count() == SEED_WORD_COUNT
}

/// Network prefixes of BOLT11 invoices, longest first.
const INVOICE_PREFIXES: [&str; 5] = ["lnbcrt", "lnbc", "lntbs", "lntb", "lnsb"];

/// Amount in sats encoded in the human-readable part of a BOLT11 invoice.
///
/// `lnbc25u1...` is 2500 sats. Returns `None` for invoices without an amount
/// and for amounts that are not a whole number of sats.
pub fn invoice_amount_sats(invoice: &str) -> Option<u64> {
    let invoice = invoice.trim().to_ascii_lowercase();
    // The data part never contains '1', so the last one is the separator
    let hrp = &invoice[..invoice.rfind('1')?];
    let amount = INVOICE_PREFIXES
        .iter()
        .find_map(|prefix| hrp.strip_prefix(prefix))?;

    let (digits, multiplier) = match amount.chars().last()? {
        c if c.is_ascii_digit() => (amount, None),
        c => (&amount[..amount.len() - c.len_utf8()], Some(c)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    let msats = match multiplier {
        None => value.checked_mul(100_000_000_000)?,
        Some('m') => value.checked_mul(100_000_000)?,
        Some('u') => value.checked_mul(100_000)?,
        Some('n') => value.checked_mul(100)?,
        Some('p') if value % 10 == 0 => value / 10,
        _ => return None,
    };

    if msats == 0 || msats % 1000 != 0 {
        return None;
    }
    Some(msats / 1000)
}
