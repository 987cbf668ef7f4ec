use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{ClientError, WalletSession};

/// Spark network the SDK should connect to.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Signet,
    Regtest,
    Local,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "MAINNET"),
            Self::Testnet => write!(f, "TESTNET"),
            Self::Signet => write!(f, "SIGNET"),
            Self::Regtest => write!(f, "REGTEST"),
            Self::Local => write!(f, "LOCAL"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAINNET" => Ok(Self::Mainnet),
            "TESTNET" => Ok(Self::Testnet),
            "SIGNET" => Ok(Self::Signet),
            "REGTEST" => Ok(Self::Regtest),
            "LOCAL" => Ok(Self::Local),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Result of initializing (or restoring) a wallet through the SDK.
pub struct InitializedWallet {
    pub session: Arc<dyn WalletSession>,
    /// Only present for freshly generated wallets.
    pub mnemonic: Option<String>,
}

impl fmt::Debug for InitializedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializedWallet")
            .field("session", &"<session>")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Lifecycle status of a Lightning receive request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Expired,
    Other(String),
}

impl InvoiceStatus {
    /// Parses an SDK status string, ignoring case.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Self::Created,
            "PENDING" => Self::Pending,
            "PAID" => Self::Paid,
            "FAILED" => Self::Failed,
            "EXPIRED" => Self::Expired,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Whether polling should stop at this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Created | Self::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for InvoiceStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Lightning invoice accepted from the SDK.
///
/// Only built through [`CreatedInvoice::from_value`], so every instance has
/// a string id and a string encoded payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInvoice {
    pub id: String,
    pub encoded_invoice: String,
    pub status: Option<InvoiceStatus>,
}

impl CreatedInvoice {
    /// Validates the raw `createLightningInvoice` response.
    pub fn from_value(value: &Value) -> Result<Self, ClientError> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::InvalidResponse("invoice response has no string id".into()))?;

        let encoded_invoice = value
            .get("invoice")
            .and_then(|invoice| invoice.get("encodedInvoice"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClientError::InvalidResponse("invoice response has no encoded invoice".into())
            })?;

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(InvoiceStatus::parse);

        Ok(Self {
            id: id.to_string(),
            encoded_invoice: encoded_invoice.to_string(),
            status,
        })
    }
}

/// One entry of the wallet's transfer history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "u64_from_number_or_string")]
    pub total_value: u64,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub transfer_type: String,
}

impl Transfer {
    /// `COMPLETED` is shown as `Completed`.
    pub fn display_status(&self) -> String {
        let mut chars = self.status.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    }

    pub fn display_type(&self) -> &str {
        if self.transfer_type.is_empty() {
            "Transfer"
        } else {
            &self.transfer_type
        }
    }

    pub fn display_date(&self) -> String {
        self.created_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Accepts the transfer list either as a bare array or as `{ "transfers": [...] }`.
pub fn parse_transfers(value: Value) -> Result<Vec<Transfer>, ClientError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(mut map) => match map.remove("transfers") {
            Some(list @ Value::Array(_)) => Ok(serde_json::from_value(list)?),
            _ => Err(ClientError::InvalidResponse(
                "Unexpected response format from transfers API".into(),
            )),
        },
        _ => Err(ClientError::InvalidResponse(
            "Unexpected response format from transfers API".into(),
        )),
    }
}

/// Balance payload as returned by `getBalance`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub balance: u64,
}

/// The SDK reports sats as bigints, which the bridge may encode as strings.
fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
