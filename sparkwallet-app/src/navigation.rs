//! Screens and the Init sub-stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Screen {
    #[default]
    Init,
    Home,
    Send,
    Receive,
    Deposit,
    Settings,
    Transfers,
}

impl Screen {
    /// Where the "back" action of a screen leads. `None` for Init and Home.
    pub fn back_target(self) -> Option<Screen> {
        match self {
            Self::Send | Self::Receive | Self::Deposit | Self::Settings => Some(Self::Home),
            Self::Transfers => Some(Self::Settings),
            Self::Init | Self::Home => None,
        }
    }

    /// Screens that need an initialized wallet session.
    pub fn requires_session(self) -> bool {
        self != Self::Init
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Home => "HOME",
            Self::Send => "SEND",
            Self::Receive => "RECEIVE",
            Self::Deposit => "DEPOSIT",
            Self::Settings => "SETTINGS",
            Self::Transfers => "TRANSFERS",
        };
        f.write_str(name)
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INIT" => Ok(Self::Init),
            "HOME" => Ok(Self::Home),
            "SEND" => Ok(Self::Send),
            "RECEIVE" => Ok(Self::Receive),
            "DEPOSIT" => Ok(Self::Deposit),
            "SETTINGS" => Ok(Self::Settings),
            "TRANSFERS" => Ok(Self::Transfers),
            other => Err(format!("Unknown screen: {}", other)),
        }
    }
}

/// Sub-state of the Init screen.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InitStage {
    /// Create or restore choice
    #[default]
    Landing,
    /// Seed phrase entry
    Restoring,
    /// New wallet's mnemonic shown for backup
    ShowMnemonic,
    /// Choosing a PIN for the new wallet
    PinSetup,
    /// Unlocking a PIN-protected saved wallet
    PinEntry,
}
