//! Line commands of the interactive shell and the text view of `AppState`.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::controller::WalletController;
use crate::error::{Result, SparkWalletError};
use crate::navigation::{InitStage, Screen};
use crate::state::{invoice_amount_sats, AppState, SendKind};

pub const HELP: &str = "\
Commands:
  create                         create a new wallet
  continue                       mnemonic backed up, choose a PIN
  pin <pin> <confirm>            set the PIN of a new wallet
  unlock <pin>                   unlock the saved wallet
  restore [12 words]             restore from a seed phrase
  cancel                         cancel the current flow
  go <home|send|receive|deposit|settings|transfers>
  back                           previous screen
  balance                        refresh the balance
  send spark <amount> <address>  send over Spark
  send lightning <invoice> [amount]
  invoice <amount> [memo]        request a Lightning invoice
  receive <spark|lightning>      switch the receive tab
  deposit                        new single-use deposit address
  more                           load more transfers
  copy <spark|deposit|invoice|mnemonic>
  logout / yes / no              log out (asks for confirmation)
  dismiss                        hide the error message
  state                          print the state as JSON
  quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    SparkAddress,
    DepositAddress,
    Invoice,
    Mnemonic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    State,
    Create,
    Continue,
    SetPin { pin: String, confirmation: String },
    Unlock(String),
    /// `None` opens the seed phrase form.
    Restore(Option<String>),
    Cancel,
    Go(Screen),
    Back,
    Balance,
    Send {
        kind: SendKind,
        amount: String,
        destination: String,
    },
    Invoice { amount: String, memo: Option<String> },
    ReceiveKind(SendKind),
    Deposit,
    More,
    Copy(CopyTarget),
    Logout,
    Confirm,
    Decline,
    Dismiss,
    Quit,
}

fn usage(text: &str) -> SparkWalletError {
    SparkWalletError::validation(format!("Usage: {}", text))
}

impl FromStr for Command {
    type Err = SparkWalletError;

    fn from_str(line: &str) -> Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Err(SparkWalletError::validation("Empty command"));
        };

        let command = match (name.to_ascii_lowercase().as_str(), args) {
            ("help" | "?", _) => Self::Help,
            ("state", _) => Self::State,
            ("create", _) => Self::Create,
            ("continue", _) => Self::Continue,
            ("pin", [pin, confirmation]) => Self::SetPin {
                pin: pin.to_string(),
                confirmation: confirmation.to_string(),
            },
            ("pin", _) => return Err(usage("pin <pin> <confirm>")),
            ("unlock", [pin]) => Self::Unlock(pin.to_string()),
            ("unlock", _) => return Err(usage("unlock <pin>")),
            ("restore", []) => Self::Restore(None),
            ("restore", words) => Self::Restore(Some(words.join(" "))),
            ("cancel", _) => Self::Cancel,
            ("go", [screen]) => Self::Go(screen.parse().map_err(SparkWalletError::Validation)?),
            ("go", _) => return Err(usage("go <screen>")),
            ("back", _) => Self::Back,
            ("balance", _) => Self::Balance,
            ("send", [kind, rest @ ..]) => match (kind.parse::<SendKind>(), rest) {
                (Ok(SendKind::Spark), [amount, address]) => Self::Send {
                    kind: SendKind::Spark,
                    amount: amount.to_string(),
                    destination: address.to_string(),
                },
                (Ok(SendKind::Lightning), [invoice]) => Self::Send {
                    kind: SendKind::Lightning,
                    amount: String::new(),
                    destination: invoice.to_string(),
                },
                (Ok(SendKind::Lightning), [invoice, amount]) => Self::Send {
                    kind: SendKind::Lightning,
                    amount: amount.to_string(),
                    destination: invoice.to_string(),
                },
                _ => {
                    return Err(usage(
                        "send spark <amount> <address> | send lightning <invoice> [amount]",
                    ))
                }
            },
            ("send", _) => return Err(usage("send <spark|lightning> ...")),
            ("invoice", [amount, memo @ ..]) => Self::Invoice {
                amount: amount.to_string(),
                memo: (!memo.is_empty()).then(|| memo.join(" ")),
            },
            ("invoice", _) => return Err(usage("invoice <amount> [memo]")),
            ("receive", [kind]) => {
                Self::ReceiveKind(kind.parse().map_err(SparkWalletError::Validation)?)
            }
            ("receive", _) => return Err(usage("receive <spark|lightning>")),
            ("deposit", _) => Self::Deposit,
            ("more", _) => Self::More,
            ("copy", [target]) => Self::Copy(match target.to_ascii_lowercase().as_str() {
                "spark" | "address" => CopyTarget::SparkAddress,
                "deposit" => CopyTarget::DepositAddress,
                "invoice" => CopyTarget::Invoice,
                "mnemonic" | "seed" => CopyTarget::Mnemonic,
                _ => return Err(usage("copy <spark|deposit|invoice|mnemonic>")),
            }),
            ("copy", _) => return Err(usage("copy <spark|deposit|invoice|mnemonic>")),
            ("logout", _) => Self::Logout,
            ("yes" | "y", _) => Self::Confirm,
            ("no" | "n", _) => Self::Decline,
            ("dismiss", _) => Self::Dismiss,
            ("quit" | "exit", _) => Self::Quit,
            (other, _) => {
                return Err(SparkWalletError::validation(format!(
                    "Unknown command: {} (try `help`)",
                    other
                )))
            }
        };

        Ok(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// Print this text instead of the rendered state.
    Print(String),
    Quit,
}

/// Run one command against the controller.
pub async fn execute(controller: &mut WalletController, command: Command) -> Result<Outcome> {
    match command {
        Command::Help => return Ok(Outcome::Print(HELP.to_string())),
        Command::State => {
            let json = serde_json::to_string_pretty(controller.state())?;
            return Ok(Outcome::Print(json));
        }
        Command::Quit => return Ok(Outcome::Quit),
        Command::Create => controller.create_wallet().await?,
        Command::Continue => controller.continue_to_wallet()?,
        Command::SetPin { pin, confirmation } => controller.set_pin(&pin, &confirmation).await?,
        Command::Unlock(pin) => controller.unlock(&pin).await?,
        Command::Restore(None) => controller.start_restore(),
        Command::Restore(Some(seed)) => {
            controller.set_seed_input(&seed);
            controller.restore_from_input().await?
        }
        Command::Cancel => cancel(controller),
        Command::Go(screen) => controller.navigate(screen).await?,
        Command::Back => controller.back(),
        Command::Balance => controller.refresh_balance().await?,
        Command::Send {
            kind,
            amount,
            destination,
        } => {
            controller.navigate(Screen::Send).await?;
            controller.set_send_kind(kind);
            match kind {
                SendKind::Spark => {
                    controller.set_send_amount(&amount);
                    controller.set_recipient_address(&destination);
                }
                SendKind::Lightning => {
                    controller.set_lightning_invoice(&destination);
                    if !amount.is_empty() && invoice_amount_sats(&destination).is_none() {
                        controller.set_send_amount(&amount);
                    }
                }
            }
            controller.submit_send().await?
        }
        Command::Invoice { amount, memo } => {
            if controller.state().screen != Screen::Receive {
                controller.navigate(Screen::Receive).await?;
            }
            controller.set_receive_amount(&amount);
            controller.request_invoice(&amount, memo.as_deref()).await?
        }
        Command::ReceiveKind(kind) => controller.set_receive_kind(kind).await?,
        Command::Deposit => {
            // Entering the screen fetches an address only when none is shown yet
            let had_address = controller.state().deposit_address.is_some();
            if controller.state().screen != Screen::Deposit {
                controller.navigate(Screen::Deposit).await?;
            }
            if had_address {
                controller.refresh_deposit_address().await?
            }
        }
        Command::More => controller.load_more_transfers().await?,
        Command::Copy(target) => {
            let text = copy_text(controller.state(), target).ok_or_else(|| {
                SparkWalletError::validation("Nothing to copy yet")
            })?;
            controller.copy_to_clipboard(&text).await;
        }
        Command::Logout => controller.request_logout(),
        Command::Confirm => controller.confirm_logout(),
        Command::Decline => controller.cancel_logout(),
        Command::Dismiss => controller.dismiss_error(),
    }

    Ok(Outcome::Continue)
}

fn cancel(controller: &mut WalletController) {
    let state = controller.state();
    if state.confirmation.is_some() {
        controller.cancel_logout();
        return;
    }

    match (state.screen, state.init_stage) {
        (Screen::Init, InitStage::ShowMnemonic | InitStage::PinSetup) => {
            controller.cancel_pin_setup()
        }
        (Screen::Init, InitStage::Restoring) => controller.cancel_restore(),
        (Screen::Send, _) => controller.cancel_send(),
        _ => controller.back(),
    }
}

fn copy_text(state: &AppState, target: CopyTarget) -> Option<String> {
    match target {
        CopyTarget::SparkAddress => state.spark_address.clone(),
        CopyTarget::DepositAddress => state.deposit_address.clone(),
        CopyTarget::Invoice => state.invoice.as_ref().map(|i| i.payment_request.clone()),
        CopyTarget::Mnemonic => state.pending_mnemonic.clone(),
    }
}

/// Plain-text rendering of the current screen.
pub fn render(state: &AppState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", state.screen);

    match state.screen {
        Screen::Init => match state.init_stage {
            InitStage::Landing => {
                let _ = writeln!(out, "Create a new wallet (`create`) or restore one (`restore`).");
            }
            InitStage::Restoring => {
                let words = state.seed_input.split_whitespace().count();
                let _ = writeln!(out, "Enter your 12-word seed phrase ({} words so far).", words);
            }
            InitStage::ShowMnemonic => {
                let _ = writeln!(out, "Write down your seed phrase:");
                if let Some(mnemonic) = &state.pending_mnemonic {
                    let _ = writeln!(out, "  {}", mnemonic);
                }
                let _ = writeln!(out, "Then `continue` to choose a PIN.");
            }
            InitStage::PinSetup => {
                let _ = writeln!(out, "Choose a 4-digit PIN: `pin <pin> <confirm>`.");
            }
            InitStage::PinEntry => {
                let _ = writeln!(out, "Wallet locked. `unlock <pin>`.");
            }
        },
        Screen::Home => {
            let _ = writeln!(out, "Balance: {} sats", state.balance);
        }
        Screen::Send => {
            let _ = writeln!(out, "Balance: {} sats", state.balance);
            let _ = writeln!(out, "Type: {}", state.send_kind);
            match state.send_kind {
                SendKind::Spark => {
                    let _ = writeln!(out, "Amount: {}", state.send_amount);
                    let _ = writeln!(out, "To: {}", state.recipient_address);
                }
                SendKind::Lightning => {
                    let _ = writeln!(out, "Invoice: {}", state.lightning_invoice);
                    let _ = writeln!(out, "Amount: {}", state.send_amount);
                }
            }
        }
        Screen::Receive => match &state.invoice {
            Some(invoice) => {
                let _ = writeln!(out, "Invoice ({}):", invoice.status);
                let _ = writeln!(out, "  {}", invoice.payment_request);
            }
            None if state.receive_kind == SendKind::Spark => {
                let address = state.spark_address.as_deref().unwrap_or("loading...");
                let _ = writeln!(out, "Spark address: {}", address);
            }
            None => {
                let _ = writeln!(out, "Request an invoice: `invoice <amount> [memo]`.");
            }
        },
        Screen::Deposit => {
            let address = state.deposit_address.as_deref().unwrap_or("loading...");
            let _ = writeln!(out, "Deposit address: {}", address);
            let _ = writeln!(out, "Deposits are claimed automatically.");
        }
        Screen::Settings => {
            let address = state.spark_address.as_deref().unwrap_or("-");
            let _ = writeln!(out, "Spark address: {}", address);
            let _ = writeln!(out, "`go transfers` for history, `logout` to remove this wallet.");
        }
        Screen::Transfers => {
            let view = &state.transfers;
            if view.loading {
                let _ = writeln!(out, "Loading transfers...");
            }
            if let Some(error) = &view.error {
                let _ = writeln!(out, "Error: {}", error);
            }
            if view.items.is_empty() && !view.loading && view.error.is_none() {
                let _ = writeln!(out, "No transfers yet.");
            }
            for transfer in &view.items {
                let _ = writeln!(
                    out,
                    "  {}  {:>10} sats  {:<12} {}",
                    transfer.display_date(),
                    transfer.total_value,
                    transfer.display_status(),
                    transfer.display_type()
                );
            }
            if view.has_more {
                let _ = writeln!(out, "`more` to load older transfers.");
            }
        }
    }

    if let Some(status) = &state.copy_status {
        let _ = writeln!(out, "[{}]", status);
    }
    if let Some(confirmation) = state.confirmation {
        let _ = writeln!(out, "{} (yes/no)", confirmation.message());
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "Error: {}", error);
    }

    out
}
