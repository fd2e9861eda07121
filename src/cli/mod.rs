pub mod cards;
pub mod categories;
pub mod init;
pub mod one_time;
pub mod promo;
pub mod status;
pub mod transactions;
pub mod wallet;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;

use crate::error::Result;
use crate::ledger::Ledger;
use crate::models::Status;
use crate::rebate::parse_percent;
use crate::settings::{load_settings, Backend};
use crate::store::open_store;

pub(crate) fn open_ledger() -> Result<Ledger> {
    let settings = load_settings();
    Ok(Ledger::open(open_store(&settings)?))
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Ask before a destructive or money-moving action unless `--yes` was given.
pub(crate) fn confirm(prompt: &str, yes: bool) -> bool {
    if yes {
        return true;
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// `CATEGORY=PERCENT`; an unparsable percent counts as 0.
fn parse_rate(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, pct) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=PERCENT, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing category in '{raw}'"));
    }
    Ok((name.to_string(), parse_percent(pct)))
}

#[derive(Parser)]
#[command(
    name = "kakeibo",
    version,
    about = "Track credit-card cashback, rebate rates and promotional campaigns."
)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and storage backend.
    Init {
        /// Where to keep kakeibo data (default: ~/.local/share/kakeibo)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Storage backend: json or sqlite
        #[arg(long)]
        backend: Option<Backend>,
        /// Your name, shown by `status`
        #[arg(long)]
        name: Option<String>,
    },
    /// Show where data lives and how many records it holds.
    Status,
    /// Manage cards and their rebate rates.
    Cards {
        #[command(subcommand)]
        command: CardsCommands,
    },
    /// Manage merchant categories.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Record and review transactions.
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },
    /// Show available cashback per card and active promo progress.
    Wallet {
        /// Evaluate as of this date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
        #[command(subcommand)]
        command: Option<WalletCommands>,
    },
    /// Manage spending campaigns.
    Promo {
        #[command(subcommand)]
        command: PromoCommands,
    },
    /// Manage one-time flat bonuses.
    OneTime {
        #[command(subcommand)]
        command: OneTimeCommands,
    },
    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum CardsCommands {
    /// Add a card and its rebate rates.
    Add {
        /// Card name, e.g. 'HSBC Red'
        name: String,
        /// Cashback already on the card
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        starting: f64,
        /// Basic rebate percent
        #[arg(long, default_value = "0")]
        basic: String,
        /// Category rate, e.g. Dining=5 (repeatable)
        #[arg(long = "rate", value_parser = parse_rate)]
        rates: Vec<(String, f64)>,
    },
    /// Edit a card's name, opening balance or rates.
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        starting: Option<f64>,
        #[arg(long)]
        basic: Option<String>,
        #[arg(long = "rate", value_parser = parse_rate)]
        rates: Vec<(String, f64)>,
        /// Drop a category rate so the basic rate applies (repeatable)
        #[arg(long = "clear-rate")]
        clear_rates: Vec<String>,
    },
    /// Remove a card and its rebate settings.
    Remove {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
    /// List cards with their rates and balances.
    List,
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Add a merchant category.
    Add { name: String },
    /// Remove a merchant category. Existing tags are kept.
    Remove {
        name: String,
        #[arg(long, short)]
        yes: bool,
    },
    /// List merchant categories.
    List,
}

#[derive(Args, Clone, Default)]
pub struct TxFields {
    /// Card id
    #[arg(long)]
    pub card: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub amount: Option<f64>,
    #[arg(long = "desc")]
    pub description: Option<String>,
    /// Calendar day, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// pending, confirmed or tbc
    #[arg(long)]
    pub status: Option<Status>,
    /// Merchant category tag (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,
    /// Rebate percent (default: the card's best matching rate)
    #[arg(long)]
    pub rebate: Option<String>,
    /// Cashback withdrawn from the card's balance
    #[arg(long, conflicts_with_all = ["cashback_in", "spend"])]
    pub redemption: bool,
    /// External credit added to the card's balance
    #[arg(long = "cashback-in", conflicts_with = "spend")]
    pub cashback_in: bool,
    /// Ordinary spending (use with edit to undo --redemption/--cashback-in)
    #[arg(long)]
    pub spend: bool,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a transaction.
    Add {
        #[command(flatten)]
        fields: TxFields,
    },
    /// Change a transaction; unspecified fields keep their values.
    Edit {
        id: String,
        #[command(flatten)]
        fields: TxFields,
    },
    /// Delete a transaction.
    Remove { id: String },
    /// List transactions, newest first.
    List {
        #[arg(long)]
        card: Option<String>,
        #[arg(long)]
        status: Option<Status>,
    },
    /// Show the suggested rebate percent for a card and categories.
    Suggest {
        #[arg(long)]
        card: String,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Pin a card's available balance to a fixed amount.
    Override {
        card: String,
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },
    /// Go back to the computed balance.
    Clear { card: String },
}

#[derive(Args, Clone, Default)]
pub struct PromoFields {
    /// First day of the spending window
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Last day of the spending window
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Bonus rebate percent
    #[arg(long)]
    pub rebate: Option<String>,
    /// Spending goal
    #[arg(long)]
    pub target: Option<f64>,
    /// Maximum bonus rebate
    #[arg(long)]
    pub cap: Option<f64>,
    /// Deadline for the payout
    #[arg(long = "rebate-by")]
    pub rebate_by: Option<NaiveDate>,
    /// Category counted toward the goal (repeatable; default All)
    #[arg(long = "target-type")]
    pub target_types: Vec<String>,
    /// Category that earns the bonus (repeatable; default all target spending)
    #[arg(long = "rebate-type")]
    pub rebate_types: Vec<String>,
    /// Eligible card id (repeatable; default any card)
    #[arg(long = "card")]
    pub cards: Vec<String>,
}

#[derive(Subcommand)]
pub enum PromoCommands {
    /// Add a campaign.
    Add {
        title: String,
        #[command(flatten)]
        fields: PromoFields,
    },
    /// Change a campaign's terms.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: PromoFields,
        #[arg(long = "no-target", conflicts_with = "target")]
        no_target: bool,
        #[arg(long = "no-cap", conflicts_with = "cap")]
        no_cap: bool,
        #[arg(long = "no-rebate-by", conflicts_with = "rebate_by")]
        no_rebate_by: bool,
    },
    /// Delete a campaign.
    Remove { id: String },
    /// Show campaigns grouped by stage.
    List {
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Credit a campaign's earned rebate once its goal is met.
    Pay {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum OneTimeCommands {
    /// Add a flat bonus for one card.
    Add {
        title: String,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        card: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// List one-time bonuses.
    List,
    /// Credit a one-time bonus. Does nothing once paid.
    Pay {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
    /// Delete a one-time bonus.
    Remove { id: String },
}
