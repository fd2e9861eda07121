use crate::cli::open_ledger;
use crate::error::Result;
use crate::settings::{load_settings, settings_path};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let ledger = open_ledger()?;
    let state = &ledger.state;

    let user = if settings.user_name.is_empty() {
        "(not set)"
    } else {
        settings.user_name.as_str()
    };
    println!("User:       {user}");
    println!("Settings:   {}", settings_path().display());
    println!("Data dir:   {}", settings.data_dir);
    println!("Backend:    {}", settings.backend);
    println!("Storage:    {}", ledger.location());

    let unpaid_campaigns = state.promotions.iter().filter(|p| !p.is_paid_off).count();
    let unpaid_one_time = state.one_time_promos.iter().filter(|p| !p.is_paid_off).count();

    println!();
    println!("Cards:            {}", state.cards.len());
    println!("Transactions:     {}", state.transactions.len());
    println!("Categories:       {}", state.merchant_types.len());
    println!("Campaigns:        {} ({unpaid_campaigns} unpaid)", state.promotions.len());
    println!("One-time promos:  {} ({unpaid_one_time} unpaid)", state.one_time_promos.len());
    Ok(())
}
