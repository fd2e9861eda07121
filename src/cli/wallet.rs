use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{open_ledger, today};
use crate::error::Result;
use crate::fmt::{bar, money, percent};
use crate::promotions::{metrics, progress_percent};
use crate::wallet::{breakdown, card_balance};

pub fn show(as_of: Option<NaiveDate>) -> Result<()> {
    let ledger = open_ledger()?;
    let state = &ledger.state;
    let today = as_of.unwrap_or_else(today);

    println!("{}", "Wallet Balance".bold());
    if state.cards.is_empty() {
        println!("No cards configured.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Card", "Starting", "Earned", "Credits", "Redeemed", "Available"]);
        let mut total = 0.0;
        for card in &state.cards {
            let b = breakdown(card, &state.transactions);
            let available = card_balance(card, &state.transactions);
            total += available;
            let available = match card.manual_override {
                Some(_) => format!("{} (override)", money(available)),
                None => money(available),
            };
            table.add_row(vec![
                Cell::new(&card.name),
                Cell::new(money(b.starting)).set_alignment(CellAlignment::Right),
                Cell::new(money(b.earned)).set_alignment(CellAlignment::Right),
                Cell::new(money(b.credits)).set_alignment(CellAlignment::Right),
                Cell::new(money(b.redeemed)).set_alignment(CellAlignment::Right),
                Cell::new(available).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
        println!("Total available: {}", money(total).bold());
    }
    println!("{}", "* Only confirmed transactions contribute to the available balance.".dimmed());

    println!();
    println!("{}", "Promo Progress".bold());
    let active: Vec<_> = state.promotions.iter().filter(|p| p.end_date >= today).collect();
    if active.is_empty() {
        println!("No active promotions tracked.");
        return Ok(());
    }
    for promo in active {
        let m = metrics(promo, &state.transactions);
        println!(
            "{}  {} to {}  +{} Rebate",
            promo.title.bold(),
            promo.start_date.format("%m-%d"),
            promo.end_date.format("%m-%d"),
            percent(promo.additional_rebate)
        );
        if let Some(target) = promo.target() {
            let progress = progress_percent(promo, m.spending);
            println!(
                "  {} {} / {} ({progress:.0}%)",
                bar(progress, 20),
                money(m.spending),
                money(target)
            );
        }
    }
    Ok(())
}

pub fn set_override(card: &str, amount: f64) -> Result<()> {
    let mut ledger = open_ledger()?;
    ledger.commit(|s| s.set_override(card, Some(amount)))?;
    println!("{} balance pinned at {}", ledger.state.card_name(card), money(amount));
    Ok(())
}

pub fn clear_override(card: &str) -> Result<()> {
    let mut ledger = open_ledger()?;
    ledger.commit(|s| s.set_override(card, None))?;
    println!("{} balance is computed from transactions again", ledger.state.card_name(card));
    Ok(())
}
