use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{confirm, open_ledger, today};
use crate::error::{KakeiboError, Result};
use crate::fmt::money;
use crate::ledger::OneTimeDraft;

pub fn add(
    title: &str,
    amount: Option<f64>,
    card: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    let mut ledger = open_ledger()?;
    let start = start.unwrap_or_else(today);
    let draft = OneTimeDraft {
        title: title.to_string(),
        start_date: start,
        end_date: end.unwrap_or(start),
        rebate_amount: amount,
        card_id: card.unwrap_or_default(),
    };
    let id = ledger.commit(|s| s.add_one_time(draft))?;
    println!("Added one-time promo: {title} ({id})");
    Ok(())
}

pub fn list() -> Result<()> {
    let ledger = open_ledger()?;
    let state = &ledger.state;
    if state.one_time_promos.is_empty() {
        println!("No one-time promos.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Window", "Card", "Amount", "Status"]);
    for promo in &state.one_time_promos {
        let status = if promo.is_paid_off {
            "Paid".green().to_string()
        } else {
            "Unpaid".yellow().to_string()
        };
        table.add_row(vec![
            Cell::new(&promo.id),
            Cell::new(&promo.title),
            Cell::new(format!("{} to {}", promo.start_date, promo.end_date)),
            Cell::new(state.card_name(&promo.card_id)),
            Cell::new(money(promo.rebate_amount)).set_alignment(CellAlignment::Right),
            Cell::new(status),
        ]);
    }
    println!("One-time promos\n{table}");
    Ok(())
}

pub fn pay(id: &str, yes: bool) -> Result<()> {
    let mut ledger = open_ledger()?;
    let promo = ledger
        .state
        .one_time_promos
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| KakeiboError::NotFound {
            kind: "one-time promo",
            id: id.to_string(),
        })?;
    if promo.is_paid_off {
        println!("\"{}\" was already paid out.", promo.title);
        return Ok(());
    }
    if !confirm(&format!("Complete payout for \"{}\"?", promo.title), yes) {
        println!("Cancelled.");
        return Ok(());
    }
    match ledger.commit(|s| s.pay_one_time(id, today()))? {
        Some(credit) => println!(
            "Credited {} to {}",
            money(credit.amount),
            ledger.state.card_name(&credit.card_id)
        ),
        None => println!("Already paid out."),
    }
    Ok(())
}

pub fn remove(id: &str) -> Result<()> {
    let mut ledger = open_ledger()?;
    let promo = ledger.commit(|s| s.remove_one_time(id))?;
    println!("Removed one-time promo: {}", promo.title);
    Ok(())
}
