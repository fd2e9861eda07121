use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{confirm, open_ledger};
use crate::error::Result;
use crate::fmt::{money, percent};
use crate::ledger::{CardDraft, CardPatch};
use crate::rebate::parse_percent;
use crate::wallet::card_balance;

pub fn add(name: &str, starting: f64, basic: &str, rates: Vec<(String, f64)>) -> Result<()> {
    let mut ledger = open_ledger()?;
    let draft = CardDraft {
        name: name.to_string(),
        starting_cashback: starting,
        basic_rebate: parse_percent(basic),
        category_rates: rates.into_iter().collect(),
    };
    let id = ledger.commit(|s| s.add_card(draft))?;
    println!("Added card: {name} ({id})");
    Ok(())
}

pub fn edit(
    id: &str,
    name: Option<String>,
    starting: Option<f64>,
    basic: Option<&str>,
    rates: Vec<(String, f64)>,
    cleared_rates: Vec<String>,
) -> Result<()> {
    let mut ledger = open_ledger()?;
    let patch = CardPatch {
        name,
        starting_cashback: starting,
        basic_rebate: basic.map(parse_percent),
        category_rates: rates.into_iter().collect(),
        cleared_rates,
    };
    ledger.commit(|s| s.edit_card(id, patch))?;
    println!("Updated card {id}");
    Ok(())
}

pub fn remove(id: &str, yes: bool) -> Result<()> {
    let mut ledger = open_ledger()?;
    let name = ledger.state.card_name(id).to_string();
    if !confirm(&format!("Remove {name} and all its settings?"), yes) {
        println!("Cancelled.");
        return Ok(());
    }
    let card = ledger.commit(|s| s.remove_card(id))?;
    println!("Removed card: {}", card.name);
    Ok(())
}

pub fn list() -> Result<()> {
    let ledger = open_ledger()?;
    let state = &ledger.state;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Starting", "Basic", "Category Rates", "Available"]);
    for card in &state.cards {
        let (basic, rates) = match state.rebate_config(&card.id) {
            Some(config) => (
                percent(config.basic_rebate),
                config
                    .merchant_type_rebates
                    .iter()
                    .map(|(m, r)| format!("{m} {}", percent(*r)))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            None => ("-".to_string(), String::new()),
        };
        let mut available = money(card_balance(card, &state.transactions));
        if card.manual_override.is_some() {
            available.push_str(" (override)");
        }
        table.add_row(vec![
            Cell::new(&card.id),
            Cell::new(&card.name),
            Cell::new(money(card.starting_cashback)).set_alignment(CellAlignment::Right),
            Cell::new(basic).set_alignment(CellAlignment::Right),
            Cell::new(rates),
            Cell::new(available).set_alignment(CellAlignment::Right),
        ]);
    }
    if state.cards.is_empty() {
        println!("No cards configured. Add one with `kakeibo cards add NAME`.");
    } else {
        println!("Cards\n{table}");
    }
    Ok(())
}
