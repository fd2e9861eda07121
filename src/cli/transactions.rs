use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{open_ledger, today, TxFields};
use crate::error::{KakeiboError, Result};
use crate::fmt::{money, percent};
use crate::ledger::TransactionDraft;
use crate::models::{Status, Transaction, TransactionKind};
use crate::rebate::{parse_percent, suggest_rebate};

fn kind_from_flags(fields: &TxFields) -> Option<TransactionKind> {
    if fields.redemption {
        Some(TransactionKind::Redemption)
    } else if fields.cashback_in {
        Some(TransactionKind::CashbackIn)
    } else if fields.spend {
        Some(TransactionKind::Spend)
    } else {
        None
    }
}

pub fn add(fields: TxFields) -> Result<()> {
    let mut ledger = open_ledger()?;
    let kind = kind_from_flags(&fields).unwrap_or_default();
    let draft = TransactionDraft {
        date: fields.date.unwrap_or_else(today),
        description: fields.description.unwrap_or_default(),
        card_id: fields.card.unwrap_or_default(),
        amount: fields.amount,
        status: fields.status.unwrap_or(Status::Pending),
        merchant_types: fields.categories,
        rebate_percent: fields.rebate.as_deref().map(parse_percent),
        kind,
    };
    let id = ledger.commit(|s| s.add_transaction(draft))?;
    let tx = &ledger.state.transactions[0];
    println!(
        "Recorded {} {} on {} ({id}), rebate {}",
        tx.kind.label().to_lowercase(),
        money(tx.amount),
        ledger.state.card_name(&tx.card_id),
        percent(tx.rebate_percent)
    );
    Ok(())
}

pub fn edit(id: &str, fields: TxFields) -> Result<()> {
    let mut ledger = open_ledger()?;
    let existing = ledger
        .state
        .transactions
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .ok_or_else(|| KakeiboError::NotFound {
            kind: "transaction",
            id: id.to_string(),
        })?;

    let card_changed = fields.card.as_ref().is_some_and(|c| *c != existing.card_id);
    let categories_changed = !fields.categories.is_empty() && fields.categories != existing.merchant_types;
    // A new card or new tags re-derive the rate unless one is given.
    let rebate_percent = match fields.rebate.as_deref() {
        Some(raw) => Some(parse_percent(raw)),
        None if card_changed || categories_changed => None,
        None => Some(existing.rebate_percent),
    };

    let draft = TransactionDraft {
        date: fields.date.unwrap_or(existing.date),
        description: fields.description.clone().unwrap_or(existing.description),
        card_id: fields.card.clone().unwrap_or(existing.card_id),
        amount: fields.amount.or(Some(existing.amount)),
        status: fields.status.unwrap_or(existing.status),
        merchant_types: if fields.categories.is_empty() {
            existing.merchant_types
        } else {
            fields.categories.clone()
        },
        rebate_percent,
        kind: kind_from_flags(&fields).unwrap_or(existing.kind),
    };
    ledger.commit(|s| s.update_transaction(id, draft))?;
    println!("Updated transaction {id}");
    Ok(())
}

pub fn remove(id: &str) -> Result<()> {
    let mut ledger = open_ledger()?;
    let tx = ledger.commit(|s| s.remove_transaction(id))?;
    println!("Deleted {} on {}: {}", money(tx.amount), tx.date, tx.description);
    Ok(())
}

fn status_cell(status: Status) -> String {
    match status {
        Status::Confirmed => status.to_string().green().to_string(),
        Status::Pending => status.to_string().yellow().to_string(),
        Status::Tbc => status.to_string().dimmed().to_string(),
    }
}

fn amount_cell(tx: &Transaction) -> String {
    match tx.kind {
        TransactionKind::Spend => money(tx.amount),
        TransactionKind::Redemption => format!("-{}", money(tx.amount)).red().to_string(),
        TransactionKind::CashbackIn => format!("+{}", money(tx.amount)).green().to_string(),
    }
}

pub fn list(card: Option<&str>, status: Option<Status>) -> Result<()> {
    let ledger = open_ledger()?;
    let state = &ledger.state;
    let rows: Vec<&Transaction> = state
        .transactions
        .iter()
        .filter(|t| card.map_or(true, |c| t.card_id == c))
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect();

    if rows.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Card", "Description", "Amount", "Status", "Categories", "Rebate", "Exp. Rebate",
    ]);
    for tx in &rows {
        let rebate = match tx.kind {
            TransactionKind::Spend => percent(tx.rebate_percent),
            kind => kind.label().to_string(),
        };
        table.add_row(vec![
            Cell::new(&tx.id),
            Cell::new(tx.date),
            Cell::new(state.card_name(&tx.card_id)),
            Cell::new(&tx.description),
            Cell::new(amount_cell(tx)).set_alignment(CellAlignment::Right),
            Cell::new(status_cell(tx.status)),
            Cell::new(tx.merchant_types.join(", ")),
            Cell::new(rebate).set_alignment(CellAlignment::Right),
            Cell::new(money(tx.expected_rebate())).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Transactions\n{table}");
    Ok(())
}

pub fn suggest(card: &str, categories: &[String]) -> Result<()> {
    let ledger = open_ledger()?;
    let state = &ledger.state;
    if state.card(card).is_none() {
        return Err(KakeiboError::UnknownCard(card.to_string()));
    }
    let rate = suggest_rebate(&state.rebate_configs, card, categories);
    println!("{} on {}", percent(rate), state.card_name(card));
    Ok(())
}
