use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{confirm, open_ledger, today, PromoFields};
use crate::error::{KakeiboError, Result};
use crate::fmt::{bar, money, percent};
use crate::ledger::PromotionDraft;
use crate::lifecycle::{bucket, Stage};
use crate::models::{AppState, Promotion};
use crate::promotions::{metrics, payable_metrics, progress_percent, target_met};
use crate::rebate::parse_percent;

pub fn add(title: &str, fields: PromoFields) -> Result<()> {
    let mut ledger = open_ledger()?;
    let start = fields.start.unwrap_or_else(today);
    let draft = PromotionDraft {
        title: title.to_string(),
        start_date: start,
        end_date: fields.end.unwrap_or(start),
        rebate_by_date: fields.rebate_by,
        additional_rebate: fields.rebate.as_deref().map(parse_percent),
        target_amount: fields.target,
        max_cashback: fields.cap,
        target_merchant_types: fields.target_types,
        rebate_merchant_types: fields.rebate_types,
        eligible_card_ids: fields.cards,
    };
    let id = ledger.commit(|s| s.add_promotion(draft))?;
    println!("Added campaign: {title} ({id})");
    Ok(())
}

pub struct EditFlags {
    pub no_target: bool,
    pub no_cap: bool,
    pub no_rebate_by: bool,
}

pub fn edit(id: &str, title: Option<String>, fields: PromoFields, flags: EditFlags) -> Result<()> {
    let mut ledger = open_ledger()?;
    let existing = find(&ledger.state, id)?.clone();

    let draft = PromotionDraft {
        title: title.unwrap_or(existing.title),
        start_date: fields.start.unwrap_or(existing.start_date),
        end_date: fields.end.unwrap_or(existing.end_date),
        rebate_by_date: if flags.no_rebate_by {
            None
        } else {
            fields.rebate_by.or(existing.rebate_by_date)
        },
        additional_rebate: Some(
            fields
                .rebate
                .as_deref()
                .map(parse_percent)
                .unwrap_or(existing.additional_rebate),
        ),
        target_amount: if flags.no_target {
            None
        } else {
            fields.target.or(existing.target_amount)
        },
        max_cashback: if flags.no_cap { None } else { fields.cap.or(existing.max_cashback) },
        target_merchant_types: if fields.target_types.is_empty() {
            existing.target_merchant_types
        } else {
            fields.target_types
        },
        rebate_merchant_types: if fields.rebate_types.is_empty() {
            existing.rebate_merchant_types
        } else {
            fields.rebate_types
        },
        eligible_card_ids: if fields.cards.is_empty() {
            existing.eligible_card_ids
        } else {
            fields.cards
        },
    };
    ledger.commit(|s| s.update_promotion(id, draft))?;
    println!("Updated campaign {id}");
    Ok(())
}

pub fn remove(id: &str) -> Result<()> {
    let mut ledger = open_ledger()?;
    let promo = ledger.commit(|s| s.remove_promotion(id))?;
    println!("Removed campaign: {}", promo.title);
    Ok(())
}

fn find<'a>(state: &'a AppState, id: &str) -> Result<&'a Promotion> {
    state
        .promotions
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| KakeiboError::NotFound {
            kind: "campaign",
            id: id.to_string(),
        })
}

fn payout_state(promo: &Promotion, spending: f64) -> String {
    if promo.is_paid_off {
        "Paid".green().to_string()
    } else if target_met(promo, spending) {
        "Ready".yellow().to_string()
    } else {
        "Locked".dimmed().to_string()
    }
}

fn section(title: &str, promos: &[&Promotion], state: &AppState) {
    println!("{}", format!("{title} ({})", promos.len()).bold());
    if promos.is_empty() {
        println!();
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Title", "Window", "Rebate By", "Bonus", "Spent / Goal", "Progress", "Earned", "Payout",
    ]);
    for promo in promos {
        let m = metrics(promo, &state.transactions);
        let goal = match promo.target() {
            Some(target) => format!("{} / {}", money(m.spending), money(target)),
            None => money(m.spending),
        };
        let earned = match promo.max_cashback {
            Some(cap) => format!("{} (cap {})", money(m.earned_rebate), money(cap)),
            None => money(m.earned_rebate),
        };
        table.add_row(vec![
            Cell::new(&promo.id),
            Cell::new(&promo.title),
            Cell::new(format!("{} to {}", promo.start_date, promo.end_date)),
            Cell::new(promo.rebate_by_date.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(format!("+{}", percent(promo.additional_rebate))).set_alignment(CellAlignment::Right),
            Cell::new(goal).set_alignment(CellAlignment::Right),
            Cell::new(bar(progress_percent(promo, m.spending), 10)),
            Cell::new(earned).set_alignment(CellAlignment::Right),
            Cell::new(payout_state(promo, m.spending)),
        ]);
    }
    println!("{table}\n");
}

pub fn list(as_of: Option<NaiveDate>) -> Result<()> {
    let ledger = open_ledger()?;
    let state = &ledger.state;
    let today = as_of.unwrap_or_else(today);
    let buckets = bucket(&state.promotions, today);

    section(Stage::Ongoing.label(), &buckets.ongoing, state);
    section(Stage::PendingReward.label(), &buckets.pending, state);
    section(Stage::Past.label(), &buckets.past, state);
    if !buckets.upcoming.is_empty() {
        section("Upcoming", &buckets.upcoming, state);
    }
    Ok(())
}

pub fn pay(id: &str, yes: bool) -> Result<()> {
    let mut ledger = open_ledger()?;
    let promo = find(&ledger.state, id)?;
    let m = payable_metrics(promo, &ledger.state.transactions)?;
    let prompt = format!("Confirm {} rebate for \"{}\"?", money(m.earned_rebate), promo.title);
    if !confirm(&prompt, yes) {
        println!("Cancelled.");
        return Ok(());
    }
    let credit = ledger.commit(|s| s.pay_promotion(id, today()))?;
    println!(
        "Credited {} to {}",
        money(credit.amount),
        ledger.state.card_name(&credit.card_id)
    );
    Ok(())
}
