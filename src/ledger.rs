//! Validated mutations over [`AppState`] and the save-on-commit session.
//!
//! Every mutation either applies completely or leaves the state untouched;
//! [`Ledger::commit`] persists the whole document only after a mutation
//! succeeds.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::error::{KakeiboError, Result};
use crate::models::{
    new_id, AppState, Card, OneTimePromo, Promotion, RebateConfig, Status, Transaction,
    TransactionKind, ALL_MERCHANTS,
};
use crate::promotions::{campaign_payout, one_time_payout};
use crate::rebate::suggest_rebate;
use crate::store::{load_state, StateStore};

pub struct Ledger {
    pub state: AppState,
    store: Box<dyn StateStore>,
}

impl Ledger {
    pub fn open(store: Box<dyn StateStore>) -> Self {
        let state = load_state(store.as_ref());
        Self { state, store }
    }

    /// Apply `mutation` to a copy of the state and save it. On error nothing
    /// changes, in memory or on disk.
    pub fn commit<T>(&mut self, mutation: impl FnOnce(&mut AppState) -> Result<T>) -> Result<T> {
        let mut draft = self.state.clone();
        let out = mutation(&mut draft)?;
        self.store.save(&draft)?;
        self.state = draft;
        Ok(out)
    }

    pub fn location(&self) -> String {
        self.store.location()
    }
}

fn required(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(KakeiboError::MissingField(field));
    }
    Ok(())
}

/// NaN and infinities cannot be stored in the JSON document.
fn finite(value: f64, field: &'static str) -> Result<f64> {
    if !value.is_finite() {
        return Err(KakeiboError::Invalid {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn finite_opt(value: Option<f64>, field: &'static str) -> Result<Option<f64>> {
    value.map(|v| finite(v, field)).transpose()
}

fn check_rates(rates: &BTreeMap<String, f64>) -> Result<()> {
    for rate in rates.values() {
        finite(*rate, "category rebate")?;
    }
    Ok(())
}

fn not_found(kind: &'static str, id: &str) -> KakeiboError {
    KakeiboError::NotFound {
        kind,
        id: id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Cards and rebate configs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CardDraft {
    pub name: String,
    pub starting_cashback: f64,
    pub basic_rebate: f64,
    pub category_rates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    pub name: Option<String>,
    pub starting_cashback: Option<f64>,
    pub basic_rebate: Option<f64>,
    pub category_rates: BTreeMap<String, f64>,
    /// Categories whose rate is dropped, falling back to the basic rate.
    pub cleared_rates: Vec<String>,
}

impl AppState {
    fn check_categories<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Result<()> {
        for name in names {
            if !self.merchant_types.contains(name) {
                return Err(KakeiboError::Invalid {
                    field: "merchant category",
                    value: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_card(&self, card_id: &str) -> Result<()> {
        required(card_id, "card")?;
        if self.card(card_id).is_none() {
            return Err(KakeiboError::UnknownCard(card_id.to_string()));
        }
        Ok(())
    }

    /// Adds a card together with its rebate config. Returns the new id.
    pub fn add_card(&mut self, draft: CardDraft) -> Result<String> {
        required(&draft.name, "card name")?;
        finite(draft.starting_cashback, "starting cashback")?;
        finite(draft.basic_rebate, "basic rebate")?;
        check_rates(&draft.category_rates)?;
        self.check_categories(draft.category_rates.keys())?;

        let id = new_id();
        self.cards.push(Card {
            id: id.clone(),
            name: draft.name.trim().to_string(),
            starting_cashback: draft.starting_cashback,
            manual_override: None,
        });
        self.rebate_configs.push(RebateConfig {
            card_id: id.clone(),
            basic_rebate: draft.basic_rebate,
            merchant_type_rebates: draft.category_rates,
        });
        info!(card = %id, "added card");
        Ok(id)
    }

    pub fn edit_card(&mut self, id: &str, patch: CardPatch) -> Result<()> {
        if let Some(name) = &patch.name {
            required(name, "card name")?;
        }
        finite_opt(patch.starting_cashback, "starting cashback")?;
        finite_opt(patch.basic_rebate, "basic rebate")?;
        check_rates(&patch.category_rates)?;
        self.check_categories(patch.category_rates.keys())?;

        let card = self
            .cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("card", id))?;
        if let Some(name) = patch.name {
            card.name = name.trim().to_string();
        }
        if let Some(starting) = patch.starting_cashback {
            card.starting_cashback = starting;
        }

        let config = match self.rebate_configs.iter().position(|rc| rc.card_id == id) {
            Some(i) => &mut self.rebate_configs[i],
            None => {
                self.rebate_configs.push(RebateConfig {
                    card_id: id.to_string(),
                    basic_rebate: 0.0,
                    merchant_type_rebates: BTreeMap::new(),
                });
                let last = self.rebate_configs.len() - 1;
                &mut self.rebate_configs[last]
            }
        };
        if let Some(basic) = patch.basic_rebate {
            config.basic_rebate = basic;
        }
        for name in &patch.cleared_rates {
            config.merchant_type_rebates.remove(name);
        }
        config.merchant_type_rebates.extend(patch.category_rates);
        info!(card = %id, "edited card");
        Ok(())
    }

    /// Removes a card and its rebate config. Its transactions stay.
    pub fn remove_card(&mut self, id: &str) -> Result<Card> {
        let pos = self
            .cards
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| not_found("card", id))?;
        let card = self.cards.remove(pos);
        self.rebate_configs.retain(|rc| rc.card_id != id);
        info!(card = %id, "removed card");
        Ok(card)
    }

    /// Sets or clears (`None`) the manual balance override.
    pub fn set_override(&mut self, card_id: &str, value: Option<f64>) -> Result<()> {
        let value = finite_opt(value, "manual override")?;
        let card = self
            .cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or_else(|| not_found("card", card_id))?;
        card.manual_override = value;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Merchant categories
    // -----------------------------------------------------------------------

    /// Returns `false` for blank or duplicate names.
    pub fn add_merchant_type(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || name == ALL_MERCHANTS || self.merchant_types.iter().any(|m| m == name) {
            return false;
        }
        self.merchant_types.push(name.to_string());
        true
    }

    /// Existing references to the category are left alone.
    pub fn remove_merchant_type(&mut self, name: &str) -> bool {
        let before = self.merchant_types.len();
        self.merchant_types.retain(|m| m != name);
        self.merchant_types.len() != before
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub date: NaiveDate,
    pub description: String,
    pub card_id: String,
    pub amount: Option<f64>,
    pub status: Status,
    pub merchant_types: Vec<String>,
    /// `None` takes the card's suggested rate.
    pub rebate_percent: Option<f64>,
    pub kind: TransactionKind,
}

impl AppState {
    fn build_transaction(&self, id: String, draft: TransactionDraft) -> Result<Transaction> {
        required(&draft.description, "description")?;
        let amount = finite(
            draft.amount.ok_or(KakeiboError::MissingField("amount"))?,
            "amount",
        )?;
        self.check_card(&draft.card_id)?;

        let rebate_percent = match draft.kind {
            TransactionKind::Spend => match draft.rebate_percent {
                Some(percent) => finite(percent, "rebate percent")?,
                None => suggest_rebate(&self.rebate_configs, &draft.card_id, &draft.merchant_types),
            },
            TransactionKind::Redemption | TransactionKind::CashbackIn => 0.0,
        };
        Ok(Transaction {
            id,
            date: draft.date,
            description: draft.description.trim().to_string(),
            card_id: draft.card_id,
            amount,
            status: draft.status,
            merchant_types: draft.merchant_types,
            rebate_percent,
            kind: draft.kind,
        })
    }

    /// Records a transaction, newest first. Returns the new id.
    pub fn add_transaction(&mut self, draft: TransactionDraft) -> Result<String> {
        let tx = self.build_transaction(new_id(), draft)?;
        let id = tx.id.clone();
        self.transactions.insert(0, tx);
        info!(transaction = %id, "added transaction");
        Ok(id)
    }

    pub fn update_transaction(&mut self, id: &str, draft: TransactionDraft) -> Result<()> {
        let pos = self
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| not_found("transaction", id))?;
        let tx = self.build_transaction(id.to_string(), draft)?;
        self.transactions[pos] = tx;
        info!(transaction = %id, "updated transaction");
        Ok(())
    }

    pub fn remove_transaction(&mut self, id: &str) -> Result<Transaction> {
        let pos = self
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| not_found("transaction", id))?;
        Ok(self.transactions.remove(pos))
    }
}

// ---------------------------------------------------------------------------
// Campaigns and one-time promos
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PromotionDraft {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rebate_by_date: Option<NaiveDate>,
    pub additional_rebate: Option<f64>,
    pub target_amount: Option<f64>,
    pub max_cashback: Option<f64>,
    pub target_merchant_types: Vec<String>,
    pub rebate_merchant_types: Vec<String>,
    pub eligible_card_ids: Vec<String>,
}

/// "All" alone, or the specific categories. Nothing selected means "All".
fn normalize_targets(targets: Vec<String>) -> Vec<String> {
    if targets.is_empty() || targets.iter().any(|t| t == ALL_MERCHANTS) {
        return vec![ALL_MERCHANTS.to_string()];
    }
    let mut out: Vec<String> = Vec::with_capacity(targets.len());
    for t in targets {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct OneTimeDraft {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rebate_amount: Option<f64>,
    pub card_id: String,
}

impl AppState {
    fn apply_promotion(&self, promo: &mut Promotion, draft: PromotionDraft) -> Result<()> {
        required(&draft.title, "title")?;
        let additional_rebate = draft
            .additional_rebate
            .ok_or(KakeiboError::MissingField("additional rebate"))?;
        let additional_rebate = finite(additional_rebate, "additional rebate")?;
        let target_amount = finite_opt(draft.target_amount, "target amount")?;
        let max_cashback = finite_opt(draft.max_cashback, "max cashback")?;
        if draft.end_date < draft.start_date {
            return Err(KakeiboError::Invalid {
                field: "end date",
                value: format!("{} is before {}", draft.end_date, draft.start_date),
            });
        }
        for card_id in &draft.eligible_card_ids {
            self.check_card(card_id)?;
        }

        promo.title = draft.title.trim().to_string();
        promo.start_date = draft.start_date;
        promo.end_date = draft.end_date;
        promo.rebate_by_date = draft.rebate_by_date;
        promo.additional_rebate = additional_rebate;
        promo.target_amount = target_amount;
        promo.max_cashback = max_cashback;
        promo.target_merchant_types = normalize_targets(draft.target_merchant_types);
        promo.rebate_merchant_types = draft.rebate_merchant_types;
        promo.eligible_card_ids = draft.eligible_card_ids;
        Ok(())
    }

    pub fn add_promotion(&mut self, draft: PromotionDraft) -> Result<String> {
        let mut promo = Promotion {
            id: new_id(),
            title: String::new(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            additional_rebate: 0.0,
            min_amount: None,
            max_amount: None,
            target_amount: None,
            max_cashback: None,
            rebate_by_date: None,
            target_merchant_types: Vec::new(),
            rebate_merchant_types: Vec::new(),
            eligible_card_ids: Vec::new(),
            is_paid_off: false,
        };
        self.apply_promotion(&mut promo, draft)?;
        let id = promo.id.clone();
        self.promotions.push(promo);
        info!(promotion = %id, "added campaign");
        Ok(id)
    }

    /// Replaces a campaign's terms. Payout state is kept.
    pub fn update_promotion(&mut self, id: &str, draft: PromotionDraft) -> Result<()> {
        let pos = self
            .promotions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| not_found("campaign", id))?;
        let mut promo = self.promotions[pos].clone();
        self.apply_promotion(&mut promo, draft)?;
        self.promotions[pos] = promo;
        Ok(())
    }

    pub fn remove_promotion(&mut self, id: &str) -> Result<Promotion> {
        let pos = self
            .promotions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| not_found("campaign", id))?;
        Ok(self.promotions.remove(pos))
    }

    /// Credits a campaign's earned rebate and marks it paid.
    pub fn pay_promotion(&mut self, id: &str, today: NaiveDate) -> Result<Transaction> {
        let promo = self
            .promotions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("campaign", id))?;
        let credit = campaign_payout(promo, &self.cards, &self.transactions, today)?;
        self.transactions.insert(0, credit.clone());
        info!(promotion = %id, amount = credit.amount, "campaign paid out");
        Ok(credit)
    }

    pub fn add_one_time(&mut self, draft: OneTimeDraft) -> Result<String> {
        required(&draft.title, "title")?;
        let rebate_amount = draft
            .rebate_amount
            .ok_or(KakeiboError::MissingField("rebate amount"))?;
        let rebate_amount = finite(rebate_amount, "rebate amount")?;
        self.check_card(&draft.card_id)?;

        let id = new_id();
        self.one_time_promos.push(OneTimePromo {
            id: id.clone(),
            title: draft.title.trim().to_string(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            rebate_amount,
            card_id: draft.card_id,
            is_paid_off: false,
        });
        info!(promo = %id, "added one-time promo");
        Ok(id)
    }

    pub fn remove_one_time(&mut self, id: &str) -> Result<OneTimePromo> {
        let pos = self
            .one_time_promos
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| not_found("one-time promo", id))?;
        Ok(self.one_time_promos.remove(pos))
    }

    /// Credits a one-time promo. `None` when it was already paid.
    pub fn pay_one_time(&mut self, id: &str, today: NaiveDate) -> Result<Option<Transaction>> {
        let promo = self
            .one_time_promos
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("one-time promo", id))?;
        let Some(credit) = one_time_payout(promo, today) else {
            return Ok(None);
        };
        self.transactions.insert(0, credit.clone());
        info!(promo = %id, amount = credit.amount, "one-time promo paid out");
        Ok(Some(credit))
    }
}
