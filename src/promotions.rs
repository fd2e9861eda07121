//! Campaign spending aggregation and payouts.

use chrono::NaiveDate;

use crate::error::{KakeiboError, Result};
use crate::fmt::money;
use crate::models::{
    new_id, Card, OneTimePromo, Promotion, Status, Transaction, TransactionKind, ALL_MERCHANTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PromoMetrics {
    pub spending: f64,
    pub earned_rebate: f64,
}

/// Whether `tx` counts toward `promo`'s spending goal.
pub fn is_eligible(promo: &Promotion, tx: &Transaction) -> bool {
    let in_window = tx.date >= promo.start_date && tx.date <= promo.end_date;
    let card_ok = promo.eligible_card_ids.is_empty() || promo.eligible_card_ids.contains(&tx.card_id);
    let type_ok = promo.target_merchant_types.iter().any(|m| m == ALL_MERCHANTS)
        || tx.tagged_with_any(&promo.target_merchant_types);

    tx.is_confirmed() && in_window && card_ok && type_ok && tx.kind == TransactionKind::Spend
}

/// Whether an eligible `tx` also earns the bonus rebate.
fn earns_bonus(promo: &Promotion, tx: &Transaction) -> bool {
    promo.rebate_merchant_types.is_empty() || tx.tagged_with_any(&promo.rebate_merchant_types)
}

pub fn eligible_transactions<'a>(
    promo: &'a Promotion,
    transactions: &'a [Transaction],
) -> impl Iterator<Item = &'a Transaction> + 'a {
    transactions.iter().filter(move |tx| is_eligible(promo, tx))
}

pub fn metrics(promo: &Promotion, transactions: &[Transaction]) -> PromoMetrics {
    let mut spending = 0.0;
    let mut raw_rebate = 0.0;
    for tx in eligible_transactions(promo, transactions) {
        spending += tx.amount;
        if earns_bonus(promo, tx) {
            raw_rebate += tx.amount * promo.additional_rebate / 100.0;
        }
    }
    let earned_rebate = match promo.max_cashback {
        Some(cap) => raw_rebate.min(cap),
        None => raw_rebate,
    };
    PromoMetrics {
        spending,
        earned_rebate,
    }
}

/// Progress toward the spending goal, 0 to 100. Campaigns without a goal
/// are complete.
pub fn progress_percent(promo: &Promotion, spending: f64) -> f64 {
    match promo.target() {
        Some(target) => (spending / target * 100.0).min(100.0),
        None => 100.0,
    }
}

pub fn target_met(promo: &Promotion, spending: f64) -> bool {
    promo.target().map_or(true, |target| spending >= target)
}

/// Card that receives a campaign payout: the first eligible card, else the
/// first card on file.
pub fn payout_card<'a>(promo: &'a Promotion, cards: &'a [Card]) -> Option<&'a str> {
    promo
        .eligible_card_ids
        .first()
        .map(String::as_str)
        .or_else(|| cards.first().map(|c| c.id.as_str()))
}

fn credit(card_id: &str, amount: f64, description: String, today: NaiveDate) -> Transaction {
    Transaction {
        id: new_id(),
        date: today,
        description,
        card_id: card_id.to_string(),
        amount,
        status: Status::Confirmed,
        merchant_types: Vec::new(),
        rebate_percent: 0.0,
        kind: TransactionKind::CashbackIn,
    }
}

/// Metrics of a campaign that can be paid out now. Errors when it is
/// already paid or its spending goal is not met.
pub fn payable_metrics(promo: &Promotion, transactions: &[Transaction]) -> Result<PromoMetrics> {
    if promo.is_paid_off {
        return Err(KakeiboError::AlreadyPaid(promo.title.clone()));
    }
    let m = metrics(promo, transactions);
    if !target_met(promo, m.spending) {
        return Err(KakeiboError::TargetNotMet {
            title: promo.title.clone(),
            spent: money(m.spending),
            target: money(promo.target().unwrap_or_default()),
        });
    }
    Ok(m)
}

/// Pays out a campaign's earned rebate.
///
/// On success `promo` is marked paid and the credit to record is returned.
pub fn campaign_payout(
    promo: &mut Promotion,
    cards: &[Card],
    transactions: &[Transaction],
    today: NaiveDate,
) -> Result<Transaction> {
    let PromoMetrics { earned_rebate, .. } = payable_metrics(promo, transactions)?;
    let card_id = payout_card(promo, cards)
        .ok_or(KakeiboError::MissingField("card"))?
        .to_string();

    let tx = credit(&card_id, earned_rebate, format!("Promo: {}", promo.title), today);
    promo.is_paid_off = true;
    Ok(tx)
}

/// Pays out a one-time promo's flat amount. Returns `None` once paid.
pub fn one_time_payout(promo: &mut OneTimePromo, today: NaiveDate) -> Option<Transaction> {
    if promo.is_paid_off {
        return None;
    }
    let tx = credit(
        &promo.card_id,
        promo.rebate_amount,
        format!("One-time: {}", promo.title),
        today,
    );
    promo.is_paid_off = true;
    Some(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn promo() -> Promotion {
        Promotion {
            id: "p1".into(),
            title: "January bonus".into(),
            start_date: day(2024, 1, 1),
            end_date: day(2024, 1, 31),
            additional_rebate: 10.0,
            min_amount: None,
            max_amount: None,
            target_amount: Some(1000.0),
            max_cashback: Some(50.0),
            rebate_by_date: None,
            target_merchant_types: vec![ALL_MERCHANTS.into()],
            rebate_merchant_types: vec![],
            eligible_card_ids: vec![],
            is_paid_off: false,
        }
    }

    fn spend(date: NaiveDate, amount: f64, tags: &[&str]) -> Transaction {
        Transaction {
            id: new_id(),
            date,
            description: "spend".into(),
            card_id: "c1".into(),
            amount,
            status: Status::Confirmed,
            merchant_types: tags.iter().map(|t| t.to_string()).collect(),
            rebate_percent: 1.0,
            kind: TransactionKind::Spend,
        }
    }

    fn card(id: &str) -> Card {
        Card {
            id: id.into(),
            name: id.to_uppercase(),
            starting_cashback: 0.0,
            manual_override: None,
        }
    }

    #[test]
    fn test_cap_applies_and_target_unmet() {
        let txs = vec![
            spend(day(2024, 1, 3), 100.0, &[]),
            spend(day(2024, 1, 15), 200.0, &["Dining"]),
            spend(day(2024, 1, 31), 300.0, &["Travel"]),
        ];
        let p = promo();
        let m = metrics(&p, &txs);
        assert_eq!(m.spending, 600.0);
        assert_eq!(m.earned_rebate, 50.0);
        assert!(!target_met(&p, m.spending));
        assert!((progress_percent(&p, m.spending) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_is_inclusive_by_day() {
        let p = promo();
        assert!(is_eligible(&p, &spend(day(2024, 1, 1), 1.0, &[])));
        assert!(is_eligible(&p, &spend(day(2024, 1, 31), 1.0, &[])));
        assert!(!is_eligible(&p, &spend(day(2023, 12, 31), 1.0, &[])));
        assert!(!is_eligible(&p, &spend(day(2024, 2, 1), 1.0, &[])));
    }

    #[test]
    fn test_excludes_unconfirmed_and_non_spend() {
        let p = promo();
        let mut pending = spend(day(2024, 1, 5), 100.0, &[]);
        pending.status = Status::Pending;
        let mut credit_in = spend(day(2024, 1, 5), 100.0, &[]);
        credit_in.kind = TransactionKind::CashbackIn;
        let mut redemption = spend(day(2024, 1, 5), 100.0, &[]);
        redemption.kind = TransactionKind::Redemption;
        assert_eq!(metrics(&p, &[pending, credit_in, redemption]).spending, 0.0);
    }

    #[test]
    fn test_card_filter() {
        let mut p = promo();
        p.eligible_card_ids = vec!["c2".into()];
        let tx = spend(day(2024, 1, 5), 100.0, &[]);
        assert!(!is_eligible(&p, &tx));
        p.eligible_card_ids.push("c1".into());
        assert!(is_eligible(&p, &tx));
    }

    #[test]
    fn test_target_types_must_intersect() {
        let mut p = promo();
        p.target_merchant_types = vec!["Dining".into()];
        assert!(is_eligible(&p, &spend(day(2024, 1, 5), 1.0, &["Dining", "Online"])));
        assert!(!is_eligible(&p, &spend(day(2024, 1, 5), 1.0, &["Online"])));
        assert!(!is_eligible(&p, &spend(day(2024, 1, 5), 1.0, &[])));
    }

    #[test]
    fn test_rebate_types_limit_bonus_not_spending() {
        let mut p = promo();
        p.max_cashback = None;
        p.rebate_merchant_types = vec!["Dining".into()];
        let txs = vec![
            spend(day(2024, 1, 5), 100.0, &["Dining"]),
            spend(day(2024, 1, 6), 400.0, &["Online"]),
            spend(day(2024, 1, 7), 50.0, &[]),
        ];
        let m = metrics(&p, &txs);
        assert_eq!(m.spending, 550.0);
        assert_eq!(m.earned_rebate, 10.0);
    }

    #[test]
    fn test_empty_rebate_types_cover_all_eligible() {
        let mut p = promo();
        p.max_cashback = None;
        let txs = vec![
            spend(day(2024, 1, 5), 100.0, &["Dining"]),
            spend(day(2024, 1, 6), 400.0, &[]),
        ];
        assert_eq!(metrics(&p, &txs).earned_rebate, 50.0);
    }

    #[test]
    fn test_cap_never_exceeded() {
        let mut p = promo();
        for cap in [0.0, 1.0, 25.0, 1e6] {
            p.max_cashback = Some(cap);
            for n in 0..20 {
                let txs: Vec<_> = (0..n)
                    .map(|i| spend(day(2024, 1, 1 + (i % 28) as u32), 37.5 * i as f64, &[]))
                    .collect();
                assert!(metrics(&p, &txs).earned_rebate <= cap);
            }
        }
    }

    #[test]
    fn test_no_target_is_complete() {
        let mut p = promo();
        p.target_amount = None;
        assert_eq!(progress_percent(&p, 0.0), 100.0);
        assert!(target_met(&p, 0.0));
        p.target_amount = Some(100.0);
        assert_eq!(progress_percent(&p, 250.0), 100.0);
    }

    #[test]
    fn test_campaign_payout_gated_by_target() {
        let mut p = promo();
        let txs = vec![spend(day(2024, 1, 3), 600.0, &[])];
        let err = campaign_payout(&mut p, &[card("c1")], &txs, day(2024, 2, 2)).unwrap_err();
        assert!(matches!(err, KakeiboError::TargetNotMet { .. }));
        assert!(!p.is_paid_off);
    }

    #[test]
    fn test_payable_metrics_checks_goal_and_paid_flag() {
        let mut p = promo();
        let short = vec![spend(day(2024, 1, 3), 999.0, &[])];
        assert!(matches!(
            payable_metrics(&p, &short),
            Err(KakeiboError::TargetNotMet { .. })
        ));
        let enough = vec![spend(day(2024, 1, 3), 1000.0, &[])];
        assert_eq!(payable_metrics(&p, &enough).unwrap().earned_rebate, 50.0);
        p.is_paid_off = true;
        assert!(matches!(
            payable_metrics(&p, &enough),
            Err(KakeiboError::AlreadyPaid(_))
        ));
    }

    #[test]
    fn test_campaign_payout_credits_first_eligible_card() {
        let mut p = promo();
        p.eligible_card_ids = vec!["c1".into(), "c2".into()];
        let txs = vec![spend(day(2024, 1, 3), 1200.0, &[])];
        let cards = vec![card("c9"), card("c1")];
        let credit = campaign_payout(&mut p, &cards, &txs, day(2024, 2, 2)).unwrap();
        assert_eq!(credit.card_id, "c1");
        assert_eq!(credit.amount, 50.0);
        assert_eq!(credit.kind, TransactionKind::CashbackIn);
        assert_eq!(credit.status, Status::Confirmed);
        assert_eq!(credit.description, "Promo: January bonus");
        assert_eq!(credit.date, day(2024, 2, 2));
        assert!(p.is_paid_off);

        let again = campaign_payout(&mut p, &cards, &txs, day(2024, 2, 3));
        assert!(matches!(again, Err(KakeiboError::AlreadyPaid(_))));
    }

    #[test]
    fn test_campaign_payout_falls_back_to_first_card() {
        let mut p = promo();
        p.target_amount = None;
        let cards = vec![card("c9"), card("c1")];
        let credit = campaign_payout(&mut p, &cards, &[], day(2024, 2, 2)).unwrap();
        assert_eq!(credit.card_id, "c9");
        assert_eq!(credit.amount, 0.0);
    }

    #[test]
    fn test_campaign_payout_needs_a_card() {
        let mut p = promo();
        p.target_amount = None;
        assert!(campaign_payout(&mut p, &[], &[], day(2024, 2, 2)).is_err());
        assert!(!p.is_paid_off);
    }

    #[test]
    fn test_one_time_payout_fires_once() {
        let mut p = OneTimePromo {
            id: "o1".into(),
            title: "Welcome".into(),
            start_date: day(2024, 1, 1),
            end_date: day(2024, 3, 31),
            rebate_amount: 30.0,
            card_id: "c1".into(),
            is_paid_off: false,
        };
        let credit = one_time_payout(&mut p, day(2024, 2, 1)).unwrap();
        assert_eq!(credit.amount, 30.0);
        assert_eq!(credit.card_id, "c1");
        assert_eq!(credit.kind, TransactionKind::CashbackIn);
        assert_eq!(credit.description, "One-time: Welcome");
        assert!(p.is_paid_off);
        assert!(one_time_payout(&mut p, day(2024, 2, 1)).is_none());
    }
}
