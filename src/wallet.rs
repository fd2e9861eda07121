use crate::models::{Card, Transaction, TransactionKind};

/// How a card's available cashback is made up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Breakdown {
    pub starting: f64,
    pub earned: f64,
    pub credits: f64,
    pub redeemed: f64,
}

impl Breakdown {
    pub fn computed(&self) -> f64 {
        self.starting + self.earned + self.credits - self.redeemed
    }
}

/// Totals over the card's confirmed transactions only.
pub fn breakdown(card: &Card, transactions: &[Transaction]) -> Breakdown {
    let mut totals = Breakdown {
        starting: card.starting_cashback,
        ..Breakdown::default()
    };
    for tx in transactions
        .iter()
        .filter(|tx| tx.card_id == card.id && tx.is_confirmed())
    {
        match tx.kind {
            TransactionKind::Spend => totals.earned += tx.expected_rebate(),
            TransactionKind::CashbackIn => totals.credits += tx.amount,
            TransactionKind::Redemption => totals.redeemed += tx.amount,
        }
    }
    totals
}

/// Available cashback on `card`. A manual override wins over everything
/// computed from history.
pub fn card_balance(card: &Card, transactions: &[Transaction]) -> f64 {
    card.manual_override
        .unwrap_or_else(|| breakdown(card, transactions).computed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use chrono::NaiveDate;

    fn card(starting: f64) -> Card {
        Card {
            id: "c1".into(),
            name: "Visa".into(),
            starting_cashback: starting,
            manual_override: None,
        }
    }

    fn tx(amount: f64, percent: f64, status: Status, kind: TransactionKind) -> Transaction {
        Transaction {
            id: crate::models::new_id(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: "test".into(),
            card_id: "c1".into(),
            amount,
            status,
            merchant_types: vec![],
            rebate_percent: percent,
            kind,
        }
    }

    #[test]
    fn test_spend_accrues_rebate() {
        let txs = vec![tx(200.0, 5.0, Status::Confirmed, TransactionKind::Spend)];
        assert_eq!(card_balance(&card(100.0), &txs), 110.0);
    }

    #[test]
    fn test_full_formula() {
        let txs = vec![
            tx(200.0, 5.0, Status::Confirmed, TransactionKind::Spend),
            tx(30.0, 0.0, Status::Confirmed, TransactionKind::CashbackIn),
            tx(25.0, 0.0, Status::Confirmed, TransactionKind::Redemption),
        ];
        let b = breakdown(&card(100.0), &txs);
        assert_eq!(b.earned, 10.0);
        assert_eq!(b.credits, 30.0);
        assert_eq!(b.redeemed, 25.0);
        assert_eq!(card_balance(&card(100.0), &txs), 115.0);
    }

    #[test]
    fn test_only_confirmed_counts() {
        let txs = vec![
            tx(200.0, 5.0, Status::Pending, TransactionKind::Spend),
            tx(50.0, 0.0, Status::Tbc, TransactionKind::CashbackIn),
            tx(40.0, 0.0, Status::Pending, TransactionKind::Redemption),
        ];
        assert_eq!(card_balance(&card(100.0), &txs), 100.0);
    }

    #[test]
    fn test_other_cards_ignored() {
        let mut other = tx(1000.0, 10.0, Status::Confirmed, TransactionKind::Spend);
        other.card_id = "c2".into();
        assert_eq!(card_balance(&card(0.0), &[other]), 0.0);
    }

    #[test]
    fn test_redemption_percent_never_accrues() {
        // A stray percent on a redemption row must not add rebate.
        let txs = vec![tx(100.0, 5.0, Status::Confirmed, TransactionKind::Redemption)];
        assert_eq!(card_balance(&card(100.0), &txs), 0.0);
    }

    #[test]
    fn test_override_wins_then_clears() {
        let txs = vec![tx(200.0, 5.0, Status::Confirmed, TransactionKind::Spend)];
        let mut c = card(100.0);
        c.manual_override = Some(7.5);
        assert_eq!(card_balance(&c, &txs), 7.5);

        c.manual_override = Some(0.0);
        assert_eq!(card_balance(&c, &txs), 0.0);

        c.manual_override = None;
        assert_eq!(card_balance(&c, &txs), 110.0);
    }
}
