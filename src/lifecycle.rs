use chrono::NaiveDate;

use crate::models::Promotion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Today falls inside the spending window.
    Ongoing,
    /// Window closed; payout still expected.
    PendingReward,
    /// The payout deadline has passed.
    Past,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Ongoing => "On-going",
            Stage::PendingReward => "Pending Reward",
            Stage::Past => "Past Campaigns",
        }
    }
}

/// Bucket for `promo` on `today`, or `None` before its window opens.
///
/// Without a `rebate_by_date` a closed campaign stays pending indefinitely.
pub fn classify(promo: &Promotion, today: NaiveDate) -> Option<Stage> {
    if promo.start_date <= today && today <= promo.end_date {
        return Some(Stage::Ongoing);
    }
    match promo.rebate_by_date {
        Some(deadline) if today > deadline => Some(Stage::Past),
        _ if today > promo.end_date => Some(Stage::PendingReward),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct Buckets<'a> {
    pub upcoming: Vec<&'a Promotion>,
    pub ongoing: Vec<&'a Promotion>,
    pub pending: Vec<&'a Promotion>,
    pub past: Vec<&'a Promotion>,
}

pub fn bucket(promotions: &[Promotion], today: NaiveDate) -> Buckets<'_> {
    let mut buckets = Buckets::default();
    for promo in promotions {
        match classify(promo, today) {
            Some(Stage::Ongoing) => buckets.ongoing.push(promo),
            Some(Stage::PendingReward) => buckets.pending.push(promo),
            Some(Stage::Past) => buckets.past.push(promo),
            None => buckets.upcoming.push(promo),
        }
    }
    buckets
}
