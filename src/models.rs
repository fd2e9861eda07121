use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel in `target_merchant_types` that matches every transaction.
pub const ALL_MERCHANTS: &str = "All";

pub const DEFAULT_MERCHANT_TYPES: &[&str] = &[
    "Dining",
    "Supermarket",
    "Online",
    "Travel",
    "Overseas",
    "Transport",
    "Entertainment",
    "Others",
];

/// Short random record id, e.g. `k3f9x0a`.
pub fn new_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Confirmed,
    #[serde(rename = "TBC")]
    Tbc,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "Pending",
            Status::Confirmed => "Confirmed",
            Status::Tbc => "TBC",
        };
        f.write_str(s)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "confirmed" => Ok(Status::Confirmed),
            "tbc" => Ok(Status::Tbc),
            other => Err(format!("unknown status '{other}' (pending, confirmed, tbc)")),
        }
    }
}

/// What a transaction does to a card's cashback balance.
///
/// Persisted as the `isRedemption` / `isCashbackIn` flag pair; a record with
/// both flags set is rejected on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "KindFlags", into = "KindFlags")]
pub enum TransactionKind {
    /// Ordinary spending that accrues rebate at the stored percent.
    #[default]
    Spend,
    /// Cashback withdrawn from the balance.
    Redemption,
    /// External credit added to the balance, e.g. a promo payout.
    CashbackIn,
}

impl TransactionKind {
    pub fn label(self) -> &'static str {
        match self {
            TransactionKind::Spend => "Spend",
            TransactionKind::Redemption => "Redemption",
            TransactionKind::CashbackIn => "Cashback in",
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KindFlags {
    #[serde(default)]
    is_redemption: bool,
    #[serde(default)]
    is_cashback_in: bool,
}

impl TryFrom<KindFlags> for TransactionKind {
    type Error = String;

    fn try_from(flags: KindFlags) -> Result<Self, Self::Error> {
        match (flags.is_redemption, flags.is_cashback_in) {
            (false, false) => Ok(TransactionKind::Spend),
            (true, false) => Ok(TransactionKind::Redemption),
            (false, true) => Ok(TransactionKind::CashbackIn),
            (true, true) => Err("transaction is flagged as both redemption and cashback in".into()),
        }
    }
}

impl From<TransactionKind> for KindFlags {
    fn from(kind: TransactionKind) -> Self {
        KindFlags {
            is_redemption: kind == TransactionKind::Redemption,
            is_cashback_in: kind == TransactionKind::CashbackIn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub starting_cashback: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_override: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub card_id: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub amount: f64,
    pub status: Status,
    #[serde(default)]
    pub merchant_types: Vec<String>,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub rebate_percent: f64,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

impl Transaction {
    pub fn is_confirmed(&self) -> bool {
        self.status == Status::Confirmed
    }

    /// Rebate this row accrues at its stored percent. Redemptions and
    /// credits never accrue.
    pub fn expected_rebate(&self) -> f64 {
        match self.kind {
            TransactionKind::Spend => self.amount * self.rebate_percent / 100.0,
            TransactionKind::Redemption | TransactionKind::CashbackIn => 0.0,
        }
    }

    pub fn tagged_with_any(&self, categories: &[String]) -> bool {
        self.merchant_types.iter().any(|m| categories.contains(m))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebateConfig {
    pub card_id: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub basic_rebate: f64,
    #[serde(default, deserialize_with = "rates_zero_if_null")]
    pub merchant_type_rebates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub additional_rebate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cashback: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_date"
    )]
    pub rebate_by_date: Option<NaiveDate>,
    #[serde(default)]
    pub target_merchant_types: Vec<String>,
    #[serde(default)]
    pub rebate_merchant_types: Vec<String>,
    #[serde(default)]
    pub eligible_card_ids: Vec<String>,
    #[serde(default)]
    pub is_paid_off: bool,
}

impl Promotion {
    /// Spending goal, if one is set. A zero or negative target counts as none.
    pub fn target(&self) -> Option<f64> {
        self.target_amount.filter(|t| *t > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimePromo {
    pub id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub rebate_amount: f64,
    #[serde(rename = "eligibleCardIds", with = "single_card")]
    pub card_id: String,
    #[serde(default)]
    pub is_paid_off: bool,
}

/// Everything the tracker knows, persisted as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub cards: Vec<Card>,
    pub transactions: Vec<Transaction>,
    pub promotions: Vec<Promotion>,
    pub one_time_promos: Vec<OneTimePromo>,
    pub merchant_types: Vec<String>,
    pub rebate_configs: Vec<RebateConfig>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            cards: Vec::new(),
            transactions: Vec::new(),
            promotions: Vec::new(),
            one_time_promos: Vec::new(),
            merchant_types: DEFAULT_MERCHANT_TYPES.iter().map(|m| m.to_string()).collect(),
            rebate_configs: Vec::new(),
        }
    }
}

impl AppState {
    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn rebate_config(&self, card_id: &str) -> Option<&RebateConfig> {
        self.rebate_configs.iter().find(|rc| rc.card_id == card_id)
    }

    pub fn card_name(&self, id: &str) -> &str {
        self.card(id).map(|c| c.name.as_str()).unwrap_or("(removed card)")
    }
}

/// A stored number that failed to parse was written as `null`; read it as 0.
fn zero_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn rates_zero_if_null<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let rates: BTreeMap<String, Option<f64>> = BTreeMap::deserialize(deserializer)?;
    Ok(rates.into_iter().map(|(k, v)| (k, v.unwrap_or(0.0))).collect())
}

/// Optional `YYYY-MM-DD` date where an empty string also means unset.
fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// One-time promos name exactly one card, stored as a one-element array.
mod single_card {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(card_id: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(std::iter::once(card_id))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let ids: Vec<String> = Vec::deserialize(deserializer)?;
        ids.into_iter()
            .next()
            .ok_or_else(|| serde::de::Error::custom("one-time promo has no eligible card"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_reads_from_flag_pair() {
        let json = r#"{
            "id": "t1", "date": "2024-01-05", "description": "ATM", "cardId": "c1",
            "amount": 20, "status": "Confirmed", "merchantTypes": [],
            "rebatePercent": 0, "isRedemption": true
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, TransactionKind::Redemption);
        assert_eq!(tx.expected_rebate(), 0.0);
    }

    #[test]
    fn test_kind_rejects_both_flags() {
        let json = r#"{
            "id": "t1", "date": "2024-01-05", "description": "x", "cardId": "c1",
            "amount": 20, "status": "Confirmed", "isRedemption": true, "isCashbackIn": true
        }"#;
        assert!(serde_json::from_str::<Transaction>(json).is_err());
    }

    #[test]
    fn test_kind_writes_flag_pair() {
        let tx = Transaction {
            id: "t1".into(),
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            description: "Promo: Spring".into(),
            card_id: "c1".into(),
            amount: 30.0,
            status: Status::Confirmed,
            merchant_types: vec![],
            rebate_percent: 0.0,
            kind: TransactionKind::CashbackIn,
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["isCashbackIn"], true);
        assert_eq!(value["isRedemption"], false);
        assert_eq!(value["date"], "2024-02-01");
        assert_eq!(value["cardId"], "c1");
    }

    #[test]
    fn test_status_parses_case_insensitively() {
        assert_eq!("confirmed".parse::<Status>().unwrap(), Status::Confirmed);
        assert_eq!("TBC".parse::<Status>().unwrap(), Status::Tbc);
        assert!("done".parse::<Status>().is_err());
        assert_eq!(serde_json::to_string(&Status::Tbc).unwrap(), "\"TBC\"");
    }

    #[test]
    fn test_promotion_tolerates_missing_and_empty_fields() {
        let json = r#"{
            "id": "p1", "title": "Dining month", "startDate": "2024-01-01",
            "endDate": "2024-01-31", "additionalRebate": 10, "rebateByDate": "",
            "targetMerchantTypes": ["All"], "rebateMerchantTypes": [], "eligibleCardIds": []
        }"#;
        let promo: Promotion = serde_json::from_str(json).unwrap();
        assert_eq!(promo.rebate_by_date, None);
        assert_eq!(promo.max_cashback, None);
        assert!(!promo.is_paid_off);
    }

    #[test]
    fn test_zero_target_counts_as_none() {
        let json = r#"{
            "id": "p1", "title": "x", "startDate": "2024-01-01", "endDate": "2024-01-31",
            "targetAmount": 0
        }"#;
        let promo: Promotion = serde_json::from_str(json).unwrap();
        assert_eq!(promo.target(), None);
    }

    #[test]
    fn test_one_time_promo_card_is_single_element_array() {
        let json = r#"{
            "id": "o1", "title": "Welcome", "startDate": "2024-01-01", "endDate": "2024-03-31",
            "rebateAmount": 30, "eligibleCardIds": ["c9"], "isPaidOff": false
        }"#;
        let promo: OneTimePromo = serde_json::from_str(json).unwrap();
        assert_eq!(promo.card_id, "c9");
        let value = serde_json::to_value(&promo).unwrap();
        assert_eq!(value["eligibleCardIds"], serde_json::json!(["c9"]));
    }

    #[test]
    fn test_null_numbers_read_as_zero() {
        let json = r#"{
            "cardId": "c1", "basicRebate": null,
            "merchantTypeRebates": {"Dining": null, "Travel": 8}
        }"#;
        let config: RebateConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.basic_rebate, 0.0);
        assert_eq!(config.merchant_type_rebates["Dining"], 0.0);
        assert_eq!(config.merchant_type_rebates["Travel"], 8.0);

        let json = r#"{
            "id": "t1", "date": "2024-01-05", "description": "x", "cardId": "c1",
            "amount": null, "status": "Confirmed", "rebatePercent": null
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.rebate_percent, 0.0);
    }

    #[test]
    fn test_cleared_override_is_omitted() {
        let card = Card {
            id: "c1".into(),
            name: "Visa".into(),
            starting_cashback: 0.0,
            manual_override: None,
        };
        let value = serde_json::to_value(&card).unwrap();
        assert!(value.get("manualOverride").is_none());
    }

    #[test]
    fn test_new_id_shape() {
        let id = new_id();
        assert_eq!(id.len(), 7);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_default_state_has_merchant_types() {
        let state = AppState::default();
        assert!(state.merchant_types.contains(&"Dining".to_string()));
        assert!(state.cards.is_empty());
    }
}
