//! Persistence for the single state document.
//!
//! The whole [`AppState`] is written as one JSON object under the
//! [`STORAGE_KEY`] key. Reading is forgiving: each top-level collection is
//! restored on its own, and a document that cannot be parsed is logged and
//! treated as absent.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{AppState, Card, OneTimePromo, Promotion, RebateConfig, Transaction};
use crate::settings::{Backend, Settings};

pub const STORAGE_KEY: &str = "kakeibo_data";

/// The stored document as read back. Missing or unreadable collections stay
/// `None` and keep their defaults when applied.
#[derive(Debug, Default)]
pub struct PartialState {
    pub cards: Option<Vec<Card>>,
    pub transactions: Option<Vec<Transaction>>,
    pub promotions: Option<Vec<Promotion>>,
    pub one_time_promos: Option<Vec<OneTimePromo>>,
    pub merchant_types: Option<Vec<String>>,
    pub rebate_configs: Option<Vec<RebateConfig>>,
}

impl PartialState {
    /// Reads each top-level collection on its own, so one bad record only
    /// costs its own collection.
    pub fn from_document(doc: Value, origin: &str) -> Option<Self> {
        let Value::Object(mut map) = doc else {
            warn!(origin, "error loading saved data: not a JSON object, starting from defaults");
            return None;
        };
        Some(Self {
            cards: collection(&mut map, "cards", origin),
            transactions: collection(&mut map, "transactions", origin),
            promotions: collection(&mut map, "promotions", origin),
            one_time_promos: collection(&mut map, "oneTimePromos", origin),
            merchant_types: collection(&mut map, "merchantTypes", origin),
            rebate_configs: collection(&mut map, "rebateConfigs", origin),
        })
    }

    pub fn into_state(self) -> AppState {
        let mut state = AppState::default();
        if let Some(cards) = self.cards {
            state.cards = cards;
        }
        if let Some(transactions) = self.transactions {
            state.transactions = transactions;
        }
        if let Some(promotions) = self.promotions {
            state.promotions = promotions;
        }
        if let Some(one_time) = self.one_time_promos {
            state.one_time_promos = one_time;
        }
        if let Some(merchant_types) = self.merchant_types {
            state.merchant_types = merchant_types;
        }
        if let Some(configs) = self.rebate_configs {
            state.rebate_configs = configs;
        }
        state
    }
}

pub trait StateStore {
    /// Saved state, or `None` when nothing usable is stored.
    fn load(&self) -> Option<PartialState>;

    /// Replace the stored document with `state`.
    fn save(&self, state: &AppState) -> Result<()>;

    /// Human-readable location, for `status`.
    fn location(&self) -> String;
}

fn collection<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str, origin: &str) -> Option<T> {
    let value = map.remove(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(items) => Some(items),
        Err(e) => {
            warn!(origin, key, error = %e, "error loading saved collection, using its default");
            None
        }
    }
}

fn parse_document(raw: &str, origin: &str) -> Option<PartialState> {
    match serde_json::from_str::<Value>(raw) {
        Ok(doc) => PartialState::from_document(doc, origin),
        Err(e) => {
            warn!(origin, error = %e, "error loading saved data, starting from defaults");
            None
        }
    }
}

/// Loads and applies the stored document, falling back to defaults.
pub fn load_state(store: &dyn StateStore) -> AppState {
    store.load().map(PartialState::into_state).unwrap_or_default()
}

pub fn open_store(settings: &Settings) -> Result<Box<dyn StateStore>> {
    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;
    match settings.backend {
        Backend::Json => Ok(Box::new(JsonFileStore::new(&dir))),
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(&dir.join("kakeibo.db"))?)),
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{STORAGE_KEY}.json")),
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Option<PartialState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no saved data");
            return None;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => parse_document(&raw, &self.path.to_string_lossy()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read saved data");
                None
            }
        }
    }

    fn save(&self, state: &AppState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, format!("{json}\n"))?;
        debug!(path = %self.path.display(), "saved state");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// SQLite key-value table
// ---------------------------------------------------------------------------

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use std::path::{Path, PathBuf};

    use rusqlite::{Connection, OptionalExtension};
    use tracing::{debug, warn};

    use super::{parse_document, PartialState, StateStore, STORAGE_KEY};
    use crate::error::Result;
    use crate::models::AppState;

    pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT DEFAULT (datetime('now'))
    );
    ";

    pub struct SqliteStore {
        conn: Connection,
        path: PathBuf,
    }

    impl SqliteStore {
        pub fn open(path: &Path) -> Result<Self> {
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(Self {
                conn,
                path: path.to_path_buf(),
            })
        }

        pub fn get(&self, key: &str) -> rusqlite::Result<Option<String>> {
            self.conn
                .query_row("SELECT value FROM kv WHERE key = ?1", [key], |r| r.get(0))
                .optional()
        }

        pub fn set(&self, key: &str, value: &str) -> rusqlite::Result<()> {
            self.conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                rusqlite::params![key, value],
            )?;
            Ok(())
        }
    }

    impl StateStore for SqliteStore {
        fn load(&self) -> Option<PartialState> {
            match self.get(STORAGE_KEY) {
                Ok(Some(raw)) => parse_document(&raw, &self.path.to_string_lossy()),
                Ok(None) => {
                    debug!(path = %self.path.display(), "no saved data");
                    None
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "could not read saved data");
                    None
                }
            }
        }

        fn save(&self, state: &AppState) -> Result<()> {
            let json = serde_json::to_string(state)?;
            self.set(STORAGE_KEY, &json)?;
            debug!(path = %self.path.display(), "saved state");
            Ok(())
        }

        fn location(&self) -> String {
            format!("{} (key {STORAGE_KEY})", self.path.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Status, TransactionKind};
    use chrono::NaiveDate;

    fn sample_state() -> AppState {
        let mut state = AppState::default();
        state.cards.push(Card {
            id: "c1".into(),
            name: "Visa Signature".into(),
            starting_cashback: 100.0,
            manual_override: None,
        });
        state.transactions.push(Transaction {
            id: "t1".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            description: "Lunch".into(),
            card_id: "c1".into(),
            amount: 200.0,
            status: Status::Confirmed,
            merchant_types: vec!["Dining".into()],
            rebate_percent: 5.0,
            kind: TransactionKind::Spend,
        });
        state.merchant_types = vec!["Dining".into(), "Travel".into()];
        state
    }

    #[test]
    fn test_json_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let state = sample_state();
        store.save(&state).unwrap();
        assert_eq!(load_state(&store), state);
    }

    #[test]
    fn test_missing_document_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load().is_none());
        assert_eq!(load_state(&store), AppState::default());
    }

    #[test]
    fn test_malformed_document_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kakeibo_data.json"), "{ not json").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load().is_none());
        assert_eq!(load_state(&store), AppState::default());
    }

    #[test]
    fn test_collections_restore_independently() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"{"cards": [{"id": "c1", "name": "Amex", "startingCashback": 5}], "extra": 1}"#;
        std::fs::write(dir.path().join("kakeibo_data.json"), doc).unwrap();
        let state = load_state(&JsonFileStore::new(dir.path()));
        assert_eq!(state.cards.len(), 1);
        assert!(state.transactions.is_empty());
        assert_eq!(state.merchant_types, AppState::default().merchant_types);
    }

    #[test]
    fn test_null_collection_counts_as_absent() {
        let doc = serde_json::json!({"merchantTypes": null, "cards": []});
        let state = PartialState::from_document(doc, "test").unwrap().into_state();
        assert_eq!(state.merchant_types, AppState::default().merchant_types);
    }

    #[test]
    fn test_null_category_rate_keeps_cards() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"{
            "cards": [{"id": "c1", "name": "Amex", "startingCashback": 5}],
            "rebateConfigs": [{"cardId": "c1", "basicRebate": 1, "merchantTypeRebates": {"Dining": null}}]
        }"#;
        std::fs::write(dir.path().join("kakeibo_data.json"), doc).unwrap();
        let state = load_state(&JsonFileStore::new(dir.path()));
        assert_eq!(state.cards.len(), 1);
        assert_eq!(state.rebate_configs[0].merchant_type_rebates["Dining"], 0.0);
    }

    #[test]
    fn test_bad_collection_falls_back_alone() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"{
            "cards": [{"id": "c1", "name": "Amex"}],
            "transactions": [{"id": "t1", "status": "Someday"}],
            "merchantTypes": ["Dining"]
        }"#;
        std::fs::write(dir.path().join("kakeibo_data.json"), doc).unwrap();
        let state = load_state(&JsonFileStore::new(dir.path()));
        assert_eq!(state.cards.len(), 1);
        assert!(state.transactions.is_empty());
        assert_eq!(state.merchant_types, vec!["Dining".to_string()]);
    }

    #[test]
    fn test_non_object_document_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kakeibo_data.json"), "[1, 2]").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_saved_document_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save(&sample_state()).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("kakeibo_data.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in [
            "cards",
            "transactions",
            "promotions",
            "oneTimePromos",
            "merchantTypes",
            "rebateConfigs",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_store_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("kakeibo.db");
        let store = SqliteStore::open(&db_path).unwrap();
        assert!(store.load().is_none());

        let mut state = sample_state();
        store.save(&state).unwrap();
        state.cards[0].manual_override = Some(42.0);
        store.save(&state).unwrap();

        assert_eq!(load_state(&store), state);
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        let rows: i64 = conn
            .query_row("SELECT count(*) FROM kv", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_store_malformed_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("kakeibo.db")).unwrap();
        store.set(STORAGE_KEY, "[1, 2").unwrap();
        assert!(store.load().is_none());
    }
}
