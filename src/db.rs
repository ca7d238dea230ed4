use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Income or expense. Derived from the sign of the amount on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(anyhow!("Unknown transaction type: {}", other)),
        }
    }
}

/// A ledger entry in its canonical shape.
///
/// `amount` is always non-negative: direction lives in `transaction_type`.
/// Expenses carry a `vendor`, income carries a `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub description: String,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Transaction as submitted by a client, before an id is assigned
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub description: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str, kind: TransactionType) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("{} is required for {} transactions", field, kind),
    }
}

impl NewTransaction {
    /// Check the submission against `today` and build the stored shape.
    ///
    /// Expenses keep only their vendor and income only its source, so every
    /// accepted transaction has exactly one counterparty.
    pub fn validate_at(self, today: NaiveDate) -> Result<Transaction> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| anyhow!("Date must be in YYYY-MM-DD format: {}", self.date))?;
        if date > today {
            bail!("Date cannot be in the future: {}", self.date);
        }

        if !self.amount.is_finite() || self.amount <= 0.0 {
            bail!("Amount must be greater than 0");
        }
        if self.category.trim().is_empty() {
            bail!("Category must not be empty");
        }
        if self.description.trim().is_empty() {
            bail!("Description must not be empty");
        }

        let kind = self.transaction_type;
        let (vendor, source) = match kind {
            TransactionType::Expense => {
                let vendor = required(&self.vendor, "Vendor", kind)?;
                (Some(vendor.to_string()), None)
            }
            TransactionType::Income => {
                let source = required(&self.source, "Source", kind)?;
                (None, Some(source.to_string()))
            }
        };

        Ok(Transaction {
            id: new_id(),
            date: date.format("%Y-%m-%d").to_string(),
            amount: self.amount,
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
            transaction_type: kind,
            vendor,
            source,
        })
    }
}

impl TryFrom<NewTransaction> for Transaction {
    type Error = anyhow::Error;

    fn try_from(new: NewTransaction) -> Result<Transaction> {
        new.validate_at(Utc::now().date_naive())
    }
}

/// Fresh opaque identifier for a stored record
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.transaction_type == TransactionType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }

    /// Amount with the direction applied (expenses negative)
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    /// Vendor for expenses, source for income
    pub fn counterparty(&self) -> Option<&str> {
        match self.transaction_type {
            TransactionType::Income => self.source.as_deref(),
            TransactionType::Expense => self.vendor.as_deref(),
        }
    }
}

pub fn filter_by_type(transactions: &[Transaction], transaction_type: TransactionType) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|tx| tx.transaction_type == transaction_type)
        .cloned()
        .collect()
}

/// Event for the audit trail: every change to a stored transaction
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: new_id(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" and stay that way
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            date TEXT NOT NULL,
            amount REAL NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            vendor TEXT,
            source TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(transaction_type)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str =
    "id, date, amount, category, description, transaction_type, vendor, source";

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let type_str: String = row.get(5)?;
    let transaction_type = type_str.parse::<TransactionType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        date: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        transaction_type,
        vendor: row.get(6)?,
        source: row.get(7)?,
    })
}

pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (
            id, date, amount, category, description, transaction_type, vendor, source
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tx.id,
            tx.date,
            tx.amount,
            tx.category,
            tx.description,
            tx.transaction_type.as_str(),
            tx.vendor,
            tx.source,
        ],
    )
    .with_context(|| format!("Failed to insert transaction {}", tx.id))?;

    Ok(())
}

/// Overwrite every field of an existing transaction. Returns false when the id is unknown.
pub fn update_transaction(conn: &Connection, tx: &Transaction) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE transactions
             SET date = ?2, amount = ?3, category = ?4, description = ?5,
                 transaction_type = ?6, vendor = ?7, source = ?8
             WHERE id = ?1",
            params![
                tx.id,
                tx.date,
                tx.amount,
                tx.category,
                tx.description,
                tx.transaction_type.as_str(),
                tx.vendor,
                tx.source,
                ],
        )
        .with_context(|| format!("Failed to update transaction {}", tx.id))?;

    Ok(changed > 0)
}

pub fn delete_transaction(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn
        .execute("DELETE FROM transactions WHERE id = ?1", params![id])
        .with_context(|| format!("Failed to delete transaction {}", id))?;

    Ok(changed > 0)
}

pub fn get_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    let tx = conn
        .query_row(&sql, params![id], transaction_from_row)
        .optional()?;

    Ok(tx)
}

/// All transactions, most recently stored first
pub fn get_all_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let sql = format!("SELECT {} FROM transactions ORDER BY seq DESC", TRANSACTION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;

    let transactions = stmt
        .query_map([], transaction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
    Ok(count)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY seq DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
