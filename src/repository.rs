// 🗂️ Transaction Repository - get/list/create/update/delete behind one trait
// Backends: in-memory (tests, throwaway runs) and SQLite with an audit trail

use crate::db::{self, Event, Transaction};
use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

pub trait TransactionRepository {
    fn get(&self, id: &str) -> Result<Option<Transaction>>;

    /// Newest stored first
    fn list(&self) -> Result<Vec<Transaction>>;

    /// Fails if a transaction with the same id already exists
    fn create(&mut self, tx: &Transaction) -> Result<()>;

    /// Returns false when the id is unknown
    fn update(&mut self, tx: &Transaction) -> Result<bool>;

    /// Returns false when the id is unknown
    fn delete(&mut self, id: &str) -> Result<bool>;

    /// Store a batch ahead of everything already stored, keeping the batch's own order
    fn prepend_batch(&mut self, batch: &[Transaction]) -> Result<usize> {
        // Stored last-to-first so the batch's first entry ends up newest
        for tx in batch.iter().rev() {
            self.create(tx)?;
        }
        info!(count = batch.len(), "stored transaction batch");
        Ok(batch.len())
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryRepository {
    // index 0 is the newest
    transactions: Vec<Transaction>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        MemoryRepository { transactions }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.transactions.iter().position(|tx| tx.id == id)
    }
}

impl TransactionRepository for MemoryRepository {
    fn get(&self, id: &str) -> Result<Option<Transaction>> {
        Ok(self.position(id).map(|i| self.transactions[i].clone()))
    }

    fn list(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }

    fn create(&mut self, tx: &Transaction) -> Result<()> {
        if self.position(&tx.id).is_some() {
            bail!("Transaction {} already exists", tx.id);
        }
        self.transactions.insert(0, tx.clone());
        Ok(())
    }

    fn update(&mut self, tx: &Transaction) -> Result<bool> {
        match self.position(&tx.id) {
            Some(i) => {
                self.transactions[i] = tx.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        match self.position(id) {
            Some(i) => {
                self.transactions.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// SQLITE
// ============================================================================

const ENTITY_TYPE: &str = "transaction";

pub struct SqliteRepository {
    conn: Connection,
    actor: String,
}

impl SqliteRepository {
    pub fn open(path: &Path, actor: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        debug!(path = %path.display(), "opened database");
        Self::from_connection(conn, actor)
    }

    pub fn open_in_memory(actor: &str) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, actor)
    }

    fn from_connection(conn: Connection, actor: &str) -> Result<Self> {
        db::setup_database(&conn)?;
        Ok(SqliteRepository {
            conn,
            actor: actor.to_string(),
        })
    }

    pub fn count(&self) -> Result<i64> {
        db::count_transactions(&self.conn)
    }

    /// Audit trail for one transaction, newest first
    pub fn events_for(&self, id: &str) -> Result<Vec<Event>> {
        db::get_events_for_entity(&self.conn, ENTITY_TYPE, id)
    }

    fn record(&self, event_type: &str, tx_id: &str, data: serde_json::Value) -> Result<()> {
        let event = Event::new(event_type, ENTITY_TYPE, tx_id, data, &self.actor);
        db::insert_event(&self.conn, &event)
    }

    fn insert_with_event(&self, tx: &Transaction) -> Result<()> {
        db::insert_transaction(&self.conn, tx)?;
        self.record("transaction_created", &tx.id, serde_json::to_value(tx)?)?;
        debug!(id = %tx.id, "created transaction");
        Ok(())
    }
}

impl TransactionRepository for SqliteRepository {
    fn get(&self, id: &str) -> Result<Option<Transaction>> {
        db::get_transaction(&self.conn, id)
    }

    fn list(&self) -> Result<Vec<Transaction>> {
        db::get_all_transactions(&self.conn)
    }

    fn create(&mut self, tx: &Transaction) -> Result<()> {
        self.insert_with_event(tx)
    }

    fn update(&mut self, tx: &Transaction) -> Result<bool> {
        let updated = db::update_transaction(&self.conn, tx)?;
        if updated {
            self.record("transaction_updated", &tx.id, serde_json::to_value(tx)?)?;
            debug!(id = %tx.id, "updated transaction");
        }
        Ok(updated)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let deleted = db::delete_transaction(&self.conn, id)?;
        if deleted {
            self.record("transaction_deleted", id, serde_json::json!({ "id": id }))?;
            debug!(id, "deleted transaction");
        }
        Ok(deleted)
    }

    fn prepend_batch(&mut self, batch: &[Transaction]) -> Result<usize> {
        // One SQLite transaction for the whole batch
        let batch_tx = self.conn.unchecked_transaction()?;
        for tx in batch.iter().rev() {
            self.insert_with_event(tx)?;
        }
        batch_tx.commit()?;
        info!(count = batch.len(), "stored transaction batch");
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionType;

    fn create_test_transaction(id: &str, amount: f64) -> Transaction {
        Transaction {
            id: id.to_string(),
            date: "2023-10-12".to_string(),
            amount,
            category: "Utilities".to_string(),
            description: "Community Pool Water Bill".to_string(),
            transaction_type: TransactionType::Expense,
            vendor: Some("City Water".to_string()),
            source: None,
        }
    }

    /// Same behaviour is expected from every backend
    fn exercise_crud(repo: &mut dyn TransactionRepository) {
        let a = create_test_transaction("a", 10.0);
        let b = create_test_transaction("b", 20.0);

        repo.create(&a).unwrap();
        repo.create(&b).unwrap();
        assert!(repo.create(&a).is_err());

        let ids: Vec<String> = repo.list().unwrap().into_iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let mut changed = a.clone();
        changed.amount = 15.0;
        assert!(repo.update(&changed).unwrap());
        assert_eq!(repo.get("a").unwrap().unwrap().amount, 15.0);

        assert!(repo.delete("b").unwrap());
        assert!(!repo.delete("b").unwrap());
        assert!(!repo.update(&b).unwrap());
        assert!(repo.get("b").unwrap().is_none());
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    fn exercise_prepend(repo: &mut dyn TransactionRepository) {
        repo.create(&create_test_transaction("old", 1.0)).unwrap();

        let batch = vec![
            create_test_transaction("new1", 2.0),
            create_test_transaction("new2", 3.0),
        ];
        assert_eq!(repo.prepend_batch(&batch).unwrap(), 2);

        let ids: Vec<String> = repo.list().unwrap().into_iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec!["new1", "new2", "old"]);
    }

    #[test]
    fn test_memory_crud() {
        exercise_crud(&mut MemoryRepository::new());
    }

    #[test]
    fn test_sqlite_crud() {
        exercise_crud(&mut SqliteRepository::open_in_memory("tester").unwrap());
    }

    #[test]
    fn test_memory_prepend_batch() {
        exercise_prepend(&mut MemoryRepository::new());
    }

    #[test]
    fn test_sqlite_prepend_batch() {
        exercise_prepend(&mut SqliteRepository::open_in_memory("tester").unwrap());
    }

    #[test]
    fn test_sqlite_audit_trail() {
        let mut repo = SqliteRepository::open_in_memory("treasurer").unwrap();
        let mut tx = create_test_transaction("x", 5.0);

        repo.create(&tx).unwrap();
        tx.amount = 6.0;
        repo.update(&tx).unwrap();
        repo.delete("x").unwrap();

        let events = repo.events_for("x").unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["transaction_deleted", "transaction_updated", "transaction_created"]);
        assert!(events.iter().all(|e| e.actor == "treasurer"));
        assert_eq!(events[1].data["amount"], 6.0);
    }

    #[test]
    fn test_sqlite_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let mut repo = SqliteRepository::open(&path, "tester").unwrap();
            repo.create(&create_test_transaction("kept", 42.0)).unwrap();
        }

        let repo = SqliteRepository::open(&path, "tester").unwrap();
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.get("kept").unwrap().unwrap().amount, 42.0);
    }
}
