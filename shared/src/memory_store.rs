//! In-process key/value store implementing [`TransactionalStore`].
//!
//! Writes are staged per transaction and only become visible on commit.
//! A semaphore models the connection pool; `grant_delay` models a slow
//! pool handing out a connection and `commit_delay` a slow commit.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::StoreError;
use crate::transaction::{IsolationLevel, TransactionalStore};

type Table = BTreeMap<String, Value>;

fn lock(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MemoryStore {
    slots: Arc<Semaphore>,
    grant_delay: Duration,
    commit_delay: Duration,
    committed: Arc<Mutex<Table>>,
    statements: Arc<AtomicUsize>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

pub struct MemoryTransaction {
    _permit: OwnedSemaphorePermit,
    isolation: Option<IsolationLevel>,
    committed: Arc<Mutex<Table>>,
    staged: Mutex<Vec<(String, Option<Value>)>>,
    statements: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// `slots` is the number of transactions that may be open at once.
    pub fn new(slots: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(slots)),
            grant_delay: Duration::ZERO,
            commit_delay: Duration::ZERO,
            committed: Arc::new(Mutex::new(BTreeMap::new())),
            statements: Arc::new(AtomicUsize::new(0)),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    pub fn with_grant_delay(mut self, delay: Duration) -> Self {
        self.grant_delay = delay;
        self
    }

    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    /// Committed value, ignoring anything staged by open transactions.
    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.committed).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.committed).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statements_executed(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

impl MemoryTransaction {
    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.statements.fetch_add(1, Ordering::SeqCst);
        self.staged
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((key.into(), Some(value)));
    }

    pub fn delete(&self, key: impl Into<String>) {
        self.statements.fetch_add(1, Ordering::SeqCst);
        self.staged
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((key.into(), None));
    }

    /// Reads its own staged writes first, then committed data.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        let staged = self.staged.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((_, value)) = staged.iter().rev().find(|(k, _)| k == key) {
            return value.clone();
        }
        drop(staged);
        lock(&self.committed).get(key).cloned()
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> Result<MemoryTransaction, StoreError> {
        if !self.grant_delay.is_zero() {
            tokio::time::sleep(self.grant_delay).await;
        }
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Unavailable("memory store closed".into()))?;
        Ok(MemoryTransaction {
            _permit: permit,
            isolation,
            committed: self.committed.clone(),
            staged: Mutex::new(Vec::new()),
            statements: self.statements.clone(),
        })
    }

    async fn commit(&self, tx: MemoryTransaction) -> Result<(), StoreError> {
        if !self.commit_delay.is_zero() {
            tokio::time::sleep(self.commit_delay).await;
        }
        let staged = tx.staged.into_inner().unwrap_or_else(|p| p.into_inner());
        let mut table = lock(&self.committed);
        for (key, value) in staged {
            match value {
                Some(v) => {
                    table.insert(key, v);
                }
                None => {
                    table.remove(&key);
                }
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTransaction) -> Result<(), StoreError> {
        drop(tx);
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
