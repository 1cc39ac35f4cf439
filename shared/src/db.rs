//! Postgres access through SeaORM, exposed as a [`TransactionalStore`].

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, DbErr, SqlErr,
    TransactionTrait,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use crate::config::Settings;
use crate::error::StoreError;
use crate::transaction::{IsolationLevel, TransactionalStore};

/// Appends `sslmode=disable` for local hosts unless the URL already sets one.
pub fn ensure_sslmode_disable(url: &str) -> String {
    if url.to_ascii_lowercase().contains("sslmode=") {
        return url.to_string();
    }
    let local = ["@localhost", "@127.0.0.1", "//localhost", "//127.0.0.1"]
        .iter()
        .any(|host| url.contains(host));
    if !local {
        return url.to_string();
    }
    if url.contains('?') {
        format!("{url}&sslmode=disable")
    } else {
        format!("{url}?sslmode=disable")
    }
}

pub async fn connect(settings: &Settings) -> Result<DatabaseConnection, DbErr> {
    let url = ensure_sslmode_disable(&settings.database_url);
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(settings.max_transactions as u32 + 4)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    info!("database connected");
    Ok(db)
}

/// Maps a SeaORM error onto the store taxonomy.
pub fn classify(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => return StoreError::UniqueViolation(detail),
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
            return StoreError::ForeignKeyViolation(detail)
        }
        _ => {}
    }
    match err {
        DbErr::RecordNotFound(detail) => StoreError::NotFound(detail),
        DbErr::RecordNotUpdated => StoreError::NotFound("record not updated".into()),
        DbErr::ConnectionAcquire(e) => StoreError::Unavailable(e.to_string()),
        DbErr::Conn(e) => StoreError::Unavailable(e.to_string()),
        other => StoreError::Other(other.to_string()),
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        classify(err)
    }
}

fn to_sea_orm(level: IsolationLevel) -> sea_orm::IsolationLevel {
    match level {
        IsolationLevel::ReadUncommitted => sea_orm::IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted => sea_orm::IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead => sea_orm::IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable => sea_orm::IsolationLevel::Serializable,
    }
}

/// Bounded transaction pool over a SeaORM connection.
pub struct SeaOrmStore {
    db: DatabaseConnection,
    slots: Arc<Semaphore>,
}

pub struct SeaOrmTransaction {
    txn: DatabaseTransaction,
    _permit: OwnedSemaphorePermit,
}

impl SeaOrmTransaction {
    /// Connection to run statements on inside the transaction.
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection, max_transactions: usize) -> Self {
        Self {
            db,
            slots: Arc::new(Semaphore::new(max_transactions.max(1))),
        }
    }

    /// Plain connection for reads outside a transaction.
    pub fn conn(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl TransactionalStore for SeaOrmStore {
    type Transaction = SeaOrmTransaction;

    async fn begin(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> Result<SeaOrmTransaction, StoreError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Unavailable("transaction pool closed".into()))?;
        let txn = self
            .db
            .begin_with_config(isolation.map(to_sea_orm), None)
            .await
            .map_err(classify)?;
        Ok(SeaOrmTransaction {
            txn,
            _permit: permit,
        })
    }

    async fn commit(&self, tx: SeaOrmTransaction) -> Result<(), StoreError> {
        tx.txn.commit().await.map_err(classify)
    }

    async fn rollback(&self, tx: SeaOrmTransaction) -> Result<(), StoreError> {
        tx.txn.rollback().await.map_err(classify)
    }
}
