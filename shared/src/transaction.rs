//! Atomic multi-statement writes with bounded queueing and execution time.
//!
//! `maxWait` bounds the time spent obtaining a transaction from the store
//! (slot/connection queueing); `timeout` bounds the body once it runs. Both
//! are enforced by dropping the pending future, so an expired wait never
//! reaches the body and an expired body is rolled back before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{store_status, AppError, StoreError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Per-call transaction parameters. Absent fields mean "store default" for
/// the isolation level and "unbounded" for the two clocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionOptions {
    #[serde(default, alias = "isolation_level", skip_serializing_if = "Option::is_none")]
    pub isolation_level: Option<IsolationLevel>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Milliseconds.
    #[serde(default, alias = "max_wait", skip_serializing_if = "Option::is_none")]
    pub max_wait: Option<u64>,
}

impl TransactionOptions {
    pub fn with_isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub fn with_max_wait(mut self, millis: u64) -> Self {
        self.max_wait = Some(millis);
        self
    }

    /// Fills fields left unset from `defaults`.
    pub fn or(self, defaults: TransactionOptions) -> Self {
        Self {
            isolation_level: self.isolation_level.or(defaults.isolation_level),
            timeout: self.timeout.or(defaults.timeout),
            max_wait: self.max_wait.or(defaults.max_wait),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RollbackReason {
    Timeout,
    MaxWaitExceeded,
    ExplicitAbort,
    StoreError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Waiting,
    Active,
    Committed,
    RolledBack(RollbackReason),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transaction transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: TransactionState,
    pub to: TransactionState,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::RolledBack(_))
    }

    pub fn advance(self, to: TransactionState) -> Result<TransactionState, InvalidTransition> {
        use RollbackReason as R;
        use TransactionState as S;

        let allowed = match (self, to) {
            (S::Pending, S::Waiting) => true,
            (S::Waiting, S::Active) => true,
            (S::Waiting, S::RolledBack(R::MaxWaitExceeded | R::StoreError)) => true,
            (S::Active, S::Committed) => true,
            (S::Active, S::RolledBack(R::Timeout | R::ExplicitAbort | R::StoreError)) => true,
            _ => false,
        };
        if allowed {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

/// Why a transaction did not commit, as seen by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionFailure {
    #[error("transaction exceeded its timeout of {0} ms")]
    Timeout(u64),
    #[error("transaction could not start within {0} ms")]
    MaxWaitExceeded(u64),
    #[error("transaction aborted: {0}")]
    Aborted(String),
    #[error("transaction store error: {0}")]
    Store(StoreError),
}

impl TransactionFailure {
    pub fn status_code(&self) -> u16 {
        match self {
            TransactionFailure::Timeout(_) => 504,
            TransactionFailure::MaxWaitExceeded(_) => 503,
            TransactionFailure::Aborted(_) => 409,
            TransactionFailure::Store(err) => store_status(err),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransactionFailure::Timeout(_) => "TransactionTimeout",
            TransactionFailure::MaxWaitExceeded(_) => "TransactionMaxWaitExceeded",
            TransactionFailure::Aborted(_) => "TransactionAborted",
            TransactionFailure::Store(_) => "DatabaseError",
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            TransactionFailure::Timeout(_) => "Transaction timed out".to_string(),
            TransactionFailure::MaxWaitExceeded(_) => {
                "Could not start transaction in time".to_string()
            }
            TransactionFailure::Aborted(reason) => reason.clone(),
            TransactionFailure::Store(_) => "Database operation failed".to_string(),
        }
    }
}

/// A backing store able to run statements atomically.
///
/// Any queueing for a free connection or slot happens inside `begin`, which
/// must be cancel-safe: dropping its future before completion must not leave
/// a transaction open. The same holds for `commit`: a commit dropped before it
/// completes must publish nothing.
#[async_trait]
pub trait TransactionalStore: Send + Sync + 'static {
    type Transaction: Send + Sync + 'static;

    async fn begin(&self, isolation: Option<IsolationLevel>)
        -> Result<Self::Transaction, StoreError>;
    async fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError>;
    async fn rollback(&self, tx: Self::Transaction) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub struct TransactionOutcome<T> {
    pub state: TransactionState,
    pub trace: Vec<TransactionState>,
    pub result: Result<T, AppError>,
}

struct Scope {
    state: TransactionState,
    trace: Vec<TransactionState>,
}

impl Scope {
    fn new() -> Self {
        Self {
            state: TransactionState::Pending,
            trace: vec![TransactionState::Pending],
        }
    }

    fn enter(&mut self, next: TransactionState) {
        match self.state.advance(next) {
            Ok(state) => {
                debug!(from = ?self.state, to = ?state, "transaction state");
                self.state = state;
                self.trace.push(state);
            }
            Err(e) => warn!(%e, "ignoring transaction transition"),
        }
    }

    fn finish<T>(mut self, state: TransactionState, result: Result<T, AppError>) -> TransactionOutcome<T> {
        self.enter(state);
        if let TransactionState::RolledBack(reason) = self.state {
            warn!(%reason, "transaction rolled back");
        }
        TransactionOutcome {
            state: self.state,
            trace: self.trace,
            result,
        }
    }
}

enum CommitError {
    Expired(u64),
    Store(StoreError),
}

/// Runs transaction bodies against a store under [`TransactionOptions`].
///
/// `timeout` bounds the body and the commit together.
pub struct TransactionRunner<S> {
    store: Arc<S>,
    defaults: TransactionOptions,
}

impl<S> Clone for TransactionRunner<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            defaults: self.defaults,
        }
    }
}

impl<S: TransactionalStore> TransactionRunner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_defaults(store, TransactionOptions::default())
    }

    /// `defaults` fill whatever a call site leaves unset.
    pub fn with_defaults(store: Arc<S>, defaults: TransactionOptions) -> Self {
        Self { store, defaults }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn defaults(&self) -> TransactionOptions {
        self.defaults
    }

    pub async fn run<T, F>(&self, options: TransactionOptions, body: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t S::Transaction) -> BoxFuture<'t, Result<T, AppError>> + Send,
    {
        self.execute(options, body).await.result
    }

    /// Like [`run`](Self::run) but also reports the terminal state and the
    /// states passed through.
    pub async fn execute<T, F>(&self, options: TransactionOptions, body: F) -> TransactionOutcome<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t S::Transaction) -> BoxFuture<'t, Result<T, AppError>> + Send,
    {
        let options = options.or(self.defaults);
        let mut scope = Scope::new();

        scope.enter(TransactionState::Waiting);
        let begin = self.store.begin(options.isolation_level);
        let started = match options.max_wait {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), begin).await {
                Ok(started) => started,
                Err(_) => {
                    return scope.finish(
                        TransactionState::RolledBack(RollbackReason::MaxWaitExceeded),
                        Err(TransactionFailure::MaxWaitExceeded(ms).into()),
                    );
                }
            },
            None => begin.await,
        };
        let tx = match started {
            Ok(tx) => tx,
            Err(e) => {
                warn!(%e, "could not begin transaction");
                return scope.finish(
                    TransactionState::RolledBack(RollbackReason::StoreError),
                    Err(TransactionFailure::Store(e).into()),
                );
            }
        };

        scope.enter(TransactionState::Active);
        // one deadline covers the body and the commit
        let deadline = options
            .timeout
            .map(|ms| (ms, Instant::now() + Duration::from_millis(ms)));
        let ran = match deadline {
            Some((ms, at)) => tokio::time::timeout_at(at, body(&tx))
                .await
                .map_err(|_| ms),
            None => Ok(body(&tx).await),
        };

        match ran {
            Err(ms) => {
                self.abort(tx).await;
                scope.finish(
                    TransactionState::RolledBack(RollbackReason::Timeout),
                    Err(TransactionFailure::Timeout(ms).into()),
                )
            }
            Ok(Err(err)) => {
                debug!(%err, "transaction body failed");
                self.abort(tx).await;
                scope.finish(TransactionState::RolledBack(RollbackReason::ExplicitAbort), Err(err))
            }
            Ok(Ok(value)) => match self.commit_by(tx, deadline).await {
                Ok(()) => scope.finish(TransactionState::Committed, Ok(value)),
                Err(CommitError::Expired(ms)) => scope.finish(
                    TransactionState::RolledBack(RollbackReason::Timeout),
                    Err(TransactionFailure::Timeout(ms).into()),
                ),
                Err(CommitError::Store(e)) => {
                    warn!(%e, "commit failed");
                    scope.finish(
                        TransactionState::RolledBack(RollbackReason::StoreError),
                        Err(TransactionFailure::Store(e).into()),
                    )
                }
            },
        }
    }

    async fn commit_by(
        &self,
        tx: S::Transaction,
        deadline: Option<(u64, Instant)>,
    ) -> Result<(), CommitError> {
        let commit = self.store.commit(tx);
        match deadline {
            Some((ms, at)) => match tokio::time::timeout_at(at, commit).await {
                Ok(done) => done.map_err(CommitError::Store),
                Err(_) => {
                    warn!(timeout_ms = ms, "commit did not finish before the deadline");
                    Err(CommitError::Expired(ms))
                }
            },
            None => commit.await.map_err(CommitError::Store),
        }
    }

    async fn abort(&self, tx: S::Transaction) {
        if let Err(e) = self.store.rollback(tx).await {
            warn!(%e, "rollback failed");
        }
    }
}
