//! Contract shared by the gateway and the downstream services: response
//! envelopes, the RPC error wire shape, transactional writes, validation,
//! configuration and e-mail delivery.

pub mod config;
pub mod db;
pub mod email;
pub mod envelope;
pub mod error;
#[cfg(feature = "axum")]
pub mod http;
pub mod memory_store;
pub mod pagination;
pub mod rpc_error;
pub mod transaction;
pub mod validation;

pub use envelope::{Message, ResponseEnvelope};
pub use error::{AppError, StoreError};
pub use rpc_error::RpcError;
pub use transaction::{
    IsolationLevel, RollbackReason, TransactionOptions, TransactionRunner, TransactionState,
};
