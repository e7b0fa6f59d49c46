//! Remote ledger service interface.
//!
//! The migration engine treats the deployed ledger contract as an opaque
//! call/response state machine. [`LedgerService`] names every read and write
//! the engine issues; [`RpcLedgerClient`] speaks it as JSON-RPC 2.0 over
//! HTTP, and `mirror-nullables` provides an in-memory implementation for
//! tests.

pub mod client;
pub mod error;
pub mod service;

pub use client::RpcLedgerClient;
pub use error::RemoteError;
pub use service::{ContractInfo, LedgerService};
