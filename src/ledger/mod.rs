//! Ledger module containing the client, transactions, queries and the workflow runner

pub mod client;
pub mod core;
pub mod query;
pub mod transaction;

pub use self::client::*;
pub use self::core::*;
pub use self::query::*;
pub use self::transaction::*;
