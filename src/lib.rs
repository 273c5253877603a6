//! # Ledger Quickstart
//!
//! A small client for a hashgraph-style ledger network that walks a brand new
//! account through its first steps: creation, funding, balance queries and
//! receipt checks.
//!
//! ## Features
//!
//! - **Client**: operator binding with explicit transaction signing, request timeouts
//! - **Transactions**: account creation and zero-sum hbar transfers with receipts
//! - **Queries**: account balance and query cost estimates
//! - **Keys**: Ed25519 key generation, parsing and signing
//! - **Networks**: the public testnet through the hedera SDK, plus an in-process
//!   ledger for tests and offline development
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledger_quickstart::utils::HederaNetwork;
//! use ledger_quickstart::{run_quickstart, ConsoleObserver, RawConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let report = run_quickstart(
//!     RawConfig::figment(),
//!     |config| HederaNetwork::for_testnet(&config.operator),
//!     &mut ConsoleObserver,
//! )
//! .await?;
//! println!("{}", report.new_account_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use crypto::*;
pub use ledger::*;
pub use traits::*;
pub use types::*;

// Re-export transaction patterns for convenience
pub use ledger::transaction::patterns;
