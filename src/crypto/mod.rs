//! Key material for accounts and transaction signing

pub mod keys;

pub use keys::*;
