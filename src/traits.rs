//! Traits for network abstraction and transaction signing

use async_trait::async_trait;

use crate::crypto::PublicKey;
use crate::ledger::{BalanceQuery, SignedTransaction};
use crate::types::*;

/// Capability set of a ledger network
///
/// This trait allows the client to work with any transport (a gRPC
/// connection to consensus nodes, a local in-process ledger, a test double)
/// by implementing these methods.
#[async_trait]
pub trait LedgerNetwork: Send + Sync {
    /// Submit a signed transaction; resolves once the node has accepted it
    /// for consensus. Precheck rejections are returned as errors.
    async fn submit(&self, transaction: &SignedTransaction) -> LedgerResult<TransactionId>;

    /// Fetch the receipt of a previously accepted transaction
    async fn get_receipt(&self, transaction_id: &TransactionId) -> LedgerResult<TransactionReceipt>;

    /// Current balance of an account
    async fn get_account_balance(&self, query: &BalanceQuery) -> LedgerResult<AccountBalance>;

    /// Fee the network would charge to answer `query`
    async fn get_query_cost(&self, query: &BalanceQuery) -> LedgerResult<Hbar>;
}

/// Signing capability attached to a client's operator
pub trait TransactionSigner: Send + Sync {
    /// Key that signatures produced by this signer verify against
    fn public_key(&self) -> LedgerResult<PublicKey>;

    /// Sign the canonical bytes of a transaction
    fn sign(&self, message: &[u8]) -> LedgerResult<Vec<u8>>;
}
