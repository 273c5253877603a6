//! Transaction construction and signing

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::ledger::{Client, TransactionResponse};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{
    validate_memo, validate_non_negative_amount, validate_transfer_list,
};

/// One leg of an hbar transfer; negative amounts debit the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbarTransfer {
    pub account_id: AccountId,
    pub amount: Hbar,
}

/// Validated payload of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionBody {
    /// Create a new account owned by `key`, funded by the payer
    AccountCreate {
        key: PublicKey,
        initial_balance: Hbar,
        memo: String,
    },
    /// Move hbar between accounts; amounts sum to zero
    CryptoTransfer {
        transfers: Vec<HbarTransfer>,
        memo: String,
    },
}

impl TransactionBody {
    pub fn memo(&self) -> &str {
        match self {
            TransactionBody::AccountCreate { memo, .. }
            | TransactionBody::CryptoTransfer { memo, .. } => memo,
        }
    }

    /// Accounts whose balance this transaction lowers, besides the fee payer
    pub fn debited_accounts(&self) -> Vec<AccountId> {
        match self {
            TransactionBody::AccountCreate { .. } => Vec::new(),
            TransactionBody::CryptoTransfer { transfers, .. } => transfers
                .iter()
                .filter(|t| t.amount.is_negative())
                .map(|t| t.account_id)
                .collect(),
        }
    }
}

/// Signature over a transaction together with the key that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct SignableTransaction<'a> {
    transaction_id: &'a TransactionId,
    max_transaction_fee: Hbar,
    body: &'a TransactionBody,
}

/// Transaction ready to be submitted to the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction_id: TransactionId,
    pub max_transaction_fee: Hbar,
    pub body: TransactionBody,
    pub signatures: Vec<SignaturePair>,
}

impl SignedTransaction {
    /// Create an unsigned transaction
    pub fn new(
        transaction_id: TransactionId,
        max_transaction_fee: Hbar,
        body: TransactionBody,
    ) -> Self {
        Self {
            transaction_id,
            max_transaction_fee,
            body,
            signatures: Vec::new(),
        }
    }

    /// Canonical bytes covered by every signature
    pub fn bytes_to_sign(&self) -> LedgerResult<Vec<u8>> {
        serde_json::to_vec(&SignableTransaction {
            transaction_id: &self.transaction_id,
            max_transaction_fee: self.max_transaction_fee,
            body: &self.body,
        })
        .map_err(|e| LedgerError::Validation(format!("Cannot encode transaction: {e}")))
    }

    /// Add a signature from `signer`; signing twice with the same key is a no-op
    pub fn sign_with(mut self, signer: &dyn TransactionSigner) -> LedgerResult<Self> {
        let public_key = signer.public_key()?;
        if self.signatures.iter().any(|s| s.public_key == public_key) {
            return Ok(self);
        }

        let signature = signer.sign(&self.bytes_to_sign()?)?;
        self.signatures.push(SignaturePair {
            public_key,
            signature,
        });
        Ok(self)
    }

    /// Whether a valid signature from `key` is attached
    pub fn is_signed_by(&self, key: &PublicKey) -> LedgerResult<bool> {
        let bytes = self.bytes_to_sign()?;
        Ok(self
            .signatures
            .iter()
            .any(|s| &s.public_key == key && key.verify(&bytes, &s.signature)))
    }
}

/// Builder for a transaction that creates a new account
#[derive(Debug, Clone, Default)]
pub struct AccountCreateTransaction {
    key: Option<PublicKey>,
    initial_balance: Hbar,
    memo: String,
}

impl AccountCreateTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key that will own the new account
    pub fn key(mut self, key: PublicKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Amount moved from the payer into the new account
    pub fn initial_balance(mut self, initial_balance: Hbar) -> Self {
        self.initial_balance = initial_balance;
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Build the transaction body
    pub fn build(self) -> LedgerResult<TransactionBody> {
        let key = self.key.ok_or_else(|| {
            LedgerError::Validation("Account create transaction requires a key".to_string())
        })?;
        validate_non_negative_amount(self.initial_balance)?;
        validate_memo(&self.memo)?;

        Ok(TransactionBody::AccountCreate {
            key,
            initial_balance: self.initial_balance,
            memo: self.memo,
        })
    }

    /// Sign with the client's operator and submit
    pub async fn execute<N: LedgerNetwork>(
        self,
        client: &Client<N>,
    ) -> LedgerResult<TransactionResponse> {
        client.execute(self.build()?).await
    }

    /// Submit and wait for a successful receipt
    pub async fn execute_for_receipt<N: LedgerNetwork>(
        self,
        client: &Client<N>,
    ) -> LedgerResult<TransactionReceipt> {
        client.execute_for_receipt(self.build()?).await
    }
}

/// Builder for an hbar transfer between accounts
#[derive(Debug, Clone, Default)]
pub struct TransferTransaction {
    transfers: Vec<HbarTransfer>,
    memo: String,
}

impl TransferTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transfer leg; negative amounts send, positive amounts receive
    pub fn hbar_transfer(mut self, account_id: AccountId, amount: Hbar) -> Self {
        self.transfers.push(HbarTransfer { account_id, amount });
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn transfers(&self) -> &[HbarTransfer] {
        &self.transfers
    }

    /// Build the transaction body
    pub fn build(self) -> LedgerResult<TransactionBody> {
        validate_transfer_list(&self.transfers)?;
        validate_memo(&self.memo)?;

        Ok(TransactionBody::CryptoTransfer {
            transfers: self.transfers,
            memo: self.memo,
        })
    }

    /// Sign with the client's operator and submit
    pub async fn execute<N: LedgerNetwork>(
        self,
        client: &Client<N>,
    ) -> LedgerResult<TransactionResponse> {
        client.execute(self.build()?).await
    }

    /// Submit and wait for a successful receipt
    pub async fn execute_for_receipt<N: LedgerNetwork>(
        self,
        client: &Client<N>,
    ) -> LedgerResult<TransactionReceipt> {
        client.execute_for_receipt(self.build()?).await
    }
}

/// Common transaction patterns
pub mod patterns {
    use super::*;

    /// Move `amount` from one account to another
    pub fn create_simple_transfer(
        from: AccountId,
        to: AccountId,
        amount: Hbar,
    ) -> LedgerResult<TransactionBody> {
        TransferTransaction::new()
            .hbar_transfer(from, amount.negated())
            .hbar_transfer(to, amount)
            .build()
    }

    /// Create an account owned by `key` holding `initial_balance`
    pub fn create_funded_account(
        key: PublicKey,
        initial_balance: Hbar,
    ) -> LedgerResult<TransactionBody> {
        AccountCreateTransaction::new()
            .key(key)
            .initial_balance(initial_balance)
            .build()
    }
}
