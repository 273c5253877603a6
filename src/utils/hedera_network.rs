//! Public ledger network reached through the hedera SDK

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::OperatorCredentials;
use crate::crypto::PublicKey;
use crate::ledger::{BalanceQuery, SignedTransaction, TransactionBody};
use crate::traits::*;
use crate::types::*;

/// Consensus nodes reached through an SDK client
///
/// The SDK client signs every request with the operator key itself, so a
/// transaction is forwarded only when it is paid by the operator and carries
/// a valid operator signature and nothing else.
pub struct HederaNetwork {
    client: hedera::Client,
    operator_account_id: AccountId,
    operator_key: PublicKey,
}

impl HederaNetwork {
    /// Connect to the public testnet, paying for requests from `operator`
    pub fn for_testnet(operator: &OperatorCredentials) -> LedgerResult<Self> {
        Self::with_client(hedera::Client::for_testnet(), operator)
    }

    /// Wrap an already configured SDK client and bind `operator` to it
    pub fn with_client(
        client: hedera::Client,
        operator: &OperatorCredentials,
    ) -> LedgerResult<Self> {
        let sdk_key = operator
            .private_key
            .to_string_der()?
            .parse::<hedera::PrivateKey>()
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        client.set_operator(to_sdk_account_id(operator.account_id)?, sdk_key);

        Ok(Self {
            client,
            operator_account_id: operator.account_id,
            operator_key: operator.private_key.public_key()?,
        })
    }

    fn check_forwardable(&self, transaction: &SignedTransaction) -> LedgerResult<()> {
        let transaction_id = transaction.transaction_id;
        if transaction_id.account_id != self.operator_account_id {
            return Err(LedgerError::Validation(format!(
                "Transaction {transaction_id} is not paid by operator {}",
                self.operator_account_id
            )));
        }
        if !transaction.is_signed_by(&self.operator_key)? {
            return Err(LedgerError::Precheck {
                transaction_id,
                status: Status::InvalidSignature,
            });
        }
        if transaction
            .signatures
            .iter()
            .any(|pair| pair.public_key != self.operator_key)
        {
            return Err(LedgerError::Validation(format!(
                "Transaction {transaction_id} carries signatures other than the operator's"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl LedgerNetwork for HederaNetwork {
    async fn submit(&self, transaction: &SignedTransaction) -> LedgerResult<TransactionId> {
        self.check_forwardable(transaction)?;

        let transaction_id = transaction.transaction_id;
        let sdk_transaction_id = to_sdk_transaction_id(&transaction_id)?;
        let max_transaction_fee = to_sdk_hbar(transaction.max_transaction_fee);

        let submitted = match &transaction.body {
            TransactionBody::AccountCreate {
                key,
                initial_balance,
                memo,
            } => {
                let mut create = hedera::AccountCreateTransaction::new();
                create
                    .key(to_sdk_public_key(key)?)
                    .initial_balance(to_sdk_hbar(*initial_balance))
                    .transaction_id(sdk_transaction_id)
                    .max_transaction_fee(max_transaction_fee)
                    .transaction_memo(memo.as_str());
                create.execute(&self.client).await
            }
            TransactionBody::CryptoTransfer { transfers, memo } => {
                let mut transfer = hedera::TransferTransaction::new();
                for leg in transfers {
                    transfer.hbar_transfer(
                        to_sdk_account_id(leg.account_id)?,
                        to_sdk_hbar(leg.amount),
                    );
                }
                transfer
                    .transaction_id(sdk_transaction_id)
                    .max_transaction_fee(max_transaction_fee)
                    .transaction_memo(memo.as_str());
                transfer.execute(&self.client).await
            }
        };

        match submitted {
            Ok(_) => {
                debug!(transaction_id = %transaction_id, "Accepted by node");
                Ok(transaction_id)
            }
            Err(hedera::Error::TransactionPreCheckStatus { status, .. }) => {
                Err(LedgerError::Precheck {
                    transaction_id,
                    status: from_sdk_status(status),
                })
            }
            Err(err) => Err(network_error(err)),
        }
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> LedgerResult<TransactionReceipt> {
        let mut query = hedera::TransactionReceiptQuery::new();
        query.transaction_id(to_sdk_transaction_id(transaction_id)?);

        match query.execute(&self.client).await {
            Ok(receipt) => Ok(TransactionReceipt {
                transaction_id: *transaction_id,
                status: from_sdk_status(receipt.status),
                account_id: receipt
                    .account_id
                    .as_ref()
                    .map(from_sdk_account_id)
                    .transpose()?,
            }),
            Err(hedera::Error::ReceiptStatus { status, .. }) => Ok(TransactionReceipt {
                transaction_id: *transaction_id,
                status: from_sdk_status(status),
                account_id: None,
            }),
            Err(err) => Err(network_error(err)),
        }
    }

    async fn get_account_balance(&self, query: &BalanceQuery) -> LedgerResult<AccountBalance> {
        let mut balance_query = hedera::AccountBalanceQuery::new();
        balance_query.account_id(to_sdk_account_id(query.account_id)?);

        let balance = balance_query
            .execute(&self.client)
            .await
            .map_err(|err| query_error(query.account_id, err))?;
        Ok(AccountBalance {
            account_id: query.account_id,
            hbars: from_sdk_hbar(balance.hbars),
        })
    }

    async fn get_query_cost(&self, query: &BalanceQuery) -> LedgerResult<Hbar> {
        let mut balance_query = hedera::AccountBalanceQuery::new();
        balance_query.account_id(to_sdk_account_id(query.account_id)?);

        let cost = balance_query
            .get_cost(&self.client)
            .await
            .map_err(|err| query_error(query.account_id, err))?;
        Ok(from_sdk_hbar(cost))
    }
}

fn network_error(err: hedera::Error) -> LedgerError {
    warn!("Request failed: {err}");
    LedgerError::Network(err.to_string())
}

fn query_error(account_id: AccountId, err: hedera::Error) -> LedgerError {
    let status = match err {
        hedera::Error::QueryPreCheckStatus { status, .. }
        | hedera::Error::QueryNoPaymentPreCheckStatus { status, .. } => from_sdk_status(status),
        err => return network_error(err),
    };

    match status {
        Status::InvalidAccountId => LedgerError::AccountNotFound(account_id),
        status => LedgerError::Network(format!(
            "Query for account {account_id} failed precheck with status {status}"
        )),
    }
}

fn to_sdk_account_id(account_id: AccountId) -> LedgerResult<hedera::AccountId> {
    account_id
        .to_string()
        .parse()
        .map_err(|e: hedera::Error| LedgerError::Parse(format!("Account ID {account_id}: {e}")))
}

fn from_sdk_account_id(account_id: &hedera::AccountId) -> LedgerResult<AccountId> {
    account_id.to_string().parse()
}

fn to_sdk_transaction_id(transaction_id: &TransactionId) -> LedgerResult<hedera::TransactionId> {
    transaction_id.to_string().parse().map_err(|e: hedera::Error| {
        LedgerError::Parse(format!("Transaction ID {transaction_id}: {e}"))
    })
}

fn to_sdk_public_key(key: &PublicKey) -> LedgerResult<hedera::PublicKey> {
    key.to_string()
        .parse()
        .map_err(|e: hedera::Error| LedgerError::InvalidKey(e.to_string()))
}

fn to_sdk_hbar(amount: Hbar) -> hedera::Hbar {
    hedera::Hbar::from_tinybars(amount.to_tinybars())
}

fn from_sdk_hbar(amount: hedera::Hbar) -> Hbar {
    Hbar::from_tinybars(amount.to_tinybars())
}

fn from_sdk_status(status: hedera::Status) -> Status {
    use hedera::Status as Sdk;

    match status {
        Sdk::Success => Status::Success,
        Sdk::InvalidSignature => Status::InvalidSignature,
        Sdk::PayerAccountNotFound => Status::PayerAccountNotFound,
        Sdk::InsufficientPayerBalance => Status::InsufficientPayerBalance,
        Sdk::InsufficientTxFee => Status::InsufficientTxFee,
        Sdk::DuplicateTransaction => Status::DuplicateTransaction,
        Sdk::TransactionExpired => Status::TransactionExpired,
        Sdk::InvalidAccountId => Status::InvalidAccountId,
        Sdk::InsufficientAccountBalance => Status::InsufficientAccountBalance,
        Sdk::InvalidAccountAmounts => Status::InvalidAccountAmounts,
        Sdk::AccountRepeatedInAccountAmounts => Status::AccountRepeatedInAccountAmounts,
        Sdk::InvalidInitialBalance => Status::InvalidInitialBalance,
        Sdk::KeyRequired => Status::KeyRequired,
        Sdk::ReceiptNotFound => Status::ReceiptNotFound,
        other => {
            debug!(status = ?other, "Unmapped response code");
            Status::Other(other as i32)
        }
    }
}
