//! Client handle bound to one network and one operator

use chrono::{TimeZone, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::crypto::PrivateKey;
use crate::ledger::{BalanceQuery, SignedTransaction, TransactionBody};
use crate::traits::*;
use crate::types::*;

/// Fee ceiling attached to transactions unless configured otherwise
pub const DEFAULT_MAX_TRANSACTION_FEE: Hbar = Hbar::from_tinybars(200_000_000);

/// How long a single network call may take
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Account that pays for, and signs, every transaction the client submits
pub struct Operator {
    account_id: AccountId,
    signer: Box<dyn TransactionSigner>,
}

impl Operator {
    pub fn new(account_id: AccountId, signer: Box<dyn TransactionSigner>) -> Self {
        Self { account_id, signer }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn signer(&self) -> &dyn TransactionSigner {
        self.signer.as_ref()
    }
}

/// Handle to a submitted transaction whose receipt has not been fetched yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
}

impl TransactionResponse {
    /// Wait for consensus; a non-success status is returned as an error
    pub async fn get_receipt<N: LedgerNetwork>(
        &self,
        client: &Client<N>,
    ) -> LedgerResult<TransactionReceipt> {
        client.get_receipt(&self.transaction_id).await
    }
}

/// Network client configured with an operator
pub struct Client<N: LedgerNetwork> {
    network: N,
    operator: Option<Operator>,
    max_transaction_fee: Hbar,
    request_timeout: Duration,
    last_valid_start_nanos: AtomicI64,
}

impl<N: LedgerNetwork> Client<N> {
    /// Create a client for the given network, without an operator
    pub fn for_network(network: N) -> Self {
        Self {
            network,
            operator: None,
            max_transaction_fee: DEFAULT_MAX_TRANSACTION_FEE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            last_valid_start_nanos: AtomicI64::new(0),
        }
    }

    /// Use `account_id`, signing with `private_key`, as the operator
    pub fn set_operator(&mut self, account_id: AccountId, private_key: PrivateKey) -> &mut Self {
        self.set_operator_with_signer(account_id, Box::new(private_key))
    }

    /// Use `account_id` as the operator with a custom signer
    pub fn set_operator_with_signer(
        &mut self,
        account_id: AccountId,
        signer: Box<dyn TransactionSigner>,
    ) -> &mut Self {
        self.operator = Some(Operator::new(account_id, signer));
        self
    }

    pub fn with_operator(mut self, account_id: AccountId, private_key: PrivateKey) -> Self {
        self.set_operator(account_id, private_key);
        self
    }

    pub fn with_max_transaction_fee(mut self, max_transaction_fee: Hbar) -> Self {
        self.max_transaction_fee = max_transaction_fee;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn operator(&self) -> LedgerResult<&Operator> {
        self.operator.as_ref().ok_or_else(|| {
            LedgerError::Configuration("Client has no operator to pay for transactions".to_string())
        })
    }

    pub fn operator_account_id(&self) -> LedgerResult<AccountId> {
        Ok(self.operator()?.account_id)
    }

    /// Transaction id for a new transaction paid by the operator. Valid-start
    /// timestamps handed out by one client strictly increase.
    pub fn generate_transaction_id(&self) -> LedgerResult<TransactionId> {
        let payer = self.operator_account_id()?;
        let now = Utc::now()
            .timestamp_nanos_opt()
            .ok_or_else(|| LedgerError::Validation("System clock out of range".to_string()))?;

        let previous = self
            .last_valid_start_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        let valid_start = now.max(previous + 1);

        Ok(TransactionId::new(payer, Utc.timestamp_nanos(valid_start)))
    }

    /// Sign `body` with the operator and submit it
    pub async fn execute(&self, body: TransactionBody) -> LedgerResult<TransactionResponse> {
        self.execute_with_signers(body, &[]).await
    }

    /// Sign `body` with the operator plus `signers` and submit it; extra
    /// signers are needed when debiting accounts other than the operator's
    pub async fn execute_with_signers(
        &self,
        body: TransactionBody,
        signers: &[&dyn TransactionSigner],
    ) -> LedgerResult<TransactionResponse> {
        let operator = self.operator()?;
        let transaction_id = self.generate_transaction_id()?;

        let mut transaction = SignedTransaction::new(transaction_id, self.max_transaction_fee, body)
            .sign_with(operator.signer())?;
        for signer in signers {
            transaction = transaction.sign_with(*signer)?;
        }

        debug!(
            transaction_id = %transaction_id,
            signatures = transaction.signatures.len(),
            "Submitting transaction"
        );
        let transaction_id = self
            .with_timeout(self.network.submit(&transaction))
            .await
            .inspect_err(|err| warn!(transaction_id = %transaction_id, "Submit failed: {err}"))?;

        Ok(TransactionResponse { transaction_id })
    }

    /// Fetch the receipt for `transaction_id`; a non-success status is
    /// returned as [`LedgerError::ReceiptStatus`]
    pub async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> LedgerResult<TransactionReceipt> {
        let receipt = self
            .with_timeout(self.network.get_receipt(transaction_id))
            .await?;
        debug!(transaction_id = %transaction_id, status = %receipt.status, "Received receipt");

        if !receipt.status.is_success() {
            return Err(LedgerError::ReceiptStatus {
                transaction_id: *transaction_id,
                status: receipt.status,
            });
        }

        Ok(receipt)
    }

    /// Submit `body` and wait for its receipt as one step
    pub async fn execute_for_receipt(
        &self,
        body: TransactionBody,
    ) -> LedgerResult<TransactionReceipt> {
        let response = self.execute(body).await?;
        response.get_receipt(self).await
    }

    pub async fn query_balance(&self, query: &BalanceQuery) -> LedgerResult<AccountBalance> {
        self.with_timeout(self.network.get_account_balance(query)).await
    }

    pub async fn query_cost(&self, query: &BalanceQuery) -> LedgerResult<Hbar> {
        self.with_timeout(self.network.get_query_cost(query)).await
    }

    async fn with_timeout<T>(
        &self,
        request: impl Future<Output = LedgerResult<T>>,
    ) -> LedgerResult<T> {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| LedgerError::Timeout(self.request_timeout))?
    }
}
