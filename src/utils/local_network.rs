//! In-process ledger network for development and testing

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::crypto::PublicKey;
use crate::ledger::{BalanceQuery, HbarTransfer, SignedTransaction, TransactionBody};
use crate::traits::*;
use crate::types::*;

/// Seconds a transaction stays valid after its valid-start timestamp
pub const TRANSACTION_VALID_DURATION_SECS: i64 = 180;

/// First account number handed out by [`LocalNetwork`]
pub const FIRST_ACCOUNT_NUM: u64 = 1001;

/// Prices charged by the local network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub account_create: Hbar,
    pub crypto_transfer: Hbar,
    pub balance_query: Hbar,
}

impl FeeSchedule {
    /// Fee charged to the payer of `body`
    pub fn fee_for(&self, body: &TransactionBody) -> Hbar {
        match body {
            TransactionBody::AccountCreate { .. } => self.account_create,
            TransactionBody::CryptoTransfer { .. } => self.crypto_transfer,
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            account_create: Hbar::from_tinybars(5_000_000),
            crypto_transfer: Hbar::from_tinybars(100_000),
            balance_query: Hbar::from_tinybars(83),
        }
    }
}

#[derive(Debug, Clone)]
struct LocalAccount {
    key: PublicKey,
    balance: Hbar,
}

#[derive(Debug)]
struct LocalLedger {
    accounts: HashMap<AccountId, LocalAccount>,
    receipts: HashMap<TransactionId, TransactionReceipt>,
    next_account_num: u64,
}

impl LocalLedger {
    fn allocate_account_id(&mut self) -> AccountId {
        let account_id = AccountId::new(self.next_account_num);
        self.next_account_num += 1;
        account_id
    }

    fn apply_account_create(
        &mut self,
        payer: AccountId,
        key: PublicKey,
        initial_balance: Hbar,
    ) -> Result<AccountId, Status> {
        if initial_balance.is_negative() {
            return Err(Status::InvalidInitialBalance);
        }

        let payer_account = self
            .accounts
            .get_mut(&payer)
            .ok_or(Status::PayerAccountNotFound)?;
        payer_account.balance = payer_account
            .balance
            .checked_sub(initial_balance)
            .filter(|balance| !balance.is_negative())
            .ok_or(Status::InsufficientPayerBalance)?;

        let account_id = self.allocate_account_id();
        self.accounts.insert(
            account_id,
            LocalAccount {
                key,
                balance: initial_balance,
            },
        );
        Ok(account_id)
    }

    fn apply_transfer(
        &mut self,
        transaction: &SignedTransaction,
        transfers: &[HbarTransfer],
    ) -> Result<(), Status> {
        let mut seen = HashSet::new();
        for transfer in transfers {
            if !self.accounts.contains_key(&transfer.account_id) {
                return Err(Status::InvalidAccountId);
            }
            if !seen.insert(transfer.account_id) {
                return Err(Status::AccountRepeatedInAccountAmounts);
            }
        }

        let net = transfers
            .iter()
            .try_fold(Hbar::ZERO, |acc, t| acc.checked_add(t.amount));
        if net != Some(Hbar::ZERO) {
            return Err(Status::InvalidAccountAmounts);
        }

        for account_id in transaction.body.debited_accounts() {
            let key = &self.accounts[&account_id].key;
            if !transaction
                .is_signed_by(key)
                .map_err(|_| Status::InvalidSignature)?
            {
                return Err(Status::InvalidSignature);
            }
        }

        // Compute every new balance before touching state so a failed
        // transfer leaves all accounts as they were.
        let mut updated = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            let balance = self.accounts[&transfer.account_id]
                .balance
                .checked_add(transfer.amount)
                .filter(|balance| !balance.is_negative())
                .ok_or(Status::InsufficientAccountBalance)?;
            updated.push((transfer.account_id, balance));
        }

        for (account_id, balance) in updated {
            if let Some(account) = self.accounts.get_mut(&account_id) {
                account.balance = balance;
            }
        }
        Ok(())
    }
}

/// In-memory ledger that behaves like a single consensus node
///
/// Clones share the same ledger state.
#[derive(Debug, Clone)]
pub struct LocalNetwork {
    ledger: Arc<RwLock<LocalLedger>>,
    fee_schedule: FeeSchedule,
    latency: Duration,
    requests: Arc<AtomicUsize>,
}

impl LocalNetwork {
    /// Create an empty local network with the default fee schedule
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(RwLock::new(LocalLedger {
                accounts: HashMap::new(),
                receipts: HashMap::new(),
                next_account_num: FIRST_ACCOUNT_NUM,
            })),
            fee_schedule: FeeSchedule::default(),
            latency: Duration::ZERO,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_fee_schedule(mut self, fee_schedule: FeeSchedule) -> Self {
        self.fee_schedule = fee_schedule;
        self
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fee_schedule
    }

    /// Number of requests the network has received
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of accounts on the ledger
    pub fn account_count(&self) -> LedgerResult<usize> {
        Ok(self.read()?.accounts.len())
    }

    /// Create an account outside of consensus, with a network-assigned id
    pub fn create_genesis_account(&self, key: PublicKey, balance: Hbar) -> LedgerResult<AccountId> {
        let mut ledger = self.write()?;
        let account_id = ledger.allocate_account_id();
        ledger
            .accounts
            .insert(account_id, LocalAccount { key, balance });
        Ok(account_id)
    }

    /// Create an account outside of consensus under a caller-chosen id
    pub fn insert_genesis_account(
        &self,
        account_id: AccountId,
        key: PublicKey,
        balance: Hbar,
    ) -> LedgerResult<()> {
        let mut ledger = self.write()?;
        if ledger.accounts.contains_key(&account_id) {
            return Err(LedgerError::Validation(format!(
                "Account '{account_id}' already exists"
            )));
        }

        ledger
            .accounts
            .insert(account_id, LocalAccount { key, balance });
        if account_id.shard == 0 && account_id.realm == 0 {
            ledger.next_account_num = ledger.next_account_num.max(account_id.num + 1);
        }
        info!(account_id = %account_id, balance = %balance, "Seeded local account");
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, LocalLedger>> {
        self.ledger
            .read()
            .map_err(|_| LedgerError::Network("Local ledger state is poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, LocalLedger>> {
        self.ledger
            .write()
            .map_err(|_| LedgerError::Network("Local ledger state is poisoned".to_string()))
    }

    async fn begin_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn process(&self, transaction: &SignedTransaction) -> LedgerResult<TransactionId> {
        let transaction_id = transaction.transaction_id;
        let precheck = |status| LedgerError::Precheck {
            transaction_id,
            status,
        };

        let mut ledger = self.write()?;

        let payer = ledger
            .accounts
            .get(&transaction_id.account_id)
            .cloned()
            .ok_or_else(|| precheck(Status::PayerAccountNotFound))?;

        let expires_at = transaction_id.valid_start
            + chrono::Duration::seconds(TRANSACTION_VALID_DURATION_SECS);
        if expires_at < Utc::now() {
            return Err(precheck(Status::TransactionExpired));
        }

        if ledger.receipts.contains_key(&transaction_id) {
            return Err(precheck(Status::DuplicateTransaction));
        }

        if !transaction.is_signed_by(&payer.key)? {
            return Err(precheck(Status::InvalidSignature));
        }

        let fee = self.fee_schedule.fee_for(&transaction.body);
        if transaction.max_transaction_fee < fee {
            return Err(precheck(Status::InsufficientTxFee));
        }
        if payer.balance < fee {
            return Err(precheck(Status::InsufficientPayerBalance));
        }

        // Past precheck: the payer is charged whatever the outcome.
        if let Some(payer) = ledger.accounts.get_mut(&transaction_id.account_id) {
            payer.balance = Hbar::from_tinybars(payer.balance.to_tinybars() - fee.to_tinybars());
        }

        let outcome = match &transaction.body {
            TransactionBody::AccountCreate {
                key,
                initial_balance,
                ..
            } => ledger
                .apply_account_create(transaction_id.account_id, *key, *initial_balance)
                .map(Some),
            TransactionBody::CryptoTransfer { transfers, .. } => {
                ledger.apply_transfer(transaction, transfers).map(|_| None)
            }
        };

        let receipt = match outcome {
            Ok(account_id) => TransactionReceipt {
                transaction_id,
                status: Status::Success,
                account_id,
            },
            Err(status) => TransactionReceipt {
                transaction_id,
                status,
                account_id: None,
            },
        };
        debug!(
            transaction_id = %transaction_id,
            status = %receipt.status,
            fee = %fee,
            "Reached consensus"
        );
        ledger.receipts.insert(transaction_id, receipt);

        Ok(transaction_id)
    }
}

impl Default for LocalNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerNetwork for LocalNetwork {
    async fn submit(&self, transaction: &SignedTransaction) -> LedgerResult<TransactionId> {
        self.begin_request().await;
        self.process(transaction)
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> LedgerResult<TransactionReceipt> {
        self.begin_request().await;
        self.read()?
            .receipts
            .get(transaction_id)
            .cloned()
            .ok_or(LedgerError::Precheck {
                transaction_id: *transaction_id,
                status: Status::ReceiptNotFound,
            })
    }

    async fn get_account_balance(&self, query: &BalanceQuery) -> LedgerResult<AccountBalance> {
        self.begin_request().await;
        let ledger = self.read()?;
        let account = ledger
            .accounts
            .get(&query.account_id)
            .ok_or(LedgerError::AccountNotFound(query.account_id))?;

        Ok(AccountBalance {
            account_id: query.account_id,
            hbars: account.balance,
        })
    }

    async fn get_query_cost(&self, _query: &BalanceQuery) -> LedgerResult<Hbar> {
        self.begin_request().await;
        Ok(self.fee_schedule.balance_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::ledger::patterns;

    fn signed(
        payer: AccountId,
        body: TransactionBody,
        signers: &[&PrivateKey],
    ) -> SignedTransaction {
        let mut transaction = SignedTransaction::new(
            TransactionId::new(payer, Utc::now()),
            Hbar::new(2),
            body,
        );
        for signer in signers {
            transaction = transaction.sign_with(*signer).unwrap();
        }
        transaction
    }

    async fn balance(network: &LocalNetwork, account_id: AccountId) -> Hbar {
        network
            .get_account_balance(&BalanceQuery { account_id })
            .await
            .unwrap()
            .hbars
    }

    #[tokio::test]
    async fn test_account_create_charges_payer() {
        let network = LocalNetwork::new();
        let operator_key = PrivateKey::generate_ed25519().unwrap();
        let operator = network
            .create_genesis_account(operator_key.public_key().unwrap(), Hbar::new(10))
            .unwrap();
        assert_eq!(operator, AccountId::new(FIRST_ACCOUNT_NUM));

        let new_key = PrivateKey::generate_ed25519().unwrap();
        let body = patterns::create_funded_account(
            new_key.public_key().unwrap(),
            Hbar::from_tinybars(1000),
        )
        .unwrap();
        let transaction = signed(operator, body, &[&operator_key]);

        let id = network.submit(&transaction).await.unwrap();
        let receipt = network.get_receipt(&id).await.unwrap();
        assert_eq!(receipt.status, Status::Success);
        let new_account = receipt.account_id.unwrap();
        assert_eq!(new_account, AccountId::new(FIRST_ACCOUNT_NUM + 1));

        assert_eq!(balance(&network, new_account).await, Hbar::from_tinybars(1000));
        let expected = Hbar::new(10).to_tinybars()
            - 1000
            - network.fee_schedule().account_create.to_tinybars();
        assert_eq!(balance(&network, operator).await, Hbar::from_tinybars(expected));
    }

    #[tokio::test]
    async fn test_precheck_rejects_bad_signature() {
        let network = LocalNetwork::new();
        let operator_key = PrivateKey::generate_ed25519().unwrap();
        let impostor = PrivateKey::generate_ed25519().unwrap();
        let operator = network
            .create_genesis_account(operator_key.public_key().unwrap(), Hbar::new(10))
            .unwrap();
        let other = network
            .create_genesis_account(impostor.public_key().unwrap(), Hbar::ZERO)
            .unwrap();

        let body =
            patterns::create_simple_transfer(operator, other, Hbar::from_tinybars(10)).unwrap();
        let transaction = signed(operator, body, &[&impostor]);

        let err = network.submit(&transaction).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::InvalidSignature));
        assert_eq!(balance(&network, operator).await, Hbar::new(10));
    }

    #[tokio::test]
    async fn test_precheck_rejects_unknown_payer_and_duplicates() {
        let network = LocalNetwork::new();
        let key = PrivateKey::generate_ed25519().unwrap();
        let body = patterns::create_funded_account(key.public_key().unwrap(), Hbar::ZERO).unwrap();

        let orphan = signed(AccountId::new(77), body.clone(), &[&key]);
        let err = network.submit(&orphan).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::PayerAccountNotFound));

        let payer = network
            .create_genesis_account(key.public_key().unwrap(), Hbar::new(1))
            .unwrap();
        let transaction = signed(payer, body, &[&key]);
        network.submit(&transaction).await.unwrap();
        let err = network.submit(&transaction).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::DuplicateTransaction));
    }

    #[tokio::test]
    async fn test_precheck_rejects_expired_and_underfunded() {
        let network = LocalNetwork::new();
        let key = PrivateKey::generate_ed25519().unwrap();
        let payer = network
            .create_genesis_account(key.public_key().unwrap(), Hbar::from_tinybars(10))
            .unwrap();
        let body = patterns::create_funded_account(key.public_key().unwrap(), Hbar::ZERO).unwrap();

        let stale = SignedTransaction::new(
            TransactionId::new(payer, Utc::now() - chrono::Duration::seconds(600)),
            Hbar::new(2),
            body.clone(),
        )
        .sign_with(&key)
        .unwrap();
        let err = network.submit(&stale).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::TransactionExpired));

        let cheap = SignedTransaction::new(
            TransactionId::new(payer, Utc::now()),
            Hbar::from_tinybars(1),
            body.clone(),
        )
        .sign_with(&key)
        .unwrap();
        let err = network.submit(&cheap).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::InsufficientTxFee));

        let transaction = signed(payer, body, &[&key]);
        let err = network.submit(&transaction).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::InsufficientPayerBalance));
    }

    #[tokio::test]
    async fn test_failed_transfer_only_charges_fee() {
        let network = LocalNetwork::new();
        let operator_key = PrivateKey::generate_ed25519().unwrap();
        let other_key = PrivateKey::generate_ed25519().unwrap();
        let operator = network
            .create_genesis_account(operator_key.public_key().unwrap(), Hbar::new(1))
            .unwrap();
        let other = network
            .create_genesis_account(other_key.public_key().unwrap(), Hbar::from_tinybars(50))
            .unwrap();

        // Pull from an account that did not sign.
        let body =
            patterns::create_simple_transfer(other, operator, Hbar::from_tinybars(50)).unwrap();
        let id = network
            .submit(&signed(operator, body, &[&operator_key]))
            .await
            .unwrap();
        let receipt = network.get_receipt(&id).await.unwrap();
        assert_eq!(receipt.status, Status::InvalidSignature);

        // Overdraw the other account even though it signed.
        let body =
            patterns::create_simple_transfer(other, operator, Hbar::from_tinybars(51)).unwrap();
        let id = network
            .submit(&signed(operator, body, &[&operator_key, &other_key]))
            .await
            .unwrap();
        let receipt = network.get_receipt(&id).await.unwrap();
        assert_eq!(receipt.status, Status::InsufficientAccountBalance);

        let fee = network.fee_schedule().crypto_transfer.to_tinybars();
        assert_eq!(balance(&network, other).await, Hbar::from_tinybars(50));
        assert_eq!(
            balance(&network, operator).await,
            Hbar::from_tinybars(Hbar::new(1).to_tinybars() - 2 * fee)
        );
    }

    #[tokio::test]
    async fn test_network_enforces_zero_sum_and_known_accounts() {
        let network = LocalNetwork::new();
        let key = PrivateKey::generate_ed25519().unwrap();
        let operator = network
            .create_genesis_account(key.public_key().unwrap(), Hbar::new(1))
            .unwrap();

        // Bodies built by hand skip the builder's validation.
        let unbalanced = TransactionBody::CryptoTransfer {
            transfers: vec![
                HbarTransfer {
                    account_id: operator,
                    amount: Hbar::from_tinybars(-10),
                },
                HbarTransfer {
                    account_id: operator,
                    amount: Hbar::from_tinybars(5),
                },
            ],
            memo: String::new(),
        };
        let id = network
            .submit(&signed(operator, unbalanced, &[&key]))
            .await
            .unwrap();
        assert_eq!(
            network.get_receipt(&id).await.unwrap().status,
            Status::AccountRepeatedInAccountAmounts
        );

        let body = patterns::create_simple_transfer(
            operator,
            AccountId::new(9999),
            Hbar::from_tinybars(10),
        )
        .unwrap();
        let id = network.submit(&signed(operator, body, &[&key])).await.unwrap();
        assert_eq!(
            network.get_receipt(&id).await.unwrap().status,
            Status::InvalidAccountId
        );
    }

    #[tokio::test]
    async fn test_unknown_receipt_and_account() {
        let network = LocalNetwork::new();
        let id = TransactionId::new(AccountId::new(2), Utc::now());
        let err = network.get_receipt(&id).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::ReceiptNotFound));

        let err = network
            .get_account_balance(&BalanceQuery {
                account_id: AccountId::new(5),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
        assert_eq!(network.request_count(), 2);
    }

    #[test]
    fn test_seeded_account_ids_are_not_reused() {
        let network = LocalNetwork::new();
        let key = PrivateKey::generate_ed25519().unwrap().public_key().unwrap();

        network
            .insert_genesis_account(AccountId::new(5000), key, Hbar::new(1))
            .unwrap();
        assert!(network
            .insert_genesis_account(AccountId::new(5000), key, Hbar::new(1))
            .is_err());

        let next = network.create_genesis_account(key, Hbar::ZERO).unwrap();
        assert_eq!(next, AccountId::new(5001));
        assert_eq!(network.account_count().unwrap(), 2);
    }
}
