//! Workflow runner that walks a new account through creation, funding and
//! balance checks

use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::crypto::PrivateKey;
use crate::ledger::{AccountBalanceQuery, AccountCreateTransaction, Client, TransferTransaction};
use crate::traits::*;
use crate::types::*;

/// Balance the new account starts with
pub const NEW_ACCOUNT_INITIAL_BALANCE: Hbar = Hbar::from_tinybars(1000);

/// Amount the operator sends to the new account
pub const TRANSFER_AMOUNT: Hbar = Hbar::from_tinybars(1000);

/// Progress reported by the workflow, in the order it happens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    AccountCreated(AccountId),
    InitialBalance(Hbar),
    TransferCompleted(Status),
    QueryCost(Hbar),
    FinalBalance(Hbar),
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowEvent::AccountCreated(account_id) => {
                write!(f, "The new account ID is: {account_id}")
            }
            WorkflowEvent::InitialBalance(balance) => write!(
                f,
                "The new account balance is: {} tinybar.",
                balance.to_tinybars()
            ),
            WorkflowEvent::TransferCompleted(status) => write!(
                f,
                "The transfer transaction from my account to the new account was: {status}"
            ),
            WorkflowEvent::QueryCost(cost) => write!(f, "The cost of query is: {cost}"),
            WorkflowEvent::FinalBalance(balance) => write!(
                f,
                "The account balance after the transfer is: {} tinybar.",
                balance.to_tinybars()
            ),
        }
    }
}

/// Receives workflow progress as it happens
pub trait WorkflowObserver: Send {
    fn on_event(&mut self, event: &WorkflowEvent);
}

/// Prints every event on its own line to stdout
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl WorkflowObserver for ConsoleObserver {
    fn on_event(&mut self, event: &WorkflowEvent) {
        println!("{event}");
    }
}

impl WorkflowObserver for Vec<WorkflowEvent> {
    fn on_event(&mut self, event: &WorkflowEvent) {
        self.push(event.clone());
    }
}

/// Everything a completed workflow run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub operator_account_id: AccountId,
    pub new_account_id: AccountId,
    pub initial_balance: Hbar,
    pub transfer_status: Status,
    pub query_cost: Hbar,
    pub final_balance: Hbar,
    pub account_create_receipt: TransactionReceipt,
    pub transfer_receipt: TransactionReceipt,
}

/// Runs the fixed account walkthrough against one client
pub struct WorkflowRunner<N: LedgerNetwork> {
    client: Client<N>,
    initial_balance: Hbar,
    transfer_amount: Hbar,
}

impl<N: LedgerNetwork> WorkflowRunner<N> {
    /// Create a runner around a client that already has an operator
    pub fn new(client: Client<N>) -> Self {
        Self {
            client,
            initial_balance: NEW_ACCOUNT_INITIAL_BALANCE,
            transfer_amount: TRANSFER_AMOUNT,
        }
    }

    /// Build the client from loaded configuration and bind its operator
    pub fn from_config(config: &Config, network: N) -> Self {
        let client = Client::for_network(network)
            .with_operator(
                config.operator.account_id,
                config.operator.private_key.clone(),
            )
            .with_max_transaction_fee(config.max_transaction_fee)
            .with_request_timeout(config.request_timeout);
        Self::new(client)
    }

    pub fn client(&self) -> &Client<N> {
        &self.client
    }

    /// Execute every step in order; the first failure aborts the rest
    pub async fn run(&self, observer: &mut dyn WorkflowObserver) -> LedgerResult<WorkflowReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("workflow", run_id = %run_id);
        self.run_steps(run_id, observer).instrument(span).await
    }

    async fn run_steps(
        &self,
        run_id: Uuid,
        observer: &mut dyn WorkflowObserver,
    ) -> LedgerResult<WorkflowReport> {
        let operator_account_id = self.client.operator_account_id()?;

        let new_account_key = PrivateKey::generate_ed25519()?;
        let new_account_public_key = new_account_key.public_key()?;
        // The new account never signs anything in this walkthrough.
        drop(new_account_key);

        info!(initial_balance = %self.initial_balance, "Creating account");
        let account_create_receipt = AccountCreateTransaction::new()
            .key(new_account_public_key)
            .initial_balance(self.initial_balance)
            .execute_for_receipt(&self.client)
            .await?;
        let new_account_id = account_create_receipt.account_id.ok_or_else(|| {
            LedgerError::Network(format!(
                "Receipt for {} does not contain an account ID",
                account_create_receipt.transaction_id
            ))
        })?;
        observer.on_event(&WorkflowEvent::AccountCreated(new_account_id));

        let balance_query = AccountBalanceQuery::new().account_id(new_account_id);
        let initial_balance = balance_query.execute(&self.client).await?.hbars;
        observer.on_event(&WorkflowEvent::InitialBalance(initial_balance));

        info!(
            from = %operator_account_id,
            to = %new_account_id,
            amount = %self.transfer_amount,
            "Transferring"
        );
        let transfer_receipt = TransferTransaction::new()
            .hbar_transfer(operator_account_id, self.transfer_amount.negated())
            .hbar_transfer(new_account_id, self.transfer_amount)
            .execute_for_receipt(&self.client)
            .await?;
        observer.on_event(&WorkflowEvent::TransferCompleted(transfer_receipt.status));

        let query_cost = balance_query.get_cost(&self.client).await?;
        observer.on_event(&WorkflowEvent::QueryCost(query_cost));

        let final_balance = balance_query.execute(&self.client).await?.hbars;
        observer.on_event(&WorkflowEvent::FinalBalance(final_balance));

        info!(
            new_account_id = %new_account_id,
            final_balance = %final_balance,
            "Workflow finished"
        );
        Ok(WorkflowReport {
            run_id,
            operator_account_id,
            new_account_id,
            initial_balance,
            transfer_status: transfer_receipt.status,
            query_cost,
            final_balance,
            account_create_receipt,
            transfer_receipt,
        })
    }
}

/// Load the configuration from `figment`, connect with `connect` and run the
/// walkthrough once. `connect` is only called after both credentials are
/// present and valid.
pub async fn run_quickstart<N, F>(
    figment: Figment,
    connect: F,
    observer: &mut dyn WorkflowObserver,
) -> LedgerResult<WorkflowReport>
where
    N: LedgerNetwork,
    F: FnOnce(&Config) -> LedgerResult<N>,
{
    let config = Config::from_figment(figment)?;
    info!(
        operator = %config.operator.account_id,
        max_transaction_fee = %config.max_transaction_fee,
        timeout = ?config.request_timeout,
        "Loaded configuration"
    );

    let network = connect(&config)?;
    WorkflowRunner::from_config(&config, network)
        .run(observer)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::LocalNetwork;

    #[test]
    fn test_event_lines() {
        assert_eq!(
            WorkflowEvent::AccountCreated(AccountId::new(1002)).to_string(),
            "The new account ID is: 0.0.1002"
        );
        assert_eq!(
            WorkflowEvent::InitialBalance(Hbar::from_tinybars(1000)).to_string(),
            "The new account balance is: 1000 tinybar."
        );
        assert_eq!(
            WorkflowEvent::TransferCompleted(Status::Success).to_string(),
            "The transfer transaction from my account to the new account was: SUCCESS"
        );
        assert_eq!(
            WorkflowEvent::QueryCost(Hbar::from_tinybars(83)).to_string(),
            "The cost of query is: 83 tℏ"
        );
        assert_eq!(
            WorkflowEvent::FinalBalance(Hbar::from_tinybars(2000)).to_string(),
            "The account balance after the transfer is: 2000 tinybar."
        );
    }

    #[tokio::test]
    async fn test_workflow_basic_run() {
        let network = LocalNetwork::new();
        let operator_key = PrivateKey::generate_ed25519().unwrap();
        let operator = network
            .create_genesis_account(operator_key.public_key().unwrap(), Hbar::new(100))
            .unwrap();

        let client = Client::for_network(network)
            .with_operator(operator, operator_key);
        let runner = WorkflowRunner::new(client);

        let mut events: Vec<WorkflowEvent> = Vec::new();
        let report = runner.run(&mut events).await.unwrap();

        assert_ne!(report.new_account_id, operator);
        assert_eq!(report.initial_balance, Hbar::from_tinybars(1000));
        assert_eq!(report.transfer_status, Status::Success);
        assert_eq!(report.final_balance, Hbar::from_tinybars(2000));
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], WorkflowEvent::AccountCreated(report.new_account_id));
    }
}
