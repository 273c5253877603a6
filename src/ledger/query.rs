//! Read-only queries against the network

use serde::{Deserialize, Serialize};

use crate::ledger::Client;
use crate::traits::*;
use crate::types::*;

/// Resolved balance query, as handed to the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceQuery {
    pub account_id: AccountId,
}

/// Builder for a query of an account's hbar balance
#[derive(Debug, Clone, Default)]
pub struct AccountBalanceQuery {
    account_id: Option<AccountId>,
}

impl AccountBalanceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account whose balance is requested
    pub fn account_id(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn build(&self) -> LedgerResult<BalanceQuery> {
        let account_id = self.account_id.ok_or_else(|| {
            LedgerError::Validation("Balance query requires an account ID".to_string())
        })?;
        Ok(BalanceQuery { account_id })
    }

    /// Run the query
    pub async fn execute<N: LedgerNetwork>(
        &self,
        client: &Client<N>,
    ) -> LedgerResult<AccountBalance> {
        client.query_balance(&self.build()?).await
    }

    /// Ask what the network would charge for this query without running it
    pub async fn get_cost<N: LedgerNetwork>(&self, client: &Client<N>) -> LedgerResult<Hbar> {
        client.query_cost(&self.build()?).await
    }
}
