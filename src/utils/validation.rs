//! Validation utilities

use std::collections::HashSet;

use crate::ledger::HbarTransfer;
use crate::types::*;

/// Longest memo the network accepts, in bytes
pub const MAX_MEMO_BYTES: usize = 100;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: Hbar) -> LedgerResult<()> {
    if amount.to_tinybars() <= 0 {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an amount is zero or positive
pub fn validate_non_negative_amount(amount: Hbar) -> LedgerResult<()> {
    if amount.is_negative() {
        Err(LedgerError::Validation(format!(
            "Amount cannot be negative: {amount}"
        )))
    } else {
        Ok(())
    }
}

/// Validate that an account ID refers to a real account number
pub fn validate_account_id(account_id: &AccountId) -> LedgerResult<()> {
    if account_id.num == 0 {
        return Err(LedgerError::Validation(format!(
            "Account ID '{account_id}' does not name an account"
        )));
    }

    Ok(())
}

/// Validate that a memo fits the network limit
pub fn validate_memo(memo: &str) -> LedgerResult<()> {
    if memo.len() > MAX_MEMO_BYTES {
        return Err(LedgerError::Validation(format!(
            "Memo cannot exceed {MAX_MEMO_BYTES} bytes"
        )));
    }

    Ok(())
}

/// Validate a list of hbar transfers: at least two legs, no zero legs, each
/// account at most once, and debits equal to credits
pub fn validate_transfer_list(transfers: &[HbarTransfer]) -> LedgerResult<()> {
    if transfers.len() < 2 {
        return Err(LedgerError::Validation(
            "Transfer must move hbar between at least two accounts".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for transfer in transfers {
        validate_account_id(&transfer.account_id)?;

        if transfer.amount == Hbar::ZERO {
            return Err(LedgerError::Validation(format!(
                "Transfer amount for account '{}' cannot be zero",
                transfer.account_id
            )));
        }

        if !seen.insert(transfer.account_id) {
            return Err(LedgerError::Validation(format!(
                "Account '{}' appears multiple times in transfer list",
                transfer.account_id
            )));
        }
    }

    let total = transfers
        .iter()
        .try_fold(Hbar::ZERO, |acc, t| acc.checked_add(t.amount))
        .ok_or_else(|| LedgerError::Validation("Transfer amounts overflow".to_string()))?;
    if total != Hbar::ZERO {
        return Err(LedgerError::Validation(format!(
            "Transfer is not balanced: amounts sum to {total}"
        )));
    }

    Ok(())
}
