//! Core types and data structures for talking to the ledger network

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an account on the network, in `shard.realm.num` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl AccountId {
    /// Create an account id in shard 0, realm 0
    pub fn new(num: u64) -> Self {
        Self {
            shard: 0,
            realm: 0,
            num,
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_part = |part: &str| {
            part.trim().parse::<u64>().map_err(|_| {
                LedgerError::Parse(format!(
                    "Invalid account ID '{s}': expected `shard.realm.num` or `num`"
                ))
            })
        };

        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [num] => Ok(Self::new(parse_part(num)?)),
            [shard, realm, num] => Ok(Self {
                shard: parse_part(shard)?,
                realm: parse_part(realm)?,
                num: parse_part(num)?,
            }),
            _ => Err(LedgerError::Parse(format!(
                "Invalid account ID '{s}': expected `shard.realm.num` or `num`"
            ))),
        }
    }
}

/// Identifier of a submitted transaction: the paying account plus the
/// moment the transaction becomes valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: DateTime<Utc>,
}

impl TransactionId {
    /// Create a transaction id valid from `valid_start`
    pub fn new(account_id: AccountId, valid_start: DateTime<Utc>) -> Self {
        Self {
            account_id,
            valid_start,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.account_id,
            self.valid_start.timestamp(),
            self.valid_start.timestamp_subsec_nanos()
        )
    }
}

/// Denominations of the network's native token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HbarUnit {
    Tinybar,
    Microbar,
    Millibar,
    Hbar,
    Kilobar,
    Megabar,
    Gigabar,
}

impl HbarUnit {
    /// Number of tinybars in one unit
    pub fn tinybars(&self) -> i64 {
        match self {
            HbarUnit::Tinybar => 1,
            HbarUnit::Microbar => 100,
            HbarUnit::Millibar => 100_000,
            HbarUnit::Hbar => TINYBARS_PER_HBAR,
            HbarUnit::Kilobar => 100_000_000_000,
            HbarUnit::Megabar => 100_000_000_000_000,
            HbarUnit::Gigabar => 100_000_000_000_000_000,
        }
    }

    /// Symbol used when displaying amounts in this unit
    pub fn symbol(&self) -> &'static str {
        match self {
            HbarUnit::Tinybar => "tℏ",
            HbarUnit::Microbar => "μℏ",
            HbarUnit::Millibar => "mℏ",
            HbarUnit::Hbar => "ℏ",
            HbarUnit::Kilobar => "kℏ",
            HbarUnit::Megabar => "Mℏ",
            HbarUnit::Gigabar => "Gℏ",
        }
    }
}

const TINYBARS_PER_HBAR: i64 = 100_000_000;

/// Amount of the native token, stored as a signed count of tinybars
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Hbar(i64);

impl Hbar {
    pub const ZERO: Hbar = Hbar(0);

    /// Amount of whole hbars
    ///
    /// # Panics
    ///
    /// Panics if `hbars` does not fit in the tinybar range, in debug and
    /// release builds alike. Use [`Hbar::from_unit`] for untrusted input.
    pub const fn new(hbars: i64) -> Self {
        match hbars.checked_mul(TINYBARS_PER_HBAR) {
            Some(tinybars) => Self(tinybars),
            None => panic!("hbar amount overflows the tinybar range"),
        }
    }

    /// Amount of tinybars
    pub const fn from_tinybars(tinybars: i64) -> Self {
        Self(tinybars)
    }

    /// Convert an amount expressed in `unit` into hbar, rejecting amounts
    /// that are not a whole number of tinybars
    pub fn from_unit(amount: &BigDecimal, unit: HbarUnit) -> LedgerResult<Self> {
        let tinybars = amount * BigDecimal::from(unit.tinybars());
        if !tinybars.is_integer() {
            return Err(LedgerError::Validation(format!(
                "{amount} {} is not a whole number of tinybars",
                unit.symbol()
            )));
        }

        tinybars.to_i64().map(Self).ok_or_else(|| {
            LedgerError::Validation(format!("{amount} {} is out of range", unit.symbol()))
        })
    }

    pub const fn to_tinybars(&self) -> i64 {
        self.0
    }

    pub fn negated(&self) -> Self {
        Self(-self.0)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(&self, other: Hbar) -> Option<Hbar> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Hbar) -> Option<Hbar> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.unsigned_abs() < 10_000 {
            return write!(f, "{} {}", self.0, HbarUnit::Tinybar.symbol());
        }

        let per_hbar = HbarUnit::Hbar.tinybars().unsigned_abs();
        let magnitude = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = magnitude / per_hbar;
        let fraction = magnitude % per_hbar;

        if fraction == 0 {
            write!(f, "{sign}{whole} {}", HbarUnit::Hbar.symbol())
        } else {
            let fraction = format!("{fraction:08}");
            write!(
                f,
                "{sign}{whole}.{} {}",
                fraction.trim_end_matches('0'),
                HbarUnit::Hbar.symbol()
            )
        }
    }
}

impl std::iter::Sum for Hbar {
    fn sum<I: Iterator<Item = Hbar>>(iter: I) -> Self {
        Hbar(iter.map(|h| h.0).sum())
    }
}

/// Outcome codes reported by the network at precheck or in a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    InvalidSignature,
    PayerAccountNotFound,
    InsufficientPayerBalance,
    InsufficientTxFee,
    DuplicateTransaction,
    TransactionExpired,
    InvalidAccountId,
    InsufficientAccountBalance,
    InvalidAccountAmounts,
    AccountRepeatedInAccountAmounts,
    InvalidInitialBalance,
    KeyRequired,
    ReceiptNotFound,
    /// Any other response code, kept as its numeric value
    Other(i32),
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::InvalidSignature => "INVALID_SIGNATURE",
            Status::PayerAccountNotFound => "PAYER_ACCOUNT_NOT_FOUND",
            Status::InsufficientPayerBalance => "INSUFFICIENT_PAYER_BALANCE",
            Status::InsufficientTxFee => "INSUFFICIENT_TX_FEE",
            Status::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            Status::TransactionExpired => "TRANSACTION_EXPIRED",
            Status::InvalidAccountId => "INVALID_ACCOUNT_ID",
            Status::InsufficientAccountBalance => "INSUFFICIENT_ACCOUNT_BALANCE",
            Status::InvalidAccountAmounts => "INVALID_ACCOUNT_AMOUNTS",
            Status::AccountRepeatedInAccountAmounts => "ACCOUNT_REPEATED_IN_ACCOUNT_AMOUNTS",
            Status::InvalidInitialBalance => "INVALID_INITIAL_BALANCE",
            Status::KeyRequired => "KEY_REQUIRED",
            Status::ReceiptNotFound => "RECEIPT_NOT_FOUND",
            Status::Other(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Other(code) => write!(f, "UNKNOWN({code})"),
            status => f.write_str(status.as_str()),
        }
    }
}

/// Consensus confirmation for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Transaction this receipt belongs to
    pub transaction_id: TransactionId,
    /// Consensus outcome
    pub status: Status,
    /// Account created by the transaction, if any
    pub account_id: Option<AccountId>,
}

/// Balance of an account at the time it was queried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub hbars: Hbar,
}

/// Errors that can occur while running against the ledger network
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Transaction {transaction_id} failed precheck with status {status}")]
    Precheck {
        transaction_id: TransactionId,
        status: Status,
    },
    #[error("Receipt for transaction {transaction_id} contained error status {status}")]
    ReceiptStatus {
        transaction_id: TransactionId,
        status: Status,
    },
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl LedgerError {
    /// Whether this error came from talking to the network rather than from
    /// local configuration or input
    pub fn is_network_operation(&self) -> bool {
        matches!(
            self,
            LedgerError::Precheck { .. }
                | LedgerError::ReceiptStatus { .. }
                | LedgerError::AccountNotFound(_)
                | LedgerError::Timeout(_)
                | LedgerError::Network(_)
        )
    }

    /// Status code carried by the error, if the network reported one
    pub fn status(&self) -> Option<Status> {
        match self {
            LedgerError::Precheck { status, .. } | LedgerError::ReceiptStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
