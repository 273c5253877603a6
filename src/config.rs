//! Runtime configuration loaded from the environment

use bigdecimal::BigDecimal;
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{de::Visitor, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::crypto::PrivateKey;
use crate::ledger::DEFAULT_MAX_TRANSACTION_FEE;
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

const MISSING_CREDENTIALS: &str =
    "Environment variables MY_ACCOUNT_ID and MY_PRIVATE_KEY must be present";

/// Credential variables, read by exact name
const CREDENTIAL_VARS: [&str; 2] = ["MY_ACCOUNT_ID", "MY_PRIVATE_KEY"];

/// Figment parses environment values, so `MY_ACCOUNT_ID=1234` arrives as an
/// integer and `LEDGER_MAX_TRANSACTION_FEE=0.5` as a float. Both are turned
/// back into the text that was written.
fn env_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvText;

    impl<'de> Visitor<'de> for EnvText {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_string<E: serde::de::Error>(self, value: String) -> Result<Self::Value, E> {
            Ok(Some(value))
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        // Shortest representation that parses back to the same f32.
        fn visit_f32<E: serde::de::Error>(self, value: f32) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_bool<E: serde::de::Error>(self, value: bool) -> Result<Self::Value, E> {
            Err(E::custom(format!("expected a string or a number, found `{value}`")))
        }
    }

    deserializer.deserialize_option(EnvText)
}

/// Raw configuration as read from the environment, before validation
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RawConfig {
    /// Operator account id (`MY_ACCOUNT_ID`)
    #[serde(default, deserialize_with = "env_text")]
    pub account_id: Option<String>,
    /// Operator private key, raw or DER hex (`MY_PRIVATE_KEY`)
    #[serde(default, deserialize_with = "env_text")]
    pub private_key: Option<String>,
    /// Fee ceiling per transaction in hbar, e.g. `2` or `0.5`
    /// (`LEDGER_MAX_TRANSACTION_FEE`)
    #[serde(default, deserialize_with = "env_text")]
    pub max_transaction_fee: Option<String>,
    /// Upper bound on any single network call (`LEDGER_REQUEST_TIMEOUT_SECS`)
    pub request_timeout_secs: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            private_key: None,
            max_transaction_fee: None,
            request_timeout_secs: 30,
        }
    }
}

impl RawConfig {
    /// Defaults overlaid with the two credential variables and any
    /// `LEDGER_*` settings from the process environment
    pub fn figment() -> Figment {
        let credentials = Env::raw()
            .only(&CREDENTIAL_VARS)
            .map(|key| key["MY_".len()..].into());

        Figment::from(Serialized::defaults(RawConfig::default()))
            .merge(credentials)
            .merge(Env::prefixed("LEDGER_"))
    }

    /// Reads the configuration from the process environment on top of the
    /// default values
    pub fn read_from_env() -> LedgerResult<Self> {
        Self::extract(Self::figment())
    }

    pub fn extract(figment: Figment) -> LedgerResult<Self> {
        figment
            .extract()
            .map_err(|e| LedgerError::Configuration(e.to_string()))
    }
}

/// Operator account and the key that signs for it
#[derive(Debug, Clone)]
pub struct OperatorCredentials {
    pub account_id: AccountId,
    pub private_key: PrivateKey,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub operator: OperatorCredentials,
    pub max_transaction_fee: Hbar,
    pub request_timeout: Duration,
}

impl Config {
    /// Load and validate configuration from the environment
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_figment(RawConfig::figment())
    }

    /// Load and validate configuration from any figment
    pub fn from_figment(figment: Figment) -> LedgerResult<Self> {
        Self::try_from(RawConfig::extract(figment)?)
    }
}

fn parse_max_transaction_fee(value: &str) -> LedgerResult<Hbar> {
    let invalid = |reason: String| {
        LedgerError::Configuration(format!("LEDGER_MAX_TRANSACTION_FEE: {reason}"))
    };

    let amount = BigDecimal::from_str(value.trim())
        .map_err(|_| invalid(format!("'{value}' is not a decimal hbar amount")))?;
    let fee = Hbar::from_unit(&amount, HbarUnit::Hbar)
        .map_err(|e| invalid(e.to_string()))?;
    validate_positive_amount(fee).map_err(|e| invalid(e.to_string()))?;
    Ok(fee)
}

impl TryFrom<RawConfig> for Config {
    type Error = LedgerError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let (Some(account_id), Some(private_key)) =
            (present(raw.account_id), present(raw.private_key))
        else {
            return Err(LedgerError::Configuration(MISSING_CREDENTIALS.to_string()));
        };

        let account_id = account_id
            .parse::<AccountId>()
            .map_err(|e| LedgerError::Configuration(format!("MY_ACCOUNT_ID: {e}")))?;
        let private_key = private_key
            .parse::<PrivateKey>()
            .map_err(|e| LedgerError::Configuration(format!("MY_PRIVATE_KEY: {e}")))?;

        let max_transaction_fee = match present(raw.max_transaction_fee) {
            Some(value) => parse_max_transaction_fee(&value)?,
            None => DEFAULT_MAX_TRANSACTION_FEE,
        };
        if raw.request_timeout_secs == 0 {
            return Err(LedgerError::Configuration(
                "LEDGER_REQUEST_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            operator: OperatorCredentials {
                account_id,
                private_key,
            },
            max_transaction_fee,
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn figment_with(values: &[(&str, &str)]) -> Figment {
        values.iter().fold(
            Figment::from(Serialized::defaults(RawConfig::default())),
            |figment, (key, value)| figment.merge(Serialized::default(key, value)),
        )
    }

    #[test]
    fn test_config_from_values() {
        let key = PrivateKey::generate_ed25519().unwrap();
        let der = key.to_string_der().unwrap();
        let config = Config::from_figment(figment_with(&[
            ("account_id", "0.0.1234"),
            ("private_key", der.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.operator.account_id, AccountId::new(1234));
        assert_eq!(
            config.operator.private_key.public_key().unwrap(),
            key.public_key().unwrap()
        );
        assert_eq!(config.max_transaction_fee, DEFAULT_MAX_TRANSACTION_FEE);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_numeric_account_id() {
        let key = PrivateKey::generate_ed25519().unwrap();
        let raw = RawConfig::extract(
            Figment::from(Serialized::defaults(RawConfig::default()))
                .merge(Serialized::default("account_id", 1234))
                .merge(Serialized::default(
                    "private_key",
                    key.to_string_raw().unwrap(),
                )),
        )
        .unwrap();
        assert_eq!(raw.account_id.as_deref(), Some("1234"));
        assert_eq!(
            Config::try_from(raw).unwrap().operator.account_id,
            AccountId::new(1234)
        );
    }

    #[test]
    fn test_missing_credentials() {
        let key = PrivateKey::generate_ed25519().unwrap().to_string_raw().unwrap();

        for values in [
            vec![],
            vec![("account_id", "0.0.2")],
            vec![("private_key", key.as_str())],
            vec![("account_id", ""), ("private_key", key.as_str())],
            vec![("account_id", "0.0.2"), ("private_key", "  ")],
        ] {
            let raw = RawConfig::extract(figment_with(&values)).unwrap();
            let err = Config::try_from(raw).unwrap_err();
            match err {
                LedgerError::Configuration(message) => assert_eq!(message, MISSING_CREDENTIALS),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_malformed_credentials() {
        let raw = RawConfig::extract(figment_with(&[
            ("account_id", "zero.zero.two"),
            ("private_key", "00"),
        ]))
        .unwrap();
        assert!(matches!(
            Config::try_from(raw),
            Err(LedgerError::Configuration(_))
        ));
    }

    #[test]
    fn test_max_transaction_fee() {
        let key = PrivateKey::generate_ed25519().unwrap().to_string_raw().unwrap();
        let with_fee = |fee: &str| {
            Config::from_figment(figment_with(&[
                ("account_id", "0.0.2"),
                ("private_key", key.as_str()),
                ("max_transaction_fee", fee),
            ]))
        };

        assert_eq!(with_fee("5").unwrap().max_transaction_fee, Hbar::new(5));
        assert_eq!(
            with_fee("0.5").unwrap().max_transaction_fee,
            Hbar::from_tinybars(50_000_000)
        );
        for bad in ["0", "-1", "lots", "0.000000001"] {
            match with_fee(bad).unwrap_err() {
                LedgerError::Configuration(message) => {
                    assert!(message.starts_with("LEDGER_MAX_TRANSACTION_FEE"), "{message}")
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_environment_reads_credentials_by_exact_name() {
        Jail::expect_with(|jail| {
            let key = PrivateKey::generate_ed25519().unwrap();
            jail.set_env("MY_ACCOUNT_ID", "0.0.4321");
            jail.set_env("MY_PRIVATE_KEY", key.to_string_der().unwrap());
            jail.set_env("MY_REQUEST_TIMEOUT_SECS", "not a number");
            jail.set_env("LEDGER_MAX_TRANSACTION_FEE", "0.1");
            jail.set_env("LEDGER_REQUEST_TIMEOUT_SECS", "5");

            let config = Config::from_env().unwrap();
            assert_eq!(config.operator.account_id, AccountId::new(4321));
            assert_eq!(config.max_transaction_fee, Hbar::from_tinybars(10_000_000));
            assert_eq!(config.request_timeout, Duration::from_secs(5));
            Ok(())
        });
    }

    #[test]
    fn test_environment_values_parsed_as_numbers() {
        Jail::expect_with(|jail| {
            let key = PrivateKey::generate_ed25519().unwrap();
            jail.set_env("MY_PRIVATE_KEY", key.to_string_raw().unwrap());

            // Plain numbers arrive as integers.
            jail.set_env("MY_ACCOUNT_ID", "1234");
            let raw = RawConfig::read_from_env().unwrap();
            assert_eq!(raw.account_id.as_deref(), Some("1234"));

            // A value with a single dot arrives as a float and is rejected as
            // an account id, with the variable named.
            jail.set_env("MY_ACCOUNT_ID", "1.5");
            let raw = RawConfig::read_from_env().unwrap();
            assert_eq!(raw.account_id.as_deref(), Some("1.5"));
            match Config::try_from(raw).unwrap_err() {
                LedgerError::Configuration(message) => {
                    assert!(message.starts_with("MY_ACCOUNT_ID"), "{message}")
                }
                other => panic!("unexpected error: {other}"),
            }

            jail.set_env("MY_ACCOUNT_ID", "true");
            assert!(matches!(
                RawConfig::read_from_env(),
                Err(LedgerError::Configuration(_))
            ));
            Ok(())
        });
    }
}
