//! Ed25519 keys backed by OpenSSL

use openssl::pkey::{Id, PKey, Private};
use openssl::sign::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::traits::TransactionSigner;
use crate::types::*;

/// DER (PKCS#8) prefix in front of a raw 32 byte Ed25519 private key
const ED25519_PRIVATE_KEY_DER_PREFIX: &str = "302e020100300506032b657004220420";
/// DER (SubjectPublicKeyInfo) prefix in front of a raw 32 byte Ed25519 public key
const ED25519_PUBLIC_KEY_DER_PREFIX: &str = "302a300506032b6570032100";

const ED25519_KEY_LEN: usize = 32;

fn decode_key_hex(input: &str, der_prefix: &str) -> LedgerResult<[u8; ED25519_KEY_LEN]> {
    let input = input.trim();
    let input = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(input).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;

    let prefix = hex::decode(der_prefix).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
    let raw = if bytes.len() == ED25519_KEY_LEN {
        &bytes[..]
    } else if bytes.len() == prefix.len() + ED25519_KEY_LEN && bytes.starts_with(&prefix) {
        &bytes[prefix.len()..]
    } else {
        return Err(LedgerError::InvalidKey(format!(
            "expected a {ED25519_KEY_LEN} byte Ed25519 key, raw or DER encoded, got {} bytes",
            bytes.len()
        )));
    };

    let mut key = [0u8; ED25519_KEY_LEN];
    key.copy_from_slice(raw);
    Ok(key)
}

fn openssl_error(err: openssl::error::ErrorStack) -> LedgerError {
    LedgerError::InvalidKey(err.to_string())
}

/// Ed25519 private key
#[derive(Clone)]
pub struct PrivateKey {
    key: PKey<Private>,
}

impl PrivateKey {
    /// Generate a fresh key from the system CSPRNG
    pub fn generate_ed25519() -> LedgerResult<Self> {
        let key = PKey::generate_ed25519().map_err(openssl_error)?;
        Ok(Self { key })
    }

    /// Build a key from its raw 32 byte seed
    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        if bytes.len() != ED25519_KEY_LEN {
            return Err(LedgerError::InvalidKey(format!(
                "expected {ED25519_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let key = PKey::private_key_from_raw_bytes(bytes, Id::ED25519).map_err(openssl_error)?;
        Ok(Self { key })
    }

    pub fn public_key(&self) -> LedgerResult<PublicKey> {
        let raw = self.key.raw_public_key().map_err(openssl_error)?;
        PublicKey::from_bytes(&raw)
    }

    /// Sign `message` with this key
    pub fn sign(&self, message: &[u8]) -> LedgerResult<Vec<u8>> {
        let mut signer = Signer::new_without_digest(&self.key).map_err(openssl_error)?;
        signer.sign_oneshot_to_vec(message).map_err(openssl_error)
    }

    /// Raw 32 byte seed, hex encoded
    pub fn to_string_raw(&self) -> LedgerResult<String> {
        let raw = self.key.raw_private_key().map_err(openssl_error)?;
        Ok(hex::encode(raw))
    }

    /// DER encoding, hex encoded
    pub fn to_string_der(&self) -> LedgerResult<String> {
        Ok(format!(
            "{ED25519_PRIVATE_KEY_DER_PREFIX}{}",
            self.to_string_raw()?
        ))
    }
}

impl FromStr for PrivateKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = decode_key_hex(s, ED25519_PRIVATE_KEY_DER_PREFIX)?;
        Self::from_bytes(&raw)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.public_key() {
            Ok(public_key) => write!(f, "PrivateKey(public: {public_key})"),
            Err(_) => f.write_str("PrivateKey(..)"),
        }
    }
}

impl TransactionSigner for PrivateKey {
    fn public_key(&self) -> LedgerResult<PublicKey> {
        PrivateKey::public_key(self)
    }

    fn sign(&self, message: &[u8]) -> LedgerResult<Vec<u8>> {
        PrivateKey::sign(self, message)
    }
}

/// Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; ED25519_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let raw: [u8; ED25519_KEY_LEN] = bytes.try_into().map_err(|_| {
            LedgerError::InvalidKey(format!(
                "expected {ED25519_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    pub fn to_bytes(&self) -> [u8; ED25519_KEY_LEN] {
        self.0
    }

    /// Check `signature` over `message`; malformed signatures verify as false
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = PKey::public_key_from_raw_bytes(&self.0, Id::ED25519) else {
            return false;
        };
        let Ok(mut verifier) = Verifier::new_without_digest(&key) else {
            return false;
        };
        verifier.verify_oneshot(signature, message).unwrap_or(false)
    }

    /// Raw 32 byte key, hex encoded
    pub fn to_string_raw(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for PublicKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(decode_key_hex(s, ED25519_PUBLIC_KEY_DER_PREFIX)?))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ED25519_PUBLIC_KEY_DER_PREFIX}{}", self.to_string_raw())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_string_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_signs_and_verifies() {
        let key = PrivateKey::generate_ed25519().unwrap();
        let public_key = key.public_key().unwrap();

        let signature = key.sign(b"transfer 1000").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(public_key.verify(b"transfer 1000", &signature));
        assert!(!public_key.verify(b"transfer 1001", &signature));
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let key = PrivateKey::generate_ed25519().unwrap();
        let other = PrivateKey::generate_ed25519().unwrap();

        let signature = other.sign(b"payload").unwrap();
        assert!(!key.public_key().unwrap().verify(b"payload", &signature));
        assert!(!key.public_key().unwrap().verify(b"payload", b"short"));
    }

    #[test]
    fn test_private_key_parses_raw_and_der() {
        let key = PrivateKey::generate_ed25519().unwrap();

        let from_raw: PrivateKey = key.to_string_raw().unwrap().parse().unwrap();
        let from_der: PrivateKey = key.to_string_der().unwrap().parse().unwrap();
        let prefixed: PrivateKey = format!("0x{}", key.to_string_raw().unwrap())
            .parse()
            .unwrap();

        let expected = key.public_key().unwrap();
        assert_eq!(from_raw.public_key().unwrap(), expected);
        assert_eq!(from_der.public_key().unwrap(), expected);
        assert_eq!(prefixed.public_key().unwrap(), expected);
    }

    #[test]
    fn test_public_key_parses_display_output() {
        let public_key = PrivateKey::generate_ed25519()
            .unwrap()
            .public_key()
            .unwrap();
        let parsed: PublicKey = public_key.to_string().parse().unwrap();
        assert_eq!(parsed, public_key);
        assert!(public_key.to_string().starts_with(ED25519_PUBLIC_KEY_DER_PREFIX));
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        assert!("not-hex".parse::<PrivateKey>().is_err());
        assert!("abcd".parse::<PrivateKey>().is_err());
        assert!(PublicKey::from_bytes(&[0u8; 31]).is_err());
        // Public key DER prefix is not accepted for private keys.
        let bogus = format!("{ED25519_PUBLIC_KEY_DER_PREFIX}{}", "00".repeat(32));
        assert!(bogus.parse::<PrivateKey>().is_err());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let key = PrivateKey::generate_ed25519().unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&key.to_string_raw().unwrap()));
    }
}
