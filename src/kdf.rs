//! Passphrase key derivation using salted BLAKE2b
//!
//! The key is the BLAKE2b digest of the UTF-8 passphrase, with the salt
//! placed in the BLAKE2b parameter block and the digest length set to the
//! requested key size. No BLAKE2b key is used.

use std::fmt;

use rand::Rng;
use zeroize::Zeroizing;

use crate::error::{GrasscryptError, Result};

/// Length of salt in bytes (BLAKE2b's native salt size)
pub const SALT_LEN: usize = 16;

/// Length of the key handed to the cipher, and of the stored verifier
pub const KEY_LEN: usize = 32;

/// Largest digest BLAKE2b can produce
pub const MAX_DIGEST_LEN: usize = 64;

/// Key material derived from a passphrase, together with the salt that
/// produced it. Wiped from memory on drop.
pub struct DerivedKey {
    key: Zeroizing<Vec<u8>>,
    salt: [u8; SALT_LEN],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .field("salt", &hex::encode(self.salt))
            .finish()
    }
}

/// Generate a fresh random salt from the thread-local CSPRNG
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Derive `digest_size` bytes of key material from a passphrase
///
/// When `salt` is `None` a fresh one is generated. Arguments are checked
/// before any randomness is consumed.
pub fn derive(
    passphrase: &str,
    salt: Option<&[u8; SALT_LEN]>,
    digest_size: usize,
) -> Result<DerivedKey> {
    if passphrase.is_empty() {
        return Err(GrasscryptError::invalid_argument("passphrase cannot be empty"));
    }
    if !(1..=MAX_DIGEST_LEN).contains(&digest_size) {
        return Err(GrasscryptError::invalid_argument(format!(
            "digest size must be between 1 and {} bytes, got {}",
            MAX_DIGEST_LEN, digest_size
        )));
    }

    let salt = match salt {
        Some(salt) => *salt,
        None => generate_salt(),
    };

    let hash = blake2b_simd::Params::new()
        .hash_length(digest_size)
        .salt(&salt)
        .hash(passphrase.as_bytes());

    Ok(DerivedKey {
        key: Zeroizing::new(hash.as_bytes().to_vec()),
        salt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_known_digest() {
        // Matches Python's hashlib.blake2b(b"secret", digest_size=32, salt=b"\x42" * 16)
        let key = derive("secret", Some(&[0x42; SALT_LEN]), KEY_LEN).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "a3ca3afe61eb662af6d51dc67100359d2e121c0514693d6c171944f09664ce42"
        );
        assert_eq!(key.salt(), &[0x42; SALT_LEN]);
    }

    #[test]
    fn test_known_digest_short() {
        let key = derive("secret", Some(&[0x42; SALT_LEN]), 16).unwrap();
        assert_eq!(hex::encode(key.as_bytes()), "b857be4206616d82c9b283878169aac5");
    }

    #[test]
    fn test_non_ascii_passphrase() {
        let salt: [u8; SALT_LEN] = core::array::from_fn(|i| i as u8);
        let key = derive("пароль", Some(&salt), KEY_LEN).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "d2c67be58677b7b8de46f7dadd95e609af0cff1d0d265123f92f559759659ccf"
        );
    }

    #[test]
    fn test_deterministic_for_same_salt() {
        let salt = [7u8; SALT_LEN];
        let a = derive("pass12345", Some(&salt), KEY_LEN).unwrap();
        let b = derive("pass12345", Some(&salt), KEY_LEN).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_salt_changes_key() {
        let a = derive("pass12345", Some(&[1u8; SALT_LEN]), KEY_LEN).unwrap();
        let b = derive("pass12345", Some(&[2u8; SALT_LEN]), KEY_LEN).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_generated_salt_is_fresh() {
        let a = derive("pass12345", None, KEY_LEN).unwrap();
        let b = derive("pass12345", None, KEY_LEN).unwrap();
        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_digest_sizes() {
        for size in [1, KEY_LEN, MAX_DIGEST_LEN] {
            let key = derive("x", None, size).unwrap();
            assert_eq!(key.as_bytes().len(), size);
        }
    }

    #[test]
    fn test_rejects_bad_digest_size() {
        for size in [0, MAX_DIGEST_LEN + 1] {
            let err = derive("x", None, size).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::InvalidArgument));
        }
    }

    #[test]
    fn test_rejects_empty_passphrase() {
        let err = derive("", None, KEY_LEN).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = derive("secret", Some(&[0x42; SALT_LEN]), KEY_LEN).unwrap();
        let shown = format!("{:?}", key);
        assert!(shown.contains("REDACTED"));
        assert!(!shown.contains("a3ca3afe"));
    }
}
