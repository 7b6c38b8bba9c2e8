//! Passphrase encryption of text and binary payloads
//!
//! Encryption derives a key from the passphrase with a fresh salt, runs
//! the cipher, prefixes the result with an envelope header (which stores
//! the salt and the derived key as a verifier) and armors the whole thing.
//! Decryption reverses each step and refuses to go on when the passphrase
//! does not reproduce the stored verifier, unless told to ignore that.

use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::cipher::{Aes256Ecb, Cipher};
use crate::envelope::{self, PayloadType};
use crate::error::{ErrorCategory, ErrorKind, GrasscryptError, Result};
use crate::kdf::{self, KEY_LEN, SALT_LEN};
use crate::mode::EncryptMode;
use crate::varmor;

/// A plaintext value, remembering whether it was text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// An empty value of the given type.
    pub fn empty(payload_type: PayloadType) -> Self {
        match payload_type {
            PayloadType::Text => Self::Text(String::new()),
            PayloadType::Binary => Self::Binary(Vec::new()),
        }
    }

    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::Text(_) => PayloadType::Text,
            Self::Binary(_) => PayloadType::Binary,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

/// Encrypts and decrypts envelopes using a particular cipher.
#[derive(Debug, Clone, Default)]
pub struct Crypter<C = Aes256Ecb> {
    cipher: C,
}

impl Crypter<Aes256Ecb> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Cipher> Crypter<C> {
    pub fn with_cipher(cipher: C) -> Self {
        Self { cipher }
    }

    /// Encrypt `plaintext` under `code`, returning the armored envelope
    pub fn encrypt(
        &self,
        plaintext: impl Into<Payload>,
        code: &str,
        mode: EncryptMode,
    ) -> Result<String> {
        self.seal(plaintext.into(), code, mode, None)
    }

    /// Encrypt with a caller-provided salt
    ///
    /// Reusing a salt makes the output predictable; this exists for test
    /// vectors. Use `encrypt()` for anything else.
    pub fn encrypt_with_salt(
        &self,
        plaintext: impl Into<Payload>,
        code: &str,
        mode: EncryptMode,
        salt: &[u8; SALT_LEN],
    ) -> Result<String> {
        self.seal(plaintext.into(), code, mode, Some(salt))
    }

    fn seal(
        &self,
        plaintext: Payload,
        code: &str,
        mode: EncryptMode,
        salt: Option<&[u8; SALT_LEN]>,
    ) -> Result<String> {
        if plaintext.is_empty() {
            return Err(GrasscryptError::invalid_argument("plaintext cannot be empty"));
        }
        if code.is_empty() {
            return Err(GrasscryptError::invalid_argument("code cannot be empty"));
        }

        let key = kdf::derive(code, salt, KEY_LEN)?;
        let payload_type = plaintext.payload_type();
        let plaintext = plaintext.into_bytes();

        let ciphertext = self
            .cipher
            .encrypt(&plaintext, key.as_bytes(), mode)
            .map_err(|e| cipher_failure("encrypt", mode, plaintext.len(), e))?;

        let mut body = envelope::make_header(payload_type, mode, key.salt(), key.as_bytes())?;
        body.extend_from_slice(&ciphertext);
        debug!(
            %mode,
            ?payload_type,
            plaintext_len = plaintext.len(),
            envelope_len = body.len(),
            "sealed envelope"
        );

        Ok(varmor::wrap(&body))
    }

    /// Decrypt an armored envelope with `code`
    ///
    /// Fails with [`ErrorKind::CodeMismatch`] when `code` does not reproduce
    /// the stored verifier. With `ignore_mismatch` set decryption proceeds
    /// anyway and never fails past that point: the result is unspecified
    /// (a cipher failure yields an empty payload of the envelope's type, and
    /// text that is not UTF-8 is decoded lossily).
    pub fn decrypt(&self, armored: &str, code: &str, ignore_mismatch: bool) -> Result<Payload> {
        if code.is_empty() {
            return Err(GrasscryptError::invalid_argument("code cannot be empty"));
        }

        let body = varmor::unwrap(armored)?;
        let envelope = envelope::read_header(&body)?;
        let mode = envelope.mode;
        let key = kdf::derive(code, Some(&envelope.salt), KEY_LEN)?;

        let matches = bool::from(key.as_bytes().ct_eq(&envelope.verifier));
        if !matches {
            if !ignore_mismatch {
                return Err(GrasscryptError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::CodeMismatch,
                    "code does not match the one used for encryption",
                ));
            }
            warn!(%mode, "code does not match envelope verifier; decrypting anyway");
        }

        let plaintext = match self.cipher.decrypt(envelope.ciphertext, key.as_bytes(), mode) {
            Ok(plaintext) => plaintext,
            Err(e) if !matches => {
                warn!(error = %e, "cipher failed after ignored mismatch");
                return Ok(Payload::empty(envelope.payload_type));
            }
            Err(e) => return Err(cipher_failure("decrypt", mode, envelope.ciphertext.len(), e)),
        };
        debug!(
            %mode,
            payload_type = ?envelope.payload_type,
            plaintext_len = plaintext.len(),
            "opened envelope"
        );

        match envelope.payload_type {
            PayloadType::Binary => Ok(Payload::Binary(plaintext)),
            PayloadType::Text if !matches => {
                Ok(Payload::Text(String::from_utf8_lossy(&plaintext).into_owned()))
            }
            PayloadType::Text => String::from_utf8(plaintext).map(Payload::Text).map_err(|e| {
                GrasscryptError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Decode,
                    "decrypted text is not valid UTF-8",
                    e,
                )
            }),
        }
    }
}

fn cipher_failure(
    op: &str,
    mode: EncryptMode,
    len: usize,
    err: crate::cipher::CipherError,
) -> GrasscryptError {
    GrasscryptError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::CipherFailure,
        format!("failed to {} {}-byte payload in {} mode", op, len, mode),
        err,
    )
}

/// Encrypt with the default AES-256 cipher
pub fn encrypt(plaintext: impl Into<Payload>, code: &str, mode: EncryptMode) -> Result<String> {
    Crypter::new().encrypt(plaintext, code, mode)
}

/// Decrypt with the default AES-256 cipher
pub fn decrypt(armored: &str, code: &str, ignore_mismatch: bool) -> Result<Payload> {
    Crypter::new().decrypt(armored, code, ignore_mismatch)
}
