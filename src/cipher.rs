//! Block cipher capability
//!
//! The envelope layer never touches a block cipher directly; it goes
//! through [`Cipher`]. Implementations are expected to be deterministic
//! for a given key and mode and to take a [`KEY_LEN`]-byte key. They carry
//! no integrity check of their own.

use aes::Aes256;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use thiserror::Error;

use crate::kdf::KEY_LEN;
use crate::mode::EncryptMode;

/// Failure reported by a cipher implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CipherError(pub String);

/// A block cipher keyed per call.
pub trait Cipher {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8],
        mode: EncryptMode,
    ) -> Result<Vec<u8>, CipherError>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        mode: EncryptMode,
    ) -> Result<Vec<u8>, CipherError>;
}

/// AES-256 with PKCS#7 padding. Only ECB is implemented; every other mode
/// is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256Ecb;

type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

fn check_mode(mode: EncryptMode) -> Result<(), CipherError> {
    match mode {
        EncryptMode::Ecb => Ok(()),
        other => Err(CipherError(format!("AES-256 backend does not implement {} mode", other))),
    }
}

fn check_key(key: &[u8]) -> Result<(), CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        )));
    }
    Ok(())
}

impl Cipher for Aes256Ecb {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8],
        mode: EncryptMode,
    ) -> Result<Vec<u8>, CipherError> {
        check_mode(mode)?;
        check_key(key)?;
        let enc = Aes256EcbEnc::new_from_slice(key)
            .map_err(|e| CipherError(format!("invalid key: {}", e)))?;
        Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        mode: EncryptMode,
    ) -> Result<Vec<u8>, CipherError> {
        check_mode(mode)?;
        check_key(key)?;
        let dec = Aes256EcbDec::new_from_slice(key)
            .map_err(|e| CipherError(format!("invalid key: {}", e)))?;
        dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError("invalid padding; wrong key or corrupt ciphertext".to_owned()))
    }
}
