//! Grasscrypt - Passphrase-based envelope encryption for text and binary payloads

#![forbid(unsafe_code)]

pub mod cipher;
pub mod crypt;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod mode;
pub mod passphrase;
pub mod varmor;

pub use crypt::{Crypter, Payload, decrypt, encrypt};
pub use error::{ErrorCategory, ErrorKind, GrasscryptError, Result};
pub use file_ops::{decrypt_file, encrypt_file};
pub use mode::EncryptMode;
