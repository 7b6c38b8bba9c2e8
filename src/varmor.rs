//! Printable transport encoding for envelopes
//!
//! Armored text is `grass<N>:` followed by the envelope in unpadded
//! base64url, where `N` is the armor version (only 1 exists). The output
//! never contains whitespace or characters a URL or POSIX shell would need
//! escaped.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;

use crate::error::{ErrorCategory, ErrorKind, GrasscryptError};

/// Armor version written by [`wrap`]
pub const ARMOR_VERSION: u32 = 1;

const MAGIC: &str = "grass";

/// Reasons a string cannot be unarmored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArmorError {
    #[error("input is not grasscrypt armor")]
    NotArmored,
    #[error("malformed armor version {0:?}")]
    BadVersion(String),
    #[error("armor version {0} is newer than this build understands")]
    FromFuture(u32),
    #[error("armored body is not valid base64url")]
    Decode(#[from] base64::DecodeError),
}

impl From<ArmorError> for GrasscryptError {
    fn from(err: ArmorError) -> Self {
        let kind = match err {
            ArmorError::NotArmored | ArmorError::BadVersion(_) => ErrorKind::ArmoringInvalid,
            ArmorError::FromFuture(_) => ErrorKind::ArmoringFromFuture,
            ArmorError::Decode(_) => ErrorKind::ArmoringDecode,
        };
        GrasscryptError::with_kind_and_source(ErrorCategory::User, kind, "invalid armor", err)
    }
}

/// Armor an envelope
pub fn wrap(body: &[u8]) -> String {
    format!("{}{}:{}", MAGIC, ARMOR_VERSION, URL_SAFE_NO_PAD.encode(body))
}

/// Recover the envelope bytes from armored text
///
/// Trailing whitespace is ignored so that files touched by an editor
/// still decode.
pub fn unwrap(armored: &str) -> Result<Vec<u8>, ArmorError> {
    let rest = armored
        .trim_end()
        .strip_prefix(MAGIC)
        .ok_or(ArmorError::NotArmored)?;
    let (version, encoded) = rest.split_once(':').ok_or(ArmorError::NotArmored)?;

    match parse_version(version)? {
        ARMOR_VERSION => Ok(URL_SAFE_NO_PAD.decode(encoded)?),
        v if v > ARMOR_VERSION => Err(ArmorError::FromFuture(v)),
        _ => Err(ArmorError::BadVersion(version.to_owned())),
    }
}

fn parse_version(version: &str) -> Result<u32, ArmorError> {
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ArmorError::BadVersion(version.to_owned()));
    }
    version
        .parse()
        .map_err(|_| ArmorError::BadVersion(version.to_owned()))
}
