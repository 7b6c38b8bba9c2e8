//! Self-describing envelope header
//!
//! Every ciphertext is prefixed with a fixed-layout header:
//! - format version: 1 byte (currently 1)
//! - payload type: 3 bytes (`STR` or `BYT`)
//! - mode tag: 3 bytes (see [`EncryptMode::tag`])
//! - salt: 16 bytes
//! - verifier: 32 bytes (the derived key, compared on decrypt)
//!
//! followed by the raw cipher output. Older unversioned layouts started
//! directly with the payload type tag; they are recognised and rejected.

use thiserror::Error;

use crate::error::{ErrorCategory, ErrorKind, GrasscryptError, Result};
use crate::kdf::{KEY_LEN, SALT_LEN};
use crate::mode::{EncryptMode, MODE_TAG_LEN};

/// Current (and only supported) header format version
pub const FORMAT_VERSION: u8 = 1;

/// Length of the payload type tag in bytes
pub const TYPE_TAG_LEN: usize = 3;

/// Length of the stored verifier in bytes
pub const VERIFIER_LEN: usize = KEY_LEN;

/// Total header length in bytes
pub const HEADER_LEN: usize = 1 + TYPE_TAG_LEN + MODE_TAG_LEN + SALT_LEN + VERIFIER_LEN;

const TYPE_OFFSET: usize = 1;
const MODE_OFFSET: usize = TYPE_OFFSET + TYPE_TAG_LEN;
const SALT_OFFSET: usize = MODE_OFFSET + MODE_TAG_LEN;
const VERIFIER_OFFSET: usize = SALT_OFFSET + SALT_LEN;

/// What the plaintext was before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    /// UTF-8 text
    Text,
    /// Arbitrary bytes
    Binary,
}

impl PayloadType {
    pub const fn tag(self) -> [u8; TYPE_TAG_LEN] {
        match self {
            Self::Text => *b"STR",
            Self::Binary => *b"BYT",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"STR" => Some(Self::Text),
            b"BYT" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Reasons a buffer cannot be parsed as an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("envelope truncated after {0} bytes")]
    Truncated(usize),
    #[error("legacy unversioned envelope format is not supported")]
    LegacyFormat,
    #[error("unsupported envelope format version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown payload type tag {0:?}")]
    UnknownPayloadType(String),
    #[error("unknown mode tag {0:?}")]
    UnknownMode(String),
}

impl From<EnvelopeError> for GrasscryptError {
    fn from(err: EnvelopeError) -> Self {
        let kind = match err {
            EnvelopeError::UnknownMode(_) => ErrorKind::UnknownMode,
            _ => ErrorKind::MalformedEnvelope,
        };
        GrasscryptError::with_kind_and_source(ErrorCategory::User, kind, "invalid envelope", err)
    }
}

/// A parsed envelope borrowing its ciphertext from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub version: u8,
    pub payload_type: PayloadType,
    pub mode: EncryptMode,
    pub salt: [u8; SALT_LEN],
    pub verifier: [u8; VERIFIER_LEN],
    pub ciphertext: &'a [u8],
}

/// Build the header that precedes the ciphertext
pub fn make_header(
    payload_type: PayloadType,
    mode: EncryptMode,
    salt: &[u8; SALT_LEN],
    verifier: &[u8],
) -> Result<Vec<u8>> {
    if verifier.len() != VERIFIER_LEN {
        return Err(GrasscryptError::invalid_argument(format!(
            "verifier must be {} bytes, got {}",
            VERIFIER_LEN,
            verifier.len()
        )));
    }

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.push(FORMAT_VERSION);
    header.extend_from_slice(&payload_type.tag());
    header.extend_from_slice(&mode.tag());
    header.extend_from_slice(salt);
    header.extend_from_slice(verifier);
    debug_assert_eq!(header.len(), HEADER_LEN);

    Ok(header)
}

/// Parse the header at the start of `buffer`
///
/// Never panics on malformed input; the failure reason is returned so
/// callers processing many inputs can attribute it to the right one.
pub fn read_header(buffer: &[u8]) -> std::result::Result<Envelope<'_>, EnvelopeError> {
    let version = *buffer.first().ok_or(EnvelopeError::Truncated(0))?;
    if version != FORMAT_VERSION {
        // Unversioned layouts begin with the ASCII payload tag.
        return Err(if version == b'S' || version == b'B' {
            EnvelopeError::LegacyFormat
        } else {
            EnvelopeError::UnsupportedVersion(version)
        });
    }

    if buffer.len() < HEADER_LEN {
        return Err(EnvelopeError::Truncated(buffer.len()));
    }
    let (header, ciphertext) = buffer.split_at(HEADER_LEN);

    let type_tag = &header[TYPE_OFFSET..MODE_OFFSET];
    let payload_type = PayloadType::from_tag(type_tag).ok_or_else(|| {
        EnvelopeError::UnknownPayloadType(String::from_utf8_lossy(type_tag).into_owned())
    })?;

    let mode_tag = &header[MODE_OFFSET..SALT_OFFSET];
    let mode = EncryptMode::from_value(mode_tag)
        .map_err(|_| EnvelopeError::UnknownMode(String::from_utf8_lossy(mode_tag).into_owned()))?;

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&header[SALT_OFFSET..VERIFIER_OFFSET]);
    let mut verifier = [0u8; VERIFIER_LEN];
    verifier.copy_from_slice(&header[VERIFIER_OFFSET..HEADER_LEN]);

    Ok(Envelope {
        version,
        payload_type,
        mode,
        salt,
        verifier,
        ciphertext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload_type: PayloadType, mode: EncryptMode) -> Vec<u8> {
        make_header(payload_type, mode, &[0x11; SALT_LEN], &[0x22; VERIFIER_LEN]).unwrap()
    }

    #[test]
    fn test_layout() {
        let header = sample(PayloadType::Binary, EncryptMode::Ecb);
        assert_eq!(header.len(), 55);
        assert_eq!(header[0], FORMAT_VERSION);
        assert_eq!(&header[1..4], b"BYT");
        assert_eq!(&header[4..7], b"ECB");
        assert_eq!(&header[7..23], &[0x11; 16]);
        assert_eq!(&header[23..55], &[0x22; 32]);
    }

    #[test]
    fn test_read_back() {
        let mut buf = sample(PayloadType::Text, EncryptMode::Ctr);
        buf.extend_from_slice(b"ciphertext");

        let env = read_header(&buf).unwrap();
        assert_eq!(env.version, FORMAT_VERSION);
        assert_eq!(env.payload_type, PayloadType::Text);
        assert_eq!(env.mode, EncryptMode::Ctr);
        assert_eq!(env.salt, [0x11; SALT_LEN]);
        assert_eq!(env.verifier, [0x22; VERIFIER_LEN]);
        assert_eq!(env.ciphertext, b"ciphertext");
    }

    #[test]
    fn test_header_only_has_empty_ciphertext() {
        let buf = sample(PayloadType::Text, EncryptMode::Ecb);
        assert_eq!(read_header(&buf).unwrap().ciphertext, b"");
    }

    #[test]
    fn test_make_header_rejects_short_verifier() {
        let err =
            make_header(PayloadType::Text, EncryptMode::Ecb, &[0; SALT_LEN], &[0; 16]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_truncated() {
        assert_eq!(read_header(b""), Err(EnvelopeError::Truncated(0)));

        let buf = sample(PayloadType::Text, EncryptMode::Ecb);
        for len in 1..HEADER_LEN {
            assert_eq!(read_header(&buf[..len]), Err(EnvelopeError::Truncated(len)));
        }
    }

    #[test]
    fn test_legacy_layouts_rejected() {
        // 22-byte header without verifier
        let mut legacy = b"STRECB".to_vec();
        legacy.extend_from_slice(&[0u8; 16]);
        assert_eq!(read_header(&legacy), Err(EnvelopeError::LegacyFormat));

        // 54-byte header with verifier
        let mut legacy = b"BYTECB".to_vec();
        legacy.extend_from_slice(&[0u8; 48]);
        legacy.extend_from_slice(b"more");
        assert_eq!(read_header(&legacy), Err(EnvelopeError::LegacyFormat));
    }

    #[test]
    fn test_future_version() {
        let mut buf = sample(PayloadType::Text, EncryptMode::Ecb);
        buf[0] = 2;
        assert_eq!(read_header(&buf), Err(EnvelopeError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_unknown_payload_type() {
        let mut buf = sample(PayloadType::Text, EncryptMode::Ecb);
        buf[1..4].copy_from_slice(b"INT");
        assert_eq!(
            read_header(&buf),
            Err(EnvelopeError::UnknownPayloadType("INT".to_owned()))
        );
    }

    #[test]
    fn test_unknown_mode() {
        let mut buf = sample(PayloadType::Text, EncryptMode::Ecb);
        buf[4..7].copy_from_slice(b"GCM");
        let err = read_header(&buf).unwrap_err();
        assert_eq!(err, EnvelopeError::UnknownMode("GCM".to_owned()));

        let err: GrasscryptError = err.into();
        assert_eq!(err.kind, Some(ErrorKind::UnknownMode));
    }

    #[test]
    fn test_malformed_converts_to_kind() {
        let err: GrasscryptError = EnvelopeError::Truncated(3).into();
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_payload_type_tags() {
        for pt in [PayloadType::Text, PayloadType::Binary] {
            assert_eq!(PayloadType::from_tag(&pt.tag()), Some(pt));
        }
        assert_eq!(PayloadType::from_tag(b"str"), None);
    }
}
