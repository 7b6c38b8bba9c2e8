//! Passphrase sources
//!
//! A code is text. Whatever a source yields goes through the same
//! normalization: one trailing line ending is dropped (what `echo` or a
//! heredoc appends), the rest must be non-empty UTF-8.

use std::io::Read;

use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, GrasscryptError, Result};

const PROMPT: &str = "Passphrase (grasscrypt): ";

/// Something that can produce the code for an operation
pub trait PassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>>;
}

/// Turn raw input into a code.
fn normalize(mut raw: Zeroizing<Vec<u8>>) -> Result<Zeroizing<String>> {
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }

    let code = std::str::from_utf8(&raw).map_err(|e| {
        GrasscryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "passphrase is not valid UTF-8",
            e,
        )
    })?;
    if code.is_empty() {
        return Err(GrasscryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "empty passphrase",
        ));
    }
    Ok(Zeroizing::new(code.to_owned()))
}

/// Fixed code, for tests and embedding
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<String>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
        normalize(Zeroizing::new(self.passphrase.as_bytes().to_vec()))
    }
}

/// Reads the whole of a stream (stdin in the CLI) as the code
pub struct ReaderPassphraseReader<R> {
    reader: R,
}

impl<R: Read> ReaderPassphraseReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> PassphraseReader for ReaderPassphraseReader<R> {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
        let mut raw = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut raw).map_err(|e| {
            GrasscryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "error reading passphrase",
                e,
            )
        })?;
        normalize(raw)
    }
}

/// Prompts on the controlling terminal without echo
#[derive(Debug, Default)]
pub struct TerminalPassphraseReader;

impl PassphraseReader for TerminalPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
        let typed = rpassword::prompt_password(PROMPT).map_err(|e| {
            GrasscryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "no terminal to prompt for a passphrase on; use --passphrase-stdin",
                e,
            )
        })?;
        normalize(Zeroizing::new(typed.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EncryptMode, Payload};

    fn from_stream(data: &[u8]) -> Result<Zeroizing<String>> {
        ReaderPassphraseReader::new(data).read_passphrase()
    }

    #[test]
    fn test_constant_reader_repeats() {
        let mut reader = ConstantPassphraseReader::new("test123");
        assert_eq!(reader.read_passphrase().unwrap().as_str(), "test123");
        assert_eq!(reader.read_passphrase().unwrap().as_str(), "test123");
    }

    #[test]
    fn test_stream_exact() {
        assert_eq!(from_stream(b"mypassword").unwrap().as_str(), "mypassword");
    }

    #[test]
    fn test_stream_trailing_line_ending_dropped() {
        assert_eq!(from_stream("пароль\n".as_bytes()).unwrap().as_str(), "пароль");
        assert_eq!(from_stream(b"secret\r\n").unwrap().as_str(), "secret");
    }

    #[test]
    fn test_only_one_line_ending_dropped() {
        assert_eq!(from_stream(b"secret\n\n").unwrap().as_str(), "secret\n");
        assert_eq!(from_stream(b" padded \n").unwrap().as_str(), " padded ");
        assert_eq!(from_stream(b"two\nlines").unwrap().as_str(), "two\nlines");
        // a lone carriage return is content
        assert_eq!(from_stream(b"secret\r").unwrap().as_str(), "secret\r");
    }

    #[test]
    fn test_same_code_with_or_without_newline() {
        let code = from_stream(b"code\n").unwrap();
        let blob = crate::encrypt("payload", &code, EncryptMode::Ecb).unwrap();
        let code = from_stream(b"code").unwrap();
        assert_eq!(crate::decrypt(&blob, &code, false).unwrap(), Payload::from("payload"));
    }

    #[test]
    fn test_stream_empty() {
        for data in [&b""[..], &b"\n"[..], &b"\r\n"[..]] {
            let err = from_stream(data).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::PassphraseUnavailable));
        }
    }

    #[test]
    fn test_stream_non_utf8() {
        let err = from_stream(&[0xff, 0xfe, 0x00, 0x01]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PassphraseUnavailable));
        assert_eq!(err.category, ErrorCategory::User);
    }

    /// Needs a human at a terminal:
    ///
    /// cargo test test_terminal_reader_interactive -- --ignored --nocapture
    #[test]
    #[ignore]
    fn test_terminal_reader_interactive() {
        let passphrase = TerminalPassphraseReader.read_passphrase().unwrap();
        println!("read {} characters", passphrase.chars().count());
    }
}
