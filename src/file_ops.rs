//! File encryption/decryption operations
//!
//! This module provides high-level file operations for encrypting, decrypting,
//! updating and inspecting files in the grasscrypt envelope format.

use crate::crypt::{Crypter, Payload};
use crate::envelope::{self, PayloadType};
use crate::error::{ErrorCategory, ErrorKind, GrasscryptError, Result};
use crate::kdf::SALT_LEN;
use crate::mode::EncryptMode;
use crate::varmor;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Encrypt a file with a code
///
/// Reads `input_path` (as text if it is valid UTF-8, as bytes otherwise),
/// encrypts it and writes the armored envelope to `output_path`, or back
/// over `input_path` when no output is given. Returns the path written.
///
/// Existing output files are only replaced when `overwrite` is set.
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(
    input_path: &Path,
    output_path: Option<&Path>,
    code: &str,
    mode: EncryptMode,
    overwrite: bool,
) -> Result<PathBuf> {
    let output_path = output_path.unwrap_or(input_path);
    let contents = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let payload = match String::from_utf8(contents) {
        Ok(text) => Payload::Text(text),
        Err(e) => Payload::Binary(e.into_bytes()),
    };
    debug!(
        input = %input_path.display(),
        payload_type = ?payload.payload_type(),
        "read plaintext"
    );

    let armored = Crypter::new()
        .encrypt(payload, code, mode)
        .map_err(|e| e.with_context(format!("failed to encrypt {}", input_path.display())))?;
    write_output(output_path, armored.as_bytes(), overwrite)?;
    info!(output = %output_path.display(), %mode, "encrypted file");

    Ok(output_path.to_path_buf())
}

/// Decrypt a file with a code
///
/// Reads the armored envelope from `input_path`, decrypts it and writes the
/// plaintext to `output_path`, or back over `input_path` when no output is
/// given. Returns the path written.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: Option<&Path>,
    code: &str,
    overwrite: bool,
) -> Result<PathBuf> {
    let output_path = output_path.unwrap_or(input_path);
    let armored = read_armored(input_path)?;
    let payload = Crypter::new()
        .decrypt(&armored, code, false)
        .map_err(|e| e.with_context(format!("failed to decrypt {}", input_path.display())))?;
    write_output(output_path, payload.as_bytes(), overwrite)?;
    info!(output = %output_path.display(), "decrypted file");

    Ok(output_path.to_path_buf())
}

/// Update an encrypted file with new plaintext using the same code
///
/// This function:
/// 1. Decrypts the existing file at `crypt_path` to validate the code
/// 2. Reads new plaintext from `plain_path`
/// 3. Encrypts the new plaintext with the validated code and the existing mode
/// 4. Atomically writes to `crypt_path` (tempfile + fsync + rename)
///
/// The code validation prevents accidental code changes.
pub fn update_file(plain_path: &Path, crypt_path: &Path, code: &str) -> Result<()> {
    let armored = read_armored(crypt_path)?;
    let crypter = Crypter::new();

    // Validate code by decrypting existing file (discard plaintext)
    crypter
        .decrypt(&armored, code, false)
        .map_err(|e| e.with_context(format!("failed to decrypt {}", crypt_path.display())))?;
    let mode = inspect_armored(&armored)?.mode;

    let new_contents = fs::read(plain_path).map_err(|e| read_error(plain_path, e))?;
    let payload = match String::from_utf8(new_contents) {
        Ok(text) => Payload::Text(text),
        Err(e) => Payload::Binary(e.into_bytes()),
    };
    let new_armored = crypter
        .encrypt(payload, code, mode)
        .map_err(|e| e.with_context(format!("failed to encrypt {}", plain_path.display())))?;

    write_atomic(crypt_path, new_armored.as_bytes())?;
    info!(output = %crypt_path.display(), %mode, "updated file");
    Ok(())
}

/// Envelope metadata that can be read without the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeInfo {
    pub version: u8,
    pub payload_type: PayloadType,
    pub mode: EncryptMode,
    pub is_validated: bool,
    pub salt: [u8; SALT_LEN],
    pub ciphertext_len: usize,
}

/// Read the envelope header of an encrypted file
pub fn inspect_file(path: &Path) -> Result<EnvelopeInfo> {
    let armored = read_armored(path)?;
    inspect_armored(&armored)
        .map_err(|e| e.with_context(format!("failed to inspect {}", path.display())))
}

/// Inspect several files, keeping going past individual failures
pub fn inspect_files<P: AsRef<Path>>(paths: &[P]) -> Vec<(PathBuf, Result<EnvelopeInfo>)> {
    paths
        .iter()
        .map(|p| {
            let path = p.as_ref();
            (path.to_path_buf(), inspect_file(path))
        })
        .collect()
}

fn inspect_armored(armored: &str) -> Result<EnvelopeInfo> {
    let body = varmor::unwrap(armored)?;
    let env = envelope::read_header(&body)?;
    Ok(EnvelopeInfo {
        version: env.version,
        payload_type: env.payload_type,
        mode: env.mode,
        is_validated: env.mode.is_validated(),
        salt: env.salt,
        ciphertext_len: env.ciphertext.len(),
    })
}

fn read_armored(path: &Path) -> Result<String> {
    let armored_bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(armored_bytes).map_err(|e| {
        GrasscryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })
}

/// Write the output, creating parent directories as needed
///
/// Without `overwrite` the file is created exclusively, so an existing file
/// is never clobbered even if it appears after the caller looked.
fn write_output(path: &Path, contents: &[u8], overwrite: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            GrasscryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to create directory {}", parent.display()),
                e,
            )
        })?;
    }

    if overwrite {
        write_atomic(path, contents)
    } else {
        write_new_file(path, contents)
    }
}

/// Create a new file with secure permissions (0o600 on Unix)
fn write_new_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            GrasscryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::AlreadyExists,
                format!("{} already exists; pass overwrite to replace it", path.display()),
                e,
            )
        } else {
            GrasscryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to open {}", path.display()),
                e,
            )
        }
    })?;

    write_or_remove(&mut file, path, contents)
}

/// Write `contents` to a file this call created, removing it again on
/// failure so a retry does not hit `AlreadyExists`.
fn write_or_remove<W: Write>(file: &mut W, path: &Path, contents: &[u8]) -> Result<()> {
    file.write_all(contents).map_err(|e| {
        if let Err(remove_err) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %remove_err, "failed to remove partial output");
        }
        GrasscryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to write {}", path.display()),
            e,
        )
    })
}

/// Replace `path` atomically (tempfile + fsync + rename)
///
/// Either the old file or the new file exists afterwards, never a
/// partial one.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        GrasscryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        GrasscryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        GrasscryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        GrasscryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    // NamedTempFile already creates files 0o600 on Unix; keep it explicit.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                GrasscryptError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }
    temp_file.persist(path).map_err(|e| {
        GrasscryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> GrasscryptError {
    let (category, kind) = if err.kind() == io::ErrorKind::NotFound {
        (ErrorCategory::User, ErrorKind::NotFound)
    } else {
        (ErrorCategory::Internal, ErrorKind::Io)
    };
    GrasscryptError::with_kind_and_source(
        category,
        kind,
        format!("failed to read from {}", path.display()),
        err,
    )
}
