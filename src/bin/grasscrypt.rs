//! Grasscrypt CLI - Passphrase-based envelope encryption
//!
//! Command-line interface for encrypting, decrypting and inspecting files
//! in the grasscrypt envelope format.

use clap::{ArgAction, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use tracing::{Level, warn};
use tracing_subscriber::FmtSubscriber;

use grasscrypt::error::Result;
use grasscrypt::file_ops;
use grasscrypt::mode::EncryptMode;
use grasscrypt::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};

#[derive(Parser)]
#[command(name = "grasscrypt")]
#[command(version)]
#[command(about = "Passphrase-based envelope encryption.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the encrypted text to (defaults to the input file)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Block cipher mode recorded in the envelope
        #[arg(short, long, value_name = "MODE", default_value = "ECB")]
        mode: EncryptMode,

        /// Replace the output file if it already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the file whose contents is to be decrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the plaintext to (defaults to the input file)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Replace the output file if it already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Update an encrypted file with new content, while validating
    /// that the passphrase is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing grasscrypt file to replace with encrypted text
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Show envelope metadata without decrypting
    Inspect {
        /// Encrypted files to inspect
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encrypt {
            input,
            output,
            mode,
            overwrite,
        } => {
            if !mode.is_validated() {
                warn!(%mode, "mode has not been validated against the cipher backend");
            }
            with_passphrase(cli.passphrase_stdin, |code| {
                file_ops::encrypt_file(&input, output.as_deref(), code, mode, overwrite).map(|_| ())
            })
        }
        Commands::Decrypt {
            input,
            output,
            overwrite,
        } => with_passphrase(cli.passphrase_stdin, |code| {
            file_ops::decrypt_file(&input, output.as_deref(), code, overwrite).map(|_| ())
        }),
        Commands::Update { input, output } => with_passphrase(cli.passphrase_stdin, |code| {
            file_ops::update_file(&input, &output, code)
        }),
        Commands::Inspect { files } => {
            if !inspect(&files) {
                process::exit(1);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e.chain_message());
        process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: failed to install logger: {}", e);
    }
}

fn with_passphrase<F>(use_stdin: bool, op: F) -> Result<()>
where
    F: FnOnce(&str) -> Result<()>,
{
    let mut reader = get_passphrase_reader(use_stdin);
    let passphrase = reader.read_passphrase()?;
    op(&passphrase)
}

/// Print one line per file; returns false if any file failed
fn inspect(files: &[PathBuf]) -> bool {
    let mut ok = true;
    for (path, result) in file_ops::inspect_files(files) {
        match result {
            Ok(info) => println!(
                "{}: version={} type={:?} mode={} validated={} salt={} ciphertext_len={}",
                path.display(),
                info.version,
                info.payload_type,
                info.mode,
                info.is_validated,
                hex::encode(info.salt),
                info.ciphertext_len
            ),
            Err(e) => {
                ok = false;
                eprintln!("{}: Error: {}", path.display(), e.chain_message());
            }
        }
    }
    ok
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(std::io::stdin()))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}
