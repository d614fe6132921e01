pub mod cli;
mod logging;

use clap::Parser;
use log::{info, warn};
use scp_source::scp::config::ScpClientSettings;
use scp_source::scp::{
    disable_encryption, CipherOutcome, CredentialProvider, ScpResult, ScpSourceSession,
    ScpTransferReport, ScpTransport, Ssh2Transport, StaticCredentials, TerminalPrompt,
};
use secrecy::SecretString;
use std::path::Path;

pub use cli::Cli;

/// Parse the command line, push the file and return the exit status.
pub fn run() -> i32 {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match push(&cli) {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Could not encode transfer report: {}", e),
                }
            }
            0
        }
        Err(e) => {
            eprintln!("scp-push: {}", e);
            e.kind.exit_code()
        }
    }
}

/// Connect, authenticate and push `cli.local_path`. The session is
/// disconnected whatever the outcome.
pub fn push(cli: &Cli) -> ScpResult<ScpTransferReport> {
    let settings = cli.settings()?;
    let password = std::env::var(cli::PASSWORD_ENV).ok().map(SecretString::new);
    let passphrase = std::env::var(cli::PASSPHRASE_ENV).ok().map(SecretString::new);

    let mut credentials = credential_provider(password.clone(), passphrase, cli.batch);

    let config = settings.connection_config(&cli.destination, password);
    let mut transport = Ssh2Transport::connect(&config, credentials.as_mut())?;

    let result = push_over(&mut transport, &settings, &cli.local_path, &cli.destination.path);

    if let Err(e) = transport.disconnect() {
        warn!("SSH disconnect failed: {}", e);
    }
    result
}

/// Unattended answers when any secret came from the environment or
/// `--batch` is set, terminal prompts otherwise.
pub fn credential_provider(
    password: Option<SecretString>,
    passphrase: Option<SecretString>,
    batch: bool,
) -> Box<dyn CredentialProvider> {
    if password.is_none() && passphrase.is_none() && !batch {
        return Box::new(TerminalPrompt);
    }
    let credentials = StaticCredentials::new(password);
    match passphrase {
        Some(p) => Box::new(credentials.with_passphrase(p)),
        None => Box::new(credentials),
    }
}

/// Cipher downgrade (when enabled) and transfer on an authenticated transport.
pub fn push_over<T: ScpTransport>(
    transport: &mut T,
    settings: &ScpClientSettings,
    local_path: &Path,
    remote_path: &str,
) -> ScpResult<ScpTransferReport> {
    let outcome = if settings.disable_encryption {
        Some(disable_encryption(transport, &settings.cipher_preference)?)
    } else {
        info!("Keeping negotiated cipher");
        None
    };

    let mut report = ScpSourceSession::new(transport)
        .with_chunk_size(settings.chunk_size)
        .transfer(local_path, remote_path)?;

    report.encryption_disabled = outcome
        .as_ref()
        .map_or(false, CipherOutcome::encryption_disabled);
    Ok(report)
}
