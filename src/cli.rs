use clap::{ArgAction, Parser};
use scp_source::scp::config::ScpClientSettings;
use scp_source::scp::{Destination, ScpKnownHostsPolicy, ScpResult};
use std::path::PathBuf;

/// Environment variable consulted for a non-interactive password.
pub const PASSWORD_ENV: &str = "SCP_PUSH_PASSWORD";

/// Passphrase for an encrypted `--identity` key in unattended runs.
pub const PASSPHRASE_ENV: &str = "SCP_PUSH_PASSPHRASE";

/// Copy one local file to a remote host over SSH using the scp protocol.
#[derive(Debug, Parser)]
#[command(name = "scp-push", version, about)]
pub struct Cli {
    /// Local regular file to send
    pub local_path: PathBuf,

    /// Remote target, `user@host:path` (`user@[v6addr]:path` for IPv6)
    #[arg(value_name = "USER@HOST:REMOTE_PATH")]
    pub destination: Destination,

    /// SSH port [default: 22]
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Private key file
    #[arg(short = 'i', long = "identity", value_name = "FILE")]
    pub identity: Option<PathBuf>,

    /// Try the SSH agent before keys and passwords
    #[arg(short = 'A', long)]
    pub agent: bool,

    /// Keep the negotiated cipher instead of switching to `none`
    #[arg(long)]
    pub keep_encryption: bool,

    /// Connect and I/O timeout
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Payload write size
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Unknown host key handling: ask, accept-new, strict, ignore
    #[arg(long = "known-hosts", value_name = "POLICY")]
    pub known_hosts: Option<ScpKnownHostsPolicy>,

    /// known_hosts file [default: ~/.ssh/known_hosts]
    #[arg(long = "known-hosts-file", value_name = "FILE")]
    pub known_hosts_file: Option<PathBuf>,

    /// Enable SSH compression
    #[arg(short = 'C', long)]
    pub compress: bool,

    /// JSON settings file
    #[arg(short = 'F', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Never prompt; fail instead
    #[arg(short = 'B', long)]
    pub batch: bool,

    /// Print the transfer report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Settings file (or defaults) with the command-line flags applied.
    pub fn settings(&self) -> ScpResult<ScpClientSettings> {
        let mut settings = match &self.config {
            Some(path) => ScpClientSettings::load(path)?,
            None => ScpClientSettings::default(),
        };

        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(identity) = &self.identity {
            settings.private_key_path = Some(identity.clone());
        }
        if self.agent {
            settings.use_agent = true;
        }
        if self.keep_encryption {
            settings.disable_encryption = false;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.chunk_size = chunk_size;
        }
        if let Some(policy) = self.known_hosts {
            settings.known_hosts_policy = policy;
        }
        if let Some(path) = &self.known_hosts_file {
            settings.known_hosts_path = Some(path.clone());
        }
        if self.compress {
            settings.compress = true;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp_source::scp::ScpErrorKind;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scp-push").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_positional_arguments() {
        let cli = parse(&["file1", "alice@remotehost:file2"]);
        assert_eq!(cli.local_path, PathBuf::from("file1"));
        assert_eq!(cli.destination.user, "alice");
        assert_eq!(cli.destination.host, "remotehost");
        assert_eq!(cli.destination.path, "file2");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_bad_destination_is_usage_error() {
        let err = Cli::try_parse_from(["scp-push", "file1", "remotehost:file2"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_destination() {
        assert!(Cli::try_parse_from(["scp-push", "file1"]).is_err());
    }

    #[test]
    fn test_defaults_without_flags() {
        let settings = parse(&["f", "a@h:p"]).settings().unwrap();
        assert_eq!(settings, ScpClientSettings::default());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = parse(&[
            "-P", "2222", "-i", "/keys/id", "-A", "--keep-encryption", "--timeout", "5",
            "--chunk-size", "1024", "--known-hosts", "accept-new", "-C", "-vv", "f", "a@h:p",
        ]);
        assert_eq!(cli.verbose, 2);

        let settings = cli.settings().unwrap();
        assert_eq!(settings.port, 2222);
        assert_eq!(settings.private_key_path, Some(PathBuf::from("/keys/id")));
        assert!(settings.use_agent);
        assert!(!settings.disable_encryption);
        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.chunk_size, 1024);
        assert_eq!(settings.known_hosts_policy, ScpKnownHostsPolicy::AcceptNew);
        assert!(settings.compress);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = parse(&["--chunk-size", "0", "f", "a@h:p"]).settings().unwrap_err();
        assert_eq!(err.kind, ScpErrorKind::Config);
    }

    #[test]
    fn test_huge_chunk_size_rejected() {
        let err = parse(&["--chunk-size", "18446744073709551615", "f", "a@h:p"])
            .settings()
            .unwrap_err();
        assert_eq!(err.kind, ScpErrorKind::Config);
    }

    #[test]
    fn test_unknown_known_hosts_policy() {
        assert!(Cli::try_parse_from(["scp-push", "--known-hosts", "maybe", "f", "a@h:p"]).is_err());
    }
}
