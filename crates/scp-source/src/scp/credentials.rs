// ── Credential providers ─────────────────────────────────────────────────────

use crate::scp::error::{ScpError, ScpResult};
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Interactive capabilities the transport calls into during connect.
///
/// The transfer itself never touches this.
pub trait CredentialProvider {
    fn password(&mut self, username: &str, host: &str) -> ScpResult<SecretString>;

    /// Passphrase for an encrypted private key; `None` to try it without one.
    fn passphrase(&mut self, key_path: &Path) -> ScpResult<Option<SecretString>>;

    /// Answer one keyboard-interactive prompt. `echo` is false for secrets.
    fn respond(&mut self, prompt: &str, echo: bool) -> ScpResult<String>;

    /// Yes/no question, e.g. whether to trust an unknown host key.
    fn confirm(&mut self, question: &str) -> ScpResult<bool>;

    /// Server-supplied text shown before a keyboard-interactive round.
    fn instructions(&mut self, _text: &str) {}
}

// ── Terminal ─────────────────────────────────────────────────────────────────

/// Prompts on stderr, hidden input for secrets.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_hidden(prompt: &str) -> ScpResult<String> {
        rpassword::prompt_password(prompt)
            .map_err(|e| ScpError::from(e).context("reading from terminal"))
    }

    fn read_line(prompt: &str) -> ScpResult<String> {
        eprint!("{}", prompt);
        io::stderr().flush().ok();
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ScpError::from(e).context("reading from terminal"))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl CredentialProvider for TerminalPrompt {
    fn password(&mut self, username: &str, host: &str) -> ScpResult<SecretString> {
        Self::read_hidden(&format!("{}@{}'s password: ", username, host)).map(SecretString::new)
    }

    fn passphrase(&mut self, key_path: &Path) -> ScpResult<Option<SecretString>> {
        let entered = Self::read_hidden(&format!(
            "Enter passphrase for key '{}': ",
            key_path.display()
        ))?;
        Ok((!entered.is_empty()).then(|| SecretString::new(entered)))
    }

    fn respond(&mut self, prompt: &str, echo: bool) -> ScpResult<String> {
        if echo {
            Self::read_line(prompt)
        } else {
            Self::read_hidden(prompt)
        }
    }

    fn instructions(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    fn confirm(&mut self, question: &str) -> ScpResult<bool> {
        loop {
            let answer = Self::read_line(&format!("{} (yes/no): ", question))?;
            match answer.to_ascii_lowercase().as_str() {
                "yes" | "y" => return Ok(true),
                "no" | "n" => return Ok(false),
                _ => eprintln!("Please type 'yes' or 'no'."),
            }
        }
    }
}

// ── Non-interactive ──────────────────────────────────────────────────────────

/// Fixed answers for unattended runs. Declines every confirmation.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    password: Option<SecretString>,
    passphrase: Option<SecretString>,
}

impl StaticCredentials {
    pub fn new(password: Option<SecretString>) -> Self {
        Self {
            password,
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: SecretString) -> Self {
        self.passphrase = Some(passphrase);
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn password(&mut self, username: &str, host: &str) -> ScpResult<SecretString> {
        self.password
            .as_ref()
            .map(|p| SecretString::new(p.expose_secret().clone()))
            .ok_or_else(|| {
                ScpError::auth_failed(format!("no password available for {}@{}", username, host))
            })
    }

    fn passphrase(&mut self, _key_path: &Path) -> ScpResult<Option<SecretString>> {
        Ok(self
            .passphrase
            .as_ref()
            .map(|p| SecretString::new(p.expose_secret().clone())))
    }

    fn respond(&mut self, prompt: &str, echo: bool) -> ScpResult<String> {
        match (&self.password, echo) {
            (Some(p), false) => Ok(p.expose_secret().clone()),
            _ => Err(ScpError::auth_failed(format!(
                "cannot answer prompt '{}' non-interactively",
                prompt.trim()
            ))),
        }
    }

    fn confirm(&mut self, _question: &str) -> ScpResult<bool> {
        Ok(false)
    }
}
