//! `user@host:path` destination argument.

use crate::scp::error::{ScpError, ScpResult};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub user: String,
    pub host: String,
    /// Passed to the remote `scp` untouched; may be empty.
    pub path: String,
}

impl Destination {
    /// Split at the first `@`, then at the first `:` after it. A host in
    /// brackets (`user@[::1]:path`) may itself contain colons.
    pub fn parse(arg: &str) -> ScpResult<Self> {
        let (user, rest) = arg
            .split_once('@')
            .ok_or_else(|| ScpError::usage(format!("'{}': expected user@host:path (missing '@')", arg)))?;

        let (host, path) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| ScpError::usage(format!("'{}': unterminated '[' in host", arg)))?;
            let path = after
                .strip_prefix(':')
                .ok_or_else(|| ScpError::usage(format!("'{}': expected ':' after host", arg)))?;
            (host, path)
        } else {
            rest.split_once(':')
                .ok_or_else(|| ScpError::usage(format!("'{}': expected user@host:path (missing ':')", arg)))?
        };

        if user.is_empty() {
            return Err(ScpError::usage(format!("'{}': empty user name", arg)));
        }
        if host.is_empty() {
            return Err(ScpError::usage(format!("'{}': empty host", arg)));
        }

        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            path: path.to_string(),
        })
    }
}

impl FromStr for Destination {
    type Err = ScpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}@[{}]:{}", self.user, self.host, self.path)
        } else {
            write!(f, "{}@{}:{}", self.user, self.host, self.path)
        }
    }
}
