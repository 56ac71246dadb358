// src/types/domain_types.rs
//! Domain-specific newtypes for type safety and validation.

use super::ValidationError;
use std::fmt;
use std::sync::Arc;

/// An egress proxy identity in `host:port` form.
///
/// Cloning is cheap; the address is shared between the pool, the worker
/// that checked it out and any log lines that mention it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proxy(Arc<str>);

impl Proxy {
    /// Parses a `host:port` entry, rejecting empty hosts and invalid ports.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let input = input.trim();
        let invalid = |reason: &str| ValidationError::InvalidProxy {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        if host.is_empty() {
            return Err(invalid("host cannot be empty"));
        }
        if host.contains(char::is_whitespace) || host.contains('/') {
            return Err(invalid("host contains illegal characters"));
        }
        match port.parse::<u16>() {
            Ok(0) | Err(_) => return Err(invalid("port must be a number in 1..=65535")),
            Ok(_) => {}
        }

        Ok(Self(Arc::from(input)))
    }

    /// Get the proxy address as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The proxy URL handed to the HTTP client.
    pub fn to_url(&self) -> String {
        format!("http://{}", self.0)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ticker symbol, trimmed but otherwise spelled as the symbol list gives
/// it. The spelling names the output file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(input: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyField("symbol"));
        }

        let valid = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if !valid {
            return Err(ValidationError::InvalidSymbol {
                input: trimmed.to_string(),
                reason: "only letters, digits and . - ^ = are allowed".to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used in time & sales URLs.
    pub fn to_url_segment(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
