//! Validators for strings that flow into shell-adjacent contexts: subprocess
//! arguments, environment variable values, host names, and file paths.
//! Rejections are typed ([`ErrorKind::InvalidInput`]), distinct from I/O
//! errors raised later by the operation itself.

use crate::error::{Error, Result};

/// Shell metacharacters rejected outright, regardless of context. Not an
/// attempt at shell-escaping — the crate never builds a shell command line
/// in the first place (§4.3) — this is a defense against values that would
/// be misinterpreted by a *downstream* tool that does invoke a shell.
const METACHARACTERS: &[char] = &['&', '|', ';', '$', '`', '(', ')', '<', '>', '\\', '"', '\''];

fn reject_control_characters(value: &str) -> Result<()> {
    if value.contains('\n') || value.contains('\r') {
        return Err(Error::invalid_input("value must not contain a newline or carriage return"));
    }
    Ok(())
}

fn reject_metacharacters(value: &str) -> Result<()> {
    if let Some(bad) = value.chars().find(|c| METACHARACTERS.contains(c)) {
        return Err(Error::invalid_input(format!("value contains disallowed character '{bad}'")));
    }
    Ok(())
}

fn reject_path_traversal(value: &str) -> Result<()> {
    if value.contains("..") {
        return Err(Error::invalid_input("path must not contain a '..' traversal segment"));
    }
    Ok(())
}

/// Validates a string destined for an environment variable value, a
/// credential-helper argument, or a host name: no control characters, no
/// shell metacharacters.
pub fn validate_shell_value(value: &str) -> Result<()> {
    reject_control_characters(value)?;
    reject_metacharacters(value)?;
    Ok(())
}

/// Validates a repository-relative or file-system path argument: no control
/// characters, no shell metacharacters, no `..` traversal segments.
pub fn validate_path(value: &str) -> Result<()> {
    reject_control_characters(value)?;
    reject_metacharacters(value)?;
    reject_path_traversal(value)?;
    Ok(())
}

/// Validates a path to a key file (an SSH private key, a credential store):
/// everything [`validate_path`] checks, plus an absolute-path requirement.
/// `..` is still rejected even though the path is absolute, since a
/// traversal segment can still escape the intended directory.
pub fn validate_key_path(value: &str) -> Result<()> {
    validate_path(value)?;
    if !value.starts_with('/') && !is_home_relative(value) {
        return Err(Error::invalid_input("key file path must be absolute"));
    }
    Ok(())
}

/// A path beginning with `~` is resolved against `$HOME` and treated as
/// absolute. The environment read is confined to this function so tests
/// can substitute `$HOME` without affecting any other validator.
fn is_home_relative(value: &str) -> bool {
    value.starts_with('~') && std::env::var_os("HOME").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_newline_and_carriage_return() {
        assert!(validate_shell_value("line1\nline2").is_err());
        assert!(validate_shell_value("line1\rline2").is_err());
    }

    #[test]
    fn rejects_shell_metacharacters() {
        for bad in ["a;b", "a|b", "a&&b", "$(whoami)", "`whoami`"] {
            assert!(validate_shell_value(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn accepts_a_plain_host_name() {
        assert!(validate_shell_value("github.com").is_ok());
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(validate_path("../../etc/passwd").is_err());
        assert!(validate_path("src/../../etc/passwd").is_err());
    }

    #[test]
    fn accepts_a_plain_relative_path() {
        assert!(validate_path("src/lib.rs").is_ok());
    }

    #[test]
    fn key_path_requires_absolute_or_home_relative() {
        assert!(validate_key_path("id_rsa").is_err());
        assert!(validate_key_path("/home/user/.ssh/id_rsa").is_ok());
    }

    #[test]
    fn errors_are_invalid_input_kind() {
        let err = validate_path("../escape").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }
}
