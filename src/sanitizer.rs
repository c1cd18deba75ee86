//! Defence-in-depth validator/escaper for `(name, args)` pairs.
//!
//! The engine never invokes a shell, so injection is not possible via the
//! kernel launch path — [`CommandBuilder`](crate::builder::CommandBuilder)
//! hands argv straight to `tokio::process::Command`. The sanitizer exists to
//! reject attacker-controlled inputs that would be dangerous if a future
//! caller piped them through a shell, and to make [`sanitize`]'s output safe
//! for logs, scripts, or reproducible reports.

use regex_lite::Regex;

/// How strictly [`validate`]/[`sanitize`] police a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SanitizeMode {
    /// No checks at all. `sanitize` returns the raw, unescaped join.
    Disabled,
    /// Reserved for callers that want to log violations without blocking;
    /// `validate` still rejects — the distinction is the caller's to make
    /// by choosing whether to act on the error.
    Warn,
    /// Reject any of the dangerous patterns in every token. Default.
    #[default]
    Strict,
    /// `Strict`, plus the program name must match `allowed_names` or one of
    /// `allowed_patterns`.
    Allowlist,
}

impl SanitizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanitizeMode::Disabled => "disabled",
            SanitizeMode::Warn => "warn",
            SanitizeMode::Strict => "strict",
            SanitizeMode::Allowlist => "allowlist",
        }
    }
}

/// Configuration for the sanitizer. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    pub mode: SanitizeMode,
    pub allowed_names: Vec<String>,
    pub allowed_patterns: Vec<Regex>,
    pub allow_pipes: bool,
    pub allow_redirects: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            mode: SanitizeMode::Strict,
            allowed_names: Vec::new(),
            allowed_patterns: Vec::new(),
            allow_pipes: false,
            allow_redirects: false,
        }
    }
}

impl SanitizerConfig {
    pub fn disabled() -> Self {
        Self {
            mode: SanitizeMode::Disabled,
            ..Self::default()
        }
    }

    pub fn allowlist(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode: SanitizeMode::Allowlist,
            allowed_names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("{context}: rejected embedded NUL byte")]
    NulByte { context: String },
    #[error("{context}: rejected command chaining (semicolon)")]
    Semicolon { context: String },
    #[error("{context}: rejected command chaining (&&)")]
    AndAnd { context: String },
    #[error("{context}: rejected command chaining (||)")]
    OrOr { context: String },
    #[error("{context}: rejected command substitution (backtick)")]
    Backtick { context: String },
    #[error("{context}: rejected command substitution ($())")]
    DollarParen { context: String },
    #[error("{context}: rejected parameter expansion (${{}})")]
    DollarBrace { context: String },
    #[error("{context}: rejected embedded newline")]
    Newline { context: String },
    #[error("{context}: rejected embedded carriage return")]
    CarriageReturn { context: String },
    #[error("{context}: rejected background execution (&)")]
    Background { context: String },
    #[error("{context}: rejected path traversal (../)")]
    PathTraversal { context: String },
    #[error("{context}: rejected pipe (|)")]
    Pipe { context: String },
    #[error("{context}: rejected redirect ({symbol})")]
    Redirect { context: String, symbol: char },
    #[error("command '{name}' is not in the allowlist")]
    NotAllowlisted { name: String },
}

/// Validate a `(name, args)` pair against `config`.
pub fn validate(config: &SanitizerConfig, name: &str, args: &[String]) -> Result<(), SanitizeError> {
    if config.mode == SanitizeMode::Disabled {
        return Ok(());
    }

    check_token(config, "command".to_string(), name)?;
    for (i, arg) in args.iter().enumerate() {
        check_token(config, format!("argument {}", i + 1), arg)?;
    }

    if config.mode == SanitizeMode::Allowlist {
        let first_token = name.split_whitespace().next().unwrap_or(name);
        let allowed = config.allowed_names.iter().any(|n| n == first_token)
            || config
                .allowed_patterns
                .iter()
                .any(|pattern| pattern.is_match(first_token));
        if !allowed {
            return Err(SanitizeError::NotAllowlisted {
                name: name.to_string(),
            });
        }
    }

    Ok(())
}

/// Order matches the spec: NUL, `;`, `&&`, `||`, backtick, `$(`, `${`,
/// newline, CR, bare `&`, `../`, then the optional pipe/redirect checks.
fn check_token(config: &SanitizerConfig, context: String, s: &str) -> Result<(), SanitizeError> {
    if s.contains('\0') {
        return Err(SanitizeError::NulByte { context });
    }
    if s.contains(';') {
        return Err(SanitizeError::Semicolon { context });
    }
    if s.contains("&&") {
        return Err(SanitizeError::AndAnd { context });
    }
    if s.contains("||") {
        return Err(SanitizeError::OrOr { context });
    }
    if s.contains('`') {
        return Err(SanitizeError::Backtick { context });
    }
    if s.contains("$(") {
        return Err(SanitizeError::DollarParen { context });
    }
    if s.contains("${") {
        return Err(SanitizeError::DollarBrace { context });
    }
    if s.contains('\n') {
        return Err(SanitizeError::Newline { context });
    }
    if s.contains('\r') {
        return Err(SanitizeError::CarriageReturn { context });
    }
    // `&&` was already ruled out above, so any remaining `&` is a bare one.
    if s.contains('&') {
        return Err(SanitizeError::Background { context });
    }
    if s.contains("../") {
        return Err(SanitizeError::PathTraversal { context });
    }
    if !config.allow_pipes && s.contains('|') {
        return Err(SanitizeError::Pipe { context });
    }
    if !config.allow_redirects {
        if s.contains('>') {
            return Err(SanitizeError::Redirect {
                context,
                symbol: '>',
            });
        }
        if s.contains('<') {
            return Err(SanitizeError::Redirect {
                context,
                symbol: '<',
            });
        }
    }
    Ok(())
}

/// Escape a single argument for safe inclusion in a shell-displayable
/// string: unquoted if it contains only `[A-Za-z0-9._/:-]`, otherwise
/// single-quoted with embedded `'` replaced by `'\''`.
pub fn escape_arg(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | ':' | '-'));
    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Validate, then render `name arg1 arg2 ...` with each argument escaped for
/// shell round-trip. In `Disabled` mode, returns the verbatim join — this is
/// documented as UNSAFE for any consumer that might feed it to a shell.
pub fn sanitize(config: &SanitizerConfig, name: &str, args: &[String]) -> Result<String, SanitizeError> {
    if config.mode == SanitizeMode::Disabled {
        return Ok(join_plain(name, args));
    }
    validate(config, name, args)?;
    let escaped: Vec<String> = args.iter().map(|a| escape_arg(a)).collect();
    Ok(join_plain(name, &escaped))
}

fn join_plain(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{name} {}", args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> SanitizerConfig {
        SanitizerConfig::default()
    }

    #[test]
    fn disabled_mode_accepts_anything() {
        let config = SanitizerConfig::disabled();
        assert!(validate(&config, "echo", &["; rm -rf /".to_string()]).is_ok());
    }

    #[test]
    fn rejects_semicolon_with_expected_message() {
        let err = validate(&strict(), "echo", &["test; rm -rf /".to_string()]).unwrap_err();
        assert!(err.to_string().contains("command chaining (semicolon)"));
    }

    #[test]
    fn rejects_and_and_or_or() {
        assert!(validate(&strict(), "a", &["x && y".to_string()]).is_err());
        assert!(validate(&strict(), "a", &["x || y".to_string()]).is_err());
    }

    #[test]
    fn rejects_command_substitution() {
        assert!(validate(&strict(), "a", &["`whoami`".to_string()]).is_err());
        assert!(validate(&strict(), "a", &["$(whoami)".to_string()]).is_err());
        assert!(validate(&strict(), "a", &["${HOME}".to_string()]).is_err());
    }

    #[test]
    fn rejects_bare_ampersand_but_already_caught_double_ampersand_first() {
        let err = validate(&strict(), "a", &["sleep 1 &".to_string()]).unwrap_err();
        assert!(matches!(err, SanitizeError::Background { .. }));
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(validate(&strict(), "cat", &["../../etc/passwd".to_string()]).is_err());
    }

    #[test]
    fn pipes_and_redirects_rejected_unless_allowed() {
        assert!(validate(&strict(), "a", &["x | y".to_string()]).is_err());
        assert!(validate(&strict(), "a", &["x > y".to_string()]).is_err());
        assert!(validate(&strict(), "a", &["x < y".to_string()]).is_err());

        let mut allowing = strict();
        allowing.allow_pipes = true;
        allowing.allow_redirects = true;
        assert!(validate(&allowing, "a", &["x | y > z".to_string()]).is_ok());
    }

    #[test]
    fn allowlist_mode_requires_membership() {
        let config = SanitizerConfig::allowlist(["git", "echo"]);
        assert!(validate(&config, "git", &["status".to_string()]).is_ok());
        assert!(matches!(
            validate(&config, "curl", &[]).unwrap_err(),
            SanitizeError::NotAllowlisted { .. }
        ));
    }

    #[test]
    fn allowlist_mode_accepts_pattern_match() {
        let mut config = SanitizerConfig::allowlist(Vec::<String>::new());
        config
            .allowed_patterns
            .push(Regex::new(r"^npm(-[a-z]+)?$").unwrap());
        assert!(validate(&config, "npm-run", &[]).is_ok());
        assert!(validate(&config, "rm", &[]).is_err());
    }

    #[test]
    fn sanitize_accepts_safe_args_unquoted() {
        let out = sanitize(&strict(), "echo", &["hello".to_string(), "world".to_string()]).unwrap();
        assert_eq!(out, "echo hello world");
    }

    #[test]
    fn sanitize_quotes_args_with_spaces() {
        let out = sanitize(&strict(), "echo", &["hello world".to_string()]).unwrap();
        assert_eq!(out, "echo 'hello world'");
    }

    #[test]
    fn escape_arg_escapes_embedded_single_quotes() {
        assert_eq!(escape_arg("it's"), r"'it'\''s'");
    }

    #[test]
    fn sanitize_propagates_validation_errors() {
        let err = sanitize(&strict(), "echo", &["a; b".to_string()]).unwrap_err();
        assert!(err.to_string().contains("semicolon"));
    }
}
