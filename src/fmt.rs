//! Argument formatting: a human display form and a shell-round-trip-safe
//! quoting form. Distinct from [`crate::sanitizer::escape_arg`], which uses
//! an allowlist of "plain" characters rather than a blocklist of dangerous
//! ones — the two exist for different audiences (diagnostic display for the
//! sanitizer vs. a form scripts and test fixtures can re-parse exactly).

/// Join an argv vector into a single shell-safe string: an argument is left
/// unquoted only if it contains none of `` \t\n"'\$``; otherwise it is
/// single-quoted with embedded `'` replaced by `'\''`.
///
/// For any `argv`, a POSIX shell word-splitter parsing `join_args(argv)`
/// yields `argv` back.
pub fn join_args(argv: &[String]) -> String {
    argv.iter().map(|a| join_arg(a)).collect::<Vec<_>>().join(" ")
}

fn join_arg(arg: &str) -> String {
    let needs_quote = arg.is_empty()
        || arg
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '\n' | '"' | '\'' | '\\' | '$'));
    if needs_quote {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_args_pass_through_unquoted() {
        assert_eq!(join_args(&["echo".into(), "hello".into()]), "echo hello");
    }

    #[test]
    fn args_with_spaces_are_single_quoted() {
        assert_eq!(join_args(&["hello world".into()]), "'hello world'");
    }

    #[test]
    fn embedded_single_quotes_are_escaped() {
        assert_eq!(join_args(&["it's".into()]), r"'it'\''s'");
    }

    #[test]
    fn empty_argument_is_quoted_so_it_survives_round_trip() {
        assert_eq!(join_args(&["".into()]), "''");
    }

    #[test]
    fn dollar_sign_forces_quoting() {
        assert_eq!(join_args(&["$HOME".into()]), "'$HOME'");
    }
}
