//! Quoting and splitting of flat command strings.
//!
//! Arguments containing whitespace, quotes or backslashes (or empty ones)
//! are wrapped in double quotes with `"` and `\` escaped. Splitting accepts
//! double-quoted, single-quoted and bare words.

use std::borrow::Cow;

use ef_core::{Error, Result};

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'))
}

pub fn quote_arg(arg: &str) -> Cow<'_, str> {
    if !needs_quoting(arg) {
        return Cow::Borrowed(arg);
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

/// Quote and space-join arguments into one command string.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| quote_arg(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a command string back into arguments.
///
/// Fails with [`Error::Validation`] on an unterminated quote or a trailing
/// escape.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    #[derive(PartialEq)]
    enum State {
        Between,
        Bare,
        Double,
        Single,
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut state = State::Between;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Between | State::Bare => match c {
                c if c.is_whitespace() => {
                    if state == State::Bare {
                        args.push(std::mem::take(&mut current));
                        state = State::Between;
                    }
                }
                '"' => state = State::Double,
                '\'' => state = State::Single,
                '\\' => {
                    let escaped = chars
                        .next()
                        .ok_or_else(|| Error::Validation("trailing escape in command".into()))?;
                    current.push(escaped);
                    state = State::Bare;
                }
                c => {
                    current.push(c);
                    state = State::Bare;
                }
            },
            State::Double => match c {
                '"' => state = State::Bare,
                '\\' => {
                    let escaped = chars
                        .next()
                        .ok_or_else(|| Error::Validation("trailing escape in command".into()))?;
                    current.push(escaped);
                }
                c => current.push(c),
            },
            State::Single => match c {
                '\'' => state = State::Bare,
                c => current.push(c),
            },
        }
    }

    match state {
        State::Double | State::Single => {
            Err(Error::Validation("unterminated quote in command".into()))
        }
        State::Bare => {
            args.push(current);
            Ok(args)
        }
        State::Between => Ok(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn plain_args_are_untouched() {
        assert_eq!(quote_arg("-c:v"), "-c:v");
        assert_eq!(quote_arg("[0:v]split=2[s0][s1]"), "[0:v]split=2[s0][s1]");
    }

    #[test]
    fn args_with_spaces_and_quotes_are_quoted() {
        assert_eq!(quote_arg("/media/My Movie.mkv"), "\"/media/My Movie.mkv\"");
        assert_eq!(quote_arg(""), "\"\"");
        assert_eq!(
            quote_arg("scale='min(1920,iw)':-2"),
            "\"scale='min(1920,iw)':-2\""
        );
        assert_eq!(quote_arg(r#"say "hi""#), r#""say \"hi\"""#);
    }

    #[test]
    fn split_handles_all_quote_styles() {
        let args = split_command_line(r#"-i "/a b/c.mkv" -vf 'x y' plain\ word"#).unwrap();
        assert_eq!(args, vec!["-i", "/a b/c.mkv", "-vf", "x y", "plain word"]);
    }

    #[test]
    fn join_then_split_recovers_arguments() {
        let original = vec![
            "-y".to_string(),
            "-i".into(),
            "/in/Some File (2021).mkv".into(),
            "-var_stream_map".into(),
            "v:0,a:0 v:1,a:1".into(),
            "".into(),
            r"C:\out\x".into(),
            "scale='min(1280,iw)':'min(720,ih)'".into(),
        ];
        let line = join_args(&original);
        assert_eq!(split_command_line(&line).unwrap(), original);
    }

    #[test]
    fn extra_whitespace_is_ignored() {
        assert_eq!(split_command_line("  a   b  ").unwrap(), vec!["a", "b"]);
        assert!(split_command_line("   ").unwrap().is_empty());
    }

    #[test]
    fn unterminated_quote_fails() {
        assert_matches!(split_command_line("-i \"oops"), Err(Error::Validation(_)));
        assert_matches!(split_command_line("-i 'oops"), Err(Error::Validation(_)));
        assert_matches!(split_command_line("trailing\\"), Err(Error::Validation(_)));
    }
}
