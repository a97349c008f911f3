//! Command-line tokenizer
//!
//! Splits a line on the console's whitespace set. There is no quoting and no
//! escaping; consecutive separators collapse.

use thiserror::Error;

/// Characters that separate arguments
pub const WHITESPACE: [char; 4] = ['\t', '\r', '\n', ' '];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Too many arguments (max {max})")]
pub struct TooManyArguments {
    pub max: usize,
}

/// Split `line` into fewer than `max_args` arguments borrowed from it
///
/// One slot of the `max_args` budget stays reserved for the argument list's
/// terminator, so at most `max_args - 1` tokens are returned.
///
/// # Errors
/// Returns [`TooManyArguments`] as soon as the `max_args`-th token appears
pub fn tokenize(line: &str, max_args: usize) -> Result<Vec<&str>, TooManyArguments> {
    let mut argv = Vec::new();
    for token in line.split(WHITESPACE).filter(|t| !t.is_empty()) {
        if argv.len() + 1 >= max_args {
            return Err(TooManyArguments { max: max_args });
        }
        argv.push(token);
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmon_common::MAX_ARGS;

    #[test]
    fn test_collapses_whitespace() {
        let argv = tokenize("  dump\t f0100000 \r\n  f0100040\n", MAX_ARGS).unwrap();
        assert_eq!(argv, vec!["dump", "f0100000", "f0100040"]);
    }

    #[test]
    fn test_blank_lines_have_no_arguments() {
        assert!(tokenize("", MAX_ARGS).unwrap().is_empty());
        assert!(tokenize(" \t\r\n ", MAX_ARGS).unwrap().is_empty());
    }

    #[test]
    fn test_no_quoting() {
        let argv = tokenize(r#"echo "a b" c\ d"#, MAX_ARGS).unwrap();
        assert_eq!(argv, vec!["echo", "\"a", "b\"", "c\\", "d"]);
    }

    #[test]
    fn test_argument_limit() {
        let fits: String = (0..MAX_ARGS - 1).map(|i| format!("a{i} ")).collect();
        assert_eq!(tokenize(&fits, MAX_ARGS).unwrap().len(), MAX_ARGS - 1);

        // The last slot belongs to the terminator
        let over = format!("{fits} one-more");
        assert_eq!(tokenize(&over, MAX_ARGS), Err(TooManyArguments { max: MAX_ARGS }));
        assert_eq!(tokenize("a b", 2), Err(TooManyArguments { max: 2 }));
        assert_eq!(tokenize("a", 2).unwrap(), vec!["a"]);
        assert_eq!(TooManyArguments { max: 16 }.to_string(), "Too many arguments (max 16)");
    }

    #[test]
    fn test_tokens_match_split_whitespace() {
        // Any mix of separators yields the same tokens as a plain split.
        let lines = ["a  b", "\ta\r\nb\t", "one", "x y z w", "   lead", "trail   "];
        for line in lines {
            let expected: Vec<&str> = line.split_ascii_whitespace().collect();
            assert_eq!(tokenize(line, MAX_ARGS).unwrap(), expected, "line {line:?}");
        }
    }
}
