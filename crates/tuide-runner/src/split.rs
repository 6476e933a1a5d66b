//! Command-line splitting for direct execution.
//!
//! Rules:
//! - Whitespace separates words
//! - Single quotes keep everything literally
//! - Double quotes keep whitespace; `\"`, `\\` and `\$` are escapes inside them
//! - A backslash outside quotes escapes the next character

use tuide_core::{Error, Result};

/// Split a command line into program and arguments.
pub fn split(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    // Distinguishes `''` (an empty word) from no word at all.
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated("single")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(unterminated("double")),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated("double")),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(ch) => current.push(ch),
                    None => current.push('\\'),
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn unterminated(kind: &str) -> Error {
    Error::InvalidInput(format!("unterminated {} quote in command line", kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(split("  ls   -la\t/tmp ").unwrap(), vec!["ls", "-la", "/tmp"]);
        assert!(split("   ").unwrap().is_empty());
    }

    #[test]
    fn quotes_group_words() {
        assert_eq!(
            split(r#"echo 'a b' "c d" e"f g"h"#).unwrap(),
            vec!["echo", "a b", "c d", "ef gh"]
        );
        assert_eq!(split("printf ''").unwrap(), vec!["printf", ""]);
    }

    #[test]
    fn escapes() {
        assert_eq!(split(r"echo a\ b").unwrap(), vec!["echo", "a b"]);
        assert_eq!(split(r#"echo "say \"hi\"""#).unwrap(), vec!["echo", r#"say "hi""#]);
        assert_eq!(split(r#"echo "\n""#).unwrap(), vec!["echo", r"\n"]);
        assert_eq!(split(r"echo '\n'").unwrap(), vec!["echo", r"\n"]);
    }

    #[test]
    fn percent_signs_are_plain_text() {
        assert_eq!(split("date +%Y-%m-%d").unwrap(), vec!["date", "+%Y-%m-%d"]);
    }

    #[test]
    fn unterminated_quotes_are_rejected() {
        assert!(matches!(split("echo 'oops"), Err(Error::InvalidInput(_))));
        assert!(matches!(split("echo \"oops"), Err(Error::InvalidInput(_))));
    }
}
