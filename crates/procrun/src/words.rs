//! Shell-word splitting and quoting
//!
//! POSIX-style tokenization for command strings executed without a
//! shell, and the inverse quoting used when an argument vector must be
//! flattened into a shell line.

/// Split a command line into words: whitespace separates, single
/// quotes are literal, double quotes allow backslash escapes, a bare
/// backslash escapes the next character.
pub fn split(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut has_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            '\\' => {
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err("trailing backslash".to_string()),
                }
                has_word = true;
            }
            '\'' => {
                has_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return Err("no closing single quote".to_string()),
                    }
                }
            }
            '"' => {
                has_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err("no closing double quote".to_string()),
                        },
                        Some(inner) => current.push(inner),
                        None => return Err("no closing double quote".to_string()),
                    }
                }
            }
            _ => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    Ok(words)
}

/// Quote one word for a POSIX shell.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    let safe = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Quote and join an argument vector into one shell line.
pub fn join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split() {
        assert_eq!(split("ls -la /tmp").unwrap(), vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_quotes_group_words() {
        assert_eq!(
            split(r#"echo 'hello world' "two words""#).unwrap(),
            vec!["echo", "hello world", "two words"]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(split(r"echo a\ b").unwrap(), vec!["echo", "a b"]);
        assert_eq!(split(r#"echo "a \"b\"""#).unwrap(), vec!["echo", "a \"b\""]);
    }

    #[test]
    fn test_unterminated_quote_is_an_error() {
        assert!(split("echo 'oops").is_err());
        assert!(split("echo \"oops").is_err());
    }

    #[test]
    fn test_quote_round_trip() {
        for word in ["plain", "with space", "it's", "", "a$b"] {
            let quoted = quote(word);
            assert_eq!(split(&quoted).unwrap(), vec![word.to_string()]);
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join(&["echo", "a b"]), "echo 'a b'");
    }
}
