//! File mode arithmetic: numeric and symbolic chmod expressions
//!
//! The symbolic grammar matches the chmod man page: a comma-separated
//! list of `<who><op><perms>` clauses, e.g. `u=rw-x+X,g=r,o-w`. Clauses
//! apply left to right, each seeing the result of the previous one.

use crate::error::{Error, Result};

/// File mode permission bits, including setuid/setgid/sticky.
pub const PERM_BITS: u32 = 0o7777;
/// Execute permission bits.
pub const EXEC_PERM_BITS: u32 = 0o0111;
/// Default permission bits for newly created files, before umask.
pub const DEFAULT_PERM: u32 = 0o0666;

/// A desired mode: either a concrete octal value or a symbolic
/// expression resolved against the current state of the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSpec {
    Octal(u32),
    Symbolic(String),
}

impl ModeSpec {
    /// Parse from string input: octal digits win, anything else is
    /// treated as a symbolic expression (validated at resolve time).
    pub fn parse(text: &str) -> Self {
        u32::from_str_radix(text, 8).map_or_else(|_| Self::Symbolic(text.to_string()), Self::Octal)
    }

    /// Resolve to concrete permission bits against the current mode of
    /// the target. `umask` applies only to symbolic clauses with an
    /// empty who-class.
    pub fn resolve(&self, current: u32, is_dir: bool, umask: u32) -> Result<u32> {
        match self {
            Self::Octal(mode) => Ok(*mode),
            Self::Symbolic(expr) => symbolic_mode_to_octal(expr, current, is_dir, umask),
        }
    }
}

impl From<u32> for ModeSpec {
    fn from(mode: u32) -> Self {
        Self::Octal(mode)
    }
}

/// Apply a full symbolic expression to `initial`, returning the new
/// permission bits.
pub fn symbolic_mode_to_octal(expr: &str, initial: u32, is_dir: bool, umask: u32) -> Result<u32> {
    let mut new_mode = initial & PERM_BITS;

    for clause in expr.split(',') {
        let (who, rest) = split_who(clause);
        let use_umask = who.is_empty();
        let users = if who.is_empty() || who == "a" {
            "ugo"
        } else {
            who
        };
        if users.chars().any(|c| !matches!(c, 'u' | 'g' | 'o')) {
            return Err(bad_mode(clause));
        }

        let operations = split_operations(rest, clause)?;
        if operations.is_empty() {
            return Err(bad_mode(clause));
        }

        for (op, perms) in operations {
            if perms
                .chars()
                .any(|c| !matches!(c, 'r' | 'w' | 'x' | 'X' | 's' | 't' | 'u' | 'g' | 'o'))
            {
                return Err(bad_mode(clause));
            }
            for user in users.chars() {
                let to_apply = perms
                    .chars()
                    .map(|perm| perm_bits(user, perm, initial, is_dir, use_umask, umask))
                    .fold(0, |acc, bits| acc | bits);
                new_mode = apply_operation(user, op, to_apply, new_mode);
            }
        }
    }

    Ok(new_mode)
}

fn bad_mode(clause: &str) -> Error {
    Error::BadMode {
        reason: format!("bad symbolic permission for mode: {clause}"),
    }
}

/// Split a clause into the who-prefix and the remaining op/perm text.
fn split_who(clause: &str) -> (&str, &str) {
    let idx = clause
        .find(['+', '-', '='])
        .unwrap_or(clause.len());
    (&clause[..idx], &clause[idx..])
}

/// Break `+x-w=r` into [('+', "x"), ('-', "w"), ('=', "r")].
fn split_operations<'a>(rest: &'a str, clause: &str) -> Result<Vec<(char, &'a str)>> {
    let mut operations = Vec::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((idx, op)) = chars.next() {
        if !matches!(op, '+' | '-' | '=') {
            return Err(bad_mode(clause));
        }
        let start = idx + 1;
        let mut end = rest.len();
        for (j, c) in rest[start..].char_indices() {
            if matches!(c, '+' | '-' | '=') {
                end = start + j;
                break;
            }
        }
        operations.push((op, &rest[start..end]));
        while chars.peek().is_some_and(|(i, _)| *i < end) {
            chars.next();
        }
    }
    Ok(operations)
}

/// Combine one operation into the accumulated mode. `=` replaces only
/// the bits owned by that who-class, setuid/setgid/sticky included.
fn apply_operation(user: char, op: char, to_apply: u32, current: u32) -> u32 {
    match op {
        '=' => {
            let mask = match user {
                'u' => 0o4700,
                'g' => 0o2070,
                _ => 0o1007,
            };
            (current & (mask ^ PERM_BITS)) | to_apply
        }
        '+' => current | to_apply,
        _ => current & !to_apply,
    }
}

/// Bits named by one perm letter for one who-class.
///
/// Copy-from letters (`u`/`g`/`o`) and the conditional `X` reference
/// the *initial* mode of the path, not the accumulated result. The
/// umask masks only plain r/w/x when the who-class was empty.
fn perm_bits(user: char, perm: char, initial: u32, is_dir: bool, use_umask: bool, umask: u32) -> u32 {
    let initial = initial & PERM_BITS;
    let rev_umask = umask ^ PERM_BITS;
    let apply_x = is_dir || (initial & EXEC_PERM_BITS) != 0;
    let masked = |bits: u32| if use_umask { rev_umask & bits } else { bits };

    match (user, perm) {
        ('u', 'r') => masked(0o400),
        ('u', 'w') => masked(0o200),
        ('u', 'x') => masked(0o100),
        ('u', 's') => 0o4000,
        ('u', 'X') => {
            if apply_x {
                0o100
            } else {
                0
            }
        }
        ('u', 'u') => initial & 0o700,
        ('u', 'g') => (initial & 0o070) << 3,
        ('u', 'o') => (initial & 0o007) << 6,

        ('g', 'r') => masked(0o040),
        ('g', 'w') => masked(0o020),
        ('g', 'x') => masked(0o010),
        ('g', 's') => 0o2000,
        ('g', 'X') => {
            if apply_x {
                0o010
            } else {
                0
            }
        }
        ('g', 'u') => (initial & 0o700) >> 3,
        ('g', 'g') => initial & 0o070,
        ('g', 'o') => (initial & 0o007) << 3,

        ('o', 'r') => masked(0o004),
        ('o', 'w') => masked(0o002),
        ('o', 'x') => masked(0o001),
        ('o', 't') => 0o1000,
        ('o', 'X') => {
            if apply_x {
                0o001
            } else {
                0
            }
        }
        ('o', 'u') => (initial & 0o700) >> 6,
        ('o', 'g') => (initial & 0o070) >> 3,
        ('o', 'o') => initial & 0o007,

        // 's' for others and 't' for user/group name no bits
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(expr: &str, initial: u32) -> u32 {
        symbolic_mode_to_octal(expr, initial, false, 0o022).unwrap()
    }

    #[test]
    fn test_add_execute_for_user() {
        assert_eq!(apply("u+x", 0o644), 0o744);
    }

    #[test]
    fn test_assign_replaces_only_that_class() {
        assert_eq!(apply("o=rw", 0o755), 0o756);
    }

    #[test]
    fn test_remove_bits() {
        assert_eq!(apply("go-w", 0o666), 0o644);
    }

    #[test]
    fn test_all_classes_expand() {
        assert_eq!(apply("a+x", 0o644), 0o755);
    }

    #[test]
    fn test_clauses_apply_left_to_right() {
        assert_eq!(apply("u=rw,u+x", 0o400), 0o700);
    }

    #[test]
    fn test_conditional_execute_on_plain_file() {
        // No execute bit anywhere and not a directory: X is inert
        assert_eq!(apply("a+X", 0o644), 0o644);
        // Any existing execute bit activates X for everyone
        assert_eq!(apply("a+X", 0o744), 0o755);
    }

    #[test]
    fn test_conditional_execute_on_directory() {
        assert_eq!(
            symbolic_mode_to_octal("a+X", 0o644, true, 0o022).unwrap(),
            0o755
        );
    }

    #[test]
    fn test_copy_from_other_class() {
        // g=u copies the user bits onto group
        assert_eq!(apply("g=u", 0o740), 0o770);
    }

    #[test]
    fn test_setuid_and_sticky() {
        assert_eq!(apply("u+s", 0o755), 0o4755);
        assert_eq!(apply("o+t", 0o755), 0o1755);
        // u= clears setuid along with the user bits
        assert_eq!(apply("u=rw", 0o4755), 0o0655);
    }

    #[test]
    fn test_empty_who_applies_umask() {
        // "+w" with umask 022 grants w only where the umask allows
        assert_eq!(symbolic_mode_to_octal("+w", 0o444, false, 0o022).unwrap(), 0o644);
    }

    #[test]
    fn test_multiple_operators_in_one_clause() {
        // u=rw clears user exec, then +X re-adds it because the
        // initial mode carried an exec bit
        assert_eq!(apply("u=rw-x+X", 0o777), 0o777);
        // No exec anywhere initially: X stays inert
        assert_eq!(apply("u=rw-x+X", 0o644), 0o644);
    }

    #[test]
    fn test_rejects_bad_who_and_perms() {
        assert!(symbolic_mode_to_octal("z+x", 0o644, false, 0).is_err());
        assert!(symbolic_mode_to_octal("u+q", 0o644, false, 0).is_err());
        assert!(symbolic_mode_to_octal("u", 0o644, false, 0).is_err());
    }

    #[test]
    fn test_parse_prefers_octal() {
        assert_eq!(ModeSpec::parse("644"), ModeSpec::Octal(0o644));
        assert_eq!(ModeSpec::parse("0755"), ModeSpec::Octal(0o755));
        assert_eq!(ModeSpec::parse("u+x"), ModeSpec::Symbolic("u+x".into()));
    }
}
