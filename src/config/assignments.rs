//! Shell-assignment evaluation for `.config` and `.userconfig`
//!
//! Both files are written by `config.sh` (or edited by hand) and used to be
//! sourced by bash. We evaluate the assignment subset of shell syntax and reject
//! anything that would run a command, naming the file and line.

use crate::error::{B2gError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

/// Variable name to value, as assigned by a configuration file.
pub type Assignments = BTreeMap<String, String>;

const COMMAND_SUBSTITUTION: &str = "command substitution is not supported";

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("valid regex")
});

static BARE_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export(?:\s+[A-Za-z_][A-Za-z0-9_]*)+$").expect("valid regex"));

static BRACED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?::-(.*))?$").expect("valid regex"));

/// Evaluate one configuration file.
///
/// Returns only the assignments made by `content`. References resolve against
/// earlier assignments in the same file, then `earlier`, then `inherited`.
pub fn evaluate(
    path: &Path,
    content: &str,
    earlier: &Assignments,
    inherited: &BTreeMap<String, String>,
) -> Result<Assignments> {
    let mut layer = Assignments::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || BARE_EXPORT.is_match(line) {
            continue;
        }

        let syntax_error = |message: String| B2gError::ConfigSyntax {
            path: path.to_path_buf(),
            line: idx + 1,
            message,
        };

        let Some(caps) = ASSIGNMENT.captures(line) else {
            return Err(syntax_error(format!("not a variable assignment: {line}")));
        };

        let value = {
            let lookup = |key: &str| {
                layer
                    .get(key)
                    .or_else(|| earlier.get(key))
                    .or_else(|| inherited.get(key))
                    .cloned()
            };
            parse_value(&caps[2], &lookup).map_err(syntax_error)?
        };
        layer.insert(caps[1].to_string(), value);
    }

    Ok(layer)
}

type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

fn parse_value(raw: &str, lookup: &Lookup<'_>) -> std::result::Result<String, String> {
    let mut value = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                let mut closed = false;
                for q in chars.by_ref() {
                    if q == '\'' {
                        closed = true;
                        break;
                    }
                    value.push(q);
                }
                if !closed {
                    return Err("unterminated single quote".to_string());
                }
            }
            '"' => {
                let mut closed = false;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.peek().copied() {
                            Some(n @ ('"' | '\\' | '$' | '`')) => {
                                value.push(n);
                                chars.next();
                            }
                            _ => value.push('\\'),
                        },
                        '$' => expand(&mut chars, &mut value, lookup)?,
                        '`' => return Err(COMMAND_SUBSTITUTION.to_string()),
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err("unterminated double quote".to_string());
                }
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            }
            '$' => expand(&mut chars, &mut value, lookup)?,
            '`' => return Err(COMMAND_SUBSTITUTION.to_string()),
            ';' | '&' | '|' | '<' | '>' | '(' | ')' => {
                return Err(format!("unsupported shell syntax '{c}'"));
            }
            c if c.is_whitespace() => {
                let rest: String = chars.by_ref().collect();
                let rest = rest.trim_start();
                if rest.is_empty() || rest.starts_with('#') {
                    break;
                }
                return Err(format!("unexpected text after value: {rest}"));
            }
            other => value.push(other),
        }
    }

    Ok(value)
}

fn expand(
    chars: &mut Peekable<Chars<'_>>,
    value: &mut String,
    lookup: &Lookup<'_>,
) -> std::result::Result<(), String> {
    match chars.peek().copied() {
        Some('{') => {
            chars.next();
            let mut inner = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                inner.push(c);
            }
            if !closed {
                return Err("unterminated ${...} expansion".to_string());
            }

            let caps = BRACED
                .captures(&inner)
                .ok_or_else(|| format!("unsupported expansion: ${{{inner}}}"))?;
            // `:-` treats an empty value the same as an unset one
            let current = lookup(&caps[1]).filter(|v| !v.is_empty());
            match (current, caps.get(2)) {
                (Some(v), _) => value.push_str(&v),
                (None, Some(default)) => value.push_str(&parse_value(default.as_str(), lookup)?),
                (None, None) => {}
            }
        }
        Some('(') => return Err(COMMAND_SUBSTITUTION.to_string()),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '_' || c.is_ascii_alphanumeric() {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if let Some(v) = lookup(&name) {
                value.push_str(&v);
            }
        }
        _ => value.push('$'),
    }
    Ok(())
}
