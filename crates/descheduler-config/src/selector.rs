//! Well-formedness check for node label selectors.
//!
//! Accepts the Kubernetes selector grammar: comma-separated requirements of
//! the form `key`, `!key`, `key=value`, `key==value`, `key!=value`,
//! `key in (a,b)`, `key notin (a,b)`, `key>N` and `key<N`. Matching against
//! nodes is left to whoever queries the cluster.

use thiserror::Error;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty requirement")]
    EmptyRequirement,

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid value {value:?}: {reason}")]
    InvalidValue { value: String, reason: String },

    #[error("unexpected {found:?} after key {key:?}")]
    UnexpectedToken { key: String, found: String },

    #[error("values set for {key:?} must not be empty")]
    EmptyValueSet { key: String },

    #[error("value {value:?} for {key:?} must be an integer")]
    NonIntegerBound { key: String, value: String },

    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
}

/// Parse `selector` into requirements. An empty selector selects everything.
pub fn parse(selector: &str) -> Result<Vec<Requirement>, SelectorError> {
    if selector.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_requirements(selector)?
        .into_iter()
        .map(parse_requirement)
        .collect()
}

// Split on commas that are not inside a `( ... )` value set.
fn split_requirements(selector: &str) -> Result<Vec<&str>, SelectorError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => {
                if depth > 0 {
                    return Err(SelectorError::UnbalancedParentheses);
                }
                depth += 1;
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(SelectorError::UnbalancedParentheses)?;
            }
            ',' if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::UnbalancedParentheses);
    }
    parts.push(&selector[start..]);
    Ok(parts)
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

fn parse_requirement(raw: &str) -> Result<Requirement, SelectorError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SelectorError::EmptyRequirement);
    }

    if let Some(key) = raw.strip_prefix('!') {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement {
            key: key.to_string(),
            operator: Operator::DoesNotExist,
            values: Vec::new(),
        });
    }

    let key_end = raw.find(|c: char| !is_key_char(c)).unwrap_or(raw.len());
    let key = &raw[..key_end];
    validate_key(key)?;
    let rest = raw[key_end..].trim_start();

    let (operator, values) = if rest.is_empty() {
        (Operator::Exists, Vec::new())
    } else if let Some(v) = rest.strip_prefix("==").or_else(|| rest.strip_prefix('=')) {
        (Operator::Equals, vec![single_value(v)?])
    } else if let Some(v) = rest.strip_prefix("!=") {
        (Operator::NotEquals, vec![single_value(v)?])
    } else if let Some(v) = rest.strip_prefix('>') {
        (Operator::GreaterThan, vec![integer_value(key, v)?])
    } else if let Some(v) = rest.strip_prefix('<') {
        (Operator::LessThan, vec![integer_value(key, v)?])
    } else if let Some(v) = keyword(rest, "notin") {
        (Operator::NotIn, value_set(key, v)?)
    } else if let Some(v) = keyword(rest, "in") {
        (Operator::In, value_set(key, v)?)
    } else {
        return Err(SelectorError::UnexpectedToken {
            key: key.to_string(),
            found: rest.to_string(),
        });
    };

    Ok(Requirement {
        key: key.to_string(),
        operator,
        values,
    })
}

// `in`/`notin` must be followed by whitespace or the opening parenthesis.
fn keyword<'a>(rest: &'a str, word: &str) -> Option<&'a str> {
    let after = rest.strip_prefix(word)?;
    if after.starts_with(|c: char| c.is_whitespace() || c == '(') {
        Some(after.trim_start())
    } else {
        None
    }
}

fn single_value(raw: &str) -> Result<String, SelectorError> {
    let value = raw.trim();
    validate_value(value)?;
    Ok(value.to_string())
}

fn integer_value(key: &str, raw: &str) -> Result<String, SelectorError> {
    let value = raw.trim();
    if value.parse::<i64>().is_err() {
        return Err(SelectorError::NonIntegerBound {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

fn value_set(key: &str, raw: &str) -> Result<Vec<String>, SelectorError> {
    let inner = raw
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| SelectorError::UnexpectedToken {
            key: key.to_string(),
            found: raw.to_string(),
        })?;
    if inner.trim().is_empty() {
        return Err(SelectorError::EmptyValueSet {
            key: key.to_string(),
        });
    }
    inner.split(',').map(single_value).collect()
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason: &str| SelectorError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() {
                return Err(invalid("prefix part must be non-empty"));
            }
            if prefix.len() > MAX_PREFIX_LEN {
                return Err(invalid("prefix part must be no more than 253 characters"));
            }
            if !is_dns_subdomain(prefix) {
                return Err(invalid("prefix part must be a lowercase DNS-1123 subdomain"));
            }
            name
        }
        None => key,
    };

    if name.is_empty() {
        return Err(invalid("name part must be non-empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name part must be no more than 63 characters"));
    }
    if !is_qualified_name(name) {
        return Err(invalid(
            "name part must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric",
        ));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), SelectorError> {
    if value.is_empty() {
        return Ok(());
    }
    let invalid = |reason: &str| SelectorError::InvalidValue {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.len() > MAX_NAME_LEN {
        return Err(invalid("must be no more than 63 characters"));
    }
    if !is_qualified_name(value) {
        return Err(invalid(
            "must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric",
        ));
    }
    Ok(())
}

fn is_qualified_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(*b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn is_dns_subdomain(s: &str) -> bool {
    s.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                bytes.len() <= MAX_LABEL_LEN
                    && (first.is_ascii_lowercase() || first.is_ascii_digit())
                    && (last.is_ascii_lowercase() || last.is_ascii_digit())
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    })
}
