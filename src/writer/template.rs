//! Template Substitution
//!
//! Templates are plain text with two kinds of placeholders:
//!
//! - a literal token, replaced wherever it appears (`/opt/nedge`)
//! - a `key` whose value runs to end of line (`netmtu: 1500`)
//!
//! Substitutions are applied in list order, each one to the output of the
//! previous.

/// One placeholder rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// Replace every occurrence of `token` with `value`
    Literal { token: String, value: String },
    /// Replace `key` and the rest of its line with `key` + `value`
    Line { key: String, value: String },
}

impl Substitution {
    pub fn literal(token: impl Into<String>, value: impl Into<String>) -> Self {
        Substitution::Literal {
            token: token.into(),
            value: value.into(),
        }
    }

    pub fn line(key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Substitution::Line {
            key: key.into(),
            value: value.to_string(),
        }
    }

    /// Apply this substitution to `text`.
    pub fn apply(&self, text: &str) -> String {
        match self {
            Substitution::Literal { token, value } if !token.is_empty() => {
                text.replace(token.as_str(), value)
            }
            Substitution::Line { key, value } if !key.is_empty() => {
                replace_line_values(text, key, value)
            }
            _ => text.to_string(),
        }
    }
}

fn replace_line_values(text: &str, key: &str, value: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(key) {
        out.push_str(&rest[..pos]);
        out.push_str(key);
        out.push_str(value);

        let after = &rest[pos + key.len()..];
        rest = match after.find('\n') {
            Some(eol) => &after[eol..],
            None => "",
        };
    }

    out.push_str(rest);
    out
}

/// Apply `substitutions` to `template` in order.
pub fn apply_substitutions(template: &str, substitutions: &[Substitution]) -> String {
    substitutions
        .iter()
        .fold(template.to_string(), |text, sub| sub.apply(&text))
}
