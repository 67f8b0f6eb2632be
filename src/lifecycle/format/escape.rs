//! Backslash escaping for field values.
//!
//! Field values may hold any text. Characters that delimit the format
//! (`|`, `,`, `[`, `]`, `=`), line breaks, and the backslash itself are
//! escaped so every value fits on one line and splits unambiguously.

/// Escapes `value` for use inside a field.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '|' | ',' | '[' | ']' | '=' => {
                escaped.push('\\');
                escaped.push(character);
            }
            _ => escaped.push(character),
        }
    }
    escaped
}

/// Reverses [`escape`]. Returns `None` for a dangling or unknown escape.
#[must_use]
pub fn unescape(value: &str) -> Option<String> {
    let mut unescaped = String::with_capacity(value.len());
    let mut characters = value.chars();
    while let Some(character) = characters.next() {
        if character != '\\' {
            unescaped.push(character);
            continue;
        }
        match characters.next()? {
            'n' => unescaped.push('\n'),
            'r' => unescaped.push('\r'),
            escaped @ ('\\' | '|' | ',' | '[' | ']' | '=') => unescaped.push(escaped),
            _ => return None,
        }
    }
    Some(unescaped)
}

/// Splits `value` on every unescaped `separator`, keeping escapes intact.
#[must_use]
pub fn split_unescaped(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (index, character) in value.char_indices() {
        if escaped {
            escaped = false;
        } else if character == '\\' {
            escaped = true;
        } else if character == separator {
            parts.push(value.get(start..index).unwrap_or_default());
            start = index + character.len_utf8();
        }
    }
    parts.push(value.get(start..).unwrap_or_default());
    parts
}

/// Splits `value` at its first unescaped `separator`.
#[must_use]
pub fn split_once_unescaped(value: &str, separator: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (index, character) in value.char_indices() {
        if escaped {
            escaped = false;
        } else if character == '\\' {
            escaped = true;
        } else if character == separator {
            let rest = value.get(index + character.len_utf8()..)?;
            return Some((value.get(..index)?, rest));
        }
    }
    None
}

/// Escapes one line of free prose. Only a leading `#` or `\` is escaped,
/// so the prose stays readable and never looks like a section header.
#[must_use]
pub fn escape_prose_line(line: &str) -> String {
    if line.starts_with('#') || line.starts_with('\\') {
        format!("\\{line}")
    } else {
        line.to_owned()
    }
}

/// Reverses [`escape_prose_line`].
#[must_use]
pub fn unescape_prose_line(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}
