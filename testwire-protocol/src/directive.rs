// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing and rendering of `##testwire[...]` directive lines.

use indexmap::IndexMap;
use std::fmt;

/// The marker that introduces a directive line.
pub const DIRECTIVE_MARKER: &str = "##testwire[";

/// The attribute name the single-quoted bare-value form is mapped to:
/// `##testwire[message 'hello']` is equivalent to
/// `##testwire[message text='hello']`.
pub const BARE_VALUE_ATTR: &str = "text";

/// A parsed directive: a name plus an ordered attribute map.
///
/// Attribute order is preserved as written, so a parse/render round trip
/// reproduces the original line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Directive {
    name: String,
    attributes: IndexMap<String, String>,
}

impl Directive {
    /// Creates a new directive with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Adds or replaces an attribute, returning `self` for chaining.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The directive name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute map, in the order attributes were written.
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Looks up an attribute value by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Attempts to parse a line as a directive.
    ///
    /// The line is trimmed of surrounding whitespace first. Returns `None`
    /// both for lines that don't carry the marker at all and for
    /// marker-carrying lines that are malformed (unterminated quote, junk
    /// between attributes, trailing text after the closing bracket). This
    /// parser never panics on any input: a malformed line is simply not a
    /// directive, and the caller treats it as plain text.
    pub fn parse(line: &str) -> Option<Directive> {
        let trimmed = line.trim();
        let body = trimmed.strip_prefix(DIRECTIVE_MARKER)?;
        let body = body.strip_suffix(']')?;

        let mut chars = body.char_indices().peekable();
        skip_spaces(&mut chars);
        let name = take_name(body, &mut chars)?;
        if name.is_empty() {
            return None;
        }

        let mut attributes = IndexMap::new();
        skip_spaces(&mut chars);

        // Bare-value form: a single quoted value right after the name.
        if let Some(&(_, '\'')) = chars.peek() {
            chars.next();
            let value = take_quoted(&mut chars)?;
            skip_spaces(&mut chars);
            if chars.next().is_some() {
                return None;
            }
            attributes.insert(BARE_VALUE_ATTR.to_owned(), value);
            return Some(Directive { name, attributes });
        }

        loop {
            skip_spaces(&mut chars);
            if chars.peek().is_none() {
                break;
            }
            let key = take_name(body, &mut chars)?;
            if key.is_empty() {
                return None;
            }
            match chars.next() {
                Some((_, '=')) => {}
                _ => return None,
            }
            match chars.next() {
                Some((_, '\'')) => {}
                _ => return None,
            }
            let value = take_quoted(&mut chars)?;
            attributes.insert(key, value);
        }

        Some(Directive { name, attributes })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", DIRECTIVE_MARKER, self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {}='{}'", key, escape(value))?;
        }
        write!(f, "]")
    }
}

fn skip_spaces(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    while let Some(&(_, c)) = chars.peek() {
        if c == ' ' {
            chars.next();
        } else {
            break;
        }
    }
}

/// Consumes a name token (directive or attribute name): everything up to
/// the next space, `=` or end of input.
fn take_name(
    body: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Option<String> {
    let start = match chars.peek() {
        Some(&(i, _)) => i,
        None => return None,
    };
    let mut end = body.len();
    while let Some(&(i, c)) = chars.peek() {
        if c == ' ' || c == '=' || c == '\'' {
            end = i;
            break;
        }
        chars.next();
    }
    Some(body[start..end].to_owned())
}

/// Consumes a quoted value with the opening quote already eaten, undoing
/// escapes. Returns `None` if the closing quote is missing.
fn take_quoted(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> Option<String> {
    let mut value = String::new();
    loop {
        let (_, c) = chars.next()?;
        match c {
            '\'' => return Some(value),
            '|' => {
                let (_, next) = chars.next()?;
                match next {
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    '\'' => value.push('\''),
                    '|' => value.push('|'),
                    '[' => value.push('['),
                    ']' => value.push(']'),
                    // Unknown escape: keep both characters so no input is lost.
                    other => {
                        value.push('|');
                        value.push(other);
                    }
                }
            }
            other => value.push(other),
        }
    }
}

/// Escapes a value for embedding into a single-quoted attribute.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            '\'' => out.push_str("|'"),
            '|' => out.push_str("||"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            other => out.push(other),
        }
    }
    out
}
