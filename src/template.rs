//! `{name}` placeholder strings, parsed once and rendered many times.
//!
//! Provider definitions use `{name}` placeholders and `{{` / `}}`
//! escapes.
//! Conversions, format specs and positional fields are rejected when the
//! template is parsed.

use crate::error::TemplateError;
use std::collections::BTreeMap;

/// Placeholder name bound to the observable being looked up.
pub const OBSERVABLE: &str = "observable";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatString {
    source: String,
    segments: Vec<Segment>,
}

/// Values available to placeholders.
pub type SubstitutionContext = BTreeMap<String, String>;

impl FormatString {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let malformed = |reason: &str| TemplateError::Malformed {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(malformed("single '}' encountered")),
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(malformed("unterminated placeholder")),
                            Some(c) => name.push(c),
                        }
                    }
                    if name.is_empty() {
                        return Err(malformed("positional placeholders are not supported"));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                        || name.starts_with(|c: char| c.is_ascii_digit())
                    {
                        return Err(malformed("placeholders must be plain identifiers"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fail with [`TemplateError::UnknownPlaceholder`] for the first
    /// placeholder not in `allowed`.
    pub fn check_placeholders(&self, allowed: &[&str]) -> Result<(), TemplateError> {
        match self.placeholders().find(|name| !allowed.contains(name)) {
            Some(name) => Err(TemplateError::UnknownPlaceholder {
                name: name.to_string(),
                template: self.source.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn render(&self, context: &SubstitutionContext) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = context
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingValue(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
