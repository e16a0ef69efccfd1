//! DASH segment naming patterns (`media`, `initialization`).
//!
//! A pattern is parsed once into literal text and `$Identifier$` parts, so
//! substitution works on named placeholders instead of raw string replacement.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unterminated placeholder in template '{template}'")]
    Unterminated { template: String },

    #[error("Unknown identifier ${identifier}$ in template '{template}'")]
    UnknownIdentifier { template: String, identifier: String },

    #[error("Invalid format tag '{format}' in template '{template}', expected %0<width>d")]
    InvalidFormat { template: String, format: String },

    #[error("Placeholder ${identifier}$ left unresolved in template '{template}'")]
    Unresolved { template: String, identifier: String },

    #[error("Template '{template}' has no $Number$ placeholder to enumerate segments with")]
    MissingNumber { template: String },

    #[error("Invalid segment pattern for template '{template}': {reason}")]
    Pattern { template: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    RepresentationId,
    Number,
    Bandwidth,
    Time,
    SubNumber,
}

impl Placeholder {
    pub fn identifier(&self) -> &'static str {
        match self {
            Placeholder::RepresentationId => "RepresentationID",
            Placeholder::Number => "Number",
            Placeholder::Bandwidth => "Bandwidth",
            Placeholder::Time => "Time",
            Placeholder::SubNumber => "SubNumber",
        }
    }

    fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "RepresentationID" => Some(Placeholder::RepresentationId),
            "Number" => Some(Placeholder::Number),
            "Bandwidth" => Some(Placeholder::Bandwidth),
            "Time" => Some(Placeholder::Time),
            "SubNumber" => Some(Placeholder::SubNumber),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    /// `$$`, a literal dollar sign
    Escaped,
    Identifier {
        placeholder: Placeholder,
        /// Zero-padding width from a `%0<width>d` format tag
        width: Option<usize>,
    },
}

/// Values bound to placeholders during substitution. Unset values leave the
/// placeholder in place.
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    representation_id: Option<String>,
    number: Option<u64>,
    bandwidth: Option<u64>,
    time: Option<u64>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn representation_id(mut self, id: &str) -> Self {
        self.representation_id = Some(id.to_string());
        self
    }

    pub fn number(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn time(mut self, time: u64) -> Self {
        self.time = Some(time);
        self
    }

    fn render(&self, placeholder: Placeholder, width: Option<usize>) -> Option<String> {
        let numeric = match placeholder {
            Placeholder::RepresentationId => return self.representation_id.clone(),
            Placeholder::Number => self.number,
            Placeholder::Bandwidth => self.bandwidth,
            Placeholder::Time => self.time,
            Placeholder::SubNumber => None,
        }?;
        Some(match width {
            Some(width) => format!("{:0width$}", numeric, width = width),
            None => numeric.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTemplate {
    parts: Vec<TemplatePart>,
}

impl MediaTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('$') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('$').ok_or_else(|| TemplateError::Unterminated {
                template: template.to_string(),
            })?;
            let body = &after[..close];
            rest = &after[close + 1..];

            if body.is_empty() {
                flush_literal(&mut parts, &mut literal);
                parts.push(TemplatePart::Escaped);
                continue;
            }

            let (identifier, format) = match body.find('%') {
                Some(idx) => (&body[..idx], Some(&body[idx..])),
                None => (body, None),
            };
            let placeholder =
                Placeholder::from_identifier(identifier).ok_or_else(|| TemplateError::UnknownIdentifier {
                    template: template.to_string(),
                    identifier: identifier.to_string(),
                })?;
            let width = format.map(|f| parse_width(template, f)).transpose()?;

            flush_literal(&mut parts, &mut literal);
            parts.push(TemplatePart::Identifier { placeholder, width });
        }
        literal.push_str(rest);
        flush_literal(&mut parts, &mut literal);

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    pub fn contains(&self, placeholder: Placeholder) -> bool {
        self.parts.iter().any(|part| {
            matches!(part, TemplatePart::Identifier { placeholder: p, .. } if *p == placeholder)
        })
    }

    /// Replace every placeholder bound in `values` by its rendered value.
    pub fn substitute(&self, values: &TemplateValues) -> MediaTemplate {
        let mut parts: Vec<TemplatePart> = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let resolved = match part {
                TemplatePart::Identifier { placeholder, width } => values.render(*placeholder, *width),
                _ => None,
            };
            match resolved {
                Some(text) => append_literal(&mut parts, &text),
                None => parts.push(part.clone()),
            }
        }
        MediaTemplate { parts }
    }

    /// Render a fully resolved template as a relative path.
    pub fn to_path(&self) -> Result<String, TemplateError> {
        let mut path = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => path.push_str(text),
                TemplatePart::Escaped => path.push('$'),
                TemplatePart::Identifier { placeholder, .. } => {
                    return Err(TemplateError::Unresolved {
                        template: self.to_string(),
                        identifier: placeholder.identifier().to_string(),
                    })
                }
            }
        }
        Ok(path)
    }
}

impl FromStr for MediaTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaTemplate::parse(s)
    }
}

impl fmt::Display for MediaTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => f.write_str(text)?,
                TemplatePart::Escaped => f.write_str("$$")?,
                TemplatePart::Identifier { placeholder, width: Some(width) } => {
                    write!(f, "${}%0{}d$", placeholder.identifier(), width)?
                }
                TemplatePart::Identifier { placeholder, width: None } => {
                    write!(f, "${}$", placeholder.identifier())?
                }
            }
        }
        Ok(())
    }
}

fn flush_literal(parts: &mut Vec<TemplatePart>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(std::mem::take(literal)));
    }
}

fn append_literal(parts: &mut Vec<TemplatePart>, text: &str) {
    if let Some(TemplatePart::Literal(prev)) = parts.last_mut() {
        prev.push_str(text);
        return;
    }
    parts.push(TemplatePart::Literal(text.to_string()));
}

fn parse_width(template: &str, format: &str) -> Result<usize, TemplateError> {
    let invalid = || TemplateError::InvalidFormat {
        template: template.to_string(),
        format: format.to_string(),
    };
    let digits = format
        .strip_prefix("%0")
        .and_then(|f| f.strip_suffix('d'))
        .ok_or_else(invalid)?;
    digits.parse::<usize>().map_err(|_| invalid())
}
