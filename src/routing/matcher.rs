//! Path template matching.
//!
//! # Responsibilities
//! - Parse OpenAPI path templates such as `/composes/{composeId}`
//! - Match concrete request paths segment by segment
//! - Extract and percent-decode path parameter values
//!
//! # Design Decisions
//! - A parameter always spans one whole segment (`/a/{id}`, never `/a/x{id}`)
//! - Literal segments compare case-sensitively
//! - A trailing slash is significant: `/composes/` does not match `/composes`
//! - No regex in the hot path

use std::collections::BTreeMap;

use thiserror::Error;

/// Path parameter values by name, already percent-decoded.
pub type PathParams = BTreeMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("segment '{0}' mixes literal text and a parameter")]
    PartialSegment(String),

    #[error("empty parameter name")]
    EmptyName,

    #[error("parameter '{0}' appears more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for part in template.trim_start_matches('/').split('/') {
            let opens = part.contains('{') || part.contains('}');
            if !opens {
                segments.push(Segment::Literal(part.to_string()));
                continue;
            }
            let name = part
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
                .filter(|n| !n.contains('{') && !n.contains('}'))
                .ok_or_else(|| TemplateError::PartialSegment(part.to_string()))?;
            if name.is_empty() {
                return Err(TemplateError::EmptyName);
            }
            if names.contains(&name) {
                return Err(TemplateError::Duplicate(name.to_string()));
            }
            names.push(name);
            segments.push(Segment::Param(name.to_string()));
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of literal segments. More literals means a more specific template.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Match a path relative to the base path, e.g. `/composes/abc`.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let path = path.strip_prefix('/')?;
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = urlencoding::decode(part).ok()?;
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }
        Some(params)
    }
}
