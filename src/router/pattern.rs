//! Path pattern compilation.
//!
//! Patterns are `/`-separated segments: literals, `:name` parameters that
//! capture one non-empty segment, and a trailing `*` that captures whatever is
//! left. Matching is anchored at both ends and strict about trailing slashes.
//! Literal segments compare case-insensitively.

use std::borrow::Cow;

/// Captures produced by a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// Captured segments in pattern order, percent-decoded.
    pub params: Vec<String>,
    /// Bytes of the path consumed by the match.
    pub matched_len: usize,
}

/// Anything that can decide whether a request path belongs to a route.
pub trait PathMatcher: Send + Sync + 'static {
    fn match_path(&self, path: &str) -> Option<PathMatch>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        let source = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("/{pattern}")
        };

        let body = &source[1..];
        let trailing_slash = body.ends_with('/');
        let body = body.strip_suffix('/').unwrap_or(body);

        let raw: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };
        let last = raw.len().saturating_sub(1);
        let segments = raw
            .iter()
            .enumerate()
            .map(|(index, part)| match *part {
                "*" if index == last => Segment::Rest,
                p if p.len() > 1 && p.starts_with(':') => Segment::Param(p[1..].to_string()),
                p => Segment::Literal(p.to_string()),
            })
            .collect();

        Self {
            source,
            segments,
            trailing_slash,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Rest => Some("*"),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let rest = path.strip_prefix('/')?;
        let rest = if self.trailing_slash {
            rest.strip_suffix('/')?
        } else if rest.ends_with('/') && !self.ends_with_rest() {
            return None;
        } else {
            rest
        };

        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        let mut params = Vec::new();
        let mut index = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => {
                    let part = parts.get(index)?;
                    if !part.eq_ignore_ascii_case(literal) {
                        return None;
                    }
                    index += 1;
                }
                Segment::Param(_) => {
                    let part = parts.get(index).filter(|p| !p.is_empty())?;
                    params.push(decode(part));
                    index += 1;
                }
                Segment::Rest => {
                    let remainder = parts.get(index..).unwrap_or(&[]).join("/");
                    params.push(decode(&remainder));
                    index = parts.len();
                }
            }
        }

        if index != parts.len() {
            return None;
        }

        Some(PathMatch {
            params,
            matched_len: path.len(),
        })
    }

    fn ends_with_rest(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Rest))
    }
}

impl PathMatcher for PathPattern {
    fn match_path(&self, path: &str) -> Option<PathMatch> {
        self.matches(path)
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}
