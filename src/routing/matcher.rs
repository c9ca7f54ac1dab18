//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse registration patterns (`/users/:id`, `/static/*path`)
//! - Normalize paths so `/a`, `/a/` and `//a` are the same route
//! - Match a request path and capture parameters
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Catch-all only allowed as the last segment, may capture an empty rest
//! - No regex to guarantee O(n) matching

use thiserror::Error;

/// Parameters captured from a matched path, in pattern order.
pub type Params = Vec<(String, String)>;

/// Reasons a pattern is rejected at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern {0:?} has a parameter without a name")]
    UnnamedParam(String),

    #[error("pattern {0:?} has a catch-all before its last segment")]
    CatchAllNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    normalized: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let raw: Vec<&str> = split(pattern).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (i, part) in raw.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PatternError::UnnamedParam(pattern.to_string()));
                }
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if i + 1 != raw.len() {
                    return Err(PatternError::CatchAllNotLast(pattern.to_string()));
                }
                if name.is_empty() {
                    return Err(PatternError::UnnamedParam(pattern.to_string()));
                }
                Segment::CatchAll(name.to_string())
            } else {
                Segment::Static((*part).to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            normalized: join(&raw),
            segments,
        })
    }

    /// Pattern text in canonical form.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// True when the pattern has no parameters.
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Static(_)))
    }

    /// Match `path`, returning captured parameters.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = split(path).collect();
        let mut params = Params::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.push((name.clone(), (*value).to_string()));
                }
                Segment::CatchAll(name) => {
                    let rest = parts.get(i..).unwrap_or_default().join("/");
                    params.push((name.clone(), rest));
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

/// Canonical form of a request path.
pub fn normalize(path: &str) -> String {
    join(&split(path).collect::<Vec<_>>())
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn join(parts: &[&str]) -> String {
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_pattern() {
        let p = RoutePattern::parse("/api/v1/").unwrap();
        assert!(p.is_static());
        assert_eq!(p.as_str(), "/api/v1");
        assert_eq!(p.matches("/api/v1"), Some(vec![]));
        assert_eq!(p.matches("//api/v1/"), Some(vec![]));
        assert_eq!(p.matches("/api"), None);
        assert_eq!(p.matches("/api/v1/x"), None);
        assert_eq!(p.matches("/API/v1"), None);
    }

    #[test]
    fn test_params() {
        let p = RoutePattern::parse("/users/:id/posts/:post").unwrap();
        assert!(!p.is_static());
        assert_eq!(
            p.matches("/users/42/posts/7"),
            Some(vec![("id".into(), "42".into()), ("post".into(), "7".into())])
        );
        assert_eq!(p.matches("/users/42/posts"), None);
    }

    #[test]
    fn test_catch_all() {
        let p = RoutePattern::parse("/static/*file").unwrap();
        assert_eq!(
            p.matches("/static/css/site.css"),
            Some(vec![("file".into(), "css/site.css".into())])
        );
        assert_eq!(p.matches("/static"), Some(vec![("file".into(), String::new())]));
        assert_eq!(p.matches("/other/x"), None);
    }

    #[test]
    fn test_root() {
        let p = RoutePattern::parse("/").unwrap();
        assert_eq!(p.as_str(), "/");
        assert_eq!(p.matches(""), Some(vec![]));
        assert_eq!(normalize("///"), "/");
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(
            RoutePattern::parse("/a/:/b"),
            Err(PatternError::UnnamedParam("/a/:/b".into()))
        );
        assert_eq!(
            RoutePattern::parse("/*rest/more"),
            Err(PatternError::CatchAllNotLast("/*rest/more".into()))
        );
    }
}
