//! Path-pattern routing.
//!
//! Patterns are `/`-separated segments where a segment is either static
//! (`repos`) or a named parameter (`{owner}`). One leading and one trailing
//! slash are ignored on both the pattern and the request path; empty segments
//! in between are kept, so `/repos//lang/Go` matches nothing. Parameters never
//! match an empty segment. Parameter values are
//! percent-decoded, so `/repos/lang/C%23` yields `C#`.

use std::collections::HashMap;

#[derive(Debug, PartialEq)]
enum Segment {
    Static(String),
    Param(String),
}

#[derive(Debug)]
struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Static(s.to_string()),
            })
            .collect();

        Self { segments }
    }

    fn matches(&self, request_path: &str) -> Option<HashMap<String, String>> {
        let request_segments: Vec<&str> = split_path(request_path).collect();
        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, value) in self.segments.iter().zip(request_segments) {
            match segment {
                Segment::Static(expected) if expected == value => {}
                Segment::Static(_) => return None,
                Segment::Param(_) if value.is_empty() => return None,
                Segment::Param(name) => {
                    let decoded = urlencoding::decode(value).ok()?;
                    params.insert(name.clone(), decoded.into_owned());
                }
            }
        }

        Some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let path = path.trim();
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    (!path.is_empty())
        .then(|| path.split('/'))
        .into_iter()
        .flatten()
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, A> {
    pub params: HashMap<String, String>,
    pub action: &'a A,
}

impl<A> RouteMatch<'_, A> {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// An ordered list of `(pattern, action)` pairs; the first match wins.
#[derive(Debug)]
pub struct RouteTable<A> {
    routes: Vec<(PathPattern, A)>,
}

impl<A> Default for RouteTable<A> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<A> RouteTable<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, action: A) -> Self {
        self.routes.push((PathPattern::parse(pattern), action));
        self
    }

    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_, A>> {
        self.routes.iter().find_map(|(pattern, action)| {
            pattern
                .matches(path)
                .map(|params| RouteMatch { params, action })
        })
    }
}
