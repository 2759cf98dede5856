//! [`RouteTable`] – ordered, method-scoped path routing.
//!
//! Routes are evaluated in registration order and the first one whose method
//! matches and whose pattern matches the path wins. There is no
//! longest-match or specificity resolution. A miss is not an error: callers
//! answer it with the generic page.

use firos_types::FirosError;
use regex::Regex;

use crate::http::Method;

/// A registered route: method, anchored path pattern and handler tag.
#[derive(Debug, Clone)]
struct Route<H> {
    method: Method,
    pattern: Regex,
    handler: H,
}

/// Result of a successful lookup.
#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, H> {
    pub handler: &'a H,
    /// Capture groups of the pattern, in order. Unmatched optional groups
    /// are empty strings.
    pub params: Vec<String>,
}

impl<H> RouteMatch<'_, H> {
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// Ordered list of `(method, pattern, handler)` triples.
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route (builder-style).
    ///
    /// # Errors
    ///
    /// Returns [`FirosError::Parsing`] if `pattern` is not a valid regex.
    pub fn route(mut self, method: Method, pattern: &str, handler: H) -> Result<Self, FirosError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| FirosError::Parsing(format!("invalid route pattern {pattern:?}: {e}")))?;
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(self)
    }

    /// First route registered for `method` whose pattern matches `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes
            .iter()
            .filter(|route| &route.method == method)
            .find_map(|route| {
                let captures = route.pattern.captures(path)?;
                let params = captures
                    .iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                Some(RouteMatch {
                    handler: &route.handler,
                    params,
                })
            })
    }
}
