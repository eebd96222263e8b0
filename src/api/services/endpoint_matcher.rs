//! Path-template matching for API contracts.

use crate::error::EngineError;
use regex::Regex;
use std::sync::LazyLock;

static PATH_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("path parameter pattern is valid"));

/// Compiled matcher for one endpoint template such as `/orders/{id}/items`.
///
/// `{name}` matches exactly one non-empty path segment, `*` matches any
/// sequence, and everything else is literal. The whole path must match.
#[derive(Debug, Clone)]
pub struct EndpointMatcher {
    template: String,
    pattern: Regex,
}

impl EndpointMatcher {
    pub fn compile(template: &str) -> Result<Self, EngineError> {
        let mut source = String::with_capacity(template.len() * 2 + 2);
        source.push('^');

        let mut rest = template;
        while let Some(c) = rest.chars().next() {
            match c {
                '{' => {
                    let Some(close) = rest.find('}') else {
                        return Err(EngineError::InvalidTemplate {
                            template: template.to_string(),
                            message: "unterminated '{' in path parameter".to_string(),
                        });
                    };
                    source.push_str("[^/]+");
                    rest = &rest[close + 1..];
                }
                '*' => {
                    source.push_str(".*");
                    rest = &rest[1..];
                }
                _ => {
                    source.push_str(&regex::escape(&c.to_string()));
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        source.push('$');

        let pattern = Regex::new(&source).map_err(|e| EngineError::InvalidTemplate {
            template: template.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            template: template.to_string(),
            pattern,
        })
    }

    /// Test a concrete call path; a `?query` or `#fragment` suffix is ignored.
    pub fn test(&self, path: &str) -> bool {
        self.pattern.is_match(strip_query(path))
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Drop the query string and fragment from a path.
pub fn strip_query(path: &str) -> &str {
    match path.find(['?', '#']) {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Remove `{param}` placeholders, e.g. `/users/{id}` becomes `/users/`.
pub fn strip_path_params(path: &str) -> String {
    PATH_PARAM_RE.replace_all(path, "").into_owned()
}
