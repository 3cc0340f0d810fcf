//! Key Pattern Module
//!
//! Builds invalidation patterns from endpoint templates such as
//! `/research/{researchId}/forms`.

use regex::Regex;

/// Converts an endpoint template into a regex where every `{param}` segment
/// matches anything. Literal parts are escaped and the match is unanchored.
pub fn endpoint_pattern(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(template.len() + 8);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) if close > 1 => {
                pattern.push_str(&regex::escape(&rest[..open]));
                pattern.push_str(".*");
                rest = &rest[open + close + 1..];
            }
            _ => break,
        }
    }
    pattern.push_str(&regex::escape(rest));

    Regex::new(&pattern)
}
