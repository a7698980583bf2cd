//! `Set-Cookie` parsing and `Cookie` header assembly

use reqwest::header::{HeaderMap, SET_COOKIE};

/// Parse one `Set-Cookie` value into `(name, value)`
///
/// Only the `name=value` pair before the first `;` is kept; attributes such
/// as `Domain` or `Expires` are irrelevant to replaying the session.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Collect every cookie set by a response, later headers winning for repeated names
pub fn from_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for raw in headers.get_all(SET_COOKIE) {
        let Ok(raw) = raw.to_str() else {
            tracing::debug!("skipping non-ASCII Set-Cookie header");
            continue;
        };
        if let Some((name, value)) = parse_set_cookie(raw) {
            match out.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = value,
                None => out.push((name, value)),
            }
        }
    }
    out
}

/// Join cookies into a `Cookie` header value (`a=1; b=2`)
pub fn header_value<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
