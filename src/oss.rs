//! Object store request signing
//!
//! Direct uploads are authorized with an HMAC-SHA1 signature over a canonical
//! string. The store recomputes the same string from the request it receives,
//! so the header set and line order below must not change.

use crate::error::{Error, Result};
use crate::types::UploadTicket;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Inputs to the canonical string to sign
#[derive(Clone, Debug)]
pub struct SignatureInput<'a> {
    /// Content type of the uploaded bytes
    pub mime: &'a str,
    /// HTTP date sent in `x-oss-date`
    pub date: &'a str,
    /// Security token from the upload ticket
    pub security_token: &'a str,
    /// SDK user agent sent in `x-oss-user-agent`
    pub user_agent: &'a str,
    /// Bucket name
    pub bucket: &'a str,
    /// Object key (`v2-<hash>`)
    pub object_key: &'a str,
}

/// Object key for a content hash
pub fn object_key(hash: &str) -> String {
    format!("v2-{hash}")
}

/// Format a timestamp as an HTTP date (`Tue, 15 Nov 1994 08:12:31 GMT`)
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the canonical string to sign
pub fn string_to_sign(input: &SignatureInput<'_>) -> String {
    format!(
        "PUT\n\n{mime}\n{date}\nx-oss-date:{date}\nx-oss-security-token:{token}\nx-oss-user-agent:{ua}\n/{bucket}/{key}",
        mime = input.mime,
        date = input.date,
        token = input.security_token,
        ua = input.user_agent,
        bucket = input.bucket,
        key = input.object_key,
    )
}

/// HMAC-SHA1 of `string_to_sign` keyed by `secret`, base64 encoded
pub fn sign(secret: &str, string_to_sign: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Other(format!("invalid signing key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Headers for a signed PUT of `object_key`
///
/// Returns `(name, value)` pairs in the order the store documents them; the
/// `Content-Type` header is carried separately with the body.
pub fn signed_headers(
    ticket: &UploadTicket,
    mime: &str,
    date: &str,
    user_agent: &str,
    bucket: &str,
    object_key: &str,
) -> Result<Vec<(&'static str, String)>> {
    let to_sign = string_to_sign(&SignatureInput {
        mime,
        date,
        security_token: &ticket.security_token,
        user_agent,
        bucket,
        object_key,
    });
    let signature = sign(&ticket.access_key_secret, &to_sign)?;

    Ok(vec![
        ("x-oss-date", date.to_string()),
        ("x-oss-user-agent", user_agent.to_string()),
        ("x-oss-security-token", ticket.security_token.clone()),
        (
            "authorization",
            format!("OSS {}:{}", ticket.access_id, signature),
        ),
    ])
}
